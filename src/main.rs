use std::io::{self, Read};
use std::time::Instant;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use fieldswarm::gpu::{GpuSimulation, create_device};
use fieldswarm::view::max_abs_difference;
use fieldswarm::{FrameScheduler, FrameSnapshot, FrameStats, SimConfig, SimulationState};

#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum Request {
    Init {
        #[serde(default)]
        config: SimConfig,
    },
    Step {
        #[serde(default)]
        config: SimConfig,
        #[serde(default = "default_frames")]
        frames: u32,
        #[serde(default)]
        backend: Backend,
    },
    Probe {
        #[serde(default = "default_probe_radius")]
        particle_radius: u32,
        #[serde(default = "default_probe_radius")]
        field_radius: u32,
        #[serde(default = "default_probe_frames")]
        frames: u32,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Backend {
    #[default]
    Cpu,
    Gpu,
}

impl Backend {
    fn name(self) -> &'static str {
        match self {
            Backend::Cpu => "cpu/rayon",
            Backend::Gpu => "wgpu",
        }
    }
}

fn default_frames() -> u32 { 1 }
fn default_probe_radius() -> u32 { 16 }
fn default_probe_frames() -> u32 { 4 }

/// Largest particle discrepancy a probe accepts between backends.
const PROBE_PARTICLE_TOLERANCE: f32 = 1e-3;
/// Largest field discrepancy a probe accepts between backends.
const PROBE_FIELD_TOLERANCE: f32 = 1e-2;

#[derive(Debug, Serialize)]
struct InitResponse {
    ok: bool,
    backend: &'static str,
    particles: usize,
    field_radius: u32,
    atlas_size: u32,
    atlas_tiles: u32,
    texels: usize,
    particle_index: u64,
    field_index: u64,
    elapsed_ms: f64,
}

#[derive(Debug, Serialize)]
struct StepResponse {
    ok: bool,
    backend: &'static str,
    frames: u32,
    elapsed_ms: f64,
    fps: f64,
    stats: FrameStats,
}

#[derive(Debug, Serialize)]
struct ProbeResponse {
    ok: bool,
    backend: &'static str,
    particle_radius: u32,
    field_radius: u32,
    frames: u32,
    cpu_ms: f64,
    gpu_ms: f64,
    max_particle_error: f32,
    max_field_error: f32,
    cpu: FrameStats,
    gpu: FrameStats,
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        let out = serde_json::json!({"ok": false, "error": format!("{err:#}")});
        println!(
            "{}",
            serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{\"ok\":false}".into())
        );
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    let req: Request = if input.trim().is_empty() {
        Request::Probe {
            particle_radius: default_probe_radius(),
            field_radius: default_probe_radius(),
            frames: default_probe_frames(),
        }
    } else {
        serde_json::from_str(&input).context("invalid JSON request")?
    };

    match req {
        Request::Init { config } => {
            let resp = run_init(&config)?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Request::Step {
            config,
            frames,
            backend,
        } => {
            let frames = frames.max(1);
            let resp = match backend {
                Backend::Cpu => run_step_cpu(&config, frames)?,
                Backend::Gpu => pollster::block_on(run_step_gpu(&config, frames))?,
            };
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Request::Probe {
            particle_radius,
            field_radius,
            frames,
        } => {
            let resp = pollster::block_on(run_probe(particle_radius, field_radius, frames.max(1)))?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
    }

    Ok(())
}

fn run_init(config: &SimConfig) -> Result<InitResponse> {
    let t0 = Instant::now();
    let state = SimulationState::new(config).context("invalid configuration")?;
    let layout = state.layout();
    Ok(InitResponse {
        ok: true,
        backend: Backend::Cpu.name(),
        particles: state.particles().len(),
        field_radius: layout.field_radius(),
        atlas_size: layout.size(),
        atlas_tiles: layout.tiles(),
        texels: layout.texel_count(),
        particle_index: state.particles().index(),
        field_index: state.field().index(),
        elapsed_ms: t0.elapsed().as_secs_f64() * 1000.0,
    })
}

fn run_cpu(config: &SimConfig, frames: u32) -> Result<(FrameSnapshot, f64)> {
    let mut state = SimulationState::new(config).context("invalid configuration")?;
    let t0 = Instant::now();
    FrameScheduler::run(&mut state, frames);
    let elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0;
    Ok((FrameSnapshot::from(state.view()), elapsed_ms))
}

async fn run_gpu(config: &SimConfig, frames: u32) -> Result<(FrameSnapshot, f64)> {
    let ctx = create_device().await?;
    let mut sim = GpuSimulation::new(ctx, config)?;
    let t0 = Instant::now();
    sim.run(frames);
    // timing includes readback
    let snapshot = sim.snapshot()?;
    let elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0;
    Ok((snapshot, elapsed_ms))
}

fn step_response(backend: Backend, frames: u32, snapshot: &FrameSnapshot, elapsed_ms: f64) -> StepResponse {
    let stats = snapshot.view().stats(u64::from(frames));
    info!(
        "{} ran {frames} frames in {elapsed_ms:.2} ms, energy {:.4}",
        backend.name(),
        stats.field_energy
    );
    StepResponse {
        ok: stats.contained,
        backend: backend.name(),
        frames,
        elapsed_ms,
        fps: frames as f64 / (elapsed_ms / 1000.0).max(1e-9),
        stats,
    }
}

fn run_step_cpu(config: &SimConfig, frames: u32) -> Result<StepResponse> {
    let (snapshot, elapsed_ms) = run_cpu(config, frames)?;
    Ok(step_response(Backend::Cpu, frames, &snapshot, elapsed_ms))
}

async fn run_step_gpu(config: &SimConfig, frames: u32) -> Result<StepResponse> {
    let (snapshot, elapsed_ms) = run_gpu(config, frames).await?;
    Ok(step_response(Backend::Gpu, frames, &snapshot, elapsed_ms))
}

async fn run_probe(particle_radius: u32, field_radius: u32, frames: u32) -> Result<ProbeResponse> {
    let config = SimConfig::with_radii(particle_radius, field_radius);
    let (cpu, cpu_ms) = run_cpu(&config, frames)?;
    let (gpu, gpu_ms) = run_gpu(&config, frames).await?;

    let (max_particle_error, max_field_error) = max_abs_difference(&cpu, &gpu);
    let ok = max_particle_error <= PROBE_PARTICLE_TOLERANCE && max_field_error <= PROBE_FIELD_TOLERANCE;
    if !ok {
        warn!(
            "backends drifted after {frames} frames: particles {max_particle_error:e}, field {max_field_error:e}"
        );
    }

    Ok(ProbeResponse {
        ok,
        backend: "cpu/rayon vs wgpu",
        particle_radius,
        field_radius,
        frames,
        cpu_ms,
        gpu_ms,
        max_particle_error,
        max_field_error,
        cpu: cpu.view().stats(u64::from(frames)),
        gpu: gpu.view().stats(u64::from(frames)),
    })
}
