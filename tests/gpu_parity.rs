//! The wgpu backend against the CPU backend.
//!
//! Needs a GPU adapter: `cargo test --test gpu_parity -- --ignored`.

use fieldswarm::gpu::{GpuContext, GpuSimulation, create_device};
use fieldswarm::view::max_abs_difference;
use fieldswarm::{FrameScheduler, FrameSnapshot, Seeding, SimConfig, SimulationState};

fn init_device() -> GpuContext {
    match pollster::block_on(create_device()) {
        Ok(ctx) => ctx,
        Err(err) => panic!("GPU adapter required: {err:#}"),
    }
}

fn cpu_snapshot(config: &SimConfig, frames: u32) -> FrameSnapshot {
    let mut state = SimulationState::new(config).unwrap();
    FrameScheduler::run(&mut state, frames);
    FrameSnapshot::from(state.view())
}

#[test]
#[ignore = "requires a GPU adapter"]
fn resting_cluster_matches_cpu() {
    let ctx = init_device();
    let config = SimConfig {
        seeding: Seeding::Point {
            position: [0.5, 0.5, 0.625],
        },
        ..SimConfig::with_radii(4, 4)
    };
    let mut sim = GpuSimulation::new(ctx, &config).unwrap();
    sim.run(1);
    let gpu = sim.snapshot().unwrap();
    let cpu = cpu_snapshot(&config, 1);

    assert_eq!(gpu.particle_index, cpu.particle_index);
    assert_eq!(gpu.field_index, cpu.field_index);
    let (particles, field) = max_abs_difference(&cpu, &gpu);
    assert!(particles < 1e-6, "particle error {particles}");
    assert!(field < 1e-4, "field error {field}");
}

#[test]
#[ignore = "requires a GPU adapter"]
fn gpu_frames_keep_particles_inside() {
    let ctx = init_device();
    let config = SimConfig {
        seeding: Seeding::Volume,
        ..SimConfig::with_radii(16, 16)
    };
    let mut sim = GpuSimulation::new(ctx, &config).unwrap();
    sim.run(20);
    assert_eq!(sim.frame(), 20);
    let snapshot = sim.snapshot().unwrap();
    let stats = snapshot.view().stats(sim.frame());
    assert!(stats.contained);
    assert_eq!(stats.particles, 256);
    assert_eq!(stats.field_index, 2 + 40);
}
