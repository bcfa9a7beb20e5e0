//! wgpu compute backend.
//!
//! Ring slots are device buffers held in the same [`RingBuffer`] the CPU
//! stores use; bind groups are built once per slot combination so a frame
//! only records dispatches. Every pass is its own compute pass, and wgpu
//! orders storage writes of one pass before reads in the next.

mod shaders;

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use log::{debug, info, warn};
use wgpu::util::DeviceExt;

use crate::atlas::AtlasLayout;
use crate::config::{FieldSampling, SimConfig};
use crate::error::CapabilityError;
use crate::field::{FIELD_INITIAL_INDEX, FIELD_SLOTS};
use crate::kernels::StepParams;
use crate::kernels::splat::FIXED_POINT_SCALE;
use crate::particles::{PARTICLE_SLOTS, ParticleStore};
use crate::ring::RingBuffer;
use crate::scheduler::DIFFUSION_PASSES;
use crate::view::FrameSnapshot;

use shaders::{ADVECT_WGSL, DIFFUSE_WGSL, PRELUDE_WGSL, SPLAT_RESOLVE_WGSL, SPLAT_SCATTER_WGSL};

const WORKGROUP_SIZE: u32 = 64;
const TEXEL_BYTES: u64 = std::mem::size_of::<[f32; 4]>() as u64;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Params {
    particle_count: u32,
    field_radius: u32,
    tiles: u32,
    atlas_size: u32,
    texel_count: u32,
    bilinear: u32,
    _pad0: u32,
    _pad1: u32,
    swirl: f32,
    gradient: f32,
    gravity: f32,
    force_scale: f32,
    inertia_damping: f32,
    field_coupling: f32,
    splat_weight: f32,
    diffusion_decay: f32,
    fixed_scale: f32,
    _pad2: f32,
    _pad3: f32,
    _pad4: f32,
}

impl Params {
    fn new(layout: &AtlasLayout, particle_count: u32, step: &StepParams) -> Self {
        Self {
            particle_count,
            field_radius: layout.field_radius(),
            tiles: layout.tiles(),
            atlas_size: layout.size(),
            texel_count: layout.texel_count() as u32,
            bilinear: u32::from(step.sampling == FieldSampling::Bilinear),
            _pad0: 0,
            _pad1: 0,
            swirl: step.forces.swirl,
            gradient: step.forces.gradient,
            gravity: step.forces.gravity,
            force_scale: step.forces.scale,
            inertia_damping: step.inertia_damping,
            field_coupling: step.field_coupling,
            splat_weight: step.splat_weight,
            diffusion_decay: step.diffusion_decay,
            fixed_scale: FIXED_POINT_SCALE,
            _pad2: 0.0,
            _pad3: 0.0,
            _pad4: 0.0,
        }
    }
}

pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_name: String,
}

pub async fn create_device() -> Result<GpuContext> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions::default())
        .await
        .ok()
        .ok_or(CapabilityError::NoAdapter)?;
    let info = adapter.get_info();
    info!("gpu adapter: {} ({:?})", info.name, info.backend);

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("fieldswarm"),
            ..Default::default()
        })
        .await
        .context("request_device failed")?;
    Ok(GpuContext {
        device,
        queue,
        adapter_name: info.name,
    })
}

/// Workgroup grid covering `n` invocations, spilling into y when x runs out.
fn dispatch_dims(n: usize, max_per_dim: u32) -> (u32, u32) {
    let groups = (n as u64).div_ceil(u64::from(WORKGROUP_SIZE)).max(1);
    let x = groups.min(u64::from(max_per_dim));
    let y = groups.div_ceil(x);
    (x as u32, y.min(u64::from(u32::MAX)) as u32)
}

/// Reject layouts the device cannot bind or dispatch.
pub fn check_capabilities(
    limits: &wgpu::Limits,
    layout: &AtlasLayout,
    particle_count: usize,
) -> Result<(), CapabilityError> {
    let available = u64::from(limits.max_storage_buffer_binding_size);
    for (what, bytes) in [
        ("particle buffer", particle_count as u64 * TEXEL_BYTES),
        ("field buffer", layout.texel_count() as u64 * TEXEL_BYTES),
    ] {
        if bytes > available {
            return Err(CapabilityError::StorageTooSmall {
                what,
                required: bytes,
                available,
            });
        }
    }
    let max = limits.max_compute_workgroups_per_dimension;
    for (what, n) in [("particle pass", particle_count), ("field pass", layout.texel_count())] {
        let (_, y) = dispatch_dims(n, max);
        if y > max {
            return Err(CapabilityError::TooManyWorkgroups {
                what,
                required: y,
                available: max,
            });
        }
    }
    Ok(())
}

fn mk_pipeline(device: &wgpu::Device, label: &str, body: &str) -> wgpu::ComputePipeline {
    let source = format!("{PRELUDE_WGSL}{body}");
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: None,
        module: &shader,
        entry_point: Some("main"),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    })
}

fn mk_storage_vec4(device: &wgpu::Device, label: &str, data: &[Vec4]) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(data),
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
    })
}

fn mk_bind_group(
    device: &wgpu::Device,
    label: &str,
    pipeline: &wgpu::ComputePipeline,
    buffers: &[&wgpu::Buffer],
) -> wgpu::BindGroup {
    let entries: Vec<wgpu::BindGroupEntry<'_>> = buffers
        .iter()
        .enumerate()
        .map(|(binding, buf)| wgpu::BindGroupEntry {
            binding: binding as u32,
            resource: buf.as_entire_binding(),
        })
        .collect();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: &pipeline.get_bind_group_layout(0),
        entries: &entries,
    })
}

fn map_wait(device: &wgpu::Device, slice: &wgpu::BufferSlice<'_>) -> Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |r| {
        let _ = tx.send(r);
    });
    device
        .poll(wgpu::PollType::wait_indefinitely())
        .context("device poll failed")?;
    rx.recv().context("map_async channel closed")??;
    Ok(())
}

/// The frame loop of [`crate::scheduler::FrameScheduler`] on a device.
pub struct GpuSimulation {
    ctx: GpuContext,
    layout: AtlasLayout,
    particle_radius: u32,
    particle_count: usize,
    particles: RingBuffer<wgpu::Buffer>,
    field: RingBuffer<wgpu::Buffer>,

    splat_pipeline: wgpu::ComputePipeline,
    resolve_pipeline: wgpu::ComputePipeline,
    diffuse_pipeline: wgpu::ComputePipeline,
    advect_pipeline: wgpu::ComputePipeline,

    // indexed by particle slot being splatted
    bg_splat: Vec<wgpu::BindGroup>,
    // indexed by field slot receiving the splat
    bg_resolve: Vec<wgpu::BindGroup>,
    // indexed by field slot being written
    bg_diffuse: Vec<wgpu::BindGroup>,
    // indexed by [particle slot being written][field slot read]
    bg_advect: Vec<Vec<wgpu::BindGroup>>,

    particle_dims: (u32, u32),
    texel_dims: (u32, u32),
    frame: u64,
}

impl GpuSimulation {
    pub fn new(ctx: GpuContext, config: &SimConfig) -> Result<Self> {
        let layout = config.validate()?;
        let particles = ParticleStore::seeded(config, &layout);
        Self::from_parts(ctx, layout, StepParams::from(config), &particles)
    }

    pub fn from_parts(
        ctx: GpuContext,
        layout: AtlasLayout,
        step: StepParams,
        initial: &ParticleStore,
    ) -> Result<Self> {
        let device = &ctx.device;
        let limits = device.limits();
        let particle_count = initial.len();
        check_capabilities(&limits, &layout, particle_count)?;

        let params = Params::new(&layout, particle_count as u32, &step);
        let params_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("fieldswarm-params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let particle_slots = initial
            .ring()
            .slots()
            .iter()
            .enumerate()
            .map(|(i, data)| mk_storage_vec4(device, &format!("particles-{i}"), data))
            .collect();
        let zero_field = vec![Vec4::ZERO; layout.texel_count()];
        let field_slots = (0..FIELD_SLOTS)
            .map(|i| mk_storage_vec4(device, &format!("field-{i}"), &zero_field))
            .collect();
        let accum = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("splat-accum"),
            size: layout.texel_count() as u64 * TEXEL_BYTES,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let particles = RingBuffer::new(particle_slots, initial.index());
        let field = RingBuffer::new(field_slots, FIELD_INITIAL_INDEX);
        debug_assert_eq!(particles.len(), PARTICLE_SLOTS);

        let splat_pipeline = mk_pipeline(device, "splat-scatter", SPLAT_SCATTER_WGSL);
        let resolve_pipeline = mk_pipeline(device, "splat-resolve", SPLAT_RESOLVE_WGSL);
        let diffuse_pipeline = mk_pipeline(device, "diffuse", DIFFUSE_WGSL);
        let advect_pipeline = mk_pipeline(device, "advect", ADVECT_WGSL);

        let ps = particles.slots();
        let fs = field.slots();
        let bg_splat = (0..PARTICLE_SLOTS)
            .map(|cur| {
                let prev = (cur + PARTICLE_SLOTS - 1) % PARTICLE_SLOTS;
                mk_bind_group(device, "bg-splat", &splat_pipeline, &[&params_buf, &ps[cur], &ps[prev], &accum])
            })
            .collect();
        let bg_resolve = (0..FIELD_SLOTS)
            .map(|dst| mk_bind_group(device, "bg-resolve", &resolve_pipeline, &[&params_buf, &accum, &fs[dst]]))
            .collect();
        let bg_diffuse = (0..FIELD_SLOTS)
            .map(|dst| {
                let src = (dst + FIELD_SLOTS - 1) % FIELD_SLOTS;
                mk_bind_group(device, "bg-diffuse", &diffuse_pipeline, &[&params_buf, &fs[src], &fs[dst]])
            })
            .collect();
        let bg_advect = (0..PARTICLE_SLOTS)
            .map(|out| {
                let p0 = (out + PARTICLE_SLOTS - 1) % PARTICLE_SLOTS;
                let p1 = (out + PARTICLE_SLOTS - 2) % PARTICLE_SLOTS;
                (0..FIELD_SLOTS)
                    .map(|f| {
                        mk_bind_group(
                            device,
                            "bg-advect",
                            &advect_pipeline,
                            &[&params_buf, &ps[p0], &ps[p1], &fs[f], &ps[out]],
                        )
                    })
                    .collect()
            })
            .collect();

        let max = limits.max_compute_workgroups_per_dimension;
        info!(
            "gpu simulation on {}: {} particles, {} texels",
            ctx.adapter_name,
            particle_count,
            layout.texel_count()
        );
        Ok(Self {
            layout,
            particle_radius: initial.radius(),
            particle_count,
            particles,
            field,
            splat_pipeline,
            resolve_pipeline,
            diffuse_pipeline,
            advect_pipeline,
            bg_splat,
            bg_resolve,
            bg_diffuse,
            bg_advect,
            particle_dims: dispatch_dims(particle_count, max),
            texel_dims: dispatch_dims(layout.texel_count(), max),
            frame: 0,
            ctx,
        })
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn particle_index(&self) -> u64 {
        self.particles.index()
    }

    pub fn field_index(&self) -> u64 {
        self.field.index()
    }

    /// Record and submit one frame.
    pub fn step(&mut self) {
        let mut encoder = self.ctx.device.create_command_encoder(&Default::default());

        // splat into the current field slot
        {
            let mut pass = encoder.begin_compute_pass(&Default::default());
            pass.set_pipeline(&self.splat_pipeline);
            pass.set_bind_group(0, &self.bg_splat[self.particles.slot_of(0)], &[]);
            pass.dispatch_workgroups(self.particle_dims.0, self.particle_dims.1, 1);
        }
        {
            let mut pass = encoder.begin_compute_pass(&Default::default());
            pass.set_pipeline(&self.resolve_pipeline);
            pass.set_bind_group(0, &self.bg_resolve[self.field.slot_of(0)], &[]);
            pass.dispatch_workgroups(self.texel_dims.0, self.texel_dims.1, 1);
        }

        for _ in 0..DIFFUSION_PASSES {
            self.field.advance();
            let mut pass = encoder.begin_compute_pass(&Default::default());
            pass.set_pipeline(&self.diffuse_pipeline);
            pass.set_bind_group(0, &self.bg_diffuse[self.field.slot_of(0)], &[]);
            pass.dispatch_workgroups(self.texel_dims.0, self.texel_dims.1, 1);
        }

        self.particles.advance();
        {
            let mut pass = encoder.begin_compute_pass(&Default::default());
            pass.set_pipeline(&self.advect_pipeline);
            pass.set_bind_group(0, &self.bg_advect[self.particles.slot_of(0)][self.field.slot_of(0)], &[]);
            pass.dispatch_workgroups(self.particle_dims.0, self.particle_dims.1, 1);
        }

        self.ctx.queue.submit(Some(encoder.finish()));
        self.frame += 1;
        debug!(
            "gpu frame {} submitted: particle_index={} field_index={}",
            self.frame,
            self.particles.index(),
            self.field.index()
        );
    }

    pub fn run(&mut self, frames: u32) {
        for _ in 0..frames {
            self.step();
        }
    }

    /// Copy the current and previous particle slots and the current field
    /// slot back to the host.
    pub fn snapshot(&self) -> Result<FrameSnapshot> {
        let device = &self.ctx.device;
        let particle_bytes = self.particle_count as u64 * TEXEL_BYTES;
        let field_bytes = self.layout.texel_count() as u64 * TEXEL_BYTES;
        let staging = |label: &str, size: u64| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            })
        };
        let cur_read = staging("particles-read", particle_bytes);
        let prev_read = staging("particles-prev-read", particle_bytes);
        let field_read = staging("field-read", field_bytes);

        let mut encoder = device.create_command_encoder(&Default::default());
        encoder.copy_buffer_to_buffer(self.particles.current(), 0, &cur_read, 0, particle_bytes);
        encoder.copy_buffer_to_buffer(self.particles.previous(1), 0, &prev_read, 0, particle_bytes);
        encoder.copy_buffer_to_buffer(self.field.current(), 0, &field_read, 0, field_bytes);
        self.ctx.queue.submit(Some(encoder.finish()));

        let current = read_vec4(device, &cur_read)?;
        let previous = read_vec4(device, &prev_read)?;
        let field = read_vec4(device, &field_read)?;
        if current.iter().any(|p| !p.is_finite()) {
            warn!("gpu frame {} produced non-finite particle positions", self.frame);
        }

        Ok(FrameSnapshot {
            layout: self.layout,
            particle_radius: self.particle_radius,
            current,
            previous,
            field,
            particle_index: self.particles.index(),
            field_index: self.field.index(),
        })
    }
}

fn read_vec4(device: &wgpu::Device, buffer: &wgpu::Buffer) -> Result<Vec<Vec4>> {
    let slice = buffer.slice(..);
    map_wait(device, &slice)?;
    let data = {
        let mapped = slice.get_mapped_range();
        let texels: &[[f32; 4]] = bytemuck::cast_slice(&mapped);
        texels.iter().copied().map(Vec4::from_array).collect()
    };
    buffer.unmap();
    Ok(data)
}
