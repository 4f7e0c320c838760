//! GPU backend (Metal/Vulkan/DX12 via wgpu).
//!
//! Fields live in device storage buffers for the whole run; only source
//! injection (one sample) and explicit host copies cross the bus.
//!
//! Each stencil is one compute pass in its own queue submission, launched in
//! 16x16 workgroups over `(nx, nz)`. Queue order makes the stress pass observe
//! every velocity write of the same step.

use std::sync::Arc;

use super::{checked_range, ComputeBackend, MemorySpace, StencilCoefficients};
use crate::error::{BackendError, KernelError};
use crate::field::FieldState;
use crate::model::Model;
use crate::Real;

const WORKGROUP_SIZE: u32 = 16;
const REAL_BYTES: u64 = std::mem::size_of::<Real>() as u64;

/// Uniform block shared by both shaders. Must match `StencilParams` in WGSL.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct StencilParams {
    nz: u32,
    nx: u32,
    dt_dz: f32,
    dt_dx: f32,
}

/// Storage buffer plus its element count.
pub struct DeviceBuffer {
    buffer: wgpu::Buffer,
    len: usize,
}

impl DeviceBuffer {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn raw(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

/// Device memory of one wgpu adapter.
#[derive(Clone)]
pub struct DeviceSpace {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

impl DeviceSpace {
    fn block_on_map(&self, staging: &wgpu::Buffer) -> Result<(), BackendError> {
        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // The receiver outlives the poll below; a failed send only means
            // nobody is waiting any more.
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| BackendError::Device(format!("readback channel closed: {e}")))?
            .map_err(|e| BackendError::Device(format!("buffer mapping failed: {e}")))
    }
}

impl MemorySpace for DeviceSpace {
    type Buffer = DeviceBuffer;

    fn allocate(&self, len: usize) -> Result<DeviceBuffer, BackendError> {
        // wgpu zero-initializes new buffers; it rejects zero-sized bindings.
        let size = (len.max(1) as u64) * REAL_BYTES;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scalar_field"),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(DeviceBuffer { buffer, len })
    }

    fn copy_to_host(&self, dst: &mut [Real], src: &DeviceBuffer) -> Result<(), BackendError> {
        if dst.len() != src.len() {
            return Err(BackendError::LengthMismatch {
                buffer: src.len(),
                host: dst.len(),
            });
        }
        if dst.is_empty() {
            return Ok(());
        }

        let byte_len = (src.len() as u64) * REAL_BYTES;
        // Dropped at the end of this call on every path.
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_staging"),
            size: byte_len,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback"),
            });
        encoder.copy_buffer_to_buffer(&src.buffer, 0, &staging, 0, byte_len);
        self.queue.submit(std::iter::once(encoder.finish()));

        self.block_on_map(&staging)?;
        {
            let data = staging.slice(..).get_mapped_range();
            dst.copy_from_slice(bytemuck::cast_slice(&data));
        }
        staging.unmap();
        Ok(())
    }

    fn copy_from_host(
        &self,
        dst: &mut DeviceBuffer,
        offset: usize,
        src: &[Real],
    ) -> Result<(), BackendError> {
        checked_range(offset, src.len(), dst.len())?;
        if src.is_empty() {
            return Ok(());
        }
        // Staged writes land before the next queue submission.
        self.queue
            .write_buffer(&dst.buffer, (offset as u64) * REAL_BYTES, bytemuck::cast_slice(src));
        Ok(())
    }
}

/// Massively parallel backend running the stencils as WGSL compute shaders.
pub struct Device {
    space: DeviceSpace,
    velocity_layout: wgpu::BindGroupLayout,
    stress_layout: wgpu::BindGroupLayout,
    velocity_pipeline: wgpu::ComputePipeline,
    stress_pipeline: wgpu::ComputePipeline,
    params: wgpu::Buffer,
}

/// Check whether any wgpu adapter is available.
pub fn adapter_available() -> bool {
    request_adapter().is_some()
}

fn request_adapter() -> Option<wgpu::Adapter> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
}

impl Device {
    /// Acquires an adapter, creates the device and compiles both shaders.
    pub fn new() -> Result<Self, BackendError> {
        let adapter = request_adapter()
            .ok_or_else(|| BackendError::Device("no suitable GPU adapter found".into()))?;
        tracing::info!(adapter = %adapter.get_info().name, "GPU adapter selected");

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("sh_stencil_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .map_err(|e| BackendError::Device(format!("failed to create device: {e}")))?;

        let velocity_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("velocity_update"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/velocity.wgsl").into()),
        });
        let stress_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("stress_update"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/stress.wgsl").into()),
        });

        // params, v_old, s_old, t_old, buoyancy | v_new
        let velocity_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("velocity_bgl"),
            entries: &[
                bgl_uniform(0),
                bgl_storage_ro(1),
                bgl_storage_ro(2),
                bgl_storage_ro(3),
                bgl_storage_ro(4),
                bgl_storage_rw(5),
            ],
        });
        // params, v_new, s_old, t_old, modulus | s_new, t_new
        let stress_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("stress_bgl"),
            entries: &[
                bgl_uniform(0),
                bgl_storage_ro(1),
                bgl_storage_ro(2),
                bgl_storage_ro(3),
                bgl_storage_ro(4),
                bgl_storage_rw(5),
                bgl_storage_rw(6),
            ],
        });

        let velocity_pipeline = compute_pipeline(
            &device,
            "velocity_update",
            &velocity_layout,
            &velocity_shader,
        );
        let stress_pipeline =
            compute_pipeline(&device, "stress_update", &stress_layout, &stress_shader);

        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("stencil_params"),
            size: std::mem::size_of::<StencilParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            space: DeviceSpace {
                device: Arc::new(device),
                queue: Arc::new(queue),
            },
            velocity_layout,
            stress_layout,
            velocity_pipeline,
            stress_pipeline,
            params,
        })
    }

    /// Encodes and submits one compute pass over the `(nx, nz)` grid.
    fn launch(
        &self,
        label: &str,
        pipeline: &wgpu::ComputePipeline,
        layout: &wgpu::BindGroupLayout,
        storage: &[&wgpu::Buffer],
        (nz, nx): (usize, usize),
        coeffs: StencilCoefficients,
    ) -> Result<(), KernelError> {
        let grid_u32 = |n: usize| {
            u32::try_from(n).map_err(|_| BackendError::Device(format!("grid extent {n} exceeds u32")))
        };
        let params = StencilParams {
            nz: grid_u32(nz)?,
            nx: grid_u32(nx)?,
            dt_dz: coeffs.dt_dz,
            dt_dx: coeffs.dt_dx,
        };

        let device = &self.space.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        self.space
            .queue
            .write_buffer(&self.params, 0, bytemuck::bytes_of(&params));

        let mut entries = Vec::with_capacity(storage.len() + 1);
        entries.push(wgpu::BindGroupEntry {
            binding: 0,
            resource: self.params.as_entire_binding(),
        });
        for (binding, buffer) in (1u32..).zip(storage) {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: buffer.as_entire_binding(),
            });
        }
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &entries,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(label),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(
                params.nx.div_ceil(WORKGROUP_SIZE),
                params.nz.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }
        self.space.queue.submit(std::iter::once(encoder.finish()));

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(BackendError::Device(format!("{label} launch failed: {err}")).into());
        }
        Ok(())
    }
}

impl ComputeBackend for Device {
    type Memory = DeviceSpace;

    fn name(&self) -> &'static str {
        "device"
    }

    fn memory(&self) -> &DeviceSpace {
        &self.space
    }

    fn velocity_update(
        &self,
        fields_new: &mut FieldState<DeviceSpace>,
        fields_old: &FieldState<DeviceSpace>,
        model: &Model<DeviceSpace>,
        coeffs: StencilCoefficients,
    ) -> Result<(), KernelError> {
        let shape = super::check_shapes(fields_new, fields_old, model)?;
        self.launch(
            "velocity_update",
            &self.velocity_pipeline,
            &self.velocity_layout,
            &[
                fields_old.v.buffer().raw(),
                fields_old.s.buffer().raw(),
                fields_old.t.buffer().raw(),
                model.l.buffer().raw(),
                fields_new.v.buffer().raw(),
            ],
            shape,
            coeffs,
        )
    }

    fn stress_update(
        &self,
        fields_new: &mut FieldState<DeviceSpace>,
        fields_old: &FieldState<DeviceSpace>,
        model: &Model<DeviceSpace>,
        coeffs: StencilCoefficients,
    ) -> Result<(), KernelError> {
        let shape = super::check_shapes(fields_new, fields_old, model)?;
        self.launch(
            "stress_update",
            &self.stress_pipeline,
            &self.stress_layout,
            &[
                fields_new.v.buffer().raw(),
                fields_old.s.buffer().raw(),
                fields_old.t.buffer().raw(),
                model.m.buffer().raw(),
                fields_new.s.buffer().raw(),
                fields_new.t.buffer().raw(),
            ],
            shape,
            coeffs,
        )
    }
}

fn compute_pipeline(
    device: &wgpu::Device,
    entry_point: &str,
    layout: &wgpu::BindGroupLayout,
    module: &wgpu::ShaderModule,
) -> wgpu::ComputePipeline {
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(entry_point),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(entry_point),
        layout: Some(&pipeline_layout),
        module,
        entry_point: Some(entry_point),
        compilation_options: Default::default(),
        cache: None,
    })
}

// ---- Bind group layout entry helpers ----

fn bgl_uniform(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn bgl_storage_ro(binding: u32) -> wgpu::BindGroupLayoutEntry {
    bgl_storage(binding, true)
}

fn bgl_storage_rw(binding: u32) -> wgpu::BindGroupLayoutEntry {
    bgl_storage(binding, false)
}

fn bgl_storage(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
