//! `wgpu` compute-shader implementation of [`MaxPoolDevice`].
//!
//! Buffers, pipeline and bind group are created once for the configured
//! shape. Each call uploads the input with `Queue::write_buffer`, dispatches
//! one invocation per cell, copies the result into a staging buffer and maps
//! it back, polling the device until the map completes.

use super::{check_buffers, MaxPoolDevice};
use crate::tensor::Dims3;
use crate::trace::trace_span;
use crate::util::DeviceError;
use std::sync::mpsc;

const SHADER: &str = include_str!("max_pool_3x3.wgsl");
const WORKGROUP: u32 = 8;

/// GPU 3x3 max pooling for `f32` CHW tensors.
pub struct WgpuMaxPool {
    dims: Dims3,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    input: wgpu::Buffer,
    output: wgpu::Buffer,
    staging: wgpu::Buffer,
}

impl WgpuMaxPool {
    /// Acquires the default high-performance adapter and allocates buffers
    /// for `dims`.
    pub fn new(dims: Dims3) -> Result<Self, DeviceError> {
        let len = dims.checked_len().map_err(|err| {
            DeviceError::Unavailable(format!("cannot allocate for {dims}: {err}"))
        })?;
        let channels = u32::try_from(dims.channels)
            .map_err(|_| DeviceError::Unavailable(format!("too many channels: {dims}")))?;
        let height = u32::try_from(dims.height)
            .map_err(|_| DeviceError::Unavailable(format!("height too large: {dims}")))?;
        let width = u32::try_from(dims.width)
            .map_err(|_| DeviceError::Unavailable(format!("width too large: {dims}")))?;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|err| DeviceError::Unavailable(format!("no suitable adapter: {err}")))?;
        let limits = adapter.limits();
        check_limits(dims, &limits)?;
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("posepeak max pool device"),
            required_limits: limits,
            ..Default::default()
        }))
        .map_err(|err| DeviceError::Unavailable(format!("failed to create device: {err}")))?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let size = (len * std::mem::size_of::<f32>()) as u64;
        let input = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("max_pool_input"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let output = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("max_pool_output"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("max_pool_staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("max_pool_dims"),
            size: 16,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(
            &uniform,
            0,
            bytemuck::cast_slice(&[channels, height, width, 0u32]),
        );

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("max_pool_3x3_shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("max_pool_3x3_pipeline"),
            layout: None,
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });
        let layout = pipeline.get_bind_group_layout(0);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("max_pool_3x3_bind_group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: input.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: output.as_entire_binding(),
                },
            ],
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(DeviceError::Unavailable(format!(
                "failed to allocate device resources for {dims}: {err}"
            )));
        }

        Ok(Self {
            dims,
            device,
            queue,
            pipeline,
            bind_group,
            input,
            output,
            staging,
        })
    }

    fn dispatch(&self) -> wgpu::CommandBuffer {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("max_pool_3x3_encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("max_pool_3x3_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups(
                (self.dims.width as u32).div_ceil(WORKGROUP),
                (self.dims.height as u32).div_ceil(WORKGROUP),
                self.dims.channels as u32,
            );
        }
        encoder.copy_buffer_to_buffer(&self.output, 0, &self.staging, 0, self.staging.size());
        encoder.finish()
    }

    fn read_back(&self, output: &mut [f32]) -> Result<(), DeviceError> {
        let slice = self.staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| DeviceError::Kernel(err.to_string()))?;
        rx.recv()
            .map_err(|_| DeviceError::Transfer("map callback dropped".to_string()))?
            .map_err(|err| DeviceError::Transfer(err.to_string()))?;

        {
            let mapped = slice.get_mapped_range();
            output.copy_from_slice(bytemuck::cast_slice(&mapped));
        }
        self.staging.unmap();
        Ok(())
    }
}

impl MaxPoolDevice<f32> for WgpuMaxPool {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn dims(&self) -> Dims3 {
        self.dims
    }

    fn max_pool_3x3(&mut self, input: &[f32], output: &mut [f32]) -> Result<(), DeviceError> {
        check_buffers(self.dims, input, output)?;
        let _span = trace_span!("max_pool_gpu", channels = self.dims.channels).entered();

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.queue
            .write_buffer(&self.input, 0, bytemuck::cast_slice(input));
        self.queue.submit(Some(self.dispatch()));
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(DeviceError::Kernel(err.to_string()));
        }
        self.read_back(output)
    }
}

/// Checks that a `dims` tensor fits one storage binding and that the
/// dispatch grid fits the per-dimension workgroup limit.
fn check_limits(dims: Dims3, limits: &wgpu::Limits) -> Result<(), DeviceError> {
    let bytes = dims
        .len()
        .checked_mul(std::mem::size_of::<f32>())
        .and_then(|b| u64::try_from(b).ok())
        .ok_or_else(|| DeviceError::Unavailable(format!("{dims} does not fit in memory")))?;
    let binding = u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);
    if bytes > binding {
        return Err(DeviceError::Unavailable(format!(
            "{dims} needs {bytes} bytes per buffer, device allows {binding}"
        )));
    }
    let grid = [
        dims.width.div_ceil(WORKGROUP as usize),
        dims.height.div_ceil(WORKGROUP as usize),
        dims.channels,
    ];
    let max_groups = limits.max_compute_workgroups_per_dimension as usize;
    if grid.iter().any(|&g| g > max_groups) {
        return Err(DeviceError::Unavailable(format!(
            "{dims} needs a {grid:?} workgroup grid, device allows {max_groups} per dimension"
        )));
    }
    Ok(())
}
