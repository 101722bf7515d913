use crate::buffer::BufferId;
use crate::context::{Capabilities, GpuBackend};
use crate::error::{GpuError, Result};
use crate::transform::{TransformJob, TransformStatus};
use crossbeam_channel::bounded;
use futures::executor::block_on;
use parking_lot::Mutex;
use slotmap::SlotMap;
use std::borrow::Cow;
use std::mem::size_of;
use strata_utils::debug_panic;
use tracing::{info, trace, warn};
use wgpu::util::{BufferInitDescriptor, DeviceExt};
use wgpu::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingType, Buffer, BufferBindingType, BufferDescriptor, BufferUsages,
    CommandEncoderDescriptor, ComputePassDescriptor, ComputePipeline, ComputePipelineDescriptor,
    Device, DeviceDescriptor, ExperimentalFeatures, Features, Instance, InstanceDescriptor, Limits,
    MapMode, MemoryHints, PipelineCompilationOptions, PipelineLayoutDescriptor, PollType,
    PowerPreference, Queue, RequestAdapterOptions, ShaderModuleDescriptor, ShaderSource,
    ShaderStages,
};

const WORKGROUP_SIZE: u32 = 64;
const MAX_WORKGROUPS_PER_DIMENSION: u32 = 65535;
const FLOAT_SIZE: u64 = size_of::<f32>() as u64;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct TransformParams {
    t: f32,
    count: u32,
    stiffness: f32,
    damping: f32,
}

struct StorageBuffer {
    label: String,
    buffer: Buffer,
    len: usize,
}

struct TransformKernel {
    name: &'static str,
    layout: BindGroupLayout,
    pipeline: ComputePipeline,
}

impl TransformKernel {
    fn new(device: &Device, name: &'static str, code: &'static str, bindings: &[bool]) -> Self {
        let module = device.create_shader_module(ShaderModuleDescriptor {
            label: Some(name),
            source: ShaderSource::Wgsl(Cow::Borrowed(code)),
        });

        let mut entries = vec![BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStages::COMPUTE,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }];
        entries.extend(bindings.iter().enumerate().map(|(i, read_only)| {
            BindGroupLayoutEntry {
                binding: i as u32 + 1,
                visibility: ShaderStages::COMPUTE,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Storage {
                        read_only: *read_only,
                    },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }
        }));

        let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some(&format!("{name} Bind Group Layout")),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(&format!("{name} Pipeline Layout")),
            bind_group_layouts: &[&layout],
            immediate_size: 0,
        });

        let pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some(&format!("{name} Pipeline")),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("main"),
            compilation_options: PipelineCompilationOptions::default(),
            cache: None,
        });

        Self {
            name,
            layout,
            pipeline,
        }
    }
}

/// Backend running transform passes as compute shaders on a wgpu device.
pub struct WgpuBackend {
    device: Device,
    queue: Queue,
    buffers: Mutex<SlotMap<BufferId, StorageBuffer>>,
    interpolate: TransformKernel,
    spring: TransformKernel,
    unsettled: Buffer,
}

impl WgpuBackend {
    /// Opens a device without a surface. Transform passes only need compute.
    pub fn request_device() -> Result<(Device, Queue)> {
        block_on(async {
            let instance = Instance::new(&InstanceDescriptor::from_env_or_default());
            let adapter = instance
                .request_adapter(&RequestAdapterOptions {
                    power_preference: PowerPreference::HighPerformance,
                    ..RequestAdapterOptions::default()
                })
                .await
                .map_err(|_| GpuError::NoAdapter)?;
            info!("Selected adapter: {}", adapter.get_info().name);

            adapter
                .request_device(&DeviceDescriptor {
                    label: Some("Strata Compute Device"),
                    required_features: Features::empty(),
                    required_limits: Limits::downlevel_defaults(),
                    experimental_features: ExperimentalFeatures::disabled(),
                    memory_hints: MemoryHints::default(),
                    trace: wgpu::Trace::Off,
                })
                .await
                .map_err(|e| GpuError::RequestDevice {
                    message: e.to_string(),
                })
        })
    }

    pub fn new(device: Device, queue: Queue) -> Self {
        let interpolate = TransformKernel::new(
            &device,
            "Interpolation Transform",
            include_str!("../shaders/interpolate.wgsl"),
            &[true, true, false],
        );
        let spring = TransformKernel::new(
            &device,
            "Spring Transform",
            include_str!("../shaders/spring.wgsl"),
            &[true, true, true, false, false],
        );
        let unsettled = device.create_buffer(&BufferDescriptor {
            label: Some("Spring Settle Counter"),
            size: size_of::<u32>() as u64,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            device,
            queue,
            buffers: Mutex::new(SlotMap::with_key()),
            interpolate,
            spring,
            unsettled,
        }
    }

    fn allocate(&self, label: &str, len: usize) -> Buffer {
        // zero sized storage bindings are invalid
        let size = len.max(1) as u64 * FLOAT_SIZE;
        self.device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn read_back(&self, source: &Buffer, size: u64) -> Option<Vec<u8>> {
        let staging = self.device.create_buffer(&BufferDescriptor {
            label: Some("Readback Staging Buffer"),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(source, 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = bounded(1);
        slice.map_async(MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        let _ = self.device.poll(PollType::wait_indefinitely());

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Failed to map readback buffer: {e}");
                return None;
            }
            Err(_) => {
                warn!("Readback channel closed before the buffer was mapped");
                return None;
            }
        }

        let bytes = slice.get_mapped_range().to_vec();
        staging.unmap();
        Some(bytes)
    }

    fn params_buffer(&self, params: TransformParams) -> Buffer {
        self.device.create_buffer_init(&BufferInitDescriptor {
            label: Some("Transform Params"),
            contents: bytemuck::bytes_of(&params),
            usage: BufferUsages::UNIFORM,
        })
    }

    fn dispatch(&self, kernel: &TransformKernel, buffers: &[&Buffer], params: &Buffer, count: u32) {
        let mut entries = vec![BindGroupEntry {
            binding: 0,
            resource: params.as_entire_binding(),
        }];
        entries.extend(buffers.iter().enumerate().map(|(i, buffer)| BindGroupEntry {
            binding: i as u32 + 1,
            resource: buffer.as_entire_binding(),
        }));

        let bind_group = self.device.create_bind_group(&BindGroupDescriptor {
            label: Some(&format!("{} Bind Group", kernel.name)),
            layout: &kernel.layout,
            entries: &entries,
        });

        let groups = count.div_ceil(WORKGROUP_SIZE);
        let x = groups.min(MAX_WORKGROUPS_PER_DIMENSION);
        let y = groups.div_ceil(MAX_WORKGROUPS_PER_DIMENSION);

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some(kernel.name),
            });
        if std::ptr::eq(kernel, &self.spring) {
            encoder.clear_buffer(&self.unsettled, 0, None);
        }
        {
            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some(kernel.name),
                ..ComputePassDescriptor::default()
            });
            pass.set_pipeline(&kernel.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(x, y, 1);
        }
        self.queue.submit(Some(encoder.finish()));
    }
}

impl GpuBackend for WgpuBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    fn create_buffer(&self, label: &str, contents: &[f32]) -> BufferId {
        let buffer = self.allocate(label, contents.len());
        if !contents.is_empty() {
            self.queue
                .write_buffer(&buffer, 0, bytemuck::cast_slice(contents));
        }
        trace!("Created storage buffer {label:?} with {} floats", contents.len());

        self.buffers.lock().insert(StorageBuffer {
            label: label.to_string(),
            buffer,
            len: contents.len(),
        })
    }

    fn write_buffer(&self, buffer: BufferId, offset: usize, data: &[f32]) {
        let buffers = self.buffers.lock();
        let Some(target) = buffers.get(buffer) else {
            debug_panic!("Tried to write to destroyed buffer {buffer:?}");
            return;
        };
        let end = (offset + data.len()).min(target.len);
        if offset >= end {
            return;
        }
        self.queue.write_buffer(
            &target.buffer,
            offset as u64 * FLOAT_SIZE,
            bytemuck::cast_slice(&data[..end - offset]),
        );
    }

    fn resize_buffer(&self, buffer: BufferId, len: usize) {
        let mut buffers = self.buffers.lock();
        let Some(target) = buffers.get_mut(buffer) else {
            return;
        };

        let resized = self.allocate(&target.label, len);
        let keep = target.len.min(len) as u64 * FLOAT_SIZE;
        if keep > 0 {
            let mut encoder = self
                .device
                .create_command_encoder(&CommandEncoderDescriptor {
                    label: Some("Buffer Resize"),
                });
            encoder.copy_buffer_to_buffer(&target.buffer, 0, &resized, 0, keep);
            self.queue.submit(Some(encoder.finish()));
        }

        target.buffer = resized;
        target.len = len;
    }

    fn copy_buffer(&self, source: BufferId, destination: BufferId, offset: usize, len: usize) {
        let buffers = self.buffers.lock();
        let (Some(src), Some(dst)) = (buffers.get(source), buffers.get(destination)) else {
            debug_panic!("Tried to copy between destroyed buffers");
            return;
        };
        let end = (offset + len).min(src.len).min(dst.len);
        if offset >= end {
            return;
        }
        let start = offset as u64 * FLOAT_SIZE;
        let size = (end - offset) as u64 * FLOAT_SIZE;

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Buffer Copy"),
            });
        encoder.copy_buffer_to_buffer(&src.buffer, start, &dst.buffer, start, size);
        self.queue.submit(Some(encoder.finish()));
    }

    fn read_buffer(&self, buffer: BufferId) -> Vec<f32> {
        let buffers = self.buffers.lock();
        let Some(source) = buffers.get(buffer) else {
            debug_panic!("Tried to read destroyed buffer {buffer:?}");
            return Vec::new();
        };
        if source.len == 0 {
            return Vec::new();
        }

        self.read_back(&source.buffer, source.len as u64 * FLOAT_SIZE)
            .map(|bytes| bytemuck::pod_collect_to_vec::<u8, f32>(&bytes))
            .unwrap_or_default()
    }

    fn destroy_buffer(&self, buffer: BufferId) {
        if let Some(storage) = self.buffers.lock().remove(buffer) {
            storage.buffer.destroy();
        }
    }

    #[profiling::function]
    fn run_transform(&self, job: &TransformJob) -> TransformStatus {
        let count = job.element_count() as u32;
        if count == 0 {
            return TransformStatus::SETTLED;
        }

        let buffers = self.buffers.lock();
        let storage = |id: BufferId| buffers.get(id).map(|s| &s.buffer);

        match job {
            TransformJob::Interpolate {
                from,
                to,
                current,
                t,
            } => {
                let (Some(from), Some(to), Some(current)) =
                    (storage(from.id()), storage(to.id()), storage(current.id()))
                else {
                    debug_panic!("Interpolation bound a destroyed buffer");
                    return TransformStatus::SETTLED;
                };
                let params = self.params_buffer(TransformParams {
                    t: *t,
                    count,
                    stiffness: 0.0,
                    damping: 0.0,
                });
                self.dispatch(&self.interpolate, &[from, to, current], &params, count);
                TransformStatus::SETTLED
            }
            TransformJob::Spring {
                previous,
                current,
                target,
                next,
                stiffness,
                damping,
            } => {
                let (Some(previous), Some(current), Some(target), Some(next)) = (
                    storage(previous.id()),
                    storage(current.id()),
                    storage(target.id()),
                    storage(next.id()),
                ) else {
                    debug_panic!("Spring step bound a destroyed buffer");
                    return TransformStatus::SETTLED;
                };
                let params = self.params_buffer(TransformParams {
                    t: 0.0,
                    count,
                    stiffness: *stiffness,
                    damping: *damping,
                });
                self.dispatch(
                    &self.spring,
                    &[previous, current, target, next, &self.unsettled],
                    &params,
                    count,
                );

                let settled = self
                    .read_back(&self.unsettled, size_of::<u32>() as u64)
                    .map(|bytes| bytemuck::pod_collect_to_vec::<u8, u32>(&bytes))
                    .and_then(|counter| counter.first().copied())
                    .is_some_and(|unsettled| unsettled == 0);
                TransformStatus { settled }
            }
        }
    }
}
