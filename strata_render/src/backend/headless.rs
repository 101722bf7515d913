use crate::buffer::BufferId;
use crate::context::{Capabilities, GpuBackend};
use crate::transform::{self, TransformJob, TransformStatus};
use parking_lot::Mutex;
use slotmap::SlotMap;
use strata_utils::debug_panic;
use tracing::trace;

/// Counters describing what a [`HeadlessBackend`] has been asked to do.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessStats {
    pub buffers_created: usize,
    pub buffers_destroyed: usize,
    pub floats_written: usize,
    pub transforms_run: usize,
}

impl HeadlessStats {
    pub fn live_buffers(&self) -> usize {
        self.buffers_created - self.buffers_destroyed
    }
}

struct HeadlessBuffer {
    label: String,
    data: Vec<f32>,
}

/// Backend keeping every buffer in host memory and running the reference kernels.
///
/// Used when no GPU is requested, and by tests, which inspect [`HeadlessStats`] to verify
/// that resources are released.
pub struct HeadlessBackend {
    capabilities: Capabilities,
    buffers: Mutex<SlotMap<BufferId, HeadlessBuffer>>,
    stats: Mutex<HeadlessStats>,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::all())
    }

    /// A backend that stores buffers but can't run transform passes.
    pub fn without_transform() -> Self {
        Self::with_capabilities(Capabilities::READBACK)
    }

    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            buffers: Mutex::new(SlotMap::with_key()),
            stats: Mutex::new(HeadlessStats::default()),
        }
    }

    pub fn stats(&self) -> HeadlessStats {
        *self.stats.lock()
    }

    pub fn buffer_labels(&self) -> Vec<String> {
        self.buffers
            .lock()
            .values()
            .map(|buffer| buffer.label.clone())
            .collect()
    }

    fn snapshot(&self, id: BufferId) -> Vec<f32> {
        match self.buffers.lock().get(id) {
            Some(buffer) => buffer.data.clone(),
            None => {
                debug_panic!("Buffer {id:?} doesn't exist");
                Vec::new()
            }
        }
    }

    fn store(&self, id: BufferId, data: Vec<f32>) {
        let mut buffers = self.buffers.lock();
        let Some(buffer) = buffers.get_mut(id) else {
            debug_panic!("Buffer {id:?} doesn't exist");
            return;
        };
        let len = buffer.data.len().min(data.len());
        buffer.data[..len].copy_from_slice(&data[..len]);
    }
}

impl GpuBackend for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn create_buffer(&self, label: &str, contents: &[f32]) -> BufferId {
        {
            let mut stats = self.stats.lock();
            stats.buffers_created += 1;
            stats.floats_written += contents.len();
        }
        trace!("Creating headless buffer {label:?} with {} floats", contents.len());

        self.buffers.lock().insert(HeadlessBuffer {
            label: label.to_string(),
            data: contents.to_vec(),
        })
    }

    fn write_buffer(&self, buffer: BufferId, offset: usize, data: &[f32]) {
        let mut buffers = self.buffers.lock();
        let Some(target) = buffers.get_mut(buffer) else {
            debug_panic!("Tried to write to destroyed buffer {buffer:?}");
            return;
        };
        let end = (offset + data.len()).min(target.data.len());
        if offset >= end {
            return;
        }
        target.data[offset..end].copy_from_slice(&data[..end - offset]);
        drop(buffers);
        self.stats.lock().floats_written += end - offset;
    }

    fn resize_buffer(&self, buffer: BufferId, len: usize) {
        if let Some(target) = self.buffers.lock().get_mut(buffer) {
            target.data.resize(len, 0.0);
        }
    }

    fn copy_buffer(&self, source: BufferId, destination: BufferId, offset: usize, len: usize) {
        let data = self.snapshot(source);
        let end = (offset + len).min(data.len());
        if offset >= end {
            return;
        }
        self.write_buffer(destination, offset, &data[offset..end]);
    }

    fn read_buffer(&self, buffer: BufferId) -> Vec<f32> {
        self.snapshot(buffer)
    }

    fn destroy_buffer(&self, buffer: BufferId) {
        if self.buffers.lock().remove(buffer).is_some() {
            self.stats.lock().buffers_destroyed += 1;
        }
    }

    #[profiling::function]
    fn run_transform(&self, job: &TransformJob) -> TransformStatus {
        if !self.capabilities.contains(Capabilities::TRANSFORM) {
            debug_panic!("{} dispatched on a backend without transform support", job.label());
            return TransformStatus::SETTLED;
        }

        let count = job.element_count();
        self.stats.lock().transforms_run += 1;

        match job {
            TransformJob::Interpolate {
                from,
                to,
                current,
                t,
            } => {
                let from = self.snapshot(from.id());
                let to = self.snapshot(to.id());
                let mut out = vec![0.0; count];
                transform::interpolate(&from[..count], &to[..count], *t, &mut out);
                self.store(current.id(), out);
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
                let previous = self.snapshot(previous.id());
                let current = self.snapshot(current.id());
                let target = self.snapshot(target.id());
                let mut out = vec![0.0; count];
                let settled = transform::spring_step(
                    &previous[..count],
                    &current[..count],
                    &target[..count],
                    *stiffness,
                    *damping,
                    &mut out,
                );
                self.store(next.id(), out);
                TransformStatus { settled }
            }
        }
    }
}
