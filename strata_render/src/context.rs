use crate::backend::HeadlessBackend;
use crate::buffer::{BufferId, GpuBuffer};
use crate::transform::{TransformJob, TransformStatus};
use bitflags::bitflags;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tracing::debug;

bitflags! {
    /// What a backend can do beyond plain buffer storage.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Runs interpolation and spring transform passes.
        const TRANSFORM = 1 << 0;
        /// Buffers can be read back synchronously.
        const READBACK = 1 << 1;
    }
}

/// The storage and compute surface every rendering context exposes.
///
/// Buffers hold per-instance `f32` data. Ids are only valid for the backend
/// that created them; [`GpuBuffer`] ties the two together and releases the
/// storage on drop.
pub trait GpuBackend: Send + Sync {
    fn name(&self) -> &str;
    fn capabilities(&self) -> Capabilities;

    fn create_buffer(&self, label: &str, contents: &[f32]) -> BufferId;
    fn write_buffer(&self, buffer: BufferId, offset: usize, data: &[f32]);
    /// Reallocates the buffer to `len` floats, keeping the overlapping prefix
    /// and zero filling the rest.
    fn resize_buffer(&self, buffer: BufferId, len: usize);
    /// Copies `len` floats starting at `offset` into the same range of `destination`.
    fn copy_buffer(&self, source: BufferId, destination: BufferId, offset: usize, len: usize);
    fn read_buffer(&self, buffer: BufferId) -> Vec<f32>;
    fn destroy_buffer(&self, buffer: BufferId);

    fn run_transform(&self, job: &TransformJob) -> TransformStatus;
}

/// Shared handle to the rendering context, handed out to every manager.
#[derive(Clone)]
pub struct GpuContext {
    backend: Arc<dyn GpuBackend>,
}

impl GpuContext {
    pub fn headless() -> Self {
        Self::from_backend(Arc::new(HeadlessBackend::new()))
    }

    pub fn from_backend(backend: Arc<dyn GpuBackend>) -> Self {
        debug!(
            "Created {} context with {:?}",
            backend.name(),
            backend.capabilities()
        );
        Self { backend }
    }

    #[cfg(feature = "wgpu")]
    pub fn wgpu(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self::from_backend(Arc::new(crate::backend::WgpuBackend::new(device, queue)))
    }

    /// Opens a compute device on the best available adapter.
    #[cfg(feature = "wgpu")]
    pub fn request_wgpu() -> crate::Result<Self> {
        let (device, queue) = crate::backend::WgpuBackend::request_device()?;
        Ok(Self::wgpu(device, queue))
    }

    pub fn backend(&self) -> &dyn GpuBackend {
        self.backend.as_ref()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.backend.capabilities()
    }

    pub fn supports(&self, capabilities: Capabilities) -> bool {
        self.capabilities().contains(capabilities)
    }

    pub fn create_buffer(&self, label: &str, contents: &[f32]) -> GpuBuffer {
        GpuBuffer::new(self.clone(), label, contents)
    }

    #[profiling::function]
    pub fn run_transform(&self, job: &TransformJob) -> TransformStatus {
        self.backend.run_transform(job)
    }

    pub fn same_context(&self, other: &GpuContext) -> bool {
        Arc::ptr_eq(&self.backend, &other.backend)
    }
}

impl Debug for GpuContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("backend", &self.backend.name())
            .field("capabilities", &self.backend.capabilities())
            .finish()
    }
}
