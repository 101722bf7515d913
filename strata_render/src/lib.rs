//! Rendering context of the strata engine.
//!
//! Everything the engine core needs from a GPU goes through [`GpuContext`]: `f32` storage
//! buffers, transform passes that advance transitions, and the picking framebuffer. The
//! [`backend::HeadlessBackend`] keeps buffers in host memory; the `wgpu` feature adds a
//! compute shader backend.

pub mod backend;
pub mod buffer;
pub mod context;
pub mod error;
pub mod picking;
pub mod transform;

pub use buffer::{BufferId, GpuBuffer};
pub use context::{Capabilities, GpuBackend, GpuContext};
pub use error::{GpuError, Result};
pub use picking::{PickedColor, PickingColor, PickingFramebuffer, PixelRect, PixelRegion};
pub use transform::{SPRING_SETTLE_EPSILON, TransformJob, TransformStatus};
