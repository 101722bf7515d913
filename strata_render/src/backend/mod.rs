mod headless;
#[cfg(feature = "wgpu")]
mod wgpu;

pub use headless::{HeadlessBackend, HeadlessStats};
#[cfg(feature = "wgpu")]
pub use self::wgpu::WgpuBackend;
