//! Drives frames and creates the GPU context lazily on the first one.

use crate::utils::FrameCounter;
use std::fmt::{Debug, Formatter};
use strata_render::GpuContext;
use strata_utils::DeckArgs;
use tracing::{debug, error, info};
use web_time::Duration;

const FPS_LOG_INTERVAL: u64 = 60;

pub type ContextFactory = Box<dyn FnOnce() -> strata_render::Result<GpuContext>>;

/// Where the GPU context comes from once the first frame runs.
#[derive(Default)]
pub enum ContextSource {
    /// A hardware context when available, headless otherwise.
    #[default]
    Auto,
    Headless,
    External(GpuContext),
    Factory(ContextFactory),
}

impl Debug for ContextSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextSource::Auto => f.write_str("Auto"),
            ContextSource::Headless => f.write_str("Headless"),
            ContextSource::External(context) => f.debug_tuple("External").field(context).finish(),
            ContextSource::Factory(_) => f.write_str("Factory"),
        }
    }
}

impl ContextSource {
    fn create(self) -> GpuContext {
        match self {
            ContextSource::Auto => auto_context(),
            ContextSource::Headless => GpuContext::headless(),
            ContextSource::External(context) => context,
            ContextSource::Factory(factory) => factory().unwrap_or_else(|e| {
                error!("Context factory failed, falling back to a headless context: {e}");
                GpuContext::headless()
            }),
        }
    }
}

#[cfg(feature = "wgpu")]
fn auto_context() -> GpuContext {
    if DeckArgs::get().force_headless {
        return GpuContext::headless();
    }
    GpuContext::request_wgpu().unwrap_or_else(|e| {
        tracing::warn!("No GPU available, running headless: {e}");
        GpuContext::headless()
    })
}

#[cfg(not(feature = "wgpu"))]
fn auto_context() -> GpuContext {
    if !DeckArgs::get().force_headless {
        debug!("Built without a hardware backend, running headless");
    }
    GpuContext::headless()
}

#[derive(Debug, Clone)]
pub struct FrameInfo {
    pub frame_number: u64,
    pub now: Duration,
    pub delta: Duration,
    /// Set on the frame that created the context.
    pub new_context: Option<GpuContext>,
}

#[derive(Debug)]
pub struct AnimationLoop {
    source: Option<ContextSource>,
    context: Option<GpuContext>,
    frame_number: u64,
    last_time: Option<Duration>,
    frame_counter: FrameCounter,
}

impl Default for AnimationLoop {
    fn default() -> Self {
        Self::new(ContextSource::default())
    }
}

impl AnimationLoop {
    pub fn new(source: ContextSource) -> Self {
        Self {
            source: Some(source),
            context: None,
            frame_number: 0,
            last_time: None,
            frame_counter: FrameCounter::default(),
        }
    }

    pub fn context(&self) -> Option<&GpuContext> {
        self.context.as_ref()
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn frame_counter(&self) -> &FrameCounter {
        &self.frame_counter
    }

    /// Starts a frame at `now`. The first call creates the context.
    pub fn tick(&mut self, now: Duration) -> FrameInfo {
        let new_context = self.source.take().map(|source| {
            debug!("Creating GPU context from {source:?}");
            let context = source.create();
            info!("Running on the {} backend", context.backend().name());
            self.context = Some(context.clone());
            context
        });

        let delta = self
            .last_time
            .map(|last| now.saturating_sub(last))
            .unwrap_or_default();
        self.last_time = Some(now);
        self.frame_number += 1;

        if self.frame_number > 1 {
            self.frame_counter.new_frame(delta);
        }
        if self.frame_number % FPS_LOG_INTERVAL == 0 {
            debug!(
                "{:.1} fps over the last {} frames",
                self.frame_counter.fps(),
                self.frame_counter.frames()
            );
        }

        FrameInfo {
            frame_number: self.frame_number,
            now,
            delta,
            new_context,
        }
    }
}
