use crate::transitions::settings::SpringSettings;
use crate::transitions::{clone_buffer, pad_buffer};
use strata_render::{GpuBuffer, GpuContext, TransformJob};
use tracing::trace;
use web_time::Duration;

struct SpringBuffers {
    previous: GpuBuffer,
    current: GpuBuffer,
    next: GpuBuffer,
    target: GpuBuffer,
}

/// Damped oscillator pulling every component towards the target, one step per tick.
///
/// Restarting keeps both the previous and current buffers, so the velocity of a
/// running spring carries over into the new run.
pub struct SpringTransition {
    settings: SpringSettings,
    buffers: Option<SpringBuffers>,
    in_progress: bool,
    last_tick: Option<Duration>,
}

impl SpringTransition {
    pub fn new(settings: SpringSettings) -> Self {
        Self {
            settings,
            buffers: None,
            in_progress: false,
            last_tick: None,
        }
    }

    pub fn settings(&self) -> &SpringSettings {
        &self.settings
    }

    pub fn start(
        &mut self,
        context: &GpuContext,
        settings: &SpringSettings,
        target: &GpuBuffer,
        len: usize,
    ) {
        self.settings = *settings;

        let buffers = match self.buffers.take() {
            Some(mut buffers) => {
                pad_buffer(&mut buffers.previous, target, len);
                pad_buffer(&mut buffers.current, target, len);
                buffers.next.resize(len);
                buffers.target.resize(len);
                buffers.target.copy_from(target);
                buffers
            }
            None => SpringBuffers {
                previous: clone_buffer(context, "Spring Previous", target, len),
                current: clone_buffer(context, "Spring Current", target, len),
                next: clone_buffer(context, "Spring Next", target, len),
                target: clone_buffer(context, "Spring Target", target, len),
            },
        };
        trace!("Starting spring over {len} floats");

        self.buffers = Some(buffers);
        self.in_progress = true;
        self.last_tick = None;
    }

    #[profiling::function]
    pub fn update(&mut self, now: Duration) -> bool {
        if !self.in_progress || self.last_tick == Some(now) {
            return false;
        }
        self.last_tick = Some(now);

        let Some(buffers) = self.buffers.as_mut() else {
            return false;
        };
        if buffers.current.is_empty() {
            self.in_progress = false;
            return false;
        }

        let context = buffers.current.context().clone();
        let status = context.run_transform(&TransformJob::Spring {
            previous: &buffers.previous,
            current: &buffers.current,
            target: &buffers.target,
            next: &buffers.next,
            stiffness: self.settings.stiffness,
            damping: self.settings.damping,
        });

        if status.settled {
            buffers.current.copy_from(&buffers.target);
            buffers.previous.copy_from(&buffers.target);
            self.in_progress = false;
            return true;
        }

        // previous <- current <- next, the old previous becomes scratch
        std::mem::swap(&mut buffers.previous, &mut buffers.current);
        std::mem::swap(&mut buffers.current, &mut buffers.next);
        true
    }

    pub fn is_transitioning(&self) -> bool {
        self.in_progress
    }

    pub fn transitioning_buffer(&self) -> Option<&GpuBuffer> {
        self.buffers.as_ref().map(|buffers| &buffers.current)
    }

    pub fn cancel(&mut self) {
        self.in_progress = false;
        self.last_tick = None;
        self.buffers = None;
    }
}
