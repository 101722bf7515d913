use crate::transitions::settings::InterpolationSettings;
use crate::transitions::timing::TransitionTiming;
use crate::transitions::{clone_buffer, pad_buffer};
use strata_render::{GpuBuffer, GpuContext, TransformJob};
use tracing::trace;
use web_time::Duration;

struct InterpolationBuffers {
    from: GpuBuffer,
    to: GpuBuffer,
    current: GpuBuffer,
}

impl InterpolationBuffers {
    fn new(context: &GpuContext, target: &GpuBuffer, len: usize) -> Self {
        Self {
            from: clone_buffer(context, "Interpolation From", target, len),
            to: clone_buffer(context, "Interpolation To", target, len),
            current: clone_buffer(context, "Interpolation Current", target, len),
        }
    }
}

/// Eased blend from the last shown value to the target over a fixed duration.
pub struct InterpolationTransition {
    settings: InterpolationSettings,
    timing: TransitionTiming,
    buffers: Option<InterpolationBuffers>,
}

impl InterpolationTransition {
    pub fn new(settings: InterpolationSettings) -> Self {
        Self {
            settings,
            timing: TransitionTiming::default(),
            buffers: None,
        }
    }

    pub fn settings(&self) -> &InterpolationSettings {
        &self.settings
    }

    pub fn start(
        &mut self,
        context: &GpuContext,
        settings: &InterpolationSettings,
        target: &GpuBuffer,
        len: usize,
    ) {
        self.settings = *settings;
        if settings.duration.is_zero() {
            // jump to the target but keep it as the start of the next run
            self.timing.cancel();
            match self.buffers.as_mut() {
                Some(buffers) => {
                    buffers.to.resize(len);
                    buffers.to.copy_from(target);
                    buffers.current.resize(len);
                    buffers.current.copy_from(target);
                }
                None => self.buffers = Some(InterpolationBuffers::new(context, target, len)),
            }
            return;
        }

        let buffers = match self.buffers.take() {
            Some(mut buffers) => {
                // the last computed value is where the new run starts
                std::mem::swap(&mut buffers.from, &mut buffers.current);
                pad_buffer(&mut buffers.from, target, len);
                buffers.to.resize(len);
                buffers.to.copy_from(target);
                buffers.current.resize(len);
                buffers.current.copy_from(&buffers.from);
                buffers
            }
            None => InterpolationBuffers::new(context, target, len),
        };
        trace!("Starting interpolation over {len} floats");

        self.buffers = Some(buffers);
        self.timing.start(settings.duration, settings.easing);
    }

    #[profiling::function]
    pub fn update(&mut self, now: Duration) -> bool {
        let Some(buffers) = self.buffers.as_mut() else {
            return false;
        };
        let Some(t) = self.timing.tick(now) else {
            return false;
        };
        if buffers.current.is_empty() {
            return true;
        }

        if t >= 1.0 {
            buffers.current.copy_from(&buffers.to);
        } else {
            let context = buffers.current.context().clone();
            context.run_transform(&TransformJob::Interpolate {
                from: &buffers.from,
                to: &buffers.to,
                current: &buffers.current,
                t,
            });
        }
        true
    }

    pub fn is_transitioning(&self) -> bool {
        self.buffers.is_some() && self.timing.is_in_progress()
    }

    pub fn transitioning_buffer(&self) -> Option<&GpuBuffer> {
        self.buffers.as_ref().map(|buffers| &buffers.current)
    }

    pub fn cancel(&mut self) {
        self.timing.cancel();
        self.buffers = None;
    }
}
