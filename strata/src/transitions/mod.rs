//! Animated transitions of per-instance attributes.
//!
//! A transition owns its own GPU buffers and advances them with transform passes on the
//! [`GpuContext`]. The [`AttributeTransitionManager`] of a layer decides when transitions
//! are created, restarted and dropped.

pub mod easing;
pub mod interpolation;
pub mod manager;
pub mod settings;
pub mod spring;
pub mod timing;

pub use easing::Easing;
pub use interpolation::InterpolationTransition;
pub use manager::AttributeTransitionManager;
pub use settings::{
    InterpolationSettings, SpringSettings, TransitionConfig, TransitionMap, TransitionSettings,
    TransitionType,
};
pub use spring::SpringTransition;
pub use timing::TransitionTiming;

use snafu::Snafu;
use strata_render::{GpuBuffer, GpuContext};
use web_time::Duration;

pub type Result<T, E = TransitionError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Err)), visibility(pub(crate)))]
pub enum TransitionError {
    #[snafu(display("Unsupported transition type '{name}'"))]
    UnsupportedType { name: String },

    #[snafu(display("Unknown easing function '{name}'"))]
    UnsupportedEasing { name: String },
}

/// A running or idle transition of one attribute.
///
/// The variant is fixed at construction. Switching type means replacing the transition.
pub enum Transition {
    Interpolation(InterpolationTransition),
    Spring(SpringTransition),
}

impl Transition {
    pub fn new(settings: &TransitionSettings) -> Self {
        match settings {
            TransitionSettings::Interpolation(settings) => {
                Transition::Interpolation(InterpolationTransition::new(*settings))
            }
            TransitionSettings::Spring(settings) => {
                Transition::Spring(SpringTransition::new(*settings))
            }
        }
    }

    pub fn transition_type(&self) -> TransitionType {
        match self {
            Transition::Interpolation(_) => TransitionType::Interpolation,
            Transition::Spring(_) => TransitionType::Spring,
        }
    }

    /// (Re)starts towards `target`, sized for `len` floats.
    ///
    /// Settings of a different type than the transition are ignored.
    pub fn start(
        &mut self,
        context: &GpuContext,
        settings: &TransitionSettings,
        target: &GpuBuffer,
        len: usize,
    ) {
        match (self, settings) {
            (Transition::Interpolation(t), TransitionSettings::Interpolation(s)) => {
                t.start(context, s, target, len)
            }
            (Transition::Spring(t), TransitionSettings::Spring(s)) => {
                t.start(context, s, target, len)
            }
            (transition, settings) => strata_utils::debug_panic!(
                "Started a {} transition with {} settings",
                transition.transition_type(),
                settings.transition_type()
            ),
        }
    }

    /// Advances one tick. Returns whether the visual output changed.
    pub fn update(&mut self, now: Duration) -> bool {
        match self {
            Transition::Interpolation(t) => t.update(now),
            Transition::Spring(t) => t.update(now),
        }
    }

    pub fn is_transitioning(&self) -> bool {
        match self {
            Transition::Interpolation(t) => t.is_transitioning(),
            Transition::Spring(t) => t.is_transitioning(),
        }
    }

    pub fn transitioning_buffer(&self) -> Option<&GpuBuffer> {
        match self {
            Transition::Interpolation(t) => t.transitioning_buffer(),
            Transition::Spring(t) => t.transitioning_buffer(),
        }
    }

    pub fn cancel(&mut self) {
        match self {
            Transition::Interpolation(t) => t.cancel(),
            Transition::Spring(t) => t.cancel(),
        }
    }
}

/// A new buffer of `len` floats holding the overlapping prefix of `source`.
pub(crate) fn clone_buffer(
    context: &GpuContext,
    label: &str,
    source: &GpuBuffer,
    len: usize,
) -> GpuBuffer {
    let mut buffer = context.create_buffer(label, &vec![0.0; len]);
    buffer.copy_from(source);
    buffer
}

/// Resizes `buffer` to `len` floats. The overlap keeps its values, new
/// instances take the values of `target`.
pub(crate) fn pad_buffer(buffer: &mut GpuBuffer, target: &GpuBuffer, len: usize) {
    let old_len = buffer.len();
    buffer.resize(len);
    if len > old_len {
        buffer.copy_range_from(target, old_len..len);
    }
}
