//! Transform passes that advance transitioning attributes.
//!
//! A pass reads one or more source buffers and writes a destination buffer of the same
//! length, component by component. Backends either run the reference kernels below on the
//! CPU or dispatch the equivalent compute shaders.

use crate::buffer::GpuBuffer;

/// Per-component tolerance under which a spring counts as settled.
pub const SPRING_SETTLE_EPSILON: f32 = 1e-4;

pub enum TransformJob<'a> {
    /// `current = from + (to - from) * t`
    Interpolate {
        from: &'a GpuBuffer,
        to: &'a GpuBuffer,
        current: &'a GpuBuffer,
        t: f32,
    },
    /// One damped oscillator step from `current` towards `target`, written to `next`.
    Spring {
        previous: &'a GpuBuffer,
        current: &'a GpuBuffer,
        target: &'a GpuBuffer,
        next: &'a GpuBuffer,
        stiffness: f32,
        damping: f32,
    },
}

impl TransformJob<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            TransformJob::Interpolate { .. } => "Interpolation Transform",
            TransformJob::Spring { .. } => "Spring Transform",
        }
    }

    /// Number of components the pass touches: the shortest bound buffer.
    pub fn element_count(&self) -> usize {
        match self {
            TransformJob::Interpolate { from, to, current, .. } => {
                from.len().min(to.len()).min(current.len())
            }
            TransformJob::Spring {
                previous,
                current,
                target,
                next,
                ..
            } => previous
                .len()
                .min(current.len())
                .min(target.len())
                .min(next.len()),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransformStatus {
    /// Every component of a spring pass came to rest. Always true for interpolation.
    pub settled: bool,
}

impl TransformStatus {
    pub const SETTLED: TransformStatus = TransformStatus { settled: true };
    pub const MOVING: TransformStatus = TransformStatus { settled: false };
}

pub fn interpolate(from: &[f32], to: &[f32], t: f32, current: &mut [f32]) {
    for ((out, a), b) in current.iter_mut().zip(from).zip(to) {
        *out = a + (b - a) * t;
    }
}

/// Returns whether every component settled.
pub fn spring_step(
    previous: &[f32],
    current: &[f32],
    target: &[f32],
    stiffness: f32,
    damping: f32,
    next: &mut [f32],
) -> bool {
    let mut settled = true;
    let components = next.iter_mut().zip(previous).zip(current).zip(target);
    for (((out, prev), cur), to) in components {
        let velocity = cur - prev;
        let spring = (to - cur) * stiffness;
        let damper = -velocity * damping;
        *out = cur + velocity + spring + damper;

        if (*out - cur).abs() > SPRING_SETTLE_EPSILON || (to - *out).abs() > SPRING_SETTLE_EPSILON
        {
            settled = false;
        }
    }
    settled
}
