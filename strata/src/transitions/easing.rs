use crate::transitions::{TransitionError, UnsupportedEasingErr};
use std::fmt::{Debug, Formatter};
use std::str::FromStr;

/// Maps linear progress in `[0, 1]` to eased progress.
#[derive(Clone, Copy, Default)]
pub enum Easing {
    #[default]
    Linear,
    QuadIn,
    QuadOut,
    QuadInOut,
    CubicIn,
    CubicOut,
    CubicInOut,
    Custom(fn(f32) -> f32),
}

impl Easing {
    /// Eased factor, clamped to `[0, 1]`.
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        let eased = match self {
            Easing::Linear => t,
            Easing::QuadIn => t * t,
            Easing::QuadOut => t * (2.0 - t),
            Easing::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Easing::CubicIn => t * t * t,
            Easing::CubicOut => {
                let u = t - 1.0;
                u * u * u + 1.0
            }
            Easing::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let u = 2.0 * t - 2.0;
                    0.5 * u * u * u + 1.0
                }
            }
            Easing::Custom(f) => f(t),
        };
        if eased.is_nan() {
            return t;
        }
        eased.clamp(0.0, 1.0)
    }
}

impl PartialEq for Easing {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Easing::Custom(a), Easing::Custom(b)) => std::ptr::fn_addr_eq(*a, *b),
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}

impl Debug for Easing {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Easing::Linear => "linear",
            Easing::QuadIn => "quad-in",
            Easing::QuadOut => "quad-out",
            Easing::QuadInOut => "quad-in-out",
            Easing::CubicIn => "cubic-in",
            Easing::CubicOut => "cubic-out",
            Easing::CubicInOut => "cubic-in-out",
            Easing::Custom(_) => "custom",
        };
        f.write_str(name)
    }
}

impl FromStr for Easing {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "linear" => Easing::Linear,
            "quad-in" => Easing::QuadIn,
            "quad-out" => Easing::QuadOut,
            "quad-in-out" => Easing::QuadInOut,
            "cubic-in" => Easing::CubicIn,
            "cubic-out" => Easing::CubicOut,
            "cubic-in-out" => Easing::CubicInOut,
            _ => return UnsupportedEasingErr { name: s }.fail(),
        })
    }
}
