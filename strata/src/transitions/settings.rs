use crate::transitions::easing::Easing;
use crate::transitions::{Result, TransitionError, UnsupportedTypeErr};
use bon::Builder;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use web_time::Duration;

pub const DEFAULT_SPRING_STIFFNESS: f32 = 0.05;
pub const DEFAULT_SPRING_DAMPING: f32 = 0.5;

/// Transition configuration per attribute accessor, as given in layer props.
pub type TransitionMap = BTreeMap<String, TransitionConfig>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionType {
    Interpolation,
    Spring,
}

impl FromStr for TransitionType {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "interpolation" => Ok(TransitionType::Interpolation),
            "spring" => Ok(TransitionType::Spring),
            _ => UnsupportedTypeErr { name: s }.fail(),
        }
    }
}

impl Display for TransitionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionType::Interpolation => f.write_str("interpolation"),
            TransitionType::Spring => f.write_str("spring"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Builder)]
pub struct InterpolationSettings {
    #[builder(default)]
    pub duration: Duration,
    #[builder(default)]
    pub easing: Easing,
}

#[derive(Debug, Clone, Copy, PartialEq, Builder)]
pub struct SpringSettings {
    #[builder(default = DEFAULT_SPRING_STIFFNESS)]
    pub stiffness: f32,
    #[builder(default = DEFAULT_SPRING_DAMPING)]
    pub damping: f32,
}

impl Default for SpringSettings {
    fn default() -> Self {
        SpringSettings::builder().build()
    }
}

/// Resolved settings of one attribute transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionSettings {
    Interpolation(InterpolationSettings),
    Spring(SpringSettings),
}

impl TransitionSettings {
    pub fn transition_type(&self) -> TransitionType {
        match self {
            TransitionSettings::Interpolation(_) => TransitionType::Interpolation,
            TransitionSettings::Spring(_) => TransitionType::Spring,
        }
    }
}

impl From<Duration> for TransitionSettings {
    fn from(duration: Duration) -> Self {
        TransitionSettings::Interpolation(InterpolationSettings::builder().duration(duration).build())
    }
}

impl From<InterpolationSettings> for TransitionSettings {
    fn from(settings: InterpolationSettings) -> Self {
        TransitionSettings::Interpolation(settings)
    }
}

impl From<SpringSettings> for TransitionSettings {
    fn from(settings: SpringSettings) -> Self {
        TransitionSettings::Spring(settings)
    }
}

/// Loosely typed transition configuration.
///
/// Either a bare duration, which means interpolation, or a `kind` of
/// `"interpolation"` or `"spring"` with the fields that kind understands.
/// Missing fields take the defaults of the kind.
#[derive(Debug, Clone, PartialEq, Default, Builder)]
pub struct TransitionConfig {
    #[builder(into)]
    pub kind: Option<String>,
    pub duration: Option<Duration>,
    pub easing: Option<Easing>,
    pub stiffness: Option<f32>,
    pub damping: Option<f32>,
}

impl TransitionConfig {
    pub fn resolve(&self) -> Result<TransitionSettings> {
        let kind = match &self.kind {
            Some(kind) => kind.parse()?,
            None => TransitionType::Interpolation,
        };

        Ok(match kind {
            TransitionType::Interpolation => {
                TransitionSettings::Interpolation(InterpolationSettings {
                    duration: self.duration.unwrap_or_default(),
                    easing: self.easing.unwrap_or_default(),
                })
            }
            TransitionType::Spring => TransitionSettings::Spring(SpringSettings {
                stiffness: self.stiffness.unwrap_or(DEFAULT_SPRING_STIFFNESS),
                damping: self.damping.unwrap_or(DEFAULT_SPRING_DAMPING),
            }),
        })
    }
}

impl From<Duration> for TransitionConfig {
    fn from(duration: Duration) -> Self {
        TransitionConfig {
            duration: Some(duration),
            ..TransitionConfig::default()
        }
    }
}

impl From<TransitionSettings> for TransitionConfig {
    fn from(settings: TransitionSettings) -> Self {
        match settings {
            TransitionSettings::Interpolation(settings) => TransitionConfig {
                kind: Some(TransitionType::Interpolation.to_string()),
                duration: Some(settings.duration),
                easing: Some(settings.easing),
                ..TransitionConfig::default()
            },
            TransitionSettings::Spring(settings) => TransitionConfig {
                kind: Some(TransitionType::Spring.to_string()),
                stiffness: Some(settings.stiffness),
                damping: Some(settings.damping),
                ..TransitionConfig::default()
            },
        }
    }
}

impl TryFrom<&TransitionConfig> for TransitionSettings {
    type Error = TransitionError;

    fn try_from(config: &TransitionConfig) -> Result<Self> {
        config.resolve()
    }
}
