use crate::transitions::easing::Easing;
use web_time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// Started, waiting for the first tick to pin the start time.
    Pending,
    Running { start: Duration },
    Ended,
}

/// Progress of a timed transition on the timeline.
///
/// The start time is taken from the first tick after [`TransitionTiming::start`], so a
/// transition started during a layer update begins on the frame that draws it.
#[derive(Debug, Clone)]
pub struct TransitionTiming {
    phase: Phase,
    duration: Duration,
    easing: Easing,
    last_tick: Option<Duration>,
}

impl Default for TransitionTiming {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            duration: Duration::ZERO,
            easing: Easing::Linear,
            last_tick: None,
        }
    }
}

impl TransitionTiming {
    pub fn start(&mut self, duration: Duration, easing: Easing) {
        self.phase = Phase::Pending;
        self.duration = duration;
        self.easing = easing;
        self.last_tick = None;
    }

    pub fn cancel(&mut self) {
        self.phase = Phase::Idle;
        self.last_tick = None;
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self.phase, Phase::Pending | Phase::Running { .. })
    }

    /// Eased progress for this tick.
    ///
    /// Returns `None` when nothing changes: the transition isn't running, or `now` was
    /// already ticked. The tick that reaches the end yields `1.0` once and ends the run.
    pub fn tick(&mut self, now: Duration) -> Option<f32> {
        if self.last_tick == Some(now) {
            return None;
        }

        let start = match self.phase {
            Phase::Idle | Phase::Ended => return None,
            Phase::Pending => {
                self.phase = Phase::Running { start: now };
                now
            }
            Phase::Running { start } => start,
        };
        self.last_tick = Some(now);

        let elapsed = now.saturating_sub(start);
        if elapsed >= self.duration {
            self.phase = Phase::Ended;
            return Some(1.0);
        }

        Some(
            self.easing
                .apply(elapsed.as_secs_f32() / self.duration.as_secs_f32()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn first_tick_pins_start() {
        let mut timing = TransitionTiming::default();
        timing.start(ms(100), Easing::Linear);

        assert_eq!(timing.tick(ms(1000)), Some(0.0));
        assert_eq!(timing.tick(ms(1050)), Some(0.5));
        assert_eq!(timing.tick(ms(1100)), Some(1.0));
        assert!(!timing.is_in_progress());
        assert_eq!(timing.tick(ms(1200)), None);
    }

    #[test]
    fn repeated_ticks_report_nothing() {
        let mut timing = TransitionTiming::default();
        timing.start(ms(100), Easing::Linear);
        assert!(timing.tick(ms(10)).is_some());
        assert_eq!(timing.tick(ms(10)), None);
    }

    #[test]
    fn idle_timing_never_ticks() {
        let mut timing = TransitionTiming::default();
        assert_eq!(timing.tick(ms(0)), None);
        timing.start(ms(100), Easing::Linear);
        timing.cancel();
        assert_eq!(timing.tick(ms(50)), None);
    }
}
