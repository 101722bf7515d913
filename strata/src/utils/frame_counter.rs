use std::collections::VecDeque;
use web_time::Duration;

const WINDOW: usize = 60;

/// Frame rate over the last [`WINDOW`] frame deltas.
#[derive(Debug, Clone, Default)]
pub struct FrameCounter {
    deltas: VecDeque<Duration>,
    total: Duration,
}

impl FrameCounter {
    pub fn new_frame(&mut self, delta: Duration) {
        if self.deltas.len() == WINDOW
            && let Some(oldest) = self.deltas.pop_front()
        {
            self.total -= oldest;
        }
        self.deltas.push_back(delta);
        self.total += delta;
    }

    pub fn frames(&self) -> usize {
        self.deltas.len()
    }

    pub fn mean_delta(&self) -> Duration {
        match self.deltas.len() {
            0 => Duration::ZERO,
            len => self.total / len as u32,
        }
    }

    /// Zero until a frame with a measurable delta was counted.
    pub fn fps(&self) -> f32 {
        let mean = self.mean_delta().as_secs_f32();
        if mean > 0.0 { mean.recip() } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_keeps_the_latest_frames() {
        let mut counter = FrameCounter::default();
        for _ in 0..WINDOW {
            counter.new_frame(Duration::from_millis(10));
        }
        for _ in 0..WINDOW {
            counter.new_frame(Duration::from_millis(20));
        }

        assert_eq!(counter.frames(), WINDOW);
        assert_eq!(counter.mean_delta(), Duration::from_millis(20));
        assert!((counter.fps() - 50.0).abs() < 1e-3);
    }

    #[test]
    fn empty_counter_reports_zero() {
        let counter = FrameCounter::default();
        assert_eq!(counter.mean_delta(), Duration::ZERO);
        assert_eq!(counter.fps(), 0.0);
    }
}
