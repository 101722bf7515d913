use web_time::Duration;

/// Clock read by transitions.
///
/// The animation loop feeds it the engine time every frame. While paused the
/// timeline holds still, so running transitions freeze in place.
#[derive(Debug, Clone)]
pub struct Timeline {
    time: Duration,
    playing: bool,
    playback_rate: f32,
    last_engine_time: Option<Duration>,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            time: Duration::ZERO,
            playing: true,
            playback_rate: 1.0,
            last_engine_time: None,
        }
    }

    pub fn time(&self) -> Duration {
        self.time
    }

    pub fn set_time(&mut self, time: Duration) {
        self.time = time;
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_playback_rate(&mut self, rate: f32) {
        self.playback_rate = rate.max(0.0);
    }

    /// Advances by however much engine time passed since the last call.
    ///
    /// The first call adopts the engine time as is.
    pub fn update(&mut self, engine_time: Duration) {
        match self.last_engine_time {
            None => self.time = engine_time,
            Some(last) if self.playing => {
                let delta = engine_time.saturating_sub(last);
                self.time += delta.mul_f32(self.playback_rate);
            }
            Some(_) => {}
        }
        self.last_engine_time = Some(engine_time);
    }
}
