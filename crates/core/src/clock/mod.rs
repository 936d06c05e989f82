use std::time::Instant;

/// Millisecond playback clock.
///
/// While running, time advances with the wall clock. Seeking replaces the
/// position outright, which is how a soundtrack position is fed back in.
#[derive(Debug, Clone, Default)]
pub struct PlaybackClock {
    position_ms: i64,
    running_since: Option<Instant>,
    length_ms: Option<i64>,
}

impl PlaybackClock {
    /// A paused clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// A clock at zero that is already running.
    pub fn start() -> Self {
        Self {
            running_since: Some(Instant::now()),
            ..Self::default()
        }
    }

    /// Bounds the clock to a soundtrack of `length_ms`.
    pub fn with_length(mut self, length_ms: i64) -> Self {
        self.length_ms = Some(length_ms.max(0));
        self.position_ms = self.clamp(self.position_ms);
        self
    }

    pub fn length_ms(&self) -> Option<i64> {
        self.length_ms
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    pub fn reset(&mut self) {
        self.seek(0);
    }

    pub fn advance(&mut self, delta_ms: i64) {
        let now = self.now_ms();
        self.seek(now.saturating_add(delta_ms));
    }

    pub fn seek(&mut self, position_ms: i64) {
        self.position_ms = self.clamp(position_ms);
        if self.running_since.is_some() {
            self.running_since = Some(Instant::now());
        }
    }

    pub fn pause(&mut self) {
        if self.running_since.is_some() {
            self.position_ms = self.now_ms();
            self.running_since = None;
        }
    }

    pub fn resume(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    pub fn now_ms(&self) -> i64 {
        let elapsed = self
            .running_since
            .map(|since| i64::try_from(since.elapsed().as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        self.clamp(self.position_ms.saturating_add(elapsed))
    }

    /// True once a bounded clock has reached the end of its soundtrack.
    pub fn finished(&self) -> bool {
        self.length_ms
            .is_some_and(|length| self.now_ms() >= length)
    }

    fn clamp(&self, ms: i64) -> i64 {
        match self.length_ms {
            Some(length) => ms.clamp(0, length),
            None => ms.max(0),
        }
    }
}

/// Converts a clock time to the scene's keyframe time base.
pub fn scene_frame(clock_ms: i64, frames_per_second: f32) -> f32 {
    (clock_ms as f64 / 1000.0 * f64::from(frames_per_second)) as f32
}

/// Fixed-rate frame times from `from_ms` to `to_ms` inclusive.
///
/// Each time is computed from the frame index, so long runs do not drift.
#[derive(Debug, Clone)]
pub struct FrameStepper {
    from_ms: i64,
    to_ms: i64,
    fps: u32,
    index: i64,
}

impl FrameStepper {
    pub fn new(from_ms: i64, to_ms: i64, fps: u32) -> Self {
        Self {
            from_ms,
            to_ms,
            fps: fps.max(1),
            index: 0,
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Milliseconds between consecutive frames, rounded down.
    pub fn frame_ms(&self) -> i64 {
        1000 / i64::from(self.fps)
    }

    fn time_of(&self, index: i64) -> i64 {
        self.from_ms
            .saturating_add(index.saturating_mul(1000) / i64::from(self.fps))
    }
}

impl Iterator for FrameStepper {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let time = self.time_of(self.index);
        if time > self.to_ms {
            return None;
        }
        self.index += 1;
        Some(time)
    }
}
