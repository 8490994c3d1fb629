use std::time::Duration;

/// Linear progress over a fixed duration, measured in time-source seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeline {
    start: f32,
    duration: f32,
}

impl Timeline {
    /// Timeline starting at `start` seconds.
    pub fn new(start: f32, duration: Duration) -> Self {
        Self {
            start,
            duration: duration.as_secs_f32(),
        }
    }

    /// Progress in `[0, 1]` at `now`. A zero duration is complete at once.
    pub fn progress(&self, now: f32) -> f32 {
        if self.duration <= f32::EPSILON {
            return 1.0;
        }
        ((now - self.start) / self.duration).clamp(0.0, 1.0)
    }

    /// Whether `now` is at or past the end.
    pub fn finished(&self, now: f32) -> bool {
        self.progress(now) >= 1.0
    }
}
