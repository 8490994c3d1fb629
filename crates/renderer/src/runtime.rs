use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Snapshot of the time state handed to an animation tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Seconds since the last reset.
    pub seconds: f32,
    /// Frames sampled since the last reset.
    pub frame_index: u64,
}

impl TimeSample {
    /// Creates a new time sample.
    pub fn new(seconds: f32, frame_index: u64) -> Self {
        Self {
            seconds,
            frame_index,
        }
    }
}

/// Abstraction over where animation time comes from.
pub trait TimeSource {
    /// Restarts the clock at zero.
    fn reset(&mut self);
    /// Produces a time sample for the current frame.
    fn sample(&mut self) -> TimeSample;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
    frame: u64,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            frame: 0,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        self.origin = Instant::now();
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.origin.elapsed().as_secs_f32(), self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Shared clock advanced by hand. Every [`ManualTimeSource`] made from it
/// measures against the same global time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f32>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves every source made from this clock forward.
    pub fn advance(&self, seconds: f32) {
        self.now.set(self.now.get() + seconds);
    }

    pub fn now(&self) -> f32 {
        self.now.get()
    }

    /// A source whose zero is the clock's current time.
    pub fn source(&self) -> ManualTimeSource {
        ManualTimeSource {
            clock: self.clone(),
            origin: self.now(),
            frame: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManualTimeSource {
    clock: ManualClock,
    origin: f32,
    frame: u64,
}

impl TimeSource for ManualTimeSource {
    fn reset(&mut self) {
        self.origin = self.clock.now();
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.clock.now() - self.origin, self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Convenient alias for owning time sources behind trait objects.
pub type BoxedTimeSource = Box<dyn TimeSource>;

/// Builds one time source per animation driver.
pub type TimeSourceFactory = Box<dyn Fn() -> BoxedTimeSource>;

/// Factory handing every driver its own monotonic clock.
pub fn system_time_sources() -> TimeSourceFactory {
    Box::new(|| Box::new(SystemTimeSource::new()))
}

/// Factory whose sources all read `clock`.
pub fn manual_time_sources(clock: &ManualClock) -> TimeSourceFactory {
    let clock = clock.clone();
    Box::new(move || Box::new(clock.source()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_sources_share_one_clock() {
        let clock = ManualClock::new();
        let mut first = clock.source();
        clock.advance(0.5);
        let mut second = clock.source();
        clock.advance(0.25);
        assert_eq!(first.sample().seconds, 0.75);
        assert_eq!(second.sample().seconds, 0.25);

        first.reset();
        assert_eq!(first.sample().seconds, 0.0);
        assert_eq!(first.sample().frame_index, 1);
    }
}
