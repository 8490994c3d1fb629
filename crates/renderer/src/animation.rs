//! Per-window animation state machine.
//!
//! A driver runs at most one activation at a time: `begin` starts it, `tick`
//! advances it once per display refresh, and `end` (explicit or on
//! completion) hands the shader instance back to the caller for release.

use std::cell::Cell;
use std::rc::Rc;

use profiles::{Settings, WindowId};
use tracing::{debug, trace};

use crate::backend::ShaderBackend;
use crate::effect::ActivationParams;
use crate::runtime::BoxedTimeSource;
use crate::shader::ShaderInstance;
use crate::timeline::Timeline;

/// Progress reported to shaders in test mode.
pub const TEST_MODE_PROGRESS: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
    Ending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnimationEvent {
    Begin(ActivationParams),
    Update { window: WindowId, progress: f32 },
    End { window: WindowId, completed: bool },
}

/// Everything one activation owns while it runs.
#[derive(Debug)]
pub struct Activation {
    pub params: ActivationParams,
    pub effect: &'static str,
    pub profile: String,
    /// Settings as they were when the activation began.
    pub settings: Settings,
    pub shader: ShaderInstance,
}

/// An activation after `end`, carrying the shader back to its pool.
#[derive(Debug)]
pub struct FinishedActivation {
    pub params: ActivationParams,
    pub effect: &'static str,
    pub profile: String,
    pub shader: ShaderInstance,
    /// False when the activation was interrupted before reaching 1.0.
    pub completed: bool,
}

/// Counted inhibition of the host's "unredirect fullscreen windows"
/// optimisation. Clones share the count; the host should disable unredirect
/// while [`UnredirectLock::is_held`] is true.
#[derive(Debug, Clone, Default)]
pub struct UnredirectLock {
    holders: Rc<Cell<usize>>,
}

impl UnredirectLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a hold; it is released when the guard drops.
    pub fn acquire(&self) -> UnredirectGuard {
        self.holders.set(self.holders.get() + 1);
        UnredirectGuard {
            holders: Rc::clone(&self.holders),
        }
    }

    /// Number of live guards.
    pub fn holders(&self) -> usize {
        self.holders.get()
    }

    pub fn is_held(&self) -> bool {
        self.holders() > 0
    }
}

/// Releases its share of the lock on drop.
#[derive(Debug)]
pub struct UnredirectGuard {
    holders: Rc<Cell<usize>>,
}

impl Drop for UnredirectGuard {
    fn drop(&mut self) {
        self.holders.set(self.holders.get().saturating_sub(1));
    }
}

struct Running {
    activation: Activation,
    timeline: Timeline,
    _guard: UnredirectGuard,
}

pub struct AnimationDriver {
    state: DriverState,
    clock: BoxedTimeSource,
    lock: UnredirectLock,
    running: Option<Running>,
    progress: f32,
    events: Vec<AnimationEvent>,
}

impl AnimationDriver {
    /// Idle driver reading time from `clock`.
    pub fn new(clock: BoxedTimeSource, lock: UnredirectLock) -> Self {
        Self {
            state: DriverState::Idle,
            clock,
            lock,
            running: None,
            progress: 0.0,
            events: Vec::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == DriverState::Running
    }

    /// Last reported progress.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// The running activation, if any.
    pub fn activation(&self) -> Option<&Activation> {
        self.running.as_ref().map(|running| &running.activation)
    }

    /// Starts `activation`. A running activation is ended first and returned
    /// so the caller can release its shader.
    pub fn begin(&mut self, activation: Activation) -> Option<FinishedActivation> {
        let previous = self.end();

        self.clock.reset();
        let start = self.clock.sample().seconds;
        let timeline = Timeline::new(start, activation.params.duration);
        self.progress = 0.0;
        debug!(
            window = %activation.params.window,
            effect = activation.effect,
            direction = %activation.params.direction,
            duration_ms = activation.params.duration.as_millis() as u64,
            "animation started"
        );
        self.events
            .push(AnimationEvent::Begin(activation.params.clone()));
        self.running = Some(Running {
            activation,
            timeline,
            _guard: self.lock.acquire(),
        });
        self.state = DriverState::Running;
        previous
    }

    /// Advances the running activation. Returns it once it reaches the end
    /// of its timeline.
    pub fn tick(&mut self, backend: &mut dyn ShaderBackend) -> Option<FinishedActivation> {
        if self.state != DriverState::Running {
            return None;
        }
        let now = self.clock.sample().seconds;
        let running = self.running.as_mut()?;
        let finished = running.timeline.finished(now);
        let progress = if running.activation.params.test_mode {
            TEST_MODE_PROGRESS
        } else {
            running.timeline.progress(now)
        };
        self.progress = progress;
        running.activation.shader.update(progress, backend);
        let window = running.activation.params.window;
        trace!(%window, progress, "animation tick");
        self.events.push(AnimationEvent::Update { window, progress });

        if finished {
            return self.finish(true);
        }
        None
    }

    /// Ends the running activation. Does nothing when idle.
    pub fn end(&mut self) -> Option<FinishedActivation> {
        self.finish(false)
    }

    /// Drains the events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<AnimationEvent> {
        std::mem::take(&mut self.events)
    }

    fn finish(&mut self, completed: bool) -> Option<FinishedActivation> {
        if self.state != DriverState::Running {
            return None;
        }
        self.state = DriverState::Ending;
        let running = self.running.take()?;
        let Running {
            activation,
            _guard,
            ..
        } = running;
        drop(_guard);

        let Activation {
            params,
            effect,
            profile,
            mut shader,
            ..
        } = activation;
        shader.end();
        debug!(window = %params.window, effect, completed, "animation ended");
        self.events.push(AnimationEvent::End {
            window: params.window,
            completed,
        });
        self.state = DriverState::Idle;
        Some(FinishedActivation {
            params,
            effect,
            profile,
            shader,
            completed,
        })
    }
}
