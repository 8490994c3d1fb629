use profiles::{ColorScheme, Direction, PowerProfile, WindowId, WindowKind};
use renderer::HostVersion;

/// Which native transition the host is about to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    Open,
    Close,
}

impl TransitionKind {
    /// Animation direction the transition maps to.
    pub fn direction(self) -> Direction {
        match self {
            TransitionKind::Open => Direction::Opening,
            TransitionKind::Close => Direction::Closing,
        }
    }

    pub fn from_direction(direction: Direction) -> Self {
        match direction {
            Direction::Opening => TransitionKind::Open,
            Direction::Closing => TransitionKind::Close,
        }
    }
}

/// What the host knows about the window a transition is for.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowInfo {
    pub id: WindowId,
    pub app_id: String,
    pub kind: WindowKind,
    /// Actor size in pixels.
    pub size: [f32; 2],
}

impl WindowInfo {
    /// Describes a window about to transition.
    pub fn new(id: WindowId, app_id: impl Into<String>, kind: WindowKind, size: [f32; 2]) -> Self {
        Self {
            id,
            app_id: app_id.into(),
            kind,
            size,
        }
    }
}

/// Runtime conditions reported by the host. A `None` capability never
/// excludes a profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostEnvironment {
    pub version: HostVersion,
    pub on_battery: Option<bool>,
    pub color_scheme: Option<ColorScheme>,
    pub power_profile: Option<PowerProfile>,
}

impl Default for HostEnvironment {
    fn default() -> Self {
        Self {
            version: HostVersion::MINIMUM,
            on_battery: None,
            color_scheme: None,
            power_profile: None,
        }
    }
}

/// The compositor side of the transition pipeline.
pub trait TransitionHost {
    fn environment(&self) -> HostEnvironment;

    /// Runs the host's own transition for `window`.
    fn start_native_transition(&mut self, window: &WindowInfo, kind: TransitionKind);

    /// Post-transition finalizer, run once a shader transition ends.
    fn finish_transition(&mut self, window: WindowId, kind: TransitionKind);

    /// Window-removal bookkeeping, e.g. dropping the actor from its group.
    fn remove_window(&mut self, window: WindowId);

    /// Toggles the host's "unredirect fullscreen windows" optimisation.
    fn set_unredirect_enabled(&mut self, enabled: bool);

    fn queue_repaint(&mut self, window: WindowId);

    fn set_actor_scale(&mut self, window: WindowId, scale: f32);
}
