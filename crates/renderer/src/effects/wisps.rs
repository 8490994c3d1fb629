use profiles::{Direction, SettingsStore};

use crate::effect::{Effect, HostVersion, Tunable};

use super::effect_source;

/// Drifting glowing particles. Enlarges the actor by 1.5.
pub struct Wisps;

const TUNABLES: &[Tunable] = &[
    Tunable::color("color-1", "uColor1", [1.0, 0.9, 0.6, 1.0]),
    Tunable::color("color-2", "uColor2", [1.0, 0.6, 0.9, 1.0]),
    Tunable::color("color-3", "uColor3", [0.6, 0.9, 1.0, 1.0]),
    Tunable::double("scale", "uScale", 1.0),
];

impl Effect for Wisps {
    fn nick(&self) -> &'static str {
        "wisps"
    }

    fn label(&self) -> &'static str {
        "Wisps"
    }

    fn min_host_version(&self) -> HostVersion {
        HostVersion::new(3, 38)
    }

    fn fragment_source(&self) -> &'static str {
        effect_source!("wisps.frag")
    }

    fn default_animation_time(&self) -> i64 {
        3000
    }

    fn tunables(&self) -> &'static [Tunable] {
        TUNABLES
    }

    /// Particles drift past the window edges.
    fn actor_scale(&self, _settings: &dyn SettingsStore, _direction: Direction) -> f32 {
        1.5
    }
}
