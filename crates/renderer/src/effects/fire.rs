use crate::effect::{Effect, Tunable};

use super::effect_source;

/// Burns the window away, or in, along a flame gradient.
pub struct Fire;

const TUNABLES: &[Tunable] = &[
    Tunable::color("gradient-1", "uGradient1", [0.0, 0.0, 0.0, 0.0]),
    Tunable::color("gradient-2", "uGradient2", [0.5, 0.05, 0.0, 0.6]),
    Tunable::color("gradient-3", "uGradient3", [0.95, 0.35, 0.0, 0.9]),
    Tunable::color("gradient-4", "uGradient4", [1.0, 0.75, 0.2, 1.0]),
    Tunable::color("gradient-5", "uGradient5", [1.0, 1.0, 0.9, 1.0]),
    Tunable::double("scale", "uScale", 1.0),
    Tunable::boolean("3d-noise", "u3DNoise", true),
    Tunable::double("movement-speed", "uMovementSpeed", 1.0),
];

impl Effect for Fire {
    fn nick(&self) -> &'static str {
        "fire"
    }

    fn label(&self) -> &'static str {
        "Fire"
    }

    fn fragment_source(&self) -> &'static str {
        effect_source!("fire.frag")
    }

    fn default_animation_time(&self) -> i64 {
        2000
    }

    fn tunables(&self) -> &'static [Tunable] {
        TUNABLES
    }
}
