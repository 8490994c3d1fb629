use crate::effect::{Effect, Tunable};

use super::effect_source;

/// Collapses the window like an old CRT switching off.
pub struct Tv;

const TUNABLES: &[Tunable] = &[Tunable::color("effect-color", "uColor", [1.0, 1.0, 1.0, 1.0])];

impl Effect for Tv {
    fn nick(&self) -> &'static str {
        "tv"
    }

    fn label(&self) -> &'static str {
        "TV Effect"
    }

    fn fragment_source(&self) -> &'static str {
        effect_source!("tv.frag")
    }

    fn default_animation_time(&self) -> i64 {
        500
    }

    fn tunables(&self) -> &'static [Tunable] {
        TUNABLES
    }
}
