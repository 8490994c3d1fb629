//! Built-in effects.

mod fire;
mod glitch;
mod pixelate;
mod tv;
mod wisps;

pub use fire::Fire;
pub use glitch::Glitch;
pub use pixelate::Pixelate;
pub use tv::Tv;
pub use wisps::Wisps;

use crate::effect::Effect;

/// Prepends the shared GLSL helpers to an effect body.
macro_rules! effect_source {
    ($file:literal) => {
        concat!(
            include_str!("shaders/common.glsl"),
            "\n",
            include_str!(concat!("shaders/", $file))
        )
    };
}
pub(crate) use effect_source;

/// Every shipped effect, in registration order.
pub fn builtin_effects() -> Vec<Box<dyn Effect>> {
    vec![
        Box::new(Fire),
        Box::new(Glitch),
        Box::new(Tv),
        Box::new(Pixelate),
        Box::new(Wisps),
    ]
}
