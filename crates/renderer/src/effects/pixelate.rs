use profiles::SettingsStore;

use crate::backend::UniformValue;
use crate::effect::{setting_key, Effect, Tunable, UniformWriter};
use crate::ShaderError;

use super::effect_source;

/// Dissolves the window into growing pixels.
pub struct Pixelate;

const TUNABLES: &[Tunable] = &[
    Tunable::int("pixel-size", "uPixelSize", 15),
    Tunable::double("noise", "uNoise", 0.5),
];

impl Effect for Pixelate {
    fn nick(&self) -> &'static str {
        "pixelate"
    }

    fn label(&self) -> &'static str {
        "Pixelate"
    }

    fn fragment_source(&self) -> &'static str {
        effect_source!("pixelate.frag")
    }

    fn default_animation_time(&self) -> i64 {
        1500
    }

    fn tunables(&self) -> &'static [Tunable] {
        TUNABLES
    }

    // The shader takes the pixel size as a float and divides by it.
    fn write_uniforms(
        &self,
        settings: &dyn SettingsStore,
        uniforms: &mut UniformWriter<'_>,
    ) -> Result<(), ShaderError> {
        let pixel_size = settings.int(&setting_key(self.nick(), "pixel-size"))?.max(1);
        let noise = settings
            .double(&setting_key(self.nick(), "noise"))?
            .clamp(0.0, 1.0);
        uniforms.set("uPixelSize", UniformValue::Float(pixel_size as f32));
        uniforms.set("uNoise", UniformValue::Float(noise as f32));
        Ok(())
    }
}
