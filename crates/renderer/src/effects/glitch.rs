use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::effect::{Effect, InstanceSetup, Tunable};
use crate::ShaderError;

use super::effect_source;

/// Digital distortion driven by a per-instance noise texture.
pub struct Glitch;

pub(crate) const NOISE_SIZE: u32 = 64;

const TUNABLES: &[Tunable] = &[
    Tunable::double("scale", "uScale", 1.0),
    Tunable::double("strength", "uStrength", 1.0),
    Tunable::double("speed", "uSpeed", 1.0),
    Tunable::color("color", "uColor", [0.4, 0.4, 0.4, 0.5]),
];

/// RGBA noise sampled by row to displace the window.
fn noise_texture(seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; (NOISE_SIZE * NOISE_SIZE * 4) as usize];
    rng.fill_bytes(&mut data);
    for alpha in data.iter_mut().skip(3).step_by(4) {
        *alpha = 255;
    }
    data
}

impl Effect for Glitch {
    fn nick(&self) -> &'static str {
        "glitch"
    }

    fn label(&self) -> &'static str {
        "Glitch"
    }

    fn fragment_source(&self) -> &'static str {
        effect_source!("glitch.frag")
    }

    fn tunables(&self) -> &'static [Tunable] {
        TUNABLES
    }

    fn prepare_instance(&self, setup: &mut InstanceSetup<'_>) -> Result<(), ShaderError> {
        let data = noise_texture(setup.seed());
        setup.attach_texture("glitch noise", NOISE_SIZE, NOISE_SIZE, &data)?;
        Ok(())
    }
}
