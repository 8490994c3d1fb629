use profiles::{Direction, SettingsStore, WindowId};

use crate::animation::TEST_MODE_PROGRESS;
use crate::backend::{InstanceHandle, ProgramHandle, ShaderBackend, TextureHandle, UniformValue};
use crate::effect::{ActivationParams, Effect, InstanceSetup, SeedSource, UniformWriter};
use crate::pool::Pooled;
use crate::registry::CompiledProgram;
use crate::registry::UniformLocations;
use crate::ShaderError;

/// Animation progress in `[0, 1]`.
pub const U_PROGRESS: &str = "uProgress";
pub const U_DURATION: &str = "uDuration";
/// 1.0 while opening, 0.0 while closing.
pub const U_FOR_OPENING: &str = "uForOpening";
pub const U_SIZE: &str = "uSize";
/// Pixels added on each side when the actor is enlarged.
pub const U_PADDING: &str = "uPadding";
pub const U_SEED: &str = "uSeed";

/// A GPU program instance bound to one effect.
///
/// Either sits in its effect's pool or is owned by exactly one activation.
/// It refers to the window it animates by id only, and forgets it at `end`.
#[derive(Debug)]
pub struct ShaderInstance {
    id: InstanceHandle,
    effect: &'static str,
    program: ProgramHandle,
    locations: UniformLocations,
    textures: Vec<TextureHandle>,
    window: Option<WindowId>,
    activations: u64,
}

impl Pooled for ShaderInstance {
    fn pool_id(&self) -> InstanceHandle {
        self.id
    }
}

impl ShaderInstance {
    /// Factory used by the pool: creates the backend instance and runs the
    /// effect's one-time setup.
    pub(crate) fn construct(
        effect: &dyn Effect,
        program: &CompiledProgram,
        backend: &mut dyn ShaderBackend,
        seed: u64,
    ) -> Result<Self, ShaderError> {
        let id = backend.create_instance(program.handle)?;
        let mut textures = Vec::new();
        let prepared = {
            let mut setup = InstanceSetup::new(backend, id, &mut textures, seed);
            effect.prepare_instance(&mut setup)
        };
        if let Err(err) = prepared {
            for texture in textures {
                backend.destroy_texture(texture);
            }
            backend.destroy_instance(id);
            return Err(err);
        }
        Ok(Self {
            id,
            effect: effect.nick(),
            program: program.handle,
            locations: program.locations.clone(),
            textures,
            window: None,
            activations: 0,
        })
    }

    pub fn id(&self) -> InstanceHandle {
        self.id
    }

    pub fn effect(&self) -> &'static str {
        self.effect
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    /// Window currently animated by this instance.
    pub fn window(&self) -> Option<WindowId> {
        self.window
    }

    /// How many activations this instance ran.
    pub fn activations(&self) -> u64 {
        self.activations
    }

    pub fn textures(&self) -> &[TextureHandle] {
        &self.textures
    }

    /// Per-activation setup: common uniforms, then the effect's own.
    pub fn begin(
        &mut self,
        effect: &dyn Effect,
        settings: &dyn SettingsStore,
        params: &ActivationParams,
        backend: &mut dyn ShaderBackend,
        seeds: &mut SeedSource<'_>,
    ) -> Result<(), ShaderError> {
        self.window = Some(params.window);
        self.activations += 1;

        let [width, height] = params.size;
        let scale = params.actor_scale.max(1.0);
        let padding = width.max(height) * (scale - 1.0) * 0.5;
        let seed = [seeds.next_seed(), seeds.next_seed()];

        let mut uniforms = UniformWriter::new(backend, self.id, &self.locations);
        let progress = if params.test_mode { TEST_MODE_PROGRESS } else { 0.0 };
        uniforms.set(U_PROGRESS, UniformValue::Float(progress));
        uniforms.set(U_DURATION, UniformValue::Float(params.duration.as_secs_f32()));
        uniforms.set(
            U_FOR_OPENING,
            UniformValue::Float(if params.direction == Direction::Opening { 1.0 } else { 0.0 }),
        );
        uniforms.set(
            U_SIZE,
            UniformValue::Vec2([width + 2.0 * padding, height + 2.0 * padding]),
        );
        uniforms.set(U_PADDING, UniformValue::Float(padding));
        uniforms.set(U_SEED, UniformValue::Vec2(seed));
        effect.write_uniforms(settings, &mut uniforms)
    }

    /// Writes the current progress.
    pub fn update(&mut self, progress: f32, backend: &mut dyn ShaderBackend) {
        if let Some(location) = self.locations.get(U_PROGRESS) {
            backend.set_uniform(self.id, location, UniformValue::Float(progress));
        }
    }

    /// Forgets the window so the instance can go back to its pool.
    pub fn end(&mut self) {
        self.window = None;
    }

    /// Frees the backend objects. Only called at shutdown.
    pub(crate) fn destroy(self, backend: &mut dyn ShaderBackend) {
        for texture in self.textures {
            backend.destroy_texture(texture);
        }
        backend.destroy_instance(self.id);
    }
}
