use profiles::{Schema, SettingsStore};
use tracing::{debug, info, warn};

use crate::backend::ShaderBackend;
use crate::effect::{ActivationParams, Effect, HostVersion, SeedSource};
use crate::pool::{PoolStats, ShaderPool};
use crate::registry::ProgramRegistry;
use crate::shader::ShaderInstance;
use crate::ShaderError;

struct Entry {
    effect: Box<dyn Effect>,
    pool: ShaderPool<ShaderInstance>,
}

/// Registered effects, each next to its instance pool, plus the shared
/// program registry.
pub struct EffectCatalog {
    entries: Vec<Entry>,
    registry: ProgramRegistry,
}

impl Default for EffectCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectCatalog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            registry: ProgramRegistry::new(),
        }
    }

    /// Catalog holding every built-in effect.
    pub fn with_builtin() -> Self {
        let mut catalog = Self::new();
        for effect in crate::effects::builtin_effects() {
            if let Err(err) = catalog.register(effect) {
                warn!(error = %err, "skipping built-in effect");
            }
        }
        catalog
    }

    /// Adds an effect. Fails when its nick is already taken.
    pub fn register(&mut self, effect: Box<dyn Effect>) -> Result<(), ShaderError> {
        let nick = effect.nick();
        if self.entry(nick).is_some() {
            return Err(ShaderError::DuplicateEffect(nick.to_string()));
        }
        debug!(effect = nick, label = effect.label(), "registered effect");
        self.entries.push(Entry {
            effect,
            pool: ShaderPool::new(nick),
        });
        Ok(())
    }

    /// Looks an effect up by nick.
    pub fn effect(&self, nick: &str) -> Option<&dyn Effect> {
        self.entry(nick).map(|entry| entry.effect.as_ref())
    }

    /// Registered nicks, in registration order.
    pub fn nicks(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.effect.nick()).collect()
    }

    /// Effects that run on `host`, in registration order.
    pub fn supported_nicks(&self, host: HostVersion) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|entry| entry.effect.min_host_version() <= host)
            .map(|entry| entry.effect.nick())
            .collect()
    }

    /// Adds the settings of every registered effect to `schema`.
    pub fn extend_schema(&self, schema: &mut Schema) {
        for entry in &self.entries {
            entry.effect.extend_schema(schema);
        }
    }

    /// Hands out a shader instance for `nick`, compiling the program on first
    /// use and constructing a new instance only when the pool is empty.
    pub fn acquire(
        &mut self,
        nick: &str,
        backend: &mut dyn ShaderBackend,
        seeds: &mut SeedSource<'_>,
    ) -> Result<ShaderInstance, ShaderError> {
        let Self { entries, registry } = self;
        let Entry { effect, pool } = entries
            .iter_mut()
            .find(|entry| entry.effect.nick() == nick)
            .ok_or_else(|| ShaderError::UnknownEffect(nick.to_string()))?;
        let effect: &dyn Effect = &**effect;
        let program = registry.get_or_compile(effect, backend)?;
        pool.acquire_with(|| ShaderInstance::construct(effect, program, backend, seeds.next_u64()))
    }

    /// Runs the per-activation uniform setup of `shader`.
    pub fn activate(
        &self,
        shader: &mut ShaderInstance,
        settings: &dyn SettingsStore,
        params: &ActivationParams,
        backend: &mut dyn ShaderBackend,
        seeds: &mut SeedSource<'_>,
    ) -> Result<(), ShaderError> {
        let effect = self
            .effect(shader.effect())
            .ok_or_else(|| ShaderError::UnknownEffect(shader.effect().to_string()))?;
        shader.begin(effect, settings, params, backend, seeds)
    }

    /// Returns `shader` to its effect's pool.
    pub fn release(&mut self, shader: ShaderInstance, backend: &mut dyn ShaderBackend) {
        let nick = shader.effect();
        match self.entries.iter_mut().find(|entry| entry.effect.nick() == nick) {
            Some(entry) => {
                entry.pool.release(shader);
            }
            None => {
                warn!(effect = nick, "released instance of an unknown effect; destroying it");
                shader.destroy(backend);
            }
        }
    }

    /// Pool counters for `nick`.
    pub fn pool_stats(&self, nick: &str) -> Option<PoolStats> {
        self.entry(nick).map(|entry| entry.pool.stats())
    }

    /// Number of programs compiled so far.
    pub fn compiled_programs(&self) -> usize {
        self.registry.len()
    }

    /// Destroys every pooled instance and compiled program. Instances still
    /// handed out must be released first.
    pub fn shutdown(&mut self, backend: &mut dyn ShaderBackend) {
        let mut destroyed = 0usize;
        for entry in &mut self.entries {
            let stats = entry.pool.stats();
            if stats.in_use > 0 {
                warn!(
                    effect = entry.effect.nick(),
                    in_use = stats.in_use,
                    "shutting down with instances still in use"
                );
            }
            for shader in entry.pool.drain_free() {
                shader.destroy(backend);
                destroyed += 1;
            }
        }
        self.registry.destroy_all(backend);
        info!(destroyed, "effect catalog shut down");
    }

    fn entry(&self, nick: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.effect.nick() == nick)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use profiles::{Direction, Settings, WindowId};

    use super::*;
    use crate::animation::TEST_MODE_PROGRESS;
    use crate::backend::{BackendCall, RecordingBackend, UniformValue};
    use crate::effects::Fire;

    fn params() -> ActivationParams {
        ActivationParams {
            window: WindowId(3),
            direction: Direction::Closing,
            duration: Duration::from_millis(1500),
            size: [200.0, 100.0],
            actor_scale: 1.5,
            test_mode: true,
        }
    }

    #[test]
    fn builtin_catalog_registers_schema() {
        let catalog = EffectCatalog::with_builtin();
        assert_eq!(catalog.nicks(), vec!["fire", "glitch", "tv", "pixelate", "wisps"]);
        let mut schema = Schema::new();
        catalog.extend_schema(&mut schema);
        assert!(schema.contains("glitch-enable-effect"));
        assert!(schema.contains("wisps-animation-time"));
        assert!(schema.contains("fire-gradient-3"));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut catalog = EffectCatalog::new();
        catalog.register(Box::new(Fire)).unwrap();
        assert!(matches!(
            catalog.register(Box::new(Fire)),
            Err(ShaderError::DuplicateEffect(_))
        ));
    }

    #[test]
    fn host_version_filters_effects() {
        let catalog = EffectCatalog::with_builtin();
        assert!(!catalog
            .supported_nicks(HostVersion::new(3, 36))
            .contains(&"wisps"));
        assert!(catalog
            .supported_nicks(HostVersion::new(46, 0))
            .contains(&"wisps"));
    }

    #[test]
    fn glitch_instances_get_one_noise_texture_each() {
        let mut catalog = EffectCatalog::with_builtin();
        let mut backend = RecordingBackend::new();
        let mut seeds = SeedSource::Fixed;
        let first = catalog.acquire("glitch", &mut backend, &mut seeds).unwrap();
        let second = catalog.acquire("glitch", &mut backend, &mut seeds).unwrap();
        assert_eq!(first.textures().len(), 1);
        assert_ne!(first.textures(), second.textures());
        assert_eq!(backend.compile_count(), 1);

        catalog.release(first, &mut backend);
        let reused = catalog.acquire("glitch", &mut backend, &mut seeds).unwrap();
        assert_eq!(backend.live_textures(), 2);
        catalog.release(reused, &mut backend);
        catalog.release(second, &mut backend);

        catalog.shutdown(&mut backend);
        assert_eq!(backend.live_textures(), 0);
        assert_eq!(backend.live_instances(), 0);
        assert_eq!(backend.live_programs(), 0);
    }

    #[test]
    fn activation_writes_common_uniforms() {
        let mut catalog = EffectCatalog::with_builtin();
        let mut schema = Schema::with_profile_keys();
        catalog.extend_schema(&mut schema);
        let settings = Settings::new(Arc::new(schema));
        let mut backend = RecordingBackend::new();
        let mut seeds = SeedSource::Fixed;

        let mut shader = catalog.acquire("fire", &mut backend, &mut seeds).unwrap();
        catalog
            .activate(&mut shader, &settings, &params(), &mut backend, &mut seeds)
            .unwrap();
        assert_eq!(shader.window(), Some(WindowId(3)));
        assert_eq!(shader.activations(), 1);

        let writes = backend.uniform_writes(shader.id());
        let get = |name: &str| {
            writes
                .iter()
                .find(|(written, _)| written == name)
                .map(|(_, value)| *value)
        };
        assert_eq!(get("uProgress"), Some(UniformValue::Float(TEST_MODE_PROGRESS)));
        assert_eq!(get("uDuration"), Some(UniformValue::Float(1.5)));
        assert_eq!(get("uForOpening"), Some(UniformValue::Float(0.0)));
        assert_eq!(get("uPadding"), Some(UniformValue::Float(50.0)));
        assert_eq!(get("uSize"), Some(UniformValue::Vec2([300.0, 200.0])));
        assert_eq!(get("uSeed"), Some(UniformValue::Vec2([0.0, 0.0])));
        assert_eq!(get("u3DNoise"), Some(UniformValue::Int(1)));
        assert!(backend
            .calls()
            .iter()
            .all(|call| !matches!(call, BackendCall::CreateTexture { .. })));
    }

    #[test]
    fn regular_activation_starts_at_zero_progress() {
        let mut catalog = EffectCatalog::with_builtin();
        let mut schema = Schema::with_profile_keys();
        catalog.extend_schema(&mut schema);
        let settings = Settings::new(Arc::new(schema));
        let mut backend = RecordingBackend::new();
        let mut seeds = SeedSource::Fixed;
        let params = ActivationParams {
            test_mode: false,
            ..params()
        };

        let mut shader = catalog.acquire("tv", &mut backend, &mut seeds).unwrap();
        catalog
            .activate(&mut shader, &settings, &params, &mut backend, &mut seeds)
            .unwrap();
        let progress = backend
            .uniform_writes(shader.id())
            .into_iter()
            .find(|(name, _)| name == "uProgress")
            .map(|(_, value)| value);
        assert_eq!(progress, Some(UniformValue::Float(0.0)));
    }

    #[test]
    fn unknown_effect_is_an_error() {
        let mut catalog = EffectCatalog::with_builtin();
        let mut backend = RecordingBackend::new();
        assert!(matches!(
            catalog.acquire("doom", &mut backend, &mut SeedSource::Fixed),
            Err(ShaderError::UnknownEffect(_))
        ));
    }
}
