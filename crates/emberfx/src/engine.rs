use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use profiles::{
    IntoSettingValue, ProfileChange, ProfileDirectory, ProfileSet, ProfileStorage, Schema,
    SettingValue, SettingsStore, SettingsValues, WindowId,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use renderer::{
    animation_time_key, enable_key, system_time_sources, Activation, ActivationParams,
    AnimationDriver, AnimationEvent, EffectCatalog, FinishedActivation, HostVersion, PoolStats,
    SeedSource, ShaderBackend, ShaderError, TimeSourceFactory, UnredirectLock,
};
use selector::{MatchContext, ProfileMatcher, Selection, SelectorError};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::host::{TransitionHost, TransitionKind, WindowInfo};
use crate::interceptor::{PendingTransition, TransitionInterceptor};
use crate::EngineError;

/// Profile storage named by `config`: its `profile_dir`, or the discovered
/// per-user directory.
pub fn storage_from_config(config: &EngineConfig) -> Result<Box<dyn ProfileStorage>, EngineError> {
    let directory = match &config.profile_dir {
        Some(dir) => ProfileDirectory::new(dir.clone()),
        None => ProfileDirectory::discover()?,
    };
    debug!(root = %directory.root().display(), "using profile directory");
    Ok(Box::new(directory))
}

/// Process-scoped owner of every piece of transition state.
///
/// The host drives it from its event loop:
///
/// 1. [`should_animate`](Self::should_animate) before a native open/close
///    transition, which arms a one-shot interception when an effect matches;
/// 2. [`start_transition`](Self::start_transition) where the host would start
///    its own transition;
/// 3. [`frame`](Self::frame) once per display refresh.
pub struct TransitionEngine<H, B> {
    config: EngineConfig,
    host: H,
    backend: B,
    catalog: EffectCatalog,
    profiles: ProfileSet,
    matcher: ProfileMatcher,
    interceptor: TransitionInterceptor,
    drivers: BTreeMap<WindowId, AnimationDriver>,
    time_sources: TimeSourceFactory,
    unredirect: UnredirectLock,
    unredirect_inhibited: bool,
    rng: StdRng,
    host_version: HostVersion,
    events: Vec<AnimationEvent>,
    shut_down: bool,
}

impl<H: TransitionHost, B: ShaderBackend> TransitionEngine<H, B> {
    /// Builds an engine over the built-in effect catalog.
    pub fn new(
        config: EngineConfig,
        host: H,
        backend: B,
        storage: Box<dyn ProfileStorage>,
    ) -> Result<Self, EngineError> {
        Self::with_catalog(config, host, backend, storage, EffectCatalog::with_builtin())
    }

    /// Builds an engine over a custom set of effects.
    pub fn with_catalog(
        config: EngineConfig,
        host: H,
        backend: B,
        storage: Box<dyn ProfileStorage>,
        catalog: EffectCatalog,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let host_version = match config.host_version_override()? {
            Some(version) => version,
            None => host.environment().version,
        };

        let mut schema = Schema::with_profile_keys();
        catalog.extend_schema(&mut schema);
        if let Some(ms) = config.default_animation_time_ms() {
            for nick in catalog.nicks() {
                schema.insert(animation_time_key(nick), ms);
            }
        }

        // A fresh default profile enables the first registered effect.
        let mut default_values = SettingsValues::new();
        if let Some(nick) = catalog.nicks().first() {
            default_values.insert(enable_key(nick), SettingValue::Bool(true));
        }
        let profiles = ProfileSet::load(storage, Arc::new(schema), default_values)?;

        let seed = config.seed.or(config.test_mode.then_some(0));
        let (matcher, rng) = match seed {
            Some(seed) => (
                ProfileMatcher::new(seed),
                StdRng::seed_from_u64(seed.wrapping_add(1)),
            ),
            None => (ProfileMatcher::from_entropy(), StdRng::from_entropy()),
        };

        info!(
            %host_version,
            effects = ?catalog.supported_nicks(host_version),
            profiles = profiles.len(),
            test_mode = config.test_mode,
            "transition engine ready"
        );

        Ok(Self {
            config,
            host,
            backend,
            catalog,
            profiles,
            matcher,
            interceptor: TransitionInterceptor::new(),
            drivers: BTreeMap::new(),
            time_sources: system_time_sources(),
            unredirect: UnredirectLock::new(),
            unredirect_inhibited: false,
            rng,
            host_version,
            events: Vec::new(),
            shut_down: false,
        })
    }

    /// Replaces where animation drivers get their clocks from.
    pub fn with_time_sources(mut self, time_sources: TimeSourceFactory) -> Self {
        self.time_sources = time_sources;
        self
    }

    /// Pre-transition hook. Returns true when a shader transition will
    /// replace the next native `kind` transition of `window`. An entry armed
    /// for the other kind is stale and gets replaced by a fresh selection.
    pub fn should_animate(&mut self, window: &WindowInfo, kind: TransitionKind) -> bool {
        if self.shut_down {
            return false;
        }
        match self.interceptor.pending(window.id) {
            Some(pending) if pending.kind == kind => {
                debug!(window = %window.id, ?kind, "interception already pending");
                return true;
            }
            Some(pending) => {
                debug!(
                    window = %window.id,
                    armed = ?pending.kind,
                    requested = ?kind,
                    "replacing stale interception"
                );
                self.interceptor.disarm(window.id);
            }
            None => {}
        }

        let environment = self.host.environment();
        let ctx = MatchContext {
            window: window.id,
            direction: kind.direction(),
            kind: window.kind,
            app_id: &window.app_id,
            on_battery: environment.on_battery,
            color_scheme: environment.color_scheme,
            power_profile: environment.power_profile,
        };
        let available = self.catalog.supported_nicks(self.host_version);
        let Some(selection) = self.matcher.select(self.profiles.profiles(), &available, &ctx)
        else {
            debug!(window = %window.id, ?kind, "no effect selected");
            return false;
        };
        self.interceptor
            .arm(window.id, PendingTransition { selection, kind });
        true
    }

    /// Transition-start call. Runs the armed shader transition for `window`,
    /// or the native one when nothing is armed or the shader fails. Returns
    /// whether a shader transition started.
    pub fn start_transition(&mut self, window: &WindowInfo, kind: TransitionKind) -> bool {
        let pending = match self.interceptor.disarm(window.id) {
            Some(pending) if pending.kind == kind && !self.shut_down => pending,
            Some(pending) => {
                debug!(
                    window = %window.id,
                    armed = ?pending.kind,
                    requested = ?kind,
                    "discarding mismatched interception"
                );
                self.host.start_native_transition(window, kind);
                return false;
            }
            None => {
                self.host.start_native_transition(window, kind);
                return false;
            }
        };

        self.end_activation(window.id);
        match self.begin_activation(window, kind, pending.selection) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    window = %window.id,
                    ?kind,
                    error = %err,
                    "shader transition failed; running native transition"
                );
                self.sync_unredirect();
                self.host.start_native_transition(window, kind);
                false
            }
        }
    }

    /// Advances every running animation by one display refresh.
    pub fn frame(&mut self) {
        let mut finished = Vec::new();
        for (window, driver) in self.drivers.iter_mut() {
            match driver.tick(&mut self.backend) {
                Some(done) => finished.push(done),
                None => self.host.queue_repaint(*window),
            }
            self.events.extend(driver.take_events());
        }
        for done in finished {
            self.drivers.remove(&done.params.window);
            self.finish_activation(done);
        }
        self.sync_unredirect();
    }

    /// Window-removal bookkeeping. Deferred until the window's animation
    /// ends, then run exactly once.
    pub fn remove_window(&mut self, window: WindowId) {
        if self.interceptor.defer_removal(window) {
            debug!(%window, "removal deferred until the animation ends");
        } else {
            self.host.remove_window(window);
        }
    }

    /// The host destroyed `window`; its animation ends now.
    pub fn window_destroyed(&mut self, window: WindowId) {
        self.interceptor.disarm(window);
        self.matcher.forget_window(window);
        self.end_window(window);
    }

    /// Ends every running animation.
    pub fn kill_all(&mut self) {
        let windows: Vec<WindowId> = self.drivers.keys().copied().collect();
        if !windows.is_empty() {
            info!(count = windows.len(), "ending all window animations");
        }
        for window in windows {
            self.end_activation(window);
        }
        self.sync_unredirect();
    }

    /// Ends the animation of `window`, if any. Returns whether one was
    /// running.
    pub fn end_window(&mut self, window: WindowId) -> bool {
        let ended = self.end_activation(window);
        self.sync_unredirect();
        ended
    }

    fn end_activation(&mut self, window: WindowId) -> bool {
        let Some(mut driver) = self.drivers.remove(&window) else {
            return false;
        };
        let finished = driver.end();
        self.events.extend(driver.take_events());
        match finished {
            Some(done) => {
                self.finish_activation(done);
                true
            }
            None => false,
        }
    }

    /// Forces `effect` from `profile` for the next opening window and that
    /// window's close.
    pub fn preview(&mut self, effect: &str, profile: &str) -> Result<(), EngineError> {
        if self.shut_down {
            return Err(EngineError::ShutDown);
        }
        let available = self.catalog.supported_nicks(self.host_version);
        self.matcher
            .set_preview(self.profiles.profiles(), &available, effect, profile)?;
        info!(effect, profile, "preview armed");
        Ok(())
    }

    /// Drops any armed or pinned preview.
    pub fn cancel_preview(&mut self) {
        self.matcher.cancel_preview();
    }

    /// Whether a preview is armed or pinned to a window.
    pub fn preview_active(&self) -> bool {
        self.matcher.preview_active()
    }

    /// Writes one profile setting. A change to the previewed profile's
    /// matching or enablement cancels the preview.
    pub fn set_profile_setting(
        &mut self,
        path: &str,
        key: &str,
        value: impl IntoSettingValue,
    ) -> Result<Option<ProfileChange>, EngineError> {
        let change = self.profiles.set(path, key, value.into_setting_value())?;
        self.note_profile_change(change.as_ref());
        Ok(change)
    }

    /// Restores one profile setting to its schema default.
    pub fn reset_profile_setting(
        &mut self,
        path: &str,
        key: &str,
    ) -> Result<Option<ProfileChange>, EngineError> {
        let change = self.profiles.reset(path, key)?;
        self.note_profile_change(change.as_ref());
        Ok(change)
    }

    /// Creates a profile and returns its path.
    pub fn create_profile(&mut self, initial: Option<&SettingsValues>) -> Result<String, EngineError> {
        let profile = self.profiles.create(initial)?;
        Ok(profile.path().to_string())
    }

    /// Deletes a profile, cancelling a preview of it.
    pub fn delete_profile(&mut self, path: &str) -> Result<(), EngineError> {
        self.profiles.delete(path)?;
        if self.matcher.preview_profile() == Some(path) {
            self.matcher.cancel_preview();
        }
        Ok(())
    }

    /// Re-reads every profile from storage.
    pub fn reload_profiles(&mut self) -> Result<(), EngineError> {
        self.profiles.reload()?;
        if let Some(path) = self.matcher.preview_profile() {
            if self.profiles.get(path).is_none() {
                self.matcher.cancel_preview();
            }
        }
        Ok(())
    }

    /// Ends all animations and destroys every GPU resource the engine made.
    /// Later transitions stay native.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.kill_all();
        self.interceptor.disarm_all();
        self.matcher.cancel_preview();
        self.catalog.shutdown(&mut self.backend);
        self.shut_down = true;
        self.sync_unredirect();
        info!("transition engine shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The host this engine drives.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable access to the host, e.g. to update its environment.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// The shader backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the shader backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Registered effects and their pools.
    pub fn catalog(&self) -> &EffectCatalog {
        &self.catalog
    }

    /// Loaded profiles in priority order.
    pub fn profiles(&self) -> &ProfileSet {
        &self.profiles
    }

    /// Host version used to filter effects, after any config override.
    pub fn host_version(&self) -> HostVersion {
        self.host_version
    }

    /// Whether a shader transition is running for `window`.
    pub fn is_animating(&self, window: WindowId) -> bool {
        self.drivers.contains_key(&window)
    }

    /// Windows with a running shader transition, in id order.
    pub fn animating_windows(&self) -> Vec<WindowId> {
        self.drivers.keys().copied().collect()
    }

    /// Last progress reported to the shader of `window`.
    pub fn progress(&self, window: WindowId) -> Option<f32> {
        self.drivers.get(&window).map(AnimationDriver::progress)
    }

    /// Effect and profile `window` is animating with.
    pub fn active_selection(&self, window: WindowId) -> Option<Selection> {
        let activation = self.drivers.get(&window)?.activation()?;
        Some(Selection {
            effect: activation.effect.to_string(),
            profile: activation.profile.clone(),
        })
    }

    /// Pool counters for one effect, `None` for unknown nicks.
    pub fn pool_stats(&self, effect: &str) -> Option<PoolStats> {
        self.catalog.pool_stats(effect)
    }

    /// Drains the animation events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<AnimationEvent> {
        std::mem::take(&mut self.events)
    }

    fn begin_activation(
        &mut self,
        window: &WindowInfo,
        kind: TransitionKind,
        selection: Selection,
    ) -> Result<(), EngineError> {
        let profile = self
            .profiles
            .get(&selection.profile)
            .ok_or_else(|| SelectorError::UnknownProfile(selection.profile.clone()))?;
        let settings = profile.settings().clone();
        let effect = self
            .catalog
            .effect(&selection.effect)
            .ok_or_else(|| ShaderError::UnknownEffect(selection.effect.clone()))?;

        let direction = kind.direction();
        let actor_scale = effect.actor_scale(&settings, direction);
        let duration_ms = settings.int(&animation_time_key(effect.nick()))?.max(0) as u64;
        let params = ActivationParams {
            window: window.id,
            direction,
            duration: Duration::from_millis(duration_ms),
            size: window.size,
            actor_scale,
            test_mode: self.config.test_mode,
        };

        let mut seeds = if self.config.test_mode {
            SeedSource::Fixed
        } else {
            SeedSource::Random(&mut self.rng)
        };
        let mut shader = self
            .catalog
            .acquire(&selection.effect, &mut self.backend, &mut seeds)?;
        if let Err(err) =
            self.catalog
                .activate(&mut shader, &settings, &params, &mut self.backend, &mut seeds)
        {
            shader.end();
            self.catalog.release(shader, &mut self.backend);
            return Err(err.into());
        }

        if actor_scale != 1.0 {
            self.host.set_actor_scale(window.id, actor_scale);
        }
        self.interceptor.mark_animating(window.id);
        debug!(
            window = %window.id,
            effect = shader.effect(),
            profile = %selection.profile,
            ?kind,
            duration_ms,
            "shader transition started"
        );

        let activation = Activation {
            params,
            effect: shader.effect(),
            profile: selection.profile,
            settings,
            shader,
        };
        let driver = self.drivers.entry(window.id).or_insert_with(|| {
            AnimationDriver::new((self.time_sources)(), self.unredirect.clone())
        });
        let previous = driver.begin(activation);
        self.events.extend(driver.take_events());
        if let Some(previous) = previous {
            self.finish_activation(previous);
        }

        self.sync_unredirect();
        self.host.queue_repaint(window.id);
        Ok(())
    }

    /// Returns the shader to its pool, then runs the host finalizer followed
    /// by any deferred removal. Callers sync the unredirect state.
    fn finish_activation(&mut self, done: FinishedActivation) {
        let FinishedActivation {
            params,
            effect,
            shader,
            completed,
            ..
        } = done;
        let window = params.window;
        self.catalog.release(shader, &mut self.backend);
        if params.actor_scale != 1.0 {
            self.host.set_actor_scale(window, 1.0);
        }
        self.host
            .finish_transition(window, TransitionKind::from_direction(params.direction));
        if self.interceptor.finish_animating(window) {
            debug!(%window, "running deferred removal");
            self.host.remove_window(window);
        }
        debug!(%window, effect, completed, "shader transition finished");
    }

    fn note_profile_change(&mut self, change: Option<&ProfileChange>) {
        let Some(change) = change else {
            return;
        };
        if change.affects_selection && self.matcher.preview_profile() == Some(change.path.as_str())
        {
            debug!(profile = %change.path, "preview profile changed; clearing preview");
            self.matcher.cancel_preview();
        }
    }

    fn sync_unredirect(&mut self) {
        let held = self.unredirect.is_held();
        if held != self.unredirect_inhibited {
            self.unredirect_inhibited = held;
            self.host.set_unredirect_enabled(!held);
        }
    }
}
