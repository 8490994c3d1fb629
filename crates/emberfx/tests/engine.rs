use emberfx::{
    storage_from_config, AnimationEvent, EngineConfig, HostEnvironment, HostVersion,
    MemoryStorage, RecordingBackend, SettingValue, SettingsValues, TransitionEngine,
    TransitionHost, TransitionKind, WindowId, WindowInfo, WindowKind,
};
use profiles::{KEY_ANIMATION_TYPE, KEY_APP};
use renderer::{manual_time_sources, BackendCall, ManualClock, UniformValue};

#[derive(Debug, Clone, PartialEq)]
enum HostCall {
    Native(WindowId, TransitionKind),
    Finish(WindowId, TransitionKind),
    Remove(WindowId),
    Unredirect(bool),
    Repaint(WindowId),
    Scale(WindowId, f32),
}

#[derive(Debug, Default)]
struct MockHost {
    environment: HostEnvironment,
    calls: Vec<HostCall>,
}

impl MockHost {
    fn with_version(version: HostVersion) -> Self {
        Self {
            environment: HostEnvironment {
                version,
                ..HostEnvironment::default()
            },
            calls: Vec::new(),
        }
    }

    /// Recorded calls without the per-frame repaint requests.
    fn lifecycle(&self) -> Vec<HostCall> {
        self.calls
            .iter()
            .filter(|call| !matches!(call, HostCall::Repaint(_)))
            .cloned()
            .collect()
    }
}

impl TransitionHost for MockHost {
    fn environment(&self) -> HostEnvironment {
        self.environment
    }

    fn start_native_transition(&mut self, window: &WindowInfo, kind: TransitionKind) {
        self.calls.push(HostCall::Native(window.id, kind));
    }

    fn finish_transition(&mut self, window: WindowId, kind: TransitionKind) {
        self.calls.push(HostCall::Finish(window, kind));
    }

    fn remove_window(&mut self, window: WindowId) {
        self.calls.push(HostCall::Remove(window));
    }

    fn set_unredirect_enabled(&mut self, enabled: bool) {
        self.calls.push(HostCall::Unredirect(enabled));
    }

    fn queue_repaint(&mut self, window: WindowId) {
        self.calls.push(HostCall::Repaint(window));
    }

    fn set_actor_scale(&mut self, window: WindowId, scale: f32) {
        self.calls.push(HostCall::Scale(window, scale));
    }
}

type Engine = TransitionEngine<MockHost, RecordingBackend>;

fn values(entries: &[(&str, SettingValue)]) -> SettingsValues {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

fn fire_only() -> MemoryStorage {
    MemoryStorage::new().with_profile(
        "p0",
        values(&[("fire-enable-effect", SettingValue::Bool(true))]),
    )
}

fn engine_with(config: EngineConfig, storage: MemoryStorage, host: MockHost) -> (Engine, ManualClock) {
    let clock = ManualClock::new();
    let engine = TransitionEngine::new(config, host, RecordingBackend::new(), Box::new(storage))
        .unwrap()
        .with_time_sources(manual_time_sources(&clock));
    (engine, clock)
}

fn engine(storage: MemoryStorage) -> (Engine, ManualClock) {
    let config = EngineConfig {
        seed: Some(11),
        ..EngineConfig::default()
    };
    engine_with(config, storage, MockHost::default())
}

fn window(id: u64) -> WindowInfo {
    WindowInfo::new(WindowId(id), "org.gnome.Terminal", WindowKind::Normal, [800.0, 600.0])
}

fn app_window(id: u64, app: &str) -> WindowInfo {
    WindowInfo::new(WindowId(id), app, WindowKind::Normal, [800.0, 600.0])
}

fn start(engine: &mut Engine, window: &WindowInfo, kind: TransitionKind) -> bool {
    engine.should_animate(window, kind) && engine.start_transition(window, kind)
}

#[test]
fn opening_window_runs_to_completion_and_finalizes() {
    let (mut engine, clock) = engine(fire_only());
    let w = window(1);

    assert!(start(&mut engine, &w, TransitionKind::Open));
    assert!(engine.is_animating(w.id));
    assert_eq!(engine.host().lifecycle(), vec![HostCall::Unredirect(false)]);

    clock.advance(1.0);
    engine.frame();
    assert!((engine.progress(w.id).unwrap() - 0.5).abs() < 1e-6);

    clock.advance(1.1);
    engine.frame();
    assert!(!engine.is_animating(w.id));
    assert_eq!(
        engine.host().lifecycle(),
        vec![
            HostCall::Unredirect(false),
            HostCall::Finish(w.id, TransitionKind::Open),
            HostCall::Unredirect(true),
        ]
    );

    let stats = engine.pool_stats("fire").unwrap();
    assert_eq!((stats.free, stats.in_use, stats.constructed), (1, 0, 1));

    let events = engine.take_events();
    assert!(matches!(events.first(), Some(AnimationEvent::Begin(_))));
    assert!(matches!(
        events.last(),
        Some(AnimationEvent::End { completed: true, .. })
    ));
}

#[test]
fn sequential_activations_share_one_instance() {
    let (mut engine, clock) = engine(fire_only());
    for id in 0..5 {
        assert!(start(&mut engine, &window(id), TransitionKind::Open));
        clock.advance(3.0);
        engine.frame();
    }
    let stats = engine.pool_stats("fire").unwrap();
    assert_eq!(stats.constructed, 1);
    assert_eq!(stats.free, 1);
    assert_eq!(engine.backend().compile_count(), 1);
}

#[test]
fn overlapping_activations_construct_one_instance_each() {
    let (mut engine, clock) = engine(fire_only());
    for id in 0..3 {
        assert!(start(&mut engine, &window(id), TransitionKind::Open));
    }
    let stats = engine.pool_stats("fire").unwrap();
    assert_eq!((stats.in_use, stats.constructed), (3, 3));

    clock.advance(3.0);
    engine.frame();
    let stats = engine.pool_stats("fire").unwrap();
    assert_eq!((stats.free, stats.in_use, stats.constructed), (3, 0, 3));
    assert_eq!(engine.backend().live_instances(), 3);
}

#[test]
fn closing_firefox_uses_app_profile_and_opening_falls_through() {
    let storage = MemoryStorage::new()
        .with_profile(
            "p0",
            values(&[("fire-enable-effect", SettingValue::Bool(true))]),
        )
        .with_profile(
            "p1",
            values(&[
                (KEY_APP, SettingValue::Str("firefox".into())),
                (KEY_ANIMATION_TYPE, SettingValue::Int(2)),
                ("glitch-enable-effect", SettingValue::Bool(true)),
            ]),
        );
    let (mut engine, _clock) = engine(storage);

    let closing = app_window(1, "Firefox");
    assert!(start(&mut engine, &closing, TransitionKind::Close));
    let selection = engine.active_selection(closing.id).unwrap();
    assert_eq!((selection.effect.as_str(), selection.profile.as_str()), ("glitch", "p1"));

    let opening = app_window(2, "firefox");
    assert!(start(&mut engine, &opening, TransitionKind::Open));
    let selection = engine.active_selection(opening.id).unwrap();
    assert_eq!((selection.effect.as_str(), selection.profile.as_str()), ("fire", "p0"));
}

#[test]
fn reentrant_transition_releases_prior_shader_first() {
    let (mut engine, clock) = engine(fire_only());
    let w = window(4);

    assert!(start(&mut engine, &w, TransitionKind::Open));
    clock.advance(0.5);
    engine.frame();
    assert!(start(&mut engine, &w, TransitionKind::Close));

    assert_eq!(
        engine.host().lifecycle(),
        vec![
            HostCall::Unredirect(false),
            HostCall::Finish(w.id, TransitionKind::Open),
        ]
    );
    assert_eq!(engine.progress(w.id), Some(0.0));
    let stats = engine.pool_stats("fire").unwrap();
    assert_eq!((stats.in_use, stats.constructed), (1, 1));

    let ends = engine
        .take_events()
        .into_iter()
        .filter(|event| matches!(event, AnimationEvent::End { completed: false, .. }))
        .count();
    assert_eq!(ends, 1);
}

#[test]
fn ending_twice_finalizes_once() {
    let (mut engine, _clock) = engine(fire_only());
    let w = window(5);
    assert!(start(&mut engine, &w, TransitionKind::Close));

    assert!(engine.end_window(w.id));
    assert!(!engine.end_window(w.id));
    engine.window_destroyed(w.id);

    let finishes = engine
        .host()
        .calls
        .iter()
        .filter(|call| matches!(call, HostCall::Finish(..)))
        .count();
    assert_eq!(finishes, 1);
    assert_eq!(engine.pool_stats("fire").unwrap().free, 1);
}

#[test]
fn test_mode_repeats_identical_uniforms() {
    let config = EngineConfig {
        test_mode: true,
        ..EngineConfig::default()
    };
    let (mut engine, clock) = engine_with(config, fire_only(), MockHost::default());

    let mut runs = Vec::new();
    for id in 0..2 {
        engine.backend_mut().clear_calls();
        assert!(start(&mut engine, &window(id), TransitionKind::Open));
        let mut progress = Vec::new();
        for _ in 0..3 {
            clock.advance(0.25);
            engine.frame();
            progress.push(engine.progress(WindowId(id)).unwrap());
        }
        assert_eq!(progress, vec![0.5; 3]);
        runs.push(
            engine
                .backend()
                .calls()
                .iter()
                .filter_map(|call| match call {
                    BackendCall::SetUniform { name, value, .. } => Some((name.clone(), *value)),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        );
        clock.advance(2.0);
        engine.frame();
        assert!(!engine.is_animating(WindowId(id)));
    }

    assert_eq!(runs[0], runs[1]);
    assert!(runs[0].contains(&("uSeed".to_string(), UniformValue::Vec2([0.0, 0.0]))));
}

#[test]
fn compile_failure_falls_back_to_native_and_retries() {
    let (mut engine, _clock) = engine(fire_only());
    engine.backend_mut().fail_compiles_of("fire");

    let w = window(6);
    assert!(engine.should_animate(&w, TransitionKind::Open));
    assert!(!engine.start_transition(&w, TransitionKind::Open));
    assert_eq!(
        engine.host().lifecycle(),
        vec![HostCall::Native(w.id, TransitionKind::Open)]
    );
    assert!(!engine.is_animating(w.id));

    engine.backend_mut().allow_compiles_of("fire");
    assert!(start(&mut engine, &window(7), TransitionKind::Open));
    assert_eq!(engine.backend().compile_count(), 1);
    assert_eq!(engine.catalog().compiled_programs(), 1);
}

#[test]
fn removal_waits_for_animation_end() {
    let (mut engine, clock) = engine(fire_only());
    let w = window(8);

    assert!(start(&mut engine, &w, TransitionKind::Close));
    engine.remove_window(w.id);
    engine.remove_window(w.id);
    assert!(!engine.host().calls.contains(&HostCall::Remove(w.id)));

    clock.advance(3.0);
    engine.frame();
    let lifecycle = engine.host().lifecycle();
    let finish = lifecycle
        .iter()
        .position(|call| *call == HostCall::Finish(w.id, TransitionKind::Close))
        .unwrap();
    assert_eq!(lifecycle[finish + 1], HostCall::Remove(w.id));
    assert_eq!(
        lifecycle.iter().filter(|call| **call == HostCall::Remove(w.id)).count(),
        1
    );

    engine.remove_window(WindowId(99));
    assert_eq!(engine.host().calls.last(), Some(&HostCall::Remove(WindowId(99))));
}

#[test]
fn destroyed_window_ends_animation() {
    let (mut engine, _clock) = engine(fire_only());
    let w = window(9);
    assert!(start(&mut engine, &w, TransitionKind::Open));
    engine.remove_window(w.id);

    engine.window_destroyed(w.id);
    assert!(!engine.is_animating(w.id));
    let lifecycle = engine.host().lifecycle();
    assert_eq!(
        &lifecycle[1..],
        &[
            HostCall::Finish(w.id, TransitionKind::Open),
            HostCall::Remove(w.id),
            HostCall::Unredirect(true),
        ]
    );
}

#[test]
fn kill_all_ends_every_animation() {
    let (mut engine, _clock) = engine(fire_only());
    for id in 0..3 {
        assert!(start(&mut engine, &window(id), TransitionKind::Open));
    }
    engine.kill_all();
    assert!(engine.animating_windows().is_empty());
    assert_eq!(engine.pool_stats("fire").unwrap().free, 3);
    assert_eq!(engine.host().calls.last(), Some(&HostCall::Unredirect(true)));
}

#[test]
fn utility_windows_keep_native_transitions() {
    let (mut engine, _clock) = engine(fire_only());
    let tooltip = WindowInfo::new(WindowId(3), "gnome-shell", WindowKind::Other, [40.0, 20.0]);
    assert!(!engine.should_animate(&tooltip, TransitionKind::Open));
    assert!(!engine.start_transition(&tooltip, TransitionKind::Open));
    assert_eq!(
        engine.host().lifecycle(),
        vec![HostCall::Native(tooltip.id, TransitionKind::Open)]
    );
}

#[test]
fn interception_is_one_shot() {
    let (mut engine, _clock) = engine(fire_only());
    let w = window(10);
    assert!(engine.should_animate(&w, TransitionKind::Close));
    assert!(engine.should_animate(&w, TransitionKind::Close));
    assert!(engine.start_transition(&w, TransitionKind::Close));
    engine.end_window(w.id);

    assert!(!engine.start_transition(&w, TransitionKind::Close));
    assert_eq!(
        engine.host().calls.last(),
        Some(&HostCall::Native(w.id, TransitionKind::Close))
    );
    assert_eq!(engine.pool_stats("fire").unwrap().constructed, 1);
}

#[test]
fn unconsumed_open_arm_does_not_swallow_close() {
    let (mut engine, _clock) = engine(fire_only());
    let w = window(50);
    assert!(engine.should_animate(&w, TransitionKind::Open));

    assert!(engine.should_animate(&w, TransitionKind::Close));
    assert!(engine.start_transition(&w, TransitionKind::Close));
    assert!(engine.is_animating(w.id));
    assert!(!engine
        .host()
        .calls
        .contains(&HostCall::Native(w.id, TransitionKind::Close)));
}

#[test]
fn preview_pins_effect_to_opened_window() {
    let (mut engine, _clock) = engine(fire_only());
    engine.preview("tv", "p0").unwrap();

    let previewed = window(20);
    assert!(start(&mut engine, &previewed, TransitionKind::Open));
    assert_eq!(engine.active_selection(previewed.id).unwrap().effect, "tv");

    let other = window(21);
    assert!(start(&mut engine, &other, TransitionKind::Close));
    assert_eq!(engine.active_selection(other.id).unwrap().effect, "fire");
    assert!(engine.preview_active());

    assert!(start(&mut engine, &previewed, TransitionKind::Close));
    assert_eq!(engine.active_selection(previewed.id).unwrap().effect, "tv");
    assert!(!engine.preview_active());
}

#[test]
fn enable_change_on_preview_profile_cancels_preview() {
    let (mut engine, _clock) = engine(fire_only());
    engine.preview("tv", "p0").unwrap();
    engine
        .set_profile_setting("p0", "tv-animation-time", 900)
        .unwrap();
    assert!(engine.preview_active());

    let change = engine
        .set_profile_setting("p0", "glitch-enable-effect", true)
        .unwrap()
        .unwrap();
    assert!(change.affects_selection);
    assert!(!engine.preview_active());

    assert!(engine.preview("doom", "p0").is_err());
    assert!(engine.preview("tv", "p9").is_err());
}

#[test]
fn disabling_effect_mid_flight_lets_animation_finish() {
    let (mut engine, clock) = engine(fire_only());
    let w = window(30);
    assert!(start(&mut engine, &w, TransitionKind::Open));

    engine
        .set_profile_setting("p0", "fire-enable-effect", false)
        .unwrap();
    assert!(engine.is_animating(w.id));
    clock.advance(1.0);
    engine.frame();
    assert!(engine.is_animating(w.id));
    clock.advance(1.5);
    engine.frame();
    assert!(engine
        .host()
        .calls
        .contains(&HostCall::Finish(w.id, TransitionKind::Open)));

    assert!(!engine.should_animate(&window(31), TransitionKind::Open));
}

#[test]
fn configured_animation_time_applies_to_every_effect() {
    let config = EngineConfig::from_toml_str("version = 1\nseed = 3\ndefault_animation_time = \"400ms\"\n")
        .unwrap();
    let (mut engine, clock) = engine_with(config, fire_only(), MockHost::default());
    let w = window(40);
    assert!(start(&mut engine, &w, TransitionKind::Open));
    clock.advance(0.45);
    engine.frame();
    assert!(!engine.is_animating(w.id));
}

#[test]
fn effects_newer_than_host_are_never_selected() {
    let storage = MemoryStorage::new().with_profile(
        "p0",
        values(&[("wisps-enable-effect", SettingValue::Bool(true))]),
    );
    let config = EngineConfig {
        seed: Some(5),
        ..EngineConfig::default()
    };
    let (mut old, _clock) = engine_with(
        config.clone(),
        storage.clone(),
        MockHost::with_version(HostVersion::new(3, 36)),
    );
    assert!(!old.should_animate(&window(1), TransitionKind::Open));

    let (mut current, _clock) =
        engine_with(config, storage, MockHost::with_version(HostVersion::new(46, 0)));
    let w = window(2);
    assert!(start(&mut current, &w, TransitionKind::Open));
    assert!(current.host().calls.contains(&HostCall::Scale(w.id, 1.5)));
    current.end_window(w.id);
    assert_eq!(current.host().calls.last(), Some(&HostCall::Unredirect(true)));
    assert!(current.host().calls.contains(&HostCall::Scale(w.id, 1.0)));
}

#[test]
fn shutdown_destroys_gpu_resources() {
    let storage = MemoryStorage::new().with_profile(
        "p0",
        values(&[("glitch-enable-effect", SettingValue::Bool(true))]),
    );
    let (mut engine, _clock) = engine(storage);
    for id in 0..2 {
        assert!(start(&mut engine, &window(id), TransitionKind::Open));
    }
    assert!(engine.backend().live_textures() > 0);

    engine.shutdown();
    assert!(engine.is_shut_down());
    assert!(engine.animating_windows().is_empty());
    assert_eq!(engine.backend().live_instances(), 0);
    assert_eq!(engine.backend().live_textures(), 0);
    assert_eq!(engine.backend().live_programs(), 0);
    assert!(!engine.should_animate(&window(5), TransitionKind::Open));
}

#[test]
fn profiles_persist_in_configured_directory() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig {
        seed: Some(1),
        profile_dir: Some(dir.path().to_path_buf()),
        ..EngineConfig::default()
    };

    let path = {
        let storage = storage_from_config(&config).unwrap();
        let mut engine =
            TransitionEngine::new(config.clone(), MockHost::default(), RecordingBackend::new(), storage)
                .unwrap();
        assert_eq!(engine.profiles().len(), 1);
        let path = engine.profiles().profiles()[0].path().to_string();
        engine.set_profile_setting(&path, "tv-enable-effect", true).unwrap();
        path
    };

    let storage = storage_from_config(&config).unwrap();
    let engine =
        TransitionEngine::new(config, MockHost::default(), RecordingBackend::new(), storage).unwrap();
    let profile = engine.profiles().get(&path).unwrap();
    assert!(profile.effect_enabled("tv"));
    assert!(profile.effect_enabled("fire"));
}
