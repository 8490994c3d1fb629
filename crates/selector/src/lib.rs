use profiles::{ColorScheme, Direction, PowerProfile, Profile, WindowId, WindowKind};
use rand::prelude::*;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum SelectorError {
    #[error("profile '{0}' not found")]
    UnknownProfile(String),
    #[error("effect '{0}' is not available")]
    UnknownEffect(String),
}

/// Runtime conditions of one window event.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub window: WindowId,
    pub direction: Direction,
    pub kind: WindowKind,
    pub app_id: &'a str,
    /// `None` when the host cannot report power state.
    pub on_battery: Option<bool>,
    /// `None` when the host exposes no color-scheme signal.
    pub color_scheme: Option<ColorScheme>,
    /// `None` when no power-profile daemon is reachable.
    pub power_profile: Option<PowerProfile>,
}

/// The outcome of a successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub effect: String,
    pub profile: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Preview {
    Inactive,
    /// Waiting for the next opening window.
    Armed(Selection),
    /// Bound to the window that opened with it; cleared when it closes.
    Pinned { selection: Selection, window: WindowId },
}

/// Picks the profile and effect for a window event.
pub struct ProfileMatcher {
    rng: StdRng,
    preview: Preview,
}

impl ProfileMatcher {
    /// Matcher whose picks are reproducible from `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            preview: Preview::Inactive,
        }
    }

    /// Matcher seeded from the OS.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            preview: Preview::Inactive,
        }
    }

    /// Forces `effect` from `profile` for the next opening window and its
    /// matching close.
    pub fn set_preview(
        &mut self,
        profiles: &[Profile],
        available: &[&str],
        effect: &str,
        profile: &str,
    ) -> Result<(), SelectorError> {
        if !profiles.iter().any(|p| p.path() == profile) {
            return Err(SelectorError::UnknownProfile(profile.to_string()));
        }
        if !available.contains(&effect) {
            return Err(SelectorError::UnknownEffect(effect.to_string()));
        }
        debug!(%effect, %profile, "preview armed");
        self.preview = Preview::Armed(Selection {
            effect: effect.to_string(),
            profile: profile.to_string(),
        });
        Ok(())
    }

    /// Drops any armed or pinned preview.
    pub fn cancel_preview(&mut self) {
        if self.preview != Preview::Inactive {
            debug!("preview cleared");
        }
        self.preview = Preview::Inactive;
    }

    pub fn preview_active(&self) -> bool {
        self.preview != Preview::Inactive
    }

    /// Drops a preview pinned to `window`, which will never close normally.
    pub fn forget_window(&mut self, window: WindowId) {
        if matches!(self.preview, Preview::Pinned { window: pinned, .. } if pinned == window) {
            debug!(%window, "preview window destroyed");
            self.preview = Preview::Inactive;
        }
    }

    /// Profile the active preview is bound to, if any.
    pub fn preview_profile(&self) -> Option<&str> {
        match &self.preview {
            Preview::Inactive => None,
            Preview::Armed(selection) | Preview::Pinned { selection, .. } => {
                Some(selection.profile.as_str())
            }
        }
    }

    /// Selects the effect for the event described by `ctx`.
    ///
    /// `profiles` must be sorted by descending priority and `available`
    /// lists the effects the host can run.
    pub fn select(
        &mut self,
        profiles: &[Profile],
        available: &[&str],
        ctx: &MatchContext<'_>,
    ) -> Option<Selection> {
        if !matches!(ctx.kind, WindowKind::Normal | WindowKind::Dialog) {
            return None;
        }

        if let Some(selection) = self.take_preview(ctx) {
            return Some(selection);
        }

        let profile = select_profile(profiles, ctx)?;
        let enabled: Vec<&str> = available
            .iter()
            .copied()
            .filter(|nick| profile.effect_enabled(nick))
            .collect();
        let effect = enabled.choose(&mut self.rng)?;
        debug!(
            window = %ctx.window,
            direction = %ctx.direction,
            profile = profile.path(),
            effect,
            "selected effect"
        );
        Some(Selection {
            effect: effect.to_string(),
            profile: profile.path().to_string(),
        })
    }

    fn take_preview(&mut self, ctx: &MatchContext<'_>) -> Option<Selection> {
        match std::mem::replace(&mut self.preview, Preview::Inactive) {
            Preview::Inactive => None,
            Preview::Armed(selection) if ctx.direction == Direction::Opening => {
                self.preview = Preview::Pinned {
                    selection: selection.clone(),
                    window: ctx.window,
                };
                Some(selection)
            }
            Preview::Pinned { selection, window } if window == ctx.window => {
                if ctx.direction == Direction::Opening {
                    self.preview = Preview::Pinned {
                        selection: selection.clone(),
                        window,
                    };
                }
                Some(selection)
            }
            other => {
                self.preview = other;
                None
            }
        }
    }
}

/// Returns the first profile (in priority order) whose constraints all
/// accept the event.
pub fn select_profile<'p>(profiles: &'p [Profile], ctx: &MatchContext<'_>) -> Option<&'p Profile> {
    profiles.iter().find(|profile| {
        let c = profile.constraints();
        c.direction.allows(ctx.direction)
            && c.window_type.allows(ctx.kind)
            && c.power_mode.allows(ctx.on_battery)
            && c.matches_app(ctx.app_id)
            && c.color_scheme.allows(ctx.color_scheme)
            && c.power_profile.allows(ctx.power_profile)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use profiles::{
        MemoryStorage, ProfileSet, Schema, SettingValue, SettingsValues, KEY_ANIMATION_TYPE,
        KEY_APP, KEY_COLOR_SCHEME, KEY_POWER_MODE, KEY_WINDOW_TYPE,
    };

    use super::*;

    const EFFECTS: [&str; 3] = ["fire", "glitch", "tv"];

    fn schema() -> Arc<Schema> {
        let mut schema = Schema::with_profile_keys();
        for nick in EFFECTS {
            schema.insert(format!("{nick}-enable-effect"), false);
        }
        Arc::new(schema)
    }

    fn values(pairs: &[(&str, SettingValue)]) -> SettingsValues {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    fn set_with(profiles: Vec<SettingsValues>) -> ProfileSet {
        let mut storage = MemoryStorage::new();
        for (index, profile) in profiles.into_iter().enumerate() {
            storage = storage.with_profile(format!("p{index}"), profile);
        }
        ProfileSet::load(Box::new(storage), schema(), SettingsValues::new()).unwrap()
    }

    fn ctx(direction: Direction, app_id: &str) -> MatchContext<'_> {
        MatchContext {
            window: WindowId(1),
            direction,
            kind: WindowKind::Normal,
            app_id,
            on_battery: Some(false),
            color_scheme: Some(ColorScheme::Default),
            power_profile: Some(PowerProfile::Balanced),
        }
    }

    fn fire_and_firefox_glitch() -> ProfileSet {
        set_with(vec![
            values(&[("fire-enable-effect", true.into())]),
            values(&[
                (KEY_APP, "firefox".into()),
                (KEY_ANIMATION_TYPE, 2.into()),
                ("glitch-enable-effect", true.into()),
            ]),
        ])
    }

    #[test]
    fn app_specific_closing_profile_wins_over_default() {
        let set = fire_and_firefox_glitch();
        let mut matcher = ProfileMatcher::new(1);
        let selection = matcher
            .select(set.profiles(), &EFFECTS, &ctx(Direction::Closing, "firefox"))
            .unwrap();
        assert_eq!(selection.profile, "p1");
        assert_eq!(selection.effect, "glitch");
    }

    #[test]
    fn direction_filter_falls_through_to_default() {
        let set = fire_and_firefox_glitch();
        let mut matcher = ProfileMatcher::new(1);
        let selection = matcher
            .select(set.profiles(), &EFFECTS, &ctx(Direction::Opening, "firefox"))
            .unwrap();
        assert_eq!(selection.profile, "p0");
        assert_eq!(selection.effect, "fire");
    }

    #[test]
    fn utility_windows_never_match() {
        let set = fire_and_firefox_glitch();
        let mut matcher = ProfileMatcher::new(1);
        let mut context = ctx(Direction::Opening, "firefox");
        context.kind = WindowKind::Other;
        assert!(matcher.select(set.profiles(), &EFFECTS, &context).is_none());

        matcher
            .set_preview(set.profiles(), &EFFECTS, "tv", "p0")
            .unwrap();
        assert!(matcher.select(set.profiles(), &EFFECTS, &context).is_none());
    }

    #[test]
    fn no_enabled_effect_means_no_selection() {
        let set = set_with(vec![values(&[])]);
        let mut matcher = ProfileMatcher::new(1);
        assert!(matcher
            .select(set.profiles(), &EFFECTS, &ctx(Direction::Opening, "kitty"))
            .is_none());
    }

    #[test]
    fn matched_profile_without_effects_does_not_fall_through() {
        let set = set_with(vec![
            values(&[("fire-enable-effect", true.into())]),
            values(&[(KEY_APP, "kitty".into())]),
        ]);
        let mut matcher = ProfileMatcher::new(1);
        assert!(matcher
            .select(set.profiles(), &EFFECTS, &ctx(Direction::Opening, "Kitty"))
            .is_none());
    }

    #[test]
    fn unavailable_effects_are_ignored() {
        let set = set_with(vec![values(&[
            ("fire-enable-effect", true.into()),
            ("tv-enable-effect", true.into()),
        ])]);
        let mut matcher = ProfileMatcher::new(5);
        for _ in 0..16 {
            let selection = matcher
                .select(set.profiles(), &["tv"], &ctx(Direction::Opening, "kitty"))
                .unwrap();
            assert_eq!(selection.effect, "tv");
        }
    }

    #[test]
    fn random_pick_covers_every_enabled_effect() {
        let set = set_with(vec![values(&[
            ("fire-enable-effect", true.into()),
            ("glitch-enable-effect", true.into()),
            ("tv-enable-effect", true.into()),
        ])]);
        let mut matcher = ProfileMatcher::new(42);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let selection = matcher
                .select(set.profiles(), &EFFECTS, &ctx(Direction::Opening, "kitty"))
                .unwrap();
            seen.insert(selection.effect);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn environment_filters_apply_when_reported() {
        let set = set_with(vec![
            values(&[("fire-enable-effect", true.into())]),
            values(&[
                (KEY_POWER_MODE, 1.into()),
                (KEY_COLOR_SCHEME, 2.into()),
                (KEY_WINDOW_TYPE, 2.into()),
                ("tv-enable-effect", true.into()),
            ]),
        ]);
        let mut matcher = ProfileMatcher::new(3);
        let mut context = ctx(Direction::Opening, "kitty");
        context.kind = WindowKind::Dialog;
        context.on_battery = Some(true);
        context.color_scheme = Some(ColorScheme::Dark);
        let selection = matcher.select(set.profiles(), &EFFECTS, &context).unwrap();
        assert_eq!(selection.effect, "tv");

        context.on_battery = Some(false);
        let selection = matcher.select(set.profiles(), &EFFECTS, &context).unwrap();
        assert_eq!(selection.effect, "fire");

        context.on_battery = None;
        context.color_scheme = None;
        let selection = matcher.select(set.profiles(), &EFFECTS, &context).unwrap();
        assert_eq!(selection.effect, "tv");
    }

    #[test]
    fn preview_pins_to_opened_window_and_clears_on_close() {
        let set = fire_and_firefox_glitch();
        let mut matcher = ProfileMatcher::new(1);
        matcher
            .set_preview(set.profiles(), &EFFECTS, "tv", "p1")
            .unwrap();

        let mut other = ctx(Direction::Closing, "kitty");
        other.window = WindowId(9);
        assert_eq!(
            matcher.select(set.profiles(), &EFFECTS, &other).unwrap().effect,
            "fire"
        );

        let opened = matcher
            .select(set.profiles(), &EFFECTS, &ctx(Direction::Opening, "kitty"))
            .unwrap();
        assert_eq!(opened, Selection { effect: "tv".into(), profile: "p1".into() });
        assert!(matcher.preview_active());

        let closed = matcher
            .select(set.profiles(), &EFFECTS, &ctx(Direction::Closing, "kitty"))
            .unwrap();
        assert_eq!(closed.effect, "tv");
        assert!(!matcher.preview_active());

        let after = matcher
            .select(set.profiles(), &EFFECTS, &ctx(Direction::Closing, "kitty"))
            .unwrap();
        assert_eq!(after.effect, "fire");
    }

    #[test]
    fn destroyed_preview_window_clears_pin() {
        let set = fire_and_firefox_glitch();
        let mut matcher = ProfileMatcher::new(1);
        matcher
            .set_preview(set.profiles(), &EFFECTS, "tv", "p1")
            .unwrap();
        let opening = ctx(Direction::Opening, "kitty");
        matcher.select(set.profiles(), &EFFECTS, &opening).unwrap();

        matcher.forget_window(WindowId(opening.window.0 + 1));
        assert!(matcher.preview_active());
        matcher.forget_window(opening.window);
        assert!(!matcher.preview_active());
    }

    #[test]
    fn preview_rejects_unknown_targets() {
        let set = fire_and_firefox_glitch();
        let mut matcher = ProfileMatcher::new(1);
        assert!(matches!(
            matcher.set_preview(set.profiles(), &EFFECTS, "tv", "nope"),
            Err(SelectorError::UnknownProfile(_))
        ));
        assert!(matches!(
            matcher.set_preview(set.profiles(), &EFFECTS, "doom", "p0"),
            Err(SelectorError::UnknownEffect(_))
        ));
    }
}
