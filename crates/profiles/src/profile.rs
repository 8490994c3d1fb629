use crate::context::{ColorScheme, Direction, PowerProfile, WindowKind};
use crate::settings::{Settings, SettingsStore};
use crate::SettingsError;

/// `|`-separated app ids the profile is limited to.
pub const KEY_APP: &str = "profile-app";
/// 0 any, 1 opening only, 2 closing only.
pub const KEY_ANIMATION_TYPE: &str = "profile-animation-type";
pub const KEY_WINDOW_TYPE: &str = "profile-window-type";
pub const KEY_COLOR_SCHEME: &str = "profile-color-scheme";
pub const KEY_POWER_MODE: &str = "profile-power-mode";
pub const KEY_POWER_PROFILE: &str = "profile-power-profile";
/// Adds 100 to the profile's priority.
pub const KEY_HIGH_PRIORITY: &str = "profile-high-priority";

const CONSTRAINT_KEYS: [&str; 7] = [
    KEY_APP,
    KEY_ANIMATION_TYPE,
    KEY_WINDOW_TYPE,
    KEY_COLOR_SCHEME,
    KEY_POWER_MODE,
    KEY_POWER_PROFILE,
    KEY_HIGH_PRIORITY,
];

/// Returns true for keys that feed into matching or priority.
pub fn is_constraint_key(key: &str) -> bool {
    CONSTRAINT_KEYS.contains(&key)
}

/// Returns true for `<nick>-enable-effect` keys.
pub fn is_enable_key(key: &str) -> bool {
    key.ends_with("-enable-effect")
}

/// Splits a pipe-separated application list into trimmed, lowercased ids.
pub fn parse_app_list(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(|app| app.trim().to_lowercase())
        .filter(|app| !app.is_empty())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectionFilter {
    #[default]
    Any,
    Opening,
    Closing,
}

impl DirectionFilter {
    pub fn from_setting(value: i64) -> Self {
        match value {
            1 => Self::Opening,
            2 => Self::Closing,
            _ => Self::Any,
        }
    }

    pub fn allows(self, direction: Direction) -> bool {
        match self {
            Self::Any => true,
            Self::Opening => direction == Direction::Opening,
            Self::Closing => direction == Direction::Closing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowTypeFilter {
    #[default]
    Any,
    Normal,
    Dialog,
}

impl WindowTypeFilter {
    pub fn from_setting(value: i64) -> Self {
        match value {
            1 => Self::Normal,
            2 => Self::Dialog,
            _ => Self::Any,
        }
    }

    pub fn allows(self, kind: WindowKind) -> bool {
        match self {
            Self::Any => true,
            Self::Normal => kind == WindowKind::Normal,
            Self::Dialog => kind == WindowKind::Dialog,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSchemeFilter {
    #[default]
    Any,
    Light,
    Dark,
}

impl ColorSchemeFilter {
    pub fn from_setting(value: i64) -> Self {
        match value {
            1 => Self::Light,
            2 => Self::Dark,
            _ => Self::Any,
        }
    }

    /// `None` means the host exposes no color scheme; the filter then never
    /// excludes.
    pub fn allows(self, scheme: Option<ColorScheme>) -> bool {
        match (self, scheme) {
            (Self::Any, _) | (_, None) => true,
            (Self::Light, Some(scheme)) => scheme == ColorScheme::Default,
            (Self::Dark, Some(scheme)) => scheme == ColorScheme::Dark,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerModeFilter {
    #[default]
    Any,
    Battery,
    Ac,
}

impl PowerModeFilter {
    pub fn from_setting(value: i64) -> Self {
        match value {
            1 => Self::Battery,
            2 => Self::Ac,
            _ => Self::Any,
        }
    }

    pub fn allows(self, on_battery: Option<bool>) -> bool {
        match (self, on_battery) {
            (Self::Any, _) | (_, None) => true,
            (Self::Battery, Some(on_battery)) => on_battery,
            (Self::Ac, Some(on_battery)) => !on_battery,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerProfileFilter {
    #[default]
    Any,
    PowerSaver,
    Balanced,
    Performance,
    SaverOrBalanced,
    BalancedOrPerformance,
}

impl PowerProfileFilter {
    pub fn from_setting(value: i64) -> Self {
        match value {
            1 => Self::PowerSaver,
            2 => Self::Balanced,
            3 => Self::Performance,
            4 => Self::SaverOrBalanced,
            5 => Self::BalancedOrPerformance,
            _ => Self::Any,
        }
    }

    pub fn allows(self, profile: Option<PowerProfile>) -> bool {
        use PowerProfile::*;
        let Some(profile) = profile else {
            return true;
        };
        match self {
            Self::Any => true,
            Self::PowerSaver => profile == PowerSaver,
            Self::Balanced => profile == Balanced,
            Self::Performance => profile == Performance,
            Self::SaverOrBalanced => matches!(profile, PowerSaver | Balanced),
            Self::BalancedOrPerformance => matches!(profile, Balanced | Performance),
        }
    }
}

/// Parsed view of a profile's constraint keys.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Constraints {
    pub apps: Vec<String>,
    pub direction: DirectionFilter,
    pub window_type: WindowTypeFilter,
    pub color_scheme: ColorSchemeFilter,
    pub power_mode: PowerModeFilter,
    pub power_profile: PowerProfileFilter,
    pub high_priority: bool,
}

impl Constraints {
    /// Reads every constraint key from `settings`.
    pub fn from_settings(settings: &dyn SettingsStore) -> Result<Self, SettingsError> {
        Ok(Self {
            apps: parse_app_list(&settings.string(KEY_APP)?),
            direction: DirectionFilter::from_setting(settings.int(KEY_ANIMATION_TYPE)?),
            window_type: WindowTypeFilter::from_setting(settings.int(KEY_WINDOW_TYPE)?),
            color_scheme: ColorSchemeFilter::from_setting(settings.int(KEY_COLOR_SCHEME)?),
            power_mode: PowerModeFilter::from_setting(settings.int(KEY_POWER_MODE)?),
            power_profile: PowerProfileFilter::from_setting(settings.int(KEY_POWER_PROFILE)?),
            high_priority: settings.boolean(KEY_HIGH_PRIORITY)?,
        })
    }

    /// 10 for an app list, 1 per non-default filter, 100 for high priority.
    pub fn priority(&self) -> u32 {
        let filters = [
            self.direction != DirectionFilter::Any,
            self.window_type != WindowTypeFilter::Any,
            self.color_scheme != ColorSchemeFilter::Any,
            self.power_mode != PowerModeFilter::Any,
            self.power_profile != PowerProfileFilter::Any,
        ];
        let mut priority = filters.iter().filter(|set| **set).count() as u32;
        if !self.apps.is_empty() {
            priority += 10;
        }
        if self.high_priority {
            priority += 100;
        }
        priority
    }

    /// True when the app list is empty or contains `app_id`, compared
    /// trimmed and case-insensitively.
    pub fn matches_app(&self, app_id: &str) -> bool {
        if self.apps.is_empty() {
            return true;
        }
        let app_id = app_id.trim().to_lowercase();
        self.apps.iter().any(|app| *app == app_id)
    }
}

/// One named profile with its settings and cached priority.
#[derive(Debug, Clone)]
pub struct Profile {
    path: String,
    settings: Settings,
    constraints: Constraints,
    priority: u32,
}

impl Profile {
    /// Builds a profile and derives its constraints and priority.
    pub fn new(path: impl Into<String>, settings: Settings) -> Result<Self, SettingsError> {
        let constraints = Constraints::from_settings(&settings)?;
        let priority = constraints.priority();
        Ok(Self {
            path: path.into(),
            settings,
            constraints,
            priority,
        })
    }

    /// Storage path, which also identifies the profile.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Constraints cached from the last settings change.
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Cached priority, see [`Constraints::priority`].
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Whether `<nick>-enable-effect` is set for this profile.
    pub fn effect_enabled(&self, nick: &str) -> bool {
        self.settings
            .boolean(&format!("{nick}-enable-effect"))
            .unwrap_or(false)
    }

    /// Recomputes the cached constraints and priority from the settings.
    pub(crate) fn refresh(&mut self) -> Result<(), SettingsError> {
        self.constraints = Constraints::from_settings(&self.settings)?;
        self.priority = self.constraints.priority();
        Ok(())
    }
}
