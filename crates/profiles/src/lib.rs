//! Profile model for emberfx.
//!
//! A profile is a named bundle of matching constraints (which windows, under
//! which power and color conditions) plus per-effect settings. This crate owns
//! the typed settings store, the schema that backs `reset`, the derived
//! priority of each profile, and the in-memory [`ProfileSet`] that keeps
//! profiles sorted by that priority. Persistence is delegated to a
//! [`ProfileStorage`] implementation.

mod context;
mod profile;
mod set;
mod settings;
mod storage;

pub use context::{ColorScheme, Direction, PowerProfile, WindowId, WindowKind};
pub use profile::{
    is_constraint_key, is_enable_key, parse_app_list, ColorSchemeFilter, Constraints,
    DirectionFilter, PowerModeFilter, PowerProfileFilter, Profile, WindowTypeFilter, KEY_APP,
    KEY_ANIMATION_TYPE, KEY_COLOR_SCHEME, KEY_HIGH_PRIORITY, KEY_POWER_MODE, KEY_POWER_PROFILE,
    KEY_WINDOW_TYPE,
};
pub use set::{ProfileChange, ProfileSet};
pub use settings::{
    IntoSettingValue, Schema, SettingValue, Settings, SettingsStore, SettingsValues,
};
pub use storage::{MemoryStorage, ProfileDirectory, ProfileStorage, StoredProfile};

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("unknown setting '{0}'")]
    UnknownKey(String),
    #[error("setting '{key}' expects a {expected} value, got {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("failed to parse profile: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize profile: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid profile: {0}")]
    Invalid(String),
    #[error("profile '{0}' not found")]
    UnknownProfile(String),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("failed to determine the profile directory")]
    NoProfileDir,
}
