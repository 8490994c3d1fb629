use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use renderer::HostVersion;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

use crate::EngineError;

/// Supported config schema version.
pub const CONFIG_VERSION: u32 = 1;

/// Engine-wide settings, usually read from `emberfx.toml`.
///
/// ```toml
/// version = 1
/// test_mode = false
/// seed = 42
/// host_version = "46.0"
/// default_animation_time = "1500ms"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    pub version: u32,
    /// Zero seeds and a fixed reported progress for reproducible frames.
    #[serde(default)]
    pub test_mode: bool,
    /// Seeds profile matching and per-activation randomness.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub profile_dir: Option<PathBuf>,
    /// Overrides the version the host reports, e.g. `"3.38"`.
    #[serde(default)]
    pub host_version: Option<String>,
    /// Replaces every effect's built-in `<nick>-animation-time` default.
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub default_animation_time: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            test_mode: false,
            seed: None,
            profile_dir: None,
            host_version: None,
            default_animation_time: None,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a config from TOML text.
    pub fn from_toml_str(input: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates the config file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config at {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("failed to load engine config at {}", path.display()))
    }

    /// Checks the version, host version override and animation time.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.version != CONFIG_VERSION {
            return Err(EngineError::Config(format!(
                "unsupported config version {}; expected {CONFIG_VERSION}",
                self.version
            )));
        }
        self.host_version_override()?;
        if let Some(duration) = self.default_animation_time {
            if duration.is_zero() {
                return Err(EngineError::Config(
                    "default_animation_time must be greater than zero".into(),
                ));
            }
            if duration.as_millis() > i64::MAX as u128 {
                return Err(EngineError::Config(
                    "default_animation_time is out of range".into(),
                ));
            }
        }
        Ok(())
    }

    /// The parsed `host_version`, when one is configured.
    pub fn host_version_override(&self) -> Result<Option<HostVersion>, EngineError> {
        self.host_version
            .as_deref()
            .map(|raw| {
                raw.parse::<HostVersion>()
                    .map_err(|_| EngineError::Config(format!("invalid host_version '{raw}'")))
            })
            .transpose()
    }

    /// Configured animation time in milliseconds, applied to every effect.
    pub fn default_animation_time_ms(&self) -> Option<i64> {
        self.default_animation_time
            .map(|duration| duration.as_millis().min(i64::MAX as u128) as i64)
    }
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a duration string like \"1500ms\" or milliseconds")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(value)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{value}': {err}")))
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            self.visit_str(&value)
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_millis(value)))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if value < 0 {
                return Err(E::custom("duration cannot be negative"));
            }
            Ok(Some(Duration::from_millis(value as u64)))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !value.is_finite() || value < 0.0 {
                return Err(E::custom("duration must be a non-negative number"));
            }
            Ok(Some(Duration::from_secs_f64(value / 1000.0)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}
