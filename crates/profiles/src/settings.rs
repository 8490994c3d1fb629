use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::SettingsError;

/// Raw key/value table as it is persisted.
pub type SettingsValues = BTreeMap<String, SettingValue>;

/// A single typed setting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
}

impl SettingValue {
    /// Type name used in mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            SettingValue::Bool(_) => "boolean",
            SettingValue::Int(_) => "integer",
            SettingValue::Double(_) => "double",
            SettingValue::Str(_) => "string",
        }
    }

    /// Coerces `value` into the kind of `self`, allowing integers where a
    /// double is expected.
    fn coerce(&self, key: &str, value: SettingValue) -> Result<SettingValue, SettingsError> {
        match (self, value) {
            (SettingValue::Bool(_), v @ SettingValue::Bool(_)) => Ok(v),
            (SettingValue::Int(_), v @ SettingValue::Int(_)) => Ok(v),
            (SettingValue::Double(_), v @ SettingValue::Double(_)) => Ok(v),
            (SettingValue::Double(_), SettingValue::Int(i)) => Ok(SettingValue::Double(i as f64)),
            (SettingValue::Str(_), v @ SettingValue::Str(_)) => Ok(v),
            (expected, found) => Err(SettingsError::TypeMismatch {
                key: key.to_string(),
                expected: expected.kind(),
                found: found.kind(),
            }),
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(v) => write!(f, "{v}"),
            SettingValue::Int(v) => write!(f, "{v}"),
            SettingValue::Double(v) => write!(f, "{v}"),
            SettingValue::Str(v) => write!(f, "'{v}'"),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Int(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        SettingValue::Int(i64::from(value))
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Double(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Str(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Str(value)
    }
}

/// Declares every known key together with its default value.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    defaults: BTreeMap<String, SettingValue>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema holding the profile constraint keys with their defaults.
    pub fn with_profile_keys() -> Self {
        let mut schema = Self::new();
        schema.insert(crate::KEY_APP, "");
        schema.insert(crate::KEY_ANIMATION_TYPE, 0);
        schema.insert(crate::KEY_WINDOW_TYPE, 0);
        schema.insert(crate::KEY_COLOR_SCHEME, 0);
        schema.insert(crate::KEY_POWER_MODE, 0);
        schema.insert(crate::KEY_POWER_PROFILE, 0);
        schema.insert(crate::KEY_HIGH_PRIORITY, false);
        schema
    }

    /// Adds `key` with its default value, replacing any earlier default.
    pub fn insert(&mut self, key: impl Into<String>, default: impl IntoSettingValue) {
        self.defaults.insert(key.into(), default.into_setting_value());
    }

    /// Default for `key`, `None` when the key is unknown.
    pub fn default_value(&self, key: &str) -> Option<&SettingValue> {
        self.defaults.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.defaults.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.defaults.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.defaults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty()
    }
}

/// Helper so schema entries can be declared with plain literals.
pub trait IntoSettingValue {
    fn into_setting_value(self) -> SettingValue;
}

impl IntoSettingValue for SettingValue {
    fn into_setting_value(self) -> SettingValue {
        self
    }
}

impl IntoSettingValue for bool {
    fn into_setting_value(self) -> SettingValue {
        SettingValue::Bool(self)
    }
}

impl IntoSettingValue for i64 {
    fn into_setting_value(self) -> SettingValue {
        SettingValue::Int(self)
    }
}

impl IntoSettingValue for i32 {
    fn into_setting_value(self) -> SettingValue {
        SettingValue::Int(i64::from(self))
    }
}

impl IntoSettingValue for f64 {
    fn into_setting_value(self) -> SettingValue {
        SettingValue::Double(self)
    }
}

impl IntoSettingValue for &str {
    fn into_setting_value(self) -> SettingValue {
        SettingValue::Str(self.to_string())
    }
}

/// Key/value store with typed getters, schema-backed `reset`, and pull-style
/// change notification.
///
/// Change notification is a queue of keys rather than callbacks so that the
/// event loop owning the store decides when to react.
pub trait SettingsStore {
    fn value(&self, key: &str) -> Result<SettingValue, SettingsError>;

    /// Writes `value`; returns whether the effective value changed.
    fn set(&mut self, key: &str, value: SettingValue) -> Result<bool, SettingsError>;

    /// Restores the schema default; returns whether the effective value changed.
    fn reset(&mut self, key: &str) -> Result<bool, SettingsError>;

    /// Drains the keys changed since the last call, in write order.
    fn take_changes(&mut self) -> Vec<String>;

    fn string(&self, key: &str) -> Result<String, SettingsError> {
        match self.value(key)? {
            SettingValue::Str(value) => Ok(value),
            other => Err(mismatch(key, "string", &other)),
        }
    }

    fn int(&self, key: &str) -> Result<i64, SettingsError> {
        match self.value(key)? {
            SettingValue::Int(value) => Ok(value),
            other => Err(mismatch(key, "integer", &other)),
        }
    }

    fn double(&self, key: &str) -> Result<f64, SettingsError> {
        match self.value(key)? {
            SettingValue::Double(value) => Ok(value),
            SettingValue::Int(value) => Ok(value as f64),
            other => Err(mismatch(key, "double", &other)),
        }
    }

    fn boolean(&self, key: &str) -> Result<bool, SettingsError> {
        match self.value(key)? {
            SettingValue::Bool(value) => Ok(value),
            other => Err(mismatch(key, "boolean", &other)),
        }
    }
}

fn mismatch(key: &str, expected: &'static str, found: &SettingValue) -> SettingsError {
    SettingsError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}

/// Schema-backed settings store. Only values that differ from the schema
/// default are kept, which is also what gets persisted.
#[derive(Debug, Clone)]
pub struct Settings {
    schema: Arc<Schema>,
    values: SettingsValues,
    changes: Vec<String>,
}

impl Settings {
    /// Settings holding only schema defaults.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            values: SettingsValues::new(),
            changes: Vec::new(),
        }
    }

    /// Builds a store from persisted values. Unknown keys and values of the
    /// wrong type are dropped so a stale file never blocks loading.
    pub fn from_values(schema: Arc<Schema>, stored: &SettingsValues) -> Self {
        let mut settings = Self::new(schema);
        for (key, value) in stored {
            let Some(default) = settings.schema.default_value(key) else {
                debug!(%key, "dropping unknown setting");
                continue;
            };
            match default.coerce(key, value.clone()) {
                Ok(value) if &value != default => {
                    settings.values.insert(key.clone(), value);
                }
                Ok(_) => {}
                Err(err) => warn!(%err, "dropping invalid setting"),
            }
        }
        settings
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Values that differ from the schema defaults.
    pub fn values(&self) -> &SettingsValues {
        &self.values
    }
}

impl SettingsStore for Settings {
    fn value(&self, key: &str) -> Result<SettingValue, SettingsError> {
        if let Some(value) = self.values.get(key) {
            return Ok(value.clone());
        }
        self.schema
            .default_value(key)
            .cloned()
            .ok_or_else(|| SettingsError::UnknownKey(key.to_string()))
    }

    fn set(&mut self, key: &str, value: SettingValue) -> Result<bool, SettingsError> {
        let default = self
            .schema
            .default_value(key)
            .ok_or_else(|| SettingsError::UnknownKey(key.to_string()))?;
        let value = default.coerce(key, value)?;
        let current = self.values.get(key).unwrap_or(default);
        if current == &value {
            return Ok(false);
        }
        if &value == default {
            self.values.remove(key);
        } else {
            self.values.insert(key.to_string(), value);
        }
        self.changes.push(key.to_string());
        Ok(true)
    }

    fn reset(&mut self, key: &str) -> Result<bool, SettingsError> {
        if !self.schema.contains(key) {
            return Err(SettingsError::UnknownKey(key.to_string()));
        }
        if self.values.remove(key).is_some() {
            self.changes.push(key.to_string());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn take_changes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.changes)
    }
}
