//! Profile persistence backends.
//!
//! The engine only consumes the [`ProfileStorage`] trait. Two backends ship
//! with the crate: [`ProfileDirectory`] keeps one TOML file per profile, and
//! [`MemoryStorage`] is for hosts that persist profiles elsewhere.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use directories_next::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::settings::SettingsValues;
use crate::ProfileError;

/// Overrides the discovered profile directory.
pub const ENV_PROFILE_DIR: &str = "EMBERFX_PROFILE_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "emberfx";
const APPLICATION: &str = "emberfx";
const PROFILE_VERSION: u32 = 1;

/// A profile as the backend hands it over: its identifier plus the raw
/// values that differ from the schema defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredProfile {
    pub path: String,
    pub values: SettingsValues,
}

/// Where profiles are persisted.
pub trait ProfileStorage {
    /// Upgrade hook run once before the first listing.
    fn migrate(&mut self) -> Result<(), ProfileError> {
        Ok(())
    }

    fn list_profiles(&self) -> Result<Vec<StoredProfile>, ProfileError>;

    fn create_profile(
        &mut self,
        initial: Option<&SettingsValues>,
    ) -> Result<StoredProfile, ProfileError>;

    fn save_profile(&mut self, path: &str, values: &SettingsValues) -> Result<(), ProfileError>;

    fn delete_profile(&mut self, path: &str) -> Result<(), ProfileError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    profiles: BTreeMap<String, SettingsValues>,
    next_id: u64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the storage with an existing profile.
    pub fn with_profile(mut self, path: impl Into<String>, values: SettingsValues) -> Self {
        self.profiles.insert(path.into(), values);
        self
    }
}

impl ProfileStorage for MemoryStorage {
    fn list_profiles(&self) -> Result<Vec<StoredProfile>, ProfileError> {
        Ok(self
            .profiles
            .iter()
            .map(|(path, values)| StoredProfile {
                path: path.clone(),
                values: values.clone(),
            })
            .collect())
    }

    fn create_profile(
        &mut self,
        initial: Option<&SettingsValues>,
    ) -> Result<StoredProfile, ProfileError> {
        let path = loop {
            let candidate = format!("memory:{}", self.next_id);
            self.next_id += 1;
            if !self.profiles.contains_key(&candidate) {
                break candidate;
            }
        };
        let values = initial.cloned().unwrap_or_default();
        self.profiles.insert(path.clone(), values.clone());
        Ok(StoredProfile { path, values })
    }

    fn save_profile(&mut self, path: &str, values: &SettingsValues) -> Result<(), ProfileError> {
        let slot = self
            .profiles
            .get_mut(path)
            .ok_or_else(|| ProfileError::UnknownProfile(path.to_string()))?;
        *slot = values.clone();
        Ok(())
    }

    fn delete_profile(&mut self, path: &str) -> Result<(), ProfileError> {
        self.profiles
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| ProfileError::UnknownProfile(path.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ProfileFile {
    version: u32,
    #[serde(default)]
    settings: SettingsValues,
}

impl ProfileFile {
    fn from_toml_str(input: &str) -> Result<Self, ProfileError> {
        let raw: ProfileFile = toml::from_str(input)?;
        if raw.version != PROFILE_VERSION {
            return Err(ProfileError::Invalid(format!(
                "unsupported profile version {}; expected {PROFILE_VERSION}",
                raw.version
            )));
        }
        Ok(raw)
    }
}

/// One `*.toml` file per profile inside a directory. The profile path is the
/// file path.
#[derive(Debug, Clone)]
pub struct ProfileDirectory {
    root: PathBuf,
}

impl ProfileDirectory {
    /// Storage rooted at `root`, created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves `$EMBERFX_PROFILE_DIR`, falling back to the user config
    /// directory.
    pub fn discover() -> Result<Self, ProfileError> {
        if let Some(value) = env::var_os(ENV_PROFILE_DIR) {
            if !value.is_empty() {
                return Ok(Self::new(PathBuf::from(value)));
            }
        }
        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or(ProfileError::NoProfileDir)?;
        Ok(Self::new(project_dirs.config_dir().join("profiles")))
    }

    /// Directory holding the profile files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_root(&self) -> Result<(), ProfileError> {
        fs::create_dir_all(&self.root).map_err(|source| ProfileError::Io {
            path: self.root.clone(),
            source,
        })
    }

    fn write(&self, path: &Path, values: &SettingsValues) -> Result<(), ProfileError> {
        let file = ProfileFile {
            version: PROFILE_VERSION,
            settings: values.clone(),
        };
        let serialized = toml::to_string_pretty(&file)?;
        fs::write(path, serialized).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn owned_path(&self, path: &str) -> Result<PathBuf, ProfileError> {
        let candidate = PathBuf::from(path);
        if candidate.parent() != Some(self.root.as_path()) || !candidate.is_file() {
            return Err(ProfileError::UnknownProfile(path.to_string()));
        }
        Ok(candidate)
    }
}

impl ProfileStorage for ProfileDirectory {
    fn list_profiles(&self) -> Result<Vec<StoredProfile>, ProfileError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ProfileError::Io {
                    path: self.root.clone(),
                    source,
                })
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().map(|ext| ext == "toml").unwrap_or(false))
            .collect();
        paths.sort();

        let mut profiles = Vec::with_capacity(paths.len());
        for path in paths {
            let contents = fs::read_to_string(&path).map_err(|source| ProfileError::Io {
                path: path.clone(),
                source,
            })?;
            match ProfileFile::from_toml_str(&contents) {
                Ok(file) => profiles.push(StoredProfile {
                    path: path.to_string_lossy().into_owned(),
                    values: file.settings,
                }),
                Err(err) => warn!(path = %path.display(), %err, "skipping unreadable profile"),
            }
        }
        debug!(root = %self.root.display(), count = profiles.len(), "listed profiles");
        Ok(profiles)
    }

    fn create_profile(
        &mut self,
        initial: Option<&SettingsValues>,
    ) -> Result<StoredProfile, ProfileError> {
        self.ensure_root()?;
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let mut suffix = 0u32;
        let path = loop {
            let candidate = self.root.join(format!("profile-{stamp}-{suffix}.toml"));
            if !candidate.exists() {
                break candidate;
            }
            suffix += 1;
        };
        let values = initial.cloned().unwrap_or_default();
        self.write(&path, &values)?;
        info!(path = %path.display(), "created profile");
        Ok(StoredProfile {
            path: path.to_string_lossy().into_owned(),
            values,
        })
    }

    fn save_profile(&mut self, path: &str, values: &SettingsValues) -> Result<(), ProfileError> {
        let path = self.owned_path(path)?;
        self.write(&path, values)
    }

    fn delete_profile(&mut self, path: &str) -> Result<(), ProfileError> {
        let path = self.owned_path(path)?;
        fs::remove_file(&path).map_err(|source| ProfileError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "deleted profile");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingValue;
    use tempfile::TempDir;

    fn values(pairs: &[(&str, SettingValue)]) -> SettingsValues {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn directory_round_trips_profiles() {
        let dir = TempDir::new().unwrap();
        let mut storage = ProfileDirectory::new(dir.path().join("profiles"));
        assert!(storage.list_profiles().unwrap().is_empty());

        let initial = values(&[
            ("profile-app", SettingValue::from("firefox")),
            ("fire-enable-effect", SettingValue::Bool(true)),
            ("fire-scale", SettingValue::Double(1.5)),
        ]);
        let created = storage.create_profile(Some(&initial)).unwrap();
        let listed = storage.list_profiles().unwrap();
        assert_eq!(listed, vec![created.clone()]);

        let updated = values(&[("profile-animation-type", SettingValue::Int(2))]);
        storage.save_profile(&created.path, &updated).unwrap();
        assert_eq!(storage.list_profiles().unwrap()[0].values, updated);

        storage.delete_profile(&created.path).unwrap();
        assert!(storage.list_profiles().unwrap().is_empty());
    }

    #[test]
    fn directory_skips_files_with_wrong_version() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("old.toml"), "version = 7\n").unwrap();
        fs::write(
            dir.path().join("good.toml"),
            "version = 1\n[settings]\nprofile-app = \"kitty\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let storage = ProfileDirectory::new(dir.path());
        let listed = storage.list_profiles().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(
            listed[0].values.get("profile-app"),
            Some(&SettingValue::from("kitty"))
        );
    }

    #[test]
    fn directory_refuses_foreign_paths() {
        let dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let foreign = other.path().join("x.toml");
        fs::write(&foreign, "version = 1\n").unwrap();
        let mut storage = ProfileDirectory::new(dir.path());
        let err = storage
            .delete_profile(&foreign.to_string_lossy())
            .unwrap_err();
        assert!(matches!(err, ProfileError::UnknownProfile(_)));
        assert!(foreign.exists());
    }

    #[test]
    fn memory_storage_assigns_unique_paths() {
        let mut storage = MemoryStorage::new().with_profile("memory:0", SettingsValues::new());
        let created = storage.create_profile(None).unwrap();
        assert_eq!(created.path, "memory:1");
        assert_eq!(storage.list_profiles().unwrap().len(), 2);
        assert!(matches!(
            storage.delete_profile("memory:9"),
            Err(ProfileError::UnknownProfile(_))
        ));
    }
}
