use std::sync::Arc;

use tracing::{debug, info};

use crate::profile::{is_constraint_key, is_enable_key, Profile};
use crate::settings::{Schema, SettingValue, Settings, SettingsStore, SettingsValues};
use crate::storage::{ProfileStorage, StoredProfile};
use crate::ProfileError;

/// Summary of a settings write, used by callers to decide whether cached
/// selection state is now stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileChange {
    pub path: String,
    pub keys: Vec<String>,
    /// True when any changed key affects matching, priority, or effect
    /// enablement.
    pub affects_selection: bool,
}

/// All configured profiles, kept sorted by descending priority.
///
/// The set never becomes empty: whenever the last profile is removed (or
/// none exist at load) a default profile is created from `default_values`.
pub struct ProfileSet {
    storage: Box<dyn ProfileStorage>,
    schema: Arc<Schema>,
    default_values: SettingsValues,
    profiles: Vec<Profile>,
}

impl ProfileSet {
    /// Loads every stored profile, creating the default one when none exist.
    pub fn load(
        mut storage: Box<dyn ProfileStorage>,
        schema: Arc<Schema>,
        default_values: SettingsValues,
    ) -> Result<Self, ProfileError> {
        storage.migrate()?;
        let stored = storage.list_profiles()?;
        let mut set = Self {
            storage,
            schema,
            default_values,
            profiles: Vec::with_capacity(stored.len()),
        };
        for profile in stored {
            let profile = set.build(profile)?;
            set.profiles.push(profile);
        }
        set.ensure_default()?;
        set.sort();
        debug!(count = set.profiles.len(), "loaded profiles");
        Ok(set)
    }

    /// Profiles in descending priority order.
    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Looks a profile up by its storage path.
    pub fn get(&self, path: &str) -> Option<&Profile> {
        self.profiles.iter().find(|profile| profile.path() == path)
    }

    /// Schema every profile's settings follow.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Number of profiles, never zero after `load`.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Creates a profile, optionally seeded with `initial`, and inserts it
    /// at its priority position.
    pub fn create(&mut self, initial: Option<&SettingsValues>) -> Result<&Profile, ProfileError> {
        let stored = self.storage.create_profile(initial)?;
        let path = stored.path.clone();
        let profile = self.build(stored)?;
        self.profiles.push(profile);
        self.sort();
        info!(%path, "profile added");
        self.get(&path)
            .ok_or_else(|| ProfileError::UnknownProfile(path.clone()))
    }

    /// Deletes a profile from storage. The default profile is recreated if
    /// this was the last one.
    pub fn delete(&mut self, path: &str) -> Result<(), ProfileError> {
        let index = self
            .position(path)
            .ok_or_else(|| ProfileError::UnknownProfile(path.to_string()))?;
        self.storage.delete_profile(path)?;
        self.profiles.remove(index);
        info!(%path, "profile removed");
        self.ensure_default()
    }

    /// Writes one setting and saves the profile.
    pub fn set(
        &mut self,
        path: &str,
        key: &str,
        value: SettingValue,
    ) -> Result<Option<ProfileChange>, ProfileError> {
        self.apply(path, |settings| settings.set(key, value).map(|_| ()))
    }

    /// Restores one setting to its schema default and saves the profile.
    pub fn reset(&mut self, path: &str, key: &str) -> Result<Option<ProfileChange>, ProfileError> {
        self.apply(path, |settings| settings.reset(key).map(|_| ()))
    }

    /// Runs `edit` against a copy of a profile's settings and persists it.
    /// The copy replaces the profile only once the save succeeded, then the
    /// set is re-sorted when a constraint changed. Returns `None` if nothing
    /// changed.
    pub fn apply<F>(&mut self, path: &str, edit: F) -> Result<Option<ProfileChange>, ProfileError>
    where
        F: FnOnce(&mut Settings) -> Result<(), crate::SettingsError>,
    {
        let index = self
            .position(path)
            .ok_or_else(|| ProfileError::UnknownProfile(path.to_string()))?;
        let mut draft = self.profiles[index].settings().clone();
        let edited = edit(&mut draft);
        let keys = draft.take_changes();
        if keys.is_empty() {
            edited?;
            return Ok(None);
        }

        self.storage.save_profile(path, draft.values())?;
        *self.profiles[index].settings_mut() = draft;

        let affects_selection = keys
            .iter()
            .any(|key| is_constraint_key(key) || is_enable_key(key));
        if keys.iter().any(|key| is_constraint_key(key)) {
            self.profiles[index].refresh()?;
            self.sort();
        }
        edited?;
        debug!(%path, ?keys, affects_selection, "profile settings changed");
        Ok(Some(ProfileChange {
            path: path.to_string(),
            keys,
            affects_selection,
        }))
    }

    /// Re-reads every profile from storage, e.g. after an external edit.
    pub fn reload(&mut self) -> Result<(), ProfileError> {
        let stored = self.storage.list_profiles()?;
        let mut profiles = Vec::with_capacity(stored.len());
        for profile in stored {
            profiles.push(self.build(profile)?);
        }
        self.profiles = profiles;
        self.ensure_default()?;
        self.sort();
        Ok(())
    }

    fn build(&self, stored: StoredProfile) -> Result<Profile, ProfileError> {
        let settings = Settings::from_values(Arc::clone(&self.schema), &stored.values);
        Ok(Profile::new(stored.path, settings)?)
    }

    fn position(&self, path: &str) -> Option<usize> {
        self.profiles.iter().position(|profile| profile.path() == path)
    }

    fn ensure_default(&mut self) -> Result<(), ProfileError> {
        if !self.profiles.is_empty() {
            return Ok(());
        }
        let stored = self.storage.create_profile(Some(&self.default_values))?;
        info!(path = %stored.path, "created default profile");
        let profile = self.build(stored)?;
        self.profiles.push(profile);
        Ok(())
    }

    /// Stable sort, so equal priorities keep their current relative order.
    fn sort(&mut self) {
        self.profiles
            .sort_by(|a, b| b.priority().cmp(&a.priority()));
    }
}
