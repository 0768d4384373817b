//! Hit-delay profile registry

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{error, info, warn};

use super::document;
use super::profile::{seeded_profiles, HitDelayProfile, DEFAULT_PROFILE};
use super::storage::{ProfileStorage, StorageError};

/// Profiles keyed by name
pub type ProfileMap = HashMap<String, HitDelayProfile>;

/// Profile store errors
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Profile name must not be blank")]
    InvalidName,

    #[error("Unknown profile: {0}")]
    NotFound(String),

    #[error("Profile {0} cannot be removed")]
    Protected(String),

    /// The change is live in memory but did not reach storage
    #[error("Change applied but not saved: {0}")]
    Persist(#[from] StorageError),
}

/// What a `load()` call ended up with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LoadSummary {
    /// Profiles now in the registry
    pub loaded: usize,
    /// Document entries that failed to decode
    pub skipped: usize,
    /// True when the stock profiles were written because no document existed
    pub seeded: bool,
    /// True when the document could not be read or parsed at all
    pub unreadable: bool,
}

/// Registry of named hit-delay profiles.
///
/// Readers clone the current `Arc` under a short read lock; writers build
/// a new map and swap it in, so a lookup never observes a half-applied
/// change.
pub struct ProfileStore {
    registry: RwLock<Arc<ProfileMap>>,
    storage: Arc<dyn ProfileStorage>,
    /// Serializes snapshot-and-write so an older snapshot never lands last
    persist_lock: Mutex<()>,
}

impl ProfileStore {
    /// Create an empty store. Call `load()` before serving lookups.
    pub fn new(storage: Arc<dyn ProfileStorage>) -> Self {
        Self {
            registry: RwLock::new(Arc::new(ProfileMap::new())),
            storage,
            persist_lock: Mutex::new(()),
        }
    }

    /// Replace the registry with the persisted document.
    ///
    /// Never fails: bad entries are skipped, an unreadable document leaves
    /// only the fallback `default`, and a missing document is seeded with
    /// the stock profiles.
    pub fn load(&self) -> LoadSummary {
        let mut summary = LoadSummary::default();

        let raw = match self.storage.read() {
            Ok(raw) => raw,
            Err(e) => {
                error!(location = %self.storage.location(), error = %e, "Failed to read hit-delay profiles");
                return self.install_fallback(summary);
            }
        };

        let Some(text) = raw else {
            let map: ProfileMap = seeded_profiles()
                .into_iter()
                .map(|p| (p.name().to_string(), p))
                .collect();
            summary.loaded = map.len();
            summary.seeded = true;
            self.swap(map);

            info!(location = %self.storage.location(), "No hit-delay profiles found, seeded defaults");
            self.persist_logged();
            return summary;
        };

        let decoded = match document::decode(&text) {
            Ok(decoded) => decoded,
            Err(e) => {
                error!(location = %self.storage.location(), error = %e, "Hit-delay profile document is unparseable");
                return self.install_fallback(summary);
            }
        };

        for (index, reason) in &decoded.rejected {
            warn!(entry = index, error = %reason, "Skipping malformed hit-delay profile");
        }
        summary.skipped = decoded.rejected.len();

        let mut map = ProfileMap::with_capacity(decoded.profiles.len());
        for profile in decoded.profiles {
            if map.contains_key(profile.name()) {
                warn!(profile = %profile.name(), "Duplicate hit-delay profile, keeping first");
                continue;
            }
            map.insert(profile.name().to_string(), profile);
        }

        let needs_default = !map.contains_key(DEFAULT_PROFILE);
        if needs_default {
            map.insert(DEFAULT_PROFILE.to_string(), HitDelayProfile::fallback_default());
        }

        summary.loaded = map.len();
        self.swap(map);

        info!(
            loaded = summary.loaded,
            skipped = summary.skipped,
            "Loaded hit-delay profiles"
        );

        if needs_default {
            info!("Document had no default profile, added one");
            self.persist_logged();
        }

        summary
    }

    /// Look up a profile by exact name
    pub fn get(&self, name: &str) -> Option<HitDelayProfile> {
        self.current().get(name).cloned()
    }

    /// The `default` profile, or the in-memory fallback if the registry lacks one
    pub fn get_default(&self) -> HitDelayProfile {
        self.get(DEFAULT_PROFILE)
            .unwrap_or_else(HitDelayProfile::fallback_default)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.current().contains_key(name)
    }

    /// Owned copy of the registry
    pub fn snapshot(&self) -> ProfileMap {
        (*self.current()).clone()
    }

    /// Profile names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.current().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    /// Insert or replace a profile, then persist the registry.
    ///
    /// `Err(Persist)` means the profile is live but unsaved.
    pub fn add(&self, profile: HitDelayProfile) -> Result<(), ProfileError> {
        if profile.name().trim().is_empty() {
            warn!("Rejected hit-delay profile with blank name");
            return Err(ProfileError::InvalidName);
        }

        let name = profile.name().to_string();
        let replaced = self.update(|map| Ok(map.insert(name.clone(), profile)))?;
        info!(profile = %name, replaced = replaced.is_some(), "Hit-delay profile added");

        self.persist()
    }

    /// Remove a profile, then persist the registry. `default` is protected.
    pub fn remove(&self, name: &str) -> Result<HitDelayProfile, ProfileError> {
        if name == DEFAULT_PROFILE {
            return Err(ProfileError::Protected(name.to_string()));
        }

        let removed = self.update(|map| {
            map.remove(name)
                .ok_or_else(|| ProfileError::NotFound(name.to_string()))
        })?;
        info!(profile = %name, "Hit-delay profile removed");

        self.persist().map(|()| removed)
    }

    /// Change a profile's delay in memory. Call `save()` to persist.
    #[allow(dead_code)]
    pub fn set_delay(&self, name: &str, delay_millis: u64) -> Result<(), ProfileError> {
        self.update_profile(name, Some(delay_millis), None).map(|_| ())
    }

    /// Enable or disable a profile in memory. Call `save()` to persist.
    #[allow(dead_code)]
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<(), ProfileError> {
        self.update_profile(name, None, Some(enabled)).map(|_| ())
    }

    /// Apply a delay and enabled change as one swap, so lookups never see
    /// half of it. Call `save()` to persist.
    pub fn update_profile(
        &self,
        name: &str,
        delay_millis: Option<u64>,
        enabled: Option<bool>,
    ) -> Result<HitDelayProfile, ProfileError> {
        self.update(|map| {
            let profile = map
                .get_mut(name)
                .ok_or_else(|| ProfileError::NotFound(name.to_string()))?;
            if let Some(delay_millis) = delay_millis {
                profile.delay_millis = delay_millis;
            }
            if let Some(enabled) = enabled {
                profile.enabled = enabled;
            }
            Ok(profile.clone())
        })
    }

    /// Persist the current registry
    pub fn save(&self) -> Result<(), ProfileError> {
        self.persist()
    }

    fn current(&self) -> Arc<ProfileMap> {
        self.registry.read().clone()
    }

    fn swap(&self, map: ProfileMap) {
        *self.registry.write() = Arc::new(map);
    }

    /// Copy-on-write mutation; the registry is untouched if `apply` fails
    fn update<T>(
        &self,
        apply: impl FnOnce(&mut ProfileMap) -> Result<T, ProfileError>,
    ) -> Result<T, ProfileError> {
        let mut guard = self.registry.write();
        let mut next = (**guard).clone();
        let out = apply(&mut next)?;
        *guard = Arc::new(next);
        Ok(out)
    }

    fn install_fallback(&self, mut summary: LoadSummary) -> LoadSummary {
        let fallback = HitDelayProfile::fallback_default();
        self.swap(ProfileMap::from([(fallback.name().to_string(), fallback)]));

        summary.loaded = 1;
        summary.unreadable = true;
        summary
    }

    fn persist(&self) -> Result<(), ProfileError> {
        let _guard = self.persist_lock.lock();
        let current = self.current();
        let text = document::encode(current.values()).map_err(StorageError::from)?;

        self.storage.write(&text).map_err(|e| {
            warn!(location = %self.storage.location(), error = %e, "Failed to persist hit-delay profiles");
            ProfileError::from(e)
        })
    }

    fn persist_logged(&self) {
        // persist() already logged the failure
        let _ = self.persist();
    }
}
