//! In-process lifecycle and kit registries fed by host events

use dashmap::DashMap;
use uuid::Uuid;

use super::{KitSource, LifecycleSource, LifecycleState};

/// Current lifecycle state per connected actor
#[derive(Debug, Default)]
pub struct LifecycleRegistry {
    states: DashMap<Uuid, LifecycleState>,
}

impl LifecycleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new state, returning the previous one
    pub fn set(&self, actor_id: Uuid, state: LifecycleState) -> Option<LifecycleState> {
        self.states.insert(actor_id, state)
    }

    pub fn remove(&self, actor_id: Uuid) -> Option<LifecycleState> {
        self.states.remove(&actor_id).map(|(_, state)| state)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }
}

impl LifecycleSource for LifecycleRegistry {
    fn state_of(&self, actor_id: Uuid) -> Option<LifecycleState> {
        self.states.get(&actor_id).map(|s| *s)
    }
}

/// Hit-delay profile of each actor's equipped kit
#[derive(Debug, Default)]
pub struct KitRegistry {
    profiles: DashMap<Uuid, String>,
}

impl KitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the equipped kit's profile; `None` or blank clears it.
    /// Returns true when the effective profile changed.
    pub fn equip(&self, actor_id: Uuid, profile: Option<String>) -> bool {
        match profile.filter(|p| !p.trim().is_empty()) {
            Some(profile) => self
                .profiles
                .insert(actor_id, profile.clone())
                .map_or(true, |previous| previous != profile),
            None => self.profiles.remove(&actor_id).is_some(),
        }
    }

    pub fn remove(&self, actor_id: Uuid) {
        self.profiles.remove(&actor_id);
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }
}

impl KitSource for KitRegistry {
    fn hit_delay_profile(&self, actor_id: Uuid) -> Option<String> {
        self.profiles.get(&actor_id).map(|p| p.clone())
    }
}
