//! Per-actor hit cooldown tracking

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::store::ProfileStore;
use crate::util::time::Clock;

/// Decides whether an actor may land a hit right now.
///
/// Each actor has at most one record: the clock reading of their last
/// allowed hit. No record means ready. A hit is allowed once at least the
/// profile's delay has passed since that reading, and every allowed hit
/// re-stamps it, so there is no burst credit.
pub struct CooldownTracker {
    profiles: Arc<ProfileStore>,
    clock: Arc<dyn Clock>,
    last_hit: DashMap<Uuid, u64>,
}

impl CooldownTracker {
    pub fn new(profiles: Arc<ProfileStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            profiles,
            clock,
            last_hit: DashMap::new(),
        }
    }

    /// Check and, if allowed, record a hit attempt.
    ///
    /// The read-compare-stamp runs under the actor's shard lock, so two
    /// concurrent attempts cannot both pass the same window.
    pub fn can_hit(&self, actor_id: Uuid, profile_name: &str) -> bool {
        let Some(delay) = self.required_delay(profile_name) else {
            return true;
        };

        let entry = self.last_hit.entry(actor_id);
        // Read after the lock so stamps are ordered like the critical sections
        let now = self.clock.now_millis();

        match entry {
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
            Entry::Occupied(mut slot) => {
                let elapsed = now.saturating_sub(*slot.get());
                if elapsed >= delay {
                    slot.insert(now);
                    true
                } else {
                    debug!(
                        actor_id = %actor_id,
                        profile = %profile_name,
                        remaining_ms = delay - elapsed,
                        "Hit denied by cooldown"
                    );
                    false
                }
            }
        }
    }

    /// Milliseconds until `can_hit` would allow; 0 when it would allow now
    pub fn remaining_cooldown(&self, actor_id: Uuid, profile_name: &str) -> u64 {
        let Some(delay) = self.required_delay(profile_name) else {
            return 0;
        };

        let Some(last) = self.last_hit.get(&actor_id) else {
            return 0;
        };

        let elapsed = self.clock.now_millis().saturating_sub(*last);
        delay.saturating_sub(elapsed)
    }

    /// Stamp the actor as having just hit, starting a fresh window
    pub fn touch(&self, actor_id: Uuid) {
        self.last_hit.insert(actor_id, self.clock.now_millis());
    }

    /// Re-stamp an existing record to now; actors without one stay ready
    pub fn restamp_if_present(&self, actor_id: Uuid) -> bool {
        match self.last_hit.get_mut(&actor_id) {
            Some(mut last) => {
                *last = self.clock.now_millis();
                true
            }
            None => false,
        }
    }

    /// Drop the actor's record, returning them to ready
    pub fn reset(&self, actor_id: Uuid) {
        self.last_hit.remove(&actor_id);
    }

    /// Drop every record
    pub fn clear_all(&self) {
        self.last_hit.clear();
    }

    /// Number of actors with a live record
    pub fn tracked_actors(&self) -> usize {
        self.last_hit.len()
    }

    /// Enforced delay for a profile name, `None` when unthrottled
    fn required_delay(&self, profile_name: &str) -> Option<u64> {
        if profile_name.trim().is_empty() {
            return None;
        }

        self.profiles
            .get(profile_name)
            .and_then(|profile| profile.effective_delay())
    }
}
