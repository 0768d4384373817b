//! Real-time event boundary: attack attempts, lifecycle and kit changes,
//! affordance use and disconnects all pass through here

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::CooldownTracker;
use crate::lifecycle::{
    Affordance, AffordanceGate, KitRegistry, KitSource, LifecycleRegistry, LifecycleState,
};

/// Event delivered by the game host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    /// Actor tries to land a hit with their active kit
    Attack { actor_id: Uuid },
    /// Actor moved to a new lifecycle state
    StateChanged {
        actor_id: Uuid,
        state: LifecycleState,
    },
    /// Actor equipped a kit; `profile` is its hit-delay profile name
    KitChanged {
        actor_id: Uuid,
        #[serde(default)]
        profile: Option<String>,
    },
    /// Actor used a granted item
    UseAffordance {
        actor_id: Uuid,
        affordance: Affordance,
    },
    /// Actor left the server
    Disconnected { actor_id: Uuid },
}

/// Result handed back to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
    /// Apply the attack's effects
    Allowed,
    /// Suppress the attack entirely
    Denied { remaining_ms: u64 },
    /// Items the actor now holds
    Granted { items: Vec<Affordance> },
    /// Use was forwarded to a collaborator
    Routed,
    /// Event had nothing to act on
    Ignored,
    /// State was updated
    Applied,
}

/// Attack decision counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttackCounters {
    pub allowed: u64,
    pub denied: u64,
}

/// Dispatches host events to the tracker, registries and gate
pub struct EventPipeline {
    tracker: Arc<CooldownTracker>,
    gate: Arc<AffordanceGate>,
    lifecycle: Arc<LifecycleRegistry>,
    kits: Arc<KitRegistry>,
    allowed: AtomicU64,
    denied: AtomicU64,
}

impl EventPipeline {
    pub fn new(
        tracker: Arc<CooldownTracker>,
        gate: Arc<AffordanceGate>,
        lifecycle: Arc<LifecycleRegistry>,
        kits: Arc<KitRegistry>,
    ) -> Self {
        Self {
            tracker,
            gate,
            lifecycle,
            kits,
            allowed: AtomicU64::new(0),
            denied: AtomicU64::new(0),
        }
    }

    pub fn dispatch(&self, event: GameEvent) -> EventOutcome {
        match event {
            GameEvent::Attack { actor_id } => self.attack(actor_id),
            GameEvent::StateChanged { actor_id, state } => {
                let previous = self.lifecycle.set(actor_id, state);
                match self.gate.on_state_change(actor_id, previous, state) {
                    Some(items) => EventOutcome::Granted {
                        items: items.to_vec(),
                    },
                    None => EventOutcome::Ignored,
                }
            }
            GameEvent::KitChanged { actor_id, profile } => {
                if self.kits.equip(actor_id, profile) {
                    self.gate.on_kit_change(actor_id);
                }
                EventOutcome::Applied
            }
            GameEvent::UseAffordance {
                actor_id,
                affordance,
            } => {
                if self.gate.on_use(actor_id, affordance) {
                    EventOutcome::Routed
                } else {
                    EventOutcome::Ignored
                }
            }
            GameEvent::Disconnected { actor_id } => {
                self.disconnect(actor_id);
                EventOutcome::Applied
            }
        }
    }

    /// Gate an attack with the actor's active kit profile
    pub fn attack(&self, actor_id: Uuid) -> EventOutcome {
        let profile = self.kits.hit_delay_profile(actor_id).unwrap_or_default();

        if self.tracker.can_hit(actor_id, &profile) {
            self.allowed.fetch_add(1, Ordering::Relaxed);
            EventOutcome::Allowed
        } else {
            self.denied.fetch_add(1, Ordering::Relaxed);
            EventOutcome::Denied {
                remaining_ms: self.tracker.remaining_cooldown(actor_id, &profile),
            }
        }
    }

    /// Release every per-actor record
    pub fn disconnect(&self, actor_id: Uuid) {
        self.tracker.reset(actor_id);
        self.kits.remove(actor_id);
        self.lifecycle.remove(actor_id);
        self.gate.forget(actor_id);
        debug!(actor_id = %actor_id, "Released actor state on disconnect");
    }

    /// Drop all cooldown records, e.g. at shutdown
    pub fn shutdown(&self) {
        let tracked = self.tracker.tracked_actors();
        self.tracker.clear_all();
        info!(tracked, "Cleared hit cooldowns");
    }

    pub fn counters(&self) -> AttackCounters {
        AttackCounters {
            allowed: self.allowed.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
        }
    }
}
