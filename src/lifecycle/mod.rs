//! Actor lifecycle state, kit selection, and the affordances they drive

pub mod affordance;
pub mod registry;

pub use affordance::{Affordance, AffordanceGate, HeldAffordances, NoticeRouter};
pub use registry::{KitRegistry, LifecycleRegistry};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// High-level mode an actor is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Idle in the lobby
    Lobby,
    /// Waiting in a matchmaking queue
    Queued,
    /// Fighting in a match
    InMatch,
    /// Watching a match
    Spectating,
}

/// Source of an actor's current lifecycle state
pub trait LifecycleSource: Send + Sync {
    /// `None` when the actor is unknown
    fn state_of(&self, actor_id: Uuid) -> Option<LifecycleState>;
}

/// Source of the hit-delay profile for an actor's active kit
pub trait KitSource: Send + Sync {
    /// `None` (or a blank name) means the kit is unthrottled
    fn hit_delay_profile(&self, actor_id: Uuid) -> Option<String>;
}
