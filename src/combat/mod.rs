//! Hit-delay gating

pub mod cooldown;
pub mod pipeline;

pub use cooldown::CooldownTracker;
pub use pipeline::{AttackCounters, EventOutcome, EventPipeline, GameEvent};
