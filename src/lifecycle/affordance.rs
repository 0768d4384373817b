//! State-driven affordance gate
//!
//! Maps an actor's lifecycle state to the interactable items they hold and
//! routes item use back out to the menu and queue collaborators. State and
//! kit transitions also reset the actor's hit cooldown so timing from a
//! previous match or kit never carries over.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use super::{LifecycleSource, LifecycleState};
use crate::combat::CooldownTracker;

/// Interactable item granted for a lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Affordance {
    /// Opens the main lobby menu
    Menu,
    /// Opens player settings
    Settings,
    /// Leaves the queue or stops spectating
    Leave,
}

impl Affordance {
    /// Items an actor holds while in `state`
    pub fn for_state(state: LifecycleState) -> &'static [Affordance] {
        match state {
            LifecycleState::Lobby => &[Affordance::Menu, Affordance::Settings],
            LifecycleState::Queued | LifecycleState::Spectating => &[Affordance::Leave],
            LifecycleState::InMatch => &[],
        }
    }
}

/// Receives the item set an actor should currently hold
pub trait AffordanceSink: Send + Sync {
    /// Replace the actor's held items
    fn grant(&self, actor_id: Uuid, items: &[Affordance]);

    /// Drop everything held by the actor
    fn revoke(&self, actor_id: Uuid);
}

/// Where affordance use is routed
pub trait MenuRouter: Send + Sync {
    fn open_menu(&self, actor_id: Uuid);
    fn open_settings(&self, actor_id: Uuid);
    fn leave_queue(&self, actor_id: Uuid);
    fn leave_spectate(&self, actor_id: Uuid);
}

/// Items currently held, per actor
#[derive(Debug, Default)]
pub struct HeldAffordances {
    held: DashMap<Uuid, Vec<Affordance>>,
}

impl HeldAffordances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn held(&self, actor_id: Uuid) -> Vec<Affordance> {
        self.held
            .get(&actor_id)
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }
}

impl AffordanceSink for HeldAffordances {
    fn grant(&self, actor_id: Uuid, items: &[Affordance]) {
        self.held.insert(actor_id, items.to_vec());
    }

    fn revoke(&self, actor_id: Uuid) {
        self.held.remove(&actor_id);
    }
}

/// Routed affordance use, published for external menu/queue handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GateNotice {
    OpenMenu { actor_id: Uuid },
    OpenSettings { actor_id: Uuid },
    LeaveQueue { actor_id: Uuid },
    LeaveSpectate { actor_id: Uuid },
}

/// `MenuRouter` that broadcasts a `GateNotice` per routed use
#[derive(Debug, Clone)]
pub struct NoticeRouter {
    tx: broadcast::Sender<GateNotice>,
}

impl NoticeRouter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GateNotice> {
        self.tx.subscribe()
    }

    fn publish(&self, notice: GateNotice) {
        if self.tx.send(notice).is_err() {
            debug!("No subscribers for gate notice");
        }
    }
}

impl MenuRouter for NoticeRouter {
    fn open_menu(&self, actor_id: Uuid) {
        self.publish(GateNotice::OpenMenu { actor_id });
    }

    fn open_settings(&self, actor_id: Uuid) {
        self.publish(GateNotice::OpenSettings { actor_id });
    }

    fn leave_queue(&self, actor_id: Uuid) {
        self.publish(GateNotice::LeaveQueue { actor_id });
    }

    fn leave_spectate(&self, actor_id: Uuid) {
        self.publish(GateNotice::LeaveSpectate { actor_id });
    }
}

/// Grants affordances from lifecycle state and keeps cooldowns in step
/// with state and kit transitions
pub struct AffordanceGate {
    lifecycle: Arc<dyn LifecycleSource>,
    tracker: Arc<CooldownTracker>,
    sink: Arc<dyn AffordanceSink>,
    router: Arc<dyn MenuRouter>,
}

impl AffordanceGate {
    pub fn new(
        lifecycle: Arc<dyn LifecycleSource>,
        tracker: Arc<CooldownTracker>,
        sink: Arc<dyn AffordanceSink>,
        router: Arc<dyn MenuRouter>,
    ) -> Self {
        Self {
            lifecycle,
            tracker,
            sink,
            router,
        }
    }

    /// Grant the items for the actor's current state.
    /// Unknown actors get nothing and `None` is returned.
    pub fn refresh(&self, actor_id: Uuid) -> Option<&'static [Affordance]> {
        let Some(state) = self.lifecycle.state_of(actor_id) else {
            debug!(actor_id = %actor_id, "No lifecycle state, skipping affordances");
            return None;
        };

        let items = Affordance::for_state(state);
        self.sink.grant(actor_id, items);
        debug!(actor_id = %actor_id, state = ?state, items = ?items, "Granted affordances");
        Some(items)
    }

    /// React to a lifecycle transition already recorded in the lifecycle source
    pub fn on_state_change(
        &self,
        actor_id: Uuid,
        previous: Option<LifecycleState>,
        next: LifecycleState,
    ) -> Option<&'static [Affordance]> {
        let was_in_match = previous == Some(LifecycleState::InMatch);
        let now_in_match = next == LifecycleState::InMatch;
        if was_in_match != now_in_match {
            self.tracker.reset(actor_id);
        }

        self.refresh(actor_id)
    }

    /// React to a kit switch. Mid-match an actor who has already hit starts
    /// the new kit's window now; everyone else is made ready, so the first
    /// hit of a match does not depend on event order.
    pub fn on_kit_change(&self, actor_id: Uuid) {
        match self.lifecycle.state_of(actor_id) {
            Some(LifecycleState::InMatch) => {
                self.tracker.restamp_if_present(actor_id);
            }
            Some(_) => self.tracker.reset(actor_id),
            None => debug!(actor_id = %actor_id, "Kit change for unknown actor ignored"),
        }
    }

    /// Route use of an affordance. Returns false when the actor is unknown
    /// or does not hold that item in their current state.
    pub fn on_use(&self, actor_id: Uuid, affordance: Affordance) -> bool {
        let Some(state) = self.lifecycle.state_of(actor_id) else {
            return false;
        };

        if !Affordance::for_state(state).contains(&affordance) {
            debug!(actor_id = %actor_id, state = ?state, affordance = ?affordance, "Ignoring affordance not held in state");
            return false;
        }

        match (affordance, state) {
            (Affordance::Menu, _) => self.router.open_menu(actor_id),
            (Affordance::Settings, _) => self.router.open_settings(actor_id),
            (Affordance::Leave, LifecycleState::Spectating) => self.router.leave_spectate(actor_id),
            (Affordance::Leave, _) => self.router.leave_queue(actor_id),
        }
        true
    }

    /// Drop everything the gate granted to a departing actor
    pub fn forget(&self, actor_id: Uuid) {
        self.sink.revoke(actor_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleRegistry;
    use crate::store::storage::MemoryStorage;
    use crate::store::ProfileStore;
    use crate::util::time::ManualClock;

    struct Harness {
        gate: AffordanceGate,
        lifecycle: Arc<LifecycleRegistry>,
        tracker: Arc<CooldownTracker>,
        held: Arc<HeldAffordances>,
        router: NoticeRouter,
        clock: Arc<ManualClock>,
    }

    fn harness() -> Harness {
        let profiles = Arc::new(ProfileStore::new(Arc::new(MemoryStorage::default())));
        profiles.load();
        let clock = Arc::new(ManualClock::new(0));
        let tracker = Arc::new(CooldownTracker::new(profiles, clock.clone()));
        let lifecycle = Arc::new(LifecycleRegistry::new());
        let held = Arc::new(HeldAffordances::new());
        let router = NoticeRouter::new(16);

        let gate = AffordanceGate::new(
            lifecycle.clone(),
            tracker.clone(),
            held.clone(),
            Arc::new(router.clone()),
        );

        Harness {
            gate,
            lifecycle,
            tracker,
            held,
            router,
            clock,
        }
    }

    fn enter(h: &Harness, actor: Uuid, state: LifecycleState) -> Option<&'static [Affordance]> {
        let previous = h.lifecycle.set(actor, state);
        h.gate.on_state_change(actor, previous, state)
    }

    #[test]
    fn each_state_grants_its_items() {
        let h = harness();
        let a = Uuid::new_v4();

        enter(&h, a, LifecycleState::Lobby);
        assert_eq!(h.held.held(a), vec![Affordance::Menu, Affordance::Settings]);

        enter(&h, a, LifecycleState::Queued);
        assert_eq!(h.held.held(a), vec![Affordance::Leave]);

        enter(&h, a, LifecycleState::InMatch);
        assert!(h.held.held(a).is_empty());

        enter(&h, a, LifecycleState::Spectating);
        assert_eq!(h.held.held(a), vec![Affordance::Leave]);
    }

    #[test]
    fn unknown_actor_gets_nothing() {
        let h = harness();
        let a = Uuid::new_v4();

        assert_eq!(h.gate.refresh(a), None);
        assert!(!h.gate.on_use(a, Affordance::Menu));
        assert_eq!(h.held.len(), 0);
    }

    #[test]
    fn entering_and_leaving_a_match_resets_cooldown() {
        let h = harness();
        let a = Uuid::new_v4();

        enter(&h, a, LifecycleState::Queued);
        enter(&h, a, LifecycleState::InMatch);
        assert!(h.tracker.can_hit(a, "slow"));
        assert_eq!(h.tracker.tracked_actors(), 1);

        enter(&h, a, LifecycleState::Lobby);
        assert_eq!(h.tracker.tracked_actors(), 0);

        h.tracker.touch(a);
        enter(&h, a, LifecycleState::InMatch);
        assert!(h.tracker.can_hit(a, "slow"));
    }

    #[test]
    fn transitions_outside_a_match_keep_cooldown() {
        let h = harness();
        let a = Uuid::new_v4();

        enter(&h, a, LifecycleState::Lobby);
        h.tracker.touch(a);
        enter(&h, a, LifecycleState::Queued);
        assert_eq!(h.tracker.tracked_actors(), 1);
    }

    #[test]
    fn kit_change_mid_match_starts_fresh_window() {
        let h = harness();
        let a = Uuid::new_v4();
        enter(&h, a, LifecycleState::InMatch);

        assert!(h.tracker.can_hit(a, "slow"));
        h.clock.advance(900);
        h.gate.on_kit_change(a);

        assert_eq!(h.tracker.remaining_cooldown(a, "fast"), 250);
        h.clock.advance(250);
        assert!(h.tracker.can_hit(a, "fast"));
    }

    #[test]
    fn kit_change_before_first_hit_keeps_actor_ready() {
        let h = harness();
        let a = Uuid::new_v4();
        enter(&h, a, LifecycleState::InMatch);

        h.gate.on_kit_change(a);
        assert_eq!(h.tracker.tracked_actors(), 0);
        assert!(h.tracker.can_hit(a, "slow"));
    }

    #[test]
    fn kit_change_outside_match_makes_actor_ready() {
        let h = harness();
        let a = Uuid::new_v4();
        enter(&h, a, LifecycleState::Lobby);
        h.tracker.touch(a);

        h.gate.on_kit_change(a);
        assert_eq!(h.tracker.tracked_actors(), 0);
    }

    #[test]
    fn use_routes_to_collaborators() {
        let h = harness();
        let mut notices = h.router.subscribe();
        let a = Uuid::new_v4();

        enter(&h, a, LifecycleState::Lobby);
        assert!(h.gate.on_use(a, Affordance::Menu));
        assert!(h.gate.on_use(a, Affordance::Settings));
        assert!(!h.gate.on_use(a, Affordance::Leave));

        enter(&h, a, LifecycleState::Queued);
        assert!(h.gate.on_use(a, Affordance::Leave));

        enter(&h, a, LifecycleState::Spectating);
        assert!(h.gate.on_use(a, Affordance::Leave));

        enter(&h, a, LifecycleState::InMatch);
        assert!(!h.gate.on_use(a, Affordance::Menu));

        let received: Vec<GateNotice> = std::iter::from_fn(|| notices.try_recv().ok()).collect();
        assert_eq!(
            received,
            vec![
                GateNotice::OpenMenu { actor_id: a },
                GateNotice::OpenSettings { actor_id: a },
                GateNotice::LeaveQueue { actor_id: a },
                GateNotice::LeaveSpectate { actor_id: a },
            ]
        );
    }

    #[test]
    fn forget_revokes_held_items() {
        let h = harness();
        let a = Uuid::new_v4();
        enter(&h, a, LifecycleState::Lobby);

        h.gate.forget(a);
        assert!(h.held.held(a).is_empty());
        assert_eq!(h.held.len(), 0);
    }
}
