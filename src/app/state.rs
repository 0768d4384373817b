//! Application state shared across routes

use std::sync::Arc;

use tracing::info;

use crate::combat::{CooldownTracker, EventPipeline};
use crate::config::Config;
use crate::lifecycle::{AffordanceGate, HeldAffordances, KitRegistry, LifecycleRegistry, NoticeRouter};
use crate::store::{JsonFileStorage, ProfileStorage, ProfileStore};
use crate::util::rate_limit::AdminRateLimiter;
use crate::util::time::{Clock, MonotonicClock};

/// Capacity of the gate notice broadcast channel
const NOTICE_CAPACITY: usize = 256;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub profiles: Arc<ProfileStore>,
    pub tracker: Arc<CooldownTracker>,
    pub lifecycle: Arc<LifecycleRegistry>,
    pub kits: Arc<KitRegistry>,
    pub held: Arc<HeldAffordances>,
    pub notices: NoticeRouter,
    pub pipeline: Arc<EventPipeline>,
    pub admin_limiter: AdminRateLimiter,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let storage = Arc::new(JsonFileStorage::new(config.profiles_path.clone()));
        Self::with_parts(config, storage, Arc::new(MonotonicClock::new()))
    }

    /// Build the service graph over the given storage and clock.
    /// Loads the profile registry before returning.
    pub fn with_parts(
        config: Config,
        storage: Arc<dyn ProfileStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = Arc::new(config);

        // Initialize profile registry
        let profiles = Arc::new(ProfileStore::new(storage.clone()));
        let summary = profiles.load();
        info!(
            location = %storage.location(),
            profiles = ?profiles.names(),
            loaded = summary.loaded,
            skipped = summary.skipped,
            seeded = summary.seeded,
            "Hit-delay profiles ready"
        );

        // Initialize cooldown tracking
        let tracker = Arc::new(CooldownTracker::new(profiles.clone(), clock));

        // Initialize lifecycle collaborators and the affordance gate
        let lifecycle = Arc::new(LifecycleRegistry::new());
        let kits = Arc::new(KitRegistry::new());
        let held = Arc::new(HeldAffordances::new());
        let notices = NoticeRouter::new(NOTICE_CAPACITY);
        let gate = Arc::new(AffordanceGate::new(
            lifecycle.clone(),
            tracker.clone(),
            held.clone(),
            Arc::new(notices.clone()),
        ));

        let pipeline = Arc::new(EventPipeline::new(
            tracker.clone(),
            gate,
            lifecycle.clone(),
            kits.clone(),
        ));

        let admin_limiter = AdminRateLimiter::new(config.admin_rate_limit);

        Self {
            config,
            profiles,
            tracker,
            lifecycle,
            kits,
            held,
            notices,
            pipeline,
            admin_limiter,
        }
    }
}
