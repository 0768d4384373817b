//! HTTP route definitions

use std::time::Duration;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::combat::{AttackCounters, EventOutcome, GameEvent};
use crate::http::middleware::{admin_rate_limit, require_admin, require_host, AuthenticatedOperator};
use crate::lifecycle::{Affordance, KitSource, LifecycleSource, LifecycleState};
use crate::store::{HitDelayProfile, LoadSummary, ProfileError};
use crate::util::time::uptime_secs;

/// Upper bound for any single request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new().route("/health", get(health_handler));

    // Operator routes (admin role)
    let admin_routes = Router::new()
        .route("/admin/profiles", get(list_profiles_handler).post(add_profile_handler))
        .route(
            "/admin/profiles/:name",
            get(get_profile_handler)
                .patch(update_profile_handler)
                .delete(remove_profile_handler),
        )
        .route("/admin/reload", post(reload_profiles_handler))
        .route("/admin/cooldowns", delete(clear_cooldowns_handler))
        .route("/admin/cooldowns/:actor_id", delete(reset_cooldown_handler))
        .route("/admin/actors/:actor_id", get(actor_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), admin_rate_limit));

    // Game host routes (host role); every attack must reach the cooldown gate
    let host_routes = Router::new()
        .route("/events", post(event_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_host));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .merge(host_routes)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    profiles: usize,
    tracked_actors: usize,
    actors: ActorCounts,
    attacks: AttackCounters,
}

#[derive(Serialize)]
struct ActorCounts {
    connected: usize,
    equipped: usize,
    holding_affordances: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        profiles: state.profiles.len(),
        tracked_actors: state.tracker.tracked_actors(),
        actors: ActorCounts {
            connected: state.lifecycle.len(),
            equipped: state.kits.len(),
            holding_affordances: state.held.len(),
        },
        attacks: state.pipeline.counters(),
    })
}

// ============================================================================
// Profile endpoints
// ============================================================================

#[derive(Serialize)]
struct ProfileListResponse {
    profiles: Vec<HitDelayProfile>,
}

async fn list_profiles_handler(State(state): State<AppState>) -> Json<ProfileListResponse> {
    let mut profiles: Vec<HitDelayProfile> = state.profiles.snapshot().into_values().collect();
    profiles.sort_by(|a, b| a.name().cmp(b.name()));

    Json(ProfileListResponse { profiles })
}

async fn get_profile_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<HitDelayProfile>, AppError> {
    state
        .profiles
        .get(&name)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Unknown profile: {}", name)))
}

#[derive(Deserialize)]
struct AddProfileRequest {
    name: String,
    #[serde(default, rename = "hitDelay", alias = "delayMillis")]
    hit_delay: Option<u64>,
    #[serde(default)]
    enabled: Option<bool>,
}

async fn add_profile_handler(
    State(state): State<AppState>,
    Extension(operator): Extension<AuthenticatedOperator>,
    Json(req): Json<AddProfileRequest>,
) -> Result<(StatusCode, Json<HitDelayProfile>), AppError> {
    // Omitted delay inherits the current default profile's
    let delay = req
        .hit_delay
        .unwrap_or_else(|| state.profiles.get_default().delay_millis);
    let profile = HitDelayProfile::new(req.name, delay, req.enabled.unwrap_or(true))?;

    info!(operator = %operator.claims.sub, profile = %profile.name(), "Adding hit-delay profile");
    let profiles = state.profiles.clone();
    let added = profile.clone();
    run_blocking(move || profiles.add(added)).await??;

    Ok((StatusCode::CREATED, Json(profile)))
}

#[derive(Deserialize)]
struct UpdateProfileRequest {
    #[serde(default, rename = "hitDelay", alias = "delayMillis")]
    hit_delay: Option<u64>,
    #[serde(default)]
    enabled: Option<bool>,
}

async fn update_profile_handler(
    State(state): State<AppState>,
    Extension(operator): Extension<AuthenticatedOperator>,
    Path(name): Path<String>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<HitDelayProfile>, AppError> {
    let updated = state
        .profiles
        .update_profile(&name, req.hit_delay, req.enabled)?;

    let profiles = state.profiles.clone();
    run_blocking(move || profiles.save()).await??;

    info!(operator = %operator.claims.sub, profile = %name, "Updated hit-delay profile");
    Ok(Json(updated))
}

async fn remove_profile_handler(
    State(state): State<AppState>,
    Extension(operator): Extension<AuthenticatedOperator>,
    Path(name): Path<String>,
) -> Result<Json<HitDelayProfile>, AppError> {
    let profiles = state.profiles.clone();
    let target = name.clone();
    let removed = run_blocking(move || profiles.remove(&target)).await??;
    info!(operator = %operator.claims.sub, profile = %name, "Removed hit-delay profile");
    Ok(Json(removed))
}

async fn reload_profiles_handler(
    State(state): State<AppState>,
    Extension(operator): Extension<AuthenticatedOperator>,
) -> Result<Json<LoadSummary>, AppError> {
    let profiles = state.profiles.clone();
    let summary = run_blocking(move || profiles.load()).await?;
    info!(operator = %operator.claims.sub, loaded = summary.loaded, "Reloaded hit-delay profiles");
    Ok(Json(summary))
}

/// Run profile storage I/O on the blocking pool, away from the event path
async fn run_blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("Profile storage task failed: {}", e)))
}

// ============================================================================
// Cooldown and actor endpoints
// ============================================================================

#[derive(Serialize)]
struct ClearResponse {
    cleared: usize,
}

async fn clear_cooldowns_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let cleared = state.tracker.tracked_actors();
    state.tracker.clear_all();
    Json(ClearResponse { cleared })
}

async fn reset_cooldown_handler(
    State(state): State<AppState>,
    Path(actor_id): Path<Uuid>,
) -> StatusCode {
    state.tracker.reset(actor_id);
    StatusCode::NO_CONTENT
}

#[derive(Serialize)]
struct ActorResponse {
    actor_id: Uuid,
    state: Option<LifecycleState>,
    profile: Option<String>,
    affordances: Vec<Affordance>,
    remaining_ms: u64,
}

async fn actor_handler(
    State(state): State<AppState>,
    Path(actor_id): Path<Uuid>,
) -> Json<ActorResponse> {
    let profile = state.kits.hit_delay_profile(actor_id);
    let remaining_ms = state
        .tracker
        .remaining_cooldown(actor_id, profile.as_deref().unwrap_or_default());

    Json(ActorResponse {
        actor_id,
        state: state.lifecycle.state_of(actor_id),
        profile,
        affordances: state.held.held(actor_id),
        remaining_ms,
    })
}

// ============================================================================
// Event endpoint
// ============================================================================

async fn event_handler(
    State(state): State<AppState>,
    Json(event): Json<GameEvent>,
) -> Json<EventOutcome> {
    Json(state.pipeline.dispatch(event))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::InvalidName => AppError::BadRequest(err.to_string()),
            ProfileError::NotFound(_) => AppError::NotFound(err.to_string()),
            ProfileError::Protected(_) => AppError::Conflict(err.to_string()),
            ProfileError::Persist(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::http::middleware::{sign_jwt, OperatorClaims, ADMIN_ROLE, HOST_ROLE};
    use crate::util::rate_limit::ADMIN_RATE_LIMIT;
    use crate::store::storage::MemoryStorage;
    use crate::util::time::ManualClock;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use std::path::PathBuf;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct Harness {
        state: AppState,
        storage: Arc<MemoryStorage>,
        clock: Arc<ManualClock>,
    }

    fn harness() -> Harness {
        let storage = Arc::new(MemoryStorage::default());
        let clock = Arc::new(ManualClock::new(0));
        let state = AppState::with_parts(
            Config::for_tests(PathBuf::from("unused.json")),
            storage.clone(),
            clock.clone(),
        );
        Harness {
            state,
            storage,
            clock,
        }
    }

    fn token(role: &str) -> String {
        let now = chrono::Utc::now().timestamp() as u64;
        sign_jwt(
            &OperatorClaims {
                sub: "tester".to_string(),
                role: role.to_string(),
                exp: now + 300,
                iat: now,
            },
            "test-secret",
        )
    }

    async fn send(
        state: &AppState,
        method: Method,
        uri: &str,
        role: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(role) = role {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(role)));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = build_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_is_public() {
        let h = harness();
        let (status, body) = send(&h.state, Method::GET, "/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["profiles"], 4);
        assert_eq!(body["tracked_actors"], 0);
    }

    #[tokio::test]
    async fn admin_routes_require_admin_role() {
        let h = harness();

        let (status, _) = send(&h.state, Method::GET, "/admin/profiles", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) =
            send(&h.state, Method::GET, "/admin/profiles", Some(HOST_ROLE), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) =
            send(&h.state, Method::GET, "/admin/profiles", Some(ADMIN_ROLE), None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body["profiles"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["combo", "default", "fast", "slow"]);
    }

    #[tokio::test]
    async fn add_update_and_remove_profile() {
        let h = harness();

        let (status, body) = send(
            &h.state,
            Method::POST,
            "/admin/profiles",
            Some(ADMIN_ROLE),
            Some(serde_json::json!({ "name": "spear", "hitDelay": 600 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["hitDelay"], 600);
        assert_eq!(body["enabled"], true);

        let (status, body) = send(
            &h.state,
            Method::PATCH,
            "/admin/profiles/spear",
            Some(ADMIN_ROLE),
            Some(serde_json::json!({ "enabled": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enabled"], false);
        assert_eq!(body["hitDelay"], 600);
        assert!(h.storage.contents().unwrap().contains("spear"));

        let (status, _) = send(
            &h.state,
            Method::DELETE,
            "/admin/profiles/spear",
            Some(ADMIN_ROLE),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(!h.state.profiles.exists("spear"));
    }

    #[tokio::test]
    async fn profile_errors_map_to_statuses() {
        let h = harness();

        let (status, _) = send(
            &h.state,
            Method::POST,
            "/admin/profiles",
            Some(ADMIN_ROLE),
            Some(serde_json::json!({ "name": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &h.state,
            Method::DELETE,
            "/admin/profiles/default",
            Some(ADMIN_ROLE),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &h.state,
            Method::PATCH,
            "/admin/profiles/ghost",
            Some(ADMIN_ROLE),
            Some(serde_json::json!({ "hitDelay": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn persist_failure_reports_error_but_keeps_change() {
        let h = harness();
        h.storage.set_fail_writes(true);

        let (status, body) = send(
            &h.state,
            Method::POST,
            "/admin/profiles",
            Some(ADMIN_ROLE),
            Some(serde_json::json!({ "name": "club", "hitDelay": 900 })),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("not saved"));
        assert!(h.state.profiles.exists("club"));
    }

    #[tokio::test]
    async fn host_events_gate_attacks() {
        let h = harness();
        let actor = Uuid::new_v4();

        for event in [
            serde_json::json!({ "type": "state_changed", "actor_id": actor, "state": "in_match" }),
            serde_json::json!({ "type": "kit_changed", "actor_id": actor, "profile": "fast" }),
        ] {
            let (status, _) =
                send(&h.state, Method::POST, "/events", Some(HOST_ROLE), Some(event)).await;
            assert_eq!(status, StatusCode::OK);
        }

        h.clock.advance(250);
        let attack = serde_json::json!({ "type": "attack", "actor_id": actor });
        let (_, body) =
            send(&h.state, Method::POST, "/events", Some(HOST_ROLE), Some(attack.clone())).await;
        assert_eq!(body, serde_json::json!({ "outcome": "allowed" }));

        let (_, body) =
            send(&h.state, Method::POST, "/events", Some(HOST_ROLE), Some(attack)).await;
        assert_eq!(
            body,
            serde_json::json!({ "outcome": "denied", "remaining_ms": 250 })
        );

        let (status, body) = send(
            &h.state,
            Method::GET,
            &format!("/admin/actors/{}", actor),
            Some(ADMIN_ROLE),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "in_match");
        assert_eq!(body["profile"], "fast");
        assert_eq!(body["remaining_ms"], 250);

        let (status, _) = send(
            &h.state,
            Method::DELETE,
            &format!("/admin/cooldowns/{}", actor),
            Some(ADMIN_ROLE),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(h.state.tracker.tracked_actors(), 0);
    }

    #[tokio::test]
    async fn attack_events_bypass_the_admin_rate_limit() {
        let storage = Arc::new(MemoryStorage::default());
        let mut config = Config::for_tests(PathBuf::from("unused.json"));
        config.admin_rate_limit = ADMIN_RATE_LIMIT;
        let state = AppState::with_parts(config, storage, Arc::new(ManualClock::new(0)));

        let attempts = ADMIN_RATE_LIMIT * 2;
        for _ in 0..attempts {
            let attack = serde_json::json!({ "type": "attack", "actor_id": Uuid::new_v4() });
            let (status, body) =
                send(&state, Method::POST, "/events", Some(HOST_ROLE), Some(attack)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, serde_json::json!({ "outcome": "allowed" }));
        }
        assert_eq!(state.pipeline.counters().allowed, u64::from(attempts));
    }

    #[tokio::test]
    async fn admin_routes_are_rate_limited() {
        let storage = Arc::new(MemoryStorage::default());
        let mut config = Config::for_tests(PathBuf::from("unused.json"));
        config.admin_rate_limit = 2;
        let state = AppState::with_parts(config, storage, Arc::new(ManualClock::new(0)));

        let mut statuses = Vec::new();
        for _ in 0..3 {
            let (status, _) =
                send(&state, Method::GET, "/admin/profiles", Some(ADMIN_ROLE), None).await;
            statuses.push(status);
        }
        assert_eq!(statuses[2], StatusCode::TOO_MANY_REQUESTS);

        let (status, _) = send(&state, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn patch_updates_delay_and_flag_together() {
        let h = harness();
        let writes = h.storage.write_count();

        let (status, body) = send(
            &h.state,
            Method::PATCH,
            "/admin/profiles/slow",
            Some(ADMIN_ROLE),
            Some(serde_json::json!({ "hitDelay": 1500, "enabled": false })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hitDelay"], 1500);
        assert_eq!(body["enabled"], false);
        assert_eq!(h.storage.write_count(), writes + 1);

        let saved = h.storage.contents().unwrap();
        assert!(saved.contains("1500"));
    }

    #[tokio::test]
    async fn events_require_host_role() {
        let h = harness();
        let attack = serde_json::json!({ "type": "attack", "actor_id": Uuid::new_v4() });

        let (status, _) =
            send(&h.state, Method::POST, "/events", Some(ADMIN_ROLE), Some(attack)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn clear_cooldowns_reports_count() {
        let h = harness();
        h.state.tracker.touch(Uuid::new_v4());
        h.state.tracker.touch(Uuid::new_v4());

        let (status, body) = send(
            &h.state,
            Method::DELETE,
            "/admin/cooldowns",
            Some(ADMIN_ROLE),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cleared"], 2);
        assert_eq!(h.state.tracker.tracked_actors(), 0);
    }

    #[tokio::test]
    async fn reload_returns_summary() {
        let h = harness();
        let (status, body) = send(
            &h.state,
            Method::POST,
            "/admin/reload",
            Some(ADMIN_ROLE),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["loaded"], 4);
        assert_eq!(body["seeded"], false);
    }
}
