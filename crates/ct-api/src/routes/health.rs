//! Health and probe endpoints.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::OnceLock;
use std::time::Instant;

use ct_core::TicketFilter;

use crate::dto::{
    ComponentsHealth, DirectoriesHealth, EventBusHealth, HealthResponse, StoreHealth,
};
use crate::state::AppState;

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Records the process start for uptime reporting. Idempotent.
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

fn uptime_seconds() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/detailed", get(health_check_detailed))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
}

/// Probes the store with a count query.
async fn store_health(state: &AppState) -> StoreHealth {
    match state.store.count(&TicketFilter::default()).await {
        Ok(tickets) => StoreHealth {
            operational: true,
            tickets,
        },
        Err(_) => StoreHealth {
            operational: false,
            tickets: 0,
        },
    }
}

/// A dead store fails the check; dropped bus events only degrade it.
fn overall_status(store_operational: bool, dropped_events: u64) -> &'static str {
    match (store_operational, dropped_events) {
        (false, _) => "unhealthy",
        (true, 0) => "healthy",
        (true, _) => "degraded",
    }
}

fn health_reply(
    store: StoreHealth,
    dropped_events: u64,
    components: Option<ComponentsHealth>,
) -> (StatusCode, Json<HealthResponse>) {
    let http_status = if store.operational {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = HealthResponse {
        status: overall_status(store.operational, dropped_events).to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store,
        uptime_seconds: uptime_seconds(),
        components,
    };

    (http_status, Json(body))
}

/// Basic health summary.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System is healthy", body = HealthResponse),
        (status = 503, description = "System is unhealthy", body = HealthResponse)
    ),
    tag = "Health"
)]
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store = store_health(&state).await;
    health_reply(store, 0, None)
}

/// Health summary including event bus and directory details.
#[utoipa::path(
    get,
    path = "/health/detailed",
    responses(
        (status = 200, description = "Detailed system health", body = HealthResponse),
        (status = 503, description = "System is unhealthy", body = HealthResponse)
    ),
    tag = "Health"
)]
async fn health_check_detailed(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let store = store_health(&state).await;
    let dropped_events = state.event_bus.dropped_event_count();

    let components = ComponentsHealth {
        event_bus: EventBusHealth {
            subscriber_count: state.event_bus.subscriber_count().await,
            dropped_events,
            operational: true,
        },
        directories: DirectoriesHealth {
            technicians: state
                .technicians
                .list()
                .await
                .map(|t| t.len())
                .unwrap_or(0),
            buildings: state.buildings.list().await.map(|b| b.len()).unwrap_or(0),
        },
    };

    health_reply(store, dropped_events, Some(components))
}

/// Kubernetes readiness probe.
#[utoipa::path(
    get,
    path = "/ready",
    responses(
        (status = 200, description = "Service is ready"),
        (status = 503, description = "Service is not ready")
    ),
    tag = "Health"
)]
async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    match state.store.count(&TicketFilter::default()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Kubernetes liveness probe.
#[utoipa::path(
    get,
    path = "/live",
    responses(
        (status = 200, description = "Service is alive")
    ),
    tag = "Health"
)]
async fn liveness_check() -> StatusCode {
    StatusCode::OK
}
