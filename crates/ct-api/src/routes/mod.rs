//! API routes.

pub mod analytics;
pub mod board;
pub mod health;
pub mod metrics;
pub mod session;
pub mod tickets;

use crate::state::AppState;
use axum::Router;

/// Assembles the full route tree.
///
/// Everything ticket-facing lives under `/api/v1`; the bare `/api` prefix
/// serves the same routes for clients that predate versioning. Health and
/// metrics stay unprefixed for probes and scrapers.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .nest("/api", api_routes())
        .merge(health::routes())
        .merge(metrics::routes())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/tickets", tickets::routes())
        .nest("/board", board::routes())
        .nest("/analytics", analytics::routes())
        .nest("/session", session::routes())
}
