//! Session introspection endpoint.

use axum::{routing::get, Json, Router};

use crate::dto::SessionResponse;
use crate::session::Session;
use crate::state::AppState;

/// Creates session routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(current_session))
}

/// Get the resolved identity and capability set for the calling session.
#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "Resolved session", body = SessionResponse),
        (status = 401, description = "Missing or invalid identity headers")
    ),
    tag = "Session"
)]
async fn current_session(session: Session) -> Json<SessionResponse> {
    Json(SessionResponse::from(&*session))
}
