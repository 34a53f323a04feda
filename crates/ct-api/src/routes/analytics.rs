//! Analytics endpoints for the KPI dashboard.

use axum::{extract::State, routing::get, Json, Router};

use crate::error::ApiError;
use crate::session::Session;
use crate::state::AppState;
use ct_core::store::MAX_PAGE_SIZE;
use ct_core::{
    compute_dashboard, Capability, DashboardSnapshot, Pagination, TechnicianMetrics, Ticket,
    TicketFilter,
};

/// Creates analytics routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/technicians", get(technician_metrics))
}

/// Get the full dashboard snapshot.
#[utoipa::path(
    get,
    path = "/api/analytics/dashboard",
    responses(
        (status = 200, description = "Dashboard snapshot", body = DashboardSnapshot),
        (status = 401, description = "Missing or invalid identity headers"),
        (status = 403, description = "Session may not view the dashboard"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Analytics"
)]
async fn dashboard(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<DashboardSnapshot>, ApiError> {
    require_dashboard(&session)?;

    let tickets = all_tickets(&state).await?;
    let technicians = state.technicians.list().await?;

    Ok(Json(compute_dashboard(&tickets, &technicians)))
}

/// Get per-technician performance metrics.
#[utoipa::path(
    get,
    path = "/api/analytics/technicians",
    responses(
        (status = 200, description = "Per-technician metrics", body = [TechnicianMetrics]),
        (status = 401, description = "Missing or invalid identity headers"),
        (status = 403, description = "Session may not view the dashboard"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Analytics"
)]
async fn technician_metrics(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<TechnicianMetrics>>, ApiError> {
    require_dashboard(&session)?;

    let tickets = all_tickets(&state).await?;
    let technicians = state.technicians.list().await?;

    Ok(Json(compute_dashboard(&tickets, &technicians).technicians))
}

// Helper functions

fn require_dashboard(session: &Session) -> Result<(), ApiError> {
    if session.has(Capability::ViewDashboard) {
        return Ok(());
    }
    Err(ApiError::Forbidden(format!(
        "Role '{}' may not view the dashboard",
        session.role
    )))
}

/// Drains the store page by page; the aggregation wants every ticket.
async fn all_tickets(state: &AppState) -> Result<Vec<Ticket>, ApiError> {
    let filter = TicketFilter::default();
    let mut tickets = Vec::new();
    let mut page = 1;

    loop {
        let pagination = Pagination::new(page, MAX_PAGE_SIZE);
        let batch = state.store.list(&filter, &pagination).await?;
        let last_page = (batch.len() as u32) < MAX_PAGE_SIZE;
        tickets.extend(batch);
        if last_page {
            break;
        }
        page += 1;
    }

    Ok(tickets)
}
