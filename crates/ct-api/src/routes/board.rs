//! Kanban board endpoints.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::dto::{
    BoardQuery, BoardResponse, HistoryEntryResponse, MoveTicketRequest, MoveTicketResponse,
    TicketResponse,
};
use crate::error::ApiError;
use crate::session::Session;
use crate::state::AppState;
use ct_core::store::MAX_PAGE_SIZE;
use ct_core::{
    apply_transition, column_status, group_by_status, on_move, visible_columns, Capability,
    Pagination, TicketEvent, TicketFilter, TicketStatus,
};

/// Creates board routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_board))
        .route("/move", post(move_ticket))
}

/// Get the board for the calling session.
///
/// Columns follow the session's role layout unless a status filter is
/// supplied; tickets are grouped into the visible columns, newest first
/// within each column.
#[utoipa::path(
    get,
    path = "/api/board",
    params(
        ("status" = Option<String>, Query, description = "Restrict to these statuses (comma-separated)"),
        ("technician" = Option<u64>, Query, description = "Filter tickets by assigned technician id"),
        ("building" = Option<u64>, Query, description = "Filter tickets by building id")
    ),
    responses(
        (status = 200, description = "The visible board", body = BoardResponse),
        (status = 400, description = "Unknown status in filter"),
        (status = 401, description = "Missing or invalid identity headers"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Board"
)]
async fn get_board(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<BoardQuery>,
) -> Result<Json<BoardResponse>, ApiError> {
    let columns = visible_columns(session.role, query.status.as_deref())?;

    // Only fetch tickets that can land in a visible column.
    let statuses: Vec<TicketStatus> = columns
        .iter()
        .filter_map(|column| column_status(column.key).ok())
        .collect();

    let filter = TicketFilter {
        status: Some(statuses),
        technician_id: query.technician,
        tenant_id: None,
        building_id: query.building,
        category: None,
        query: None,
    };

    let pagination = Pagination::new(1, MAX_PAGE_SIZE);
    let tickets = state.store.list(&filter, &pagination).await?;

    let view = group_by_status(&tickets, &columns);
    Ok(Json(BoardResponse::from(view)))
}

/// Move a ticket between board columns.
///
/// Dropping a ticket on the column it came from is a no-op and answers with
/// `moved: false`; every other drop runs the full transition flow.
#[utoipa::path(
    post,
    path = "/api/board/move",
    request_body = MoveTicketRequest,
    responses(
        (status = 200, description = "Move processed", body = MoveTicketResponse),
        (status = 400, description = "Unknown column key"),
        (status = 401, description = "Missing or invalid identity headers"),
        (status = 403, description = "Session may not drag tickets"),
        (status = 404, description = "Ticket not found"),
        (status = 409, description = "Transition not in the state table"),
        (status = 422, description = "Justification comment required"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Board"
)]
async fn move_ticket(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<MoveTicketRequest>,
) -> Result<Json<MoveTicketResponse>, ApiError> {
    request.validate()?;

    let mut ticket = state
        .store
        .get(request.ticket_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Ticket {} not found", request.ticket_id)))?;

    if !session.has(Capability::MoveTicketByDrag) {
        state.metrics.record_transition_rejected("forbidden");
        return Err(ApiError::Forbidden(format!(
            "Role '{}' may not drag tickets on the board",
            session.role
        )));
    }

    let comment = request.comment.as_deref().unwrap_or("");

    let transition = match on_move(
        &ticket,
        &request.source_column,
        &request.target_column,
        comment,
    ) {
        Ok(transition) => transition,
        Err(err) => {
            state.metrics.record_transition_rejected(err.code());
            return Err(err.into());
        }
    };

    let Some(transition) = transition else {
        return Ok(Json(MoveTicketResponse {
            moved: false,
            ticket: TicketResponse::from(ticket),
            history_entry: None,
        }));
    };

    let actor = session.audit_identity();
    let entry = apply_transition(&mut ticket, transition.to, comment, &actor)?;

    // One status write, then one history append.
    state.store.update_status(ticket.id, transition.to).await?;
    state.store.append_history(ticket.id, entry.clone()).await?;

    state
        .metrics
        .record_transition(transition.from.as_str(), transition.to.as_str());
    state.metrics.record_history_appended(&entry.action);
    if transition.to == TicketStatus::Resolved {
        state.metrics.record_ticket_resolved(ticket.id).await;
    }

    state
        .event_bus
        .publish_with_fallback(TicketEvent::StatusChanged {
            ticket_id: ticket.id,
            old_status: transition.from,
            new_status: transition.to,
            actor,
        })
        .await;

    Ok(Json(MoveTicketResponse {
        moved: true,
        ticket: TicketResponse::from(ticket),
        history_entry: Some(HistoryEntryResponse::from(entry)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use chrono::Utc;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::session::{ACTOR_ID_HEADER, ACTOR_NAME_HEADER, ACTOR_ROLE_HEADER};
    use ct_core::{
        EventBus, MemoryBuildingDirectory, MemoryTechnicianDirectory, MemoryTicketStore, Ticket,
    };

    fn create_test_ticket(id: u64, status: TicketStatus, technician_id: Option<u64>) -> Ticket {
        let now = Utc::now();
        Ticket {
            id,
            code: format!("TCK-2024-{id:04}"),
            status,
            summary: "Hallway light flickering".to_string(),
            category: "electrical".to_string(),
            tenant_id: 40 + id,
            tenant_name: "Jonas Weber".to_string(),
            technician_id,
            device: Some("light fixture".to_string()),
            building_id: if id % 2 == 0 { 2 } else { 1 },
            apartment: "3C".to_string(),
            reported_at: now,
            updated_at: now,
            history: Vec::new(),
        }
    }

    fn create_test_router(tickets: Vec<Ticket>) -> (Router, AppState) {
        let state = AppState::new(
            Arc::new(MemoryTicketStore::with_tickets(tickets)),
            Arc::new(MemoryTechnicianDirectory::default()),
            Arc::new(MemoryBuildingDirectory::default()),
            EventBus::new(100),
        );
        let router = Router::new()
            .nest("/api/board", routes())
            .with_state(state.clone());
        (router, state)
    }

    fn authed(method: &str, uri: &str, role: &str, actor_id: u64) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(ACTOR_ID_HEADER, actor_id.to_string())
            .header(ACTOR_NAME_HEADER, "Test User")
            .header(ACTOR_ROLE_HEADER, role)
    }

    async fn read_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).expect("Failed to parse response")
    }

    fn column_keys(board: &serde_json::Value) -> Vec<String> {
        board["columns"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["key"].as_str().unwrap().to_string())
            .collect()
    }

    // ==============================================
    // Board View Tests
    // ==============================================

    #[tokio::test]
    async fn test_member_board_has_six_columns() {
        let (app, _state) = create_test_router(vec![
            create_test_ticket(1, TicketStatus::Open, None),
            create_test_ticket(2, TicketStatus::Closed, Some(4)),
        ]);

        let response = app
            .oneshot(
                authed("GET", "/api/board", "member", 30)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let board = read_json(response).await;
        assert_eq!(
            column_keys(&board),
            vec!["open", "in_progress", "resolved", "closed", "cancelled", "reopened"]
        );
        assert_eq!(board["total_tickets"], 2);
    }

    #[tokio::test]
    async fn test_technical_board_collects_open_under_recents() {
        let (app, _state) = create_test_router(vec![
            create_test_ticket(1, TicketStatus::Open, None),
            create_test_ticket(2, TicketStatus::Closed, Some(4)),
            create_test_ticket(3, TicketStatus::InProgress, Some(4)),
        ]);

        let response = app
            .oneshot(
                authed("GET", "/api/board", "technical", 4)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let board = read_json(response).await;
        assert_eq!(
            column_keys(&board),
            vec!["recents", "in_progress", "resolved", "reopened"]
        );

        let recents = &board["columns"][0];
        assert_eq!(recents["label"], "Recents");
        assert_eq!(recents["tickets"].as_array().unwrap().len(), 1);
        assert_eq!(recents["tickets"][0]["status"], "open");

        // The closed ticket has no visible column in this layout.
        assert_eq!(board["total_tickets"], 2);
    }

    #[tokio::test]
    async fn test_status_filter_overrides_role_layout() {
        let (app, _state) =
            create_test_router(vec![create_test_ticket(1, TicketStatus::Closed, Some(4))]);

        let response = app
            .oneshot(
                authed("GET", "/api/board?status=closed,open", "technical", 4)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let board = read_json(response).await;
        // Canonical order, not input order.
        assert_eq!(column_keys(&board), vec!["open", "closed"]);
        assert_eq!(board["columns"][1]["tickets"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_status_filter_is_bad_request() {
        let (app, _state) = create_test_router(Vec::new());

        let response = app
            .oneshot(
                authed("GET", "/api/board?status=archived", "member", 30)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_board_filters_by_technician_and_building() {
        let (app, _state) = create_test_router(vec![
            create_test_ticket(1, TicketStatus::InProgress, Some(4)), // building 1
            create_test_ticket(2, TicketStatus::InProgress, Some(4)), // building 2
            create_test_ticket(3, TicketStatus::InProgress, Some(7)), // building 1
        ]);

        let response = app
            .oneshot(
                authed("GET", "/api/board?technician=4&building=1", "technical", 4)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let board = read_json(response).await;
        assert_eq!(board["total_tickets"], 1);
        assert_eq!(board["columns"][1]["tickets"][0]["id"], 1);
    }

    // ==============================================
    // Move Tests
    // ==============================================

    #[tokio::test]
    async fn test_move_runs_transition_flow() {
        let (app, state) =
            create_test_router(vec![create_test_ticket(1, TicketStatus::Open, None)]);
        let mut events = state.event_bus.subscribe_broadcast();

        let payload = serde_json::json!({
            "ticket_id": 1,
            "source_column": "recents",
            "target_column": "in_progress"
        });

        let response = app
            .oneshot(
                authed("POST", "/api/board/move", "technical", 4)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let result = read_json(response).await;
        assert_eq!(result["moved"], true);
        assert_eq!(result["ticket"]["status"], "in_progress");
        assert_eq!(result["history_entry"]["action"], "status_change_in_progress");

        let stored = state.store.get(1).await.unwrap().unwrap();
        assert_eq!(stored.status, TicketStatus::InProgress);
        assert_eq!(stored.history.len(), 1);

        let event = events.recv().await.unwrap();
        assert_eq!(event.event_type(), "status_changed");
    }

    #[tokio::test]
    async fn test_same_column_drop_is_a_noop() {
        let (app, state) =
            create_test_router(vec![create_test_ticket(1, TicketStatus::Open, None)]);

        // recents and open name the same status.
        let payload = serde_json::json!({
            "ticket_id": 1,
            "source_column": "recents",
            "target_column": "open"
        });

        let response = app
            .oneshot(
                authed("POST", "/api/board/move", "technical", 4)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let result = read_json(response).await;
        assert_eq!(result["moved"], false);
        assert!(result.get("history_entry").is_none());

        let stored = state.store.get(1).await.unwrap().unwrap();
        assert!(stored.history.is_empty());
    }

    #[tokio::test]
    async fn test_move_to_resolved_without_comment_prompts() {
        let (app, _state) =
            create_test_router(vec![create_test_ticket(1, TicketStatus::InProgress, Some(4))]);

        let payload = serde_json::json!({
            "ticket_id": 1,
            "source_column": "in_progress",
            "target_column": "resolved"
        });

        let response = app
            .oneshot(
                authed("POST", "/api/board/move", "technical", 4)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let result = read_json(response).await;
        assert_eq!(result["code"], "MISSING_JUSTIFICATION");
        assert_eq!(result["details"]["requires_comment"], true);
    }

    #[tokio::test]
    async fn test_move_with_comment_succeeds() {
        let (app, state) =
            create_test_router(vec![create_test_ticket(1, TicketStatus::InProgress, Some(4))]);

        let payload = serde_json::json!({
            "ticket_id": 1,
            "source_column": "in_progress",
            "target_column": "resolved",
            "comment": "Swapped the ballast"
        });

        let response = app
            .oneshot(
                authed("POST", "/api/board/move", "technical", 4)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let stored = state.store.get(1).await.unwrap().unwrap();
        assert_eq!(stored.status, TicketStatus::Resolved);
        assert_eq!(stored.history[0].description, "Swapped the ballast");
    }

    #[tokio::test]
    async fn test_member_cannot_move() {
        let (app, _state) =
            create_test_router(vec![create_test_ticket(1, TicketStatus::Open, None)]);

        let payload = serde_json::json!({
            "ticket_id": 1,
            "source_column": "open",
            "target_column": "in_progress"
        });

        let response = app
            .oneshot(
                authed("POST", "/api/board/move", "member", 30)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_move_unknown_column_is_bad_request() {
        let (app, _state) =
            create_test_router(vec![create_test_ticket(1, TicketStatus::Open, None)]);

        let payload = serde_json::json!({
            "ticket_id": 1,
            "source_column": "open",
            "target_column": "archive"
        });

        let response = app
            .oneshot(
                authed("POST", "/api/board/move", "technical", 4)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_move_missing_ticket_is_not_found() {
        let (app, _state) = create_test_router(Vec::new());

        let payload = serde_json::json!({
            "ticket_id": 42,
            "source_column": "open",
            "target_column": "in_progress"
        });

        let response = app
            .oneshot(
                authed("POST", "/api/board/move", "technical", 4)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
