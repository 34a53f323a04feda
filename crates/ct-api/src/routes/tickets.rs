//! Ticket management endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::dto::{
    AllowedTransition, AssignTechnicianRequest, CommentRequest, CreateTicketRequest,
    HistoryEntryResponse, ListTicketsQuery, PaginatedResponse, PaginationInfo,
    TicketDetailResponse, TicketResponse, TransitionOptionsResponse, TransitionResponse,
    TransitionTicketRequest,
};
use crate::error::ApiError;
use crate::session::Session;
use crate::state::AppState;
use ct_core::{
    allowed_next_statuses, apply_transition, requires_comment, HistoryEntry, Pagination, Ticket,
    TicketEvent, TicketFilter, TicketStatus, TransitionError, TransitionTrigger,
};

/// Creates ticket routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tickets).post(create_ticket))
        .route("/:id", get(get_ticket))
        .route(
            "/:id/transitions",
            get(transition_options).post(transition_ticket),
        )
        .route("/:id/assign", post(assign_technician))
        .route("/:id/comments", post(add_comment))
        .route("/:id/history", get(ticket_history))
}

/// List tickets with filtering and pagination.
#[utoipa::path(
    get,
    path = "/api/tickets",
    params(
        ("status" = Option<String>, Query, description = "Filter by status (comma-separated)"),
        ("building" = Option<u64>, Query, description = "Filter by building id"),
        ("technician" = Option<u64>, Query, description = "Filter by assigned technician id"),
        ("q" = Option<String>, Query, description = "Search over code, summary, and apartment"),
        ("page" = Option<u32>, Query, description = "Page number (1-indexed)"),
        ("per_page" = Option<u32>, Query, description = "Items per page (max 200)")
    ),
    responses(
        (status = 200, description = "List of tickets", body = PaginatedResponse<TicketResponse>),
        (status = 400, description = "Invalid query parameters"),
        (status = 401, description = "Missing or invalid identity headers"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Tickets"
)]
async fn list_tickets(
    State(state): State<AppState>,
    _session: Session,
    Query(query): Query<ListTicketsQuery>,
) -> Result<Json<PaginatedResponse<TicketResponse>>, ApiError> {
    query.validate()?;

    let filter = TicketFilter {
        status: query.status.as_deref().map(parse_statuses).transpose()?,
        technician_id: query.technician,
        tenant_id: None,
        building_id: query.building,
        category: None,
        query: query.q,
    };

    let pagination = Pagination::from_query(query.page, query.per_page);

    let tickets = state.store.list(&filter, &pagination).await?;
    let total = state.store.count(&filter).await?;

    let data: Vec<TicketResponse> = tickets.into_iter().map(TicketResponse::from).collect();

    Ok(Json(PaginatedResponse {
        data,
        pagination: PaginationInfo {
            page: pagination.page,
            per_page: pagination.per_page,
            total_items: total,
            total_pages: pagination.total_pages(total),
        },
    }))
}

/// Report a new ticket.
#[utoipa::path(
    post,
    path = "/api/tickets",
    request_body = CreateTicketRequest,
    responses(
        (status = 201, description = "Ticket reported", body = TicketResponse),
        (status = 401, description = "Missing or invalid identity headers"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Tickets"
)]
async fn create_ticket(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<TicketResponse>), ApiError> {
    request.validate()?;

    let ticket = state.store.create(request.into_new_ticket()).await?;

    state
        .metrics
        .record_ticket_reported(ticket.id, &ticket.category)
        .await;

    state
        .event_bus
        .publish_with_fallback(TicketEvent::TicketReported {
            ticket_id: ticket.id,
            code: ticket.code.clone(),
        })
        .await;

    tracing::info!(
        ticket = %ticket.code,
        reporter = %session.audit_identity(),
        category = %ticket.category,
        "Ticket reported"
    );

    Ok((StatusCode::CREATED, Json(TicketResponse::from(ticket))))
}

/// Get a single ticket with its history and allowed next moves.
#[utoipa::path(
    get,
    path = "/api/tickets/{id}",
    params(
        ("id" = u64, Path, description = "Ticket id")
    ),
    responses(
        (status = 200, description = "Ticket details", body = TicketDetailResponse),
        (status = 401, description = "Missing or invalid identity headers"),
        (status = 404, description = "Ticket not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Tickets"
)]
async fn get_ticket(
    State(state): State<AppState>,
    _session: Session,
    Path(id): Path<u64>,
) -> Result<Json<TicketDetailResponse>, ApiError> {
    let ticket = fetch_ticket(&state, id).await?;
    Ok(Json(ticket_to_detail_response(ticket)))
}

/// Get the transition options for a ticket.
///
/// Lists the statuses the ticket may move to next, whether each move needs a
/// justification comment, and whether the calling session may move the
/// ticket at all.
#[utoipa::path(
    get,
    path = "/api/tickets/{id}/transitions",
    params(
        ("id" = u64, Path, description = "Ticket id")
    ),
    responses(
        (status = 200, description = "Transition options", body = TransitionOptionsResponse),
        (status = 401, description = "Missing or invalid identity headers"),
        (status = 404, description = "Ticket not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Tickets"
)]
async fn transition_options(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<u64>,
) -> Result<Json<TransitionOptionsResponse>, ApiError> {
    let ticket = fetch_ticket(&state, id).await?;

    Ok(Json(TransitionOptionsResponse {
        ticket_id: ticket.id,
        current_status: ticket.status.as_str().to_string(),
        transitions: allowed_transitions_for(ticket.status),
        can_move_by_drag: session.can_transition(&ticket, TransitionTrigger::Drag),
        can_move_by_button: session.can_transition(&ticket, TransitionTrigger::Button),
    }))
}

/// Move a ticket to a new status.
#[utoipa::path(
    post,
    path = "/api/tickets/{id}/transitions",
    params(
        ("id" = u64, Path, description = "Ticket id")
    ),
    request_body = TransitionTicketRequest,
    responses(
        (status = 200, description = "Ticket moved", body = TransitionResponse),
        (status = 400, description = "Unknown target status"),
        (status = 401, description = "Missing or invalid identity headers"),
        (status = 403, description = "Session may not move this ticket"),
        (status = 404, description = "Ticket not found"),
        (status = 409, description = "Transition not in the state table"),
        (status = 422, description = "Justification comment required"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Tickets"
)]
async fn transition_ticket(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<u64>,
    Json(request): Json<TransitionTicketRequest>,
) -> Result<Json<TransitionResponse>, ApiError> {
    request.validate()?;

    let mut ticket = fetch_ticket(&state, id).await?;

    if !session.can_transition(&ticket, request.trigger) {
        state.metrics.record_transition_rejected("forbidden");
        return Err(ApiError::Forbidden(format!(
            "Role '{}' may not move ticket {} via {}",
            session.role,
            ticket.code,
            trigger_name(request.trigger)
        )));
    }

    let target = match TicketStatus::parse(&request.target_status) {
        Some(status) => status,
        None => {
            let err = TransitionError::InvalidStatus {
                value: request.target_status.clone(),
            };
            state.metrics.record_transition_rejected(err.code());
            return Err(err.into());
        }
    };

    let old_status = ticket.status;
    let comment = request.comment.as_deref().unwrap_or("");
    let actor = session.audit_identity();

    let entry = match apply_transition(&mut ticket, target, comment, &actor) {
        Ok(entry) => entry,
        Err(err) => {
            state.metrics.record_transition_rejected(err.code());
            return Err(err.into());
        }
    };

    // One status write, then one history append.
    state.store.update_status(id, target).await?;
    state.store.append_history(id, entry.clone()).await?;

    state
        .metrics
        .record_transition(old_status.as_str(), target.as_str());
    state.metrics.record_history_appended(&entry.action);
    if target == TicketStatus::Resolved {
        state.metrics.record_ticket_resolved(id).await;
    }

    state
        .event_bus
        .publish_with_fallback(TicketEvent::StatusChanged {
            ticket_id: id,
            old_status,
            new_status: target,
            actor,
        })
        .await;

    Ok(Json(TransitionResponse {
        ticket: TicketResponse::from(ticket),
        history_entry: HistoryEntryResponse::from(entry),
    }))
}

/// Assign or unassign a technician.
#[utoipa::path(
    post,
    path = "/api/tickets/{id}/assign",
    params(
        ("id" = u64, Path, description = "Ticket id")
    ),
    request_body = AssignTechnicianRequest,
    responses(
        (status = 200, description = "Assignment recorded", body = TicketResponse),
        (status = 400, description = "Unknown technician id"),
        (status = 401, description = "Missing or invalid identity headers"),
        (status = 403, description = "Session may not assign technicians"),
        (status = 404, description = "Ticket not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Tickets"
)]
async fn assign_technician(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<u64>,
    Json(request): Json<AssignTechnicianRequest>,
) -> Result<Json<TicketResponse>, ApiError> {
    if !session.can_assign() {
        return Err(ApiError::Forbidden(format!(
            "Role '{}' may not assign technicians",
            session.role
        )));
    }

    let mut ticket = fetch_ticket(&state, id).await?;

    if let Some(technician_id) = request.technician_id {
        state
            .technicians
            .get(technician_id)
            .await?
            .ok_or_else(|| {
                ApiError::BadRequest(format!("Unknown technician id {}", technician_id))
            })?;
    }

    let entry = ticket.record_assignment(request.technician_id, &session.audit_identity());

    state
        .store
        .assign_technician(id, request.technician_id)
        .await?;
    state.store.append_history(id, entry.clone()).await?;

    state.metrics.record_assignment();
    state.metrics.record_history_appended(&entry.action);

    state
        .event_bus
        .publish_with_fallback(TicketEvent::TechnicianAssigned {
            ticket_id: id,
            technician_id: request.technician_id,
            assigned_by: session.audit_identity(),
        })
        .await;

    tracing::info!(
        ticket = %ticket.code,
        technician = ?request.technician_id,
        assigned_by = %session.audit_identity(),
        "Technician assignment updated"
    );

    Ok(Json(TicketResponse::from(ticket)))
}

/// Append a free-text comment to the ticket history.
#[utoipa::path(
    post,
    path = "/api/tickets/{id}/comments",
    params(
        ("id" = u64, Path, description = "Ticket id")
    ),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment appended", body = HistoryEntryResponse),
        (status = 401, description = "Missing or invalid identity headers"),
        (status = 404, description = "Ticket not found"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Tickets"
)]
async fn add_comment(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<u64>,
    Json(request): Json<CommentRequest>,
) -> Result<(StatusCode, Json<HistoryEntryResponse>), ApiError> {
    request.validate()?;

    // Existence check; comments never mutate the ticket itself.
    fetch_ticket(&state, id).await?;

    let entry = HistoryEntry::comment(request.body.trim(), &session.audit_identity());
    state.store.append_history(id, entry.clone()).await?;

    state.metrics.record_history_appended(&entry.action);

    state
        .event_bus
        .publish_with_fallback(TicketEvent::CommentAdded {
            ticket_id: id,
            actor: session.audit_identity(),
        })
        .await;

    Ok((StatusCode::CREATED, Json(HistoryEntryResponse::from(entry))))
}

/// Get the ticket history, oldest first.
#[utoipa::path(
    get,
    path = "/api/tickets/{id}/history",
    params(
        ("id" = u64, Path, description = "Ticket id")
    ),
    responses(
        (status = 200, description = "History entries, oldest first", body = [HistoryEntryResponse]),
        (status = 401, description = "Missing or invalid identity headers"),
        (status = 404, description = "Ticket not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Tickets"
)]
async fn ticket_history(
    State(state): State<AppState>,
    _session: Session,
    Path(id): Path<u64>,
) -> Result<Json<Vec<HistoryEntryResponse>>, ApiError> {
    let ticket = fetch_ticket(&state, id).await?;

    Ok(Json(
        ticket
            .history
            .into_iter()
            .map(HistoryEntryResponse::from)
            .collect(),
    ))
}

// Helper functions

async fn fetch_ticket(state: &AppState, id: u64) -> Result<Ticket, ApiError> {
    state
        .store
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Ticket {} not found", id)))
}

fn ticket_to_detail_response(ticket: Ticket) -> TicketDetailResponse {
    TicketDetailResponse {
        history: ticket
            .history
            .iter()
            .cloned()
            .map(HistoryEntryResponse::from)
            .collect(),
        allowed_transitions: allowed_transitions_for(ticket.status),
        ticket: TicketResponse::from(ticket),
    }
}

fn allowed_transitions_for(status: TicketStatus) -> Vec<AllowedTransition> {
    allowed_next_statuses(status)
        .iter()
        .map(|target| AllowedTransition {
            status: target.as_str().to_string(),
            requires_comment: requires_comment(*target),
        })
        .collect()
}

fn parse_statuses(s: &str) -> Result<Vec<TicketStatus>, ApiError> {
    s.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            TicketStatus::parse(token).ok_or_else(|| {
                ApiError::from(TransitionError::InvalidStatus {
                    value: token.to_string(),
                })
            })
        })
        .collect()
}

fn trigger_name(trigger: TransitionTrigger) -> &'static str {
    match trigger {
        TransitionTrigger::Drag => "drag",
        TransitionTrigger::Button => "button",
    }
}
