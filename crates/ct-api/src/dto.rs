//! Data Transfer Objects (DTOs) for API requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use ct_core::{
    BoardColumn, BoardView, Capability, HistoryEntry, NewTicket, Role, SessionContext, Ticket,
    TransitionTrigger,
};

// ============================================================================
// Ticket DTOs
// ============================================================================

/// Response for a single ticket.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TicketResponse {
    pub id: u64,
    pub code: String,
    pub status: String,
    pub summary: String,
    pub category: String,
    pub tenant_id: u64,
    pub tenant_name: String,
    pub technician_id: Option<u64>,
    pub device: Option<String>,
    pub building_id: u64,
    pub apartment: String,
    pub reported_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Ticket> for TicketResponse {
    fn from(ticket: Ticket) -> Self {
        Self {
            id: ticket.id,
            code: ticket.code,
            status: ticket.status.as_str().to_string(),
            summary: ticket.summary,
            category: ticket.category,
            tenant_id: ticket.tenant_id,
            tenant_name: ticket.tenant_name,
            technician_id: ticket.technician_id,
            device: ticket.device,
            building_id: ticket.building_id,
            apartment: ticket.apartment,
            reported_at: ticket.reported_at,
            updated_at: ticket.updated_at,
        }
    }
}

/// Detailed ticket response including full history and the next moves.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TicketDetailResponse {
    #[serde(flatten)]
    pub ticket: TicketResponse,
    /// Append-only history, oldest first.
    pub history: Vec<HistoryEntryResponse>,
    /// Statuses this ticket may move to next.
    pub allowed_transitions: Vec<AllowedTransition>,
}

/// History entry in response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntryResponse {
    pub id: Uuid,
    pub action: String,
    pub description: String,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}

impl From<HistoryEntry> for HistoryEntryResponse {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            id: entry.id,
            action: entry.action,
            description: entry.description,
            actor: entry.actor,
            timestamp: entry.timestamp,
        }
    }
}

/// Request to report a new ticket.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTicketRequest {
    /// Short description of the issue.
    #[validate(length(min = 3, max = 200))]
    pub summary: String,
    /// Free-text category (plumbing, electrical, ...).
    #[validate(length(min = 1, max = 64))]
    pub category: String,
    /// Reporting tenant id.
    pub tenant_id: u64,
    /// Reporting tenant display name.
    #[validate(length(min = 1, max = 120))]
    pub tenant_name: String,
    /// Affected device label.
    pub device: Option<String>,
    /// Building the issue belongs to.
    pub building_id: u64,
    /// Apartment label within the building.
    #[validate(length(min = 1, max = 32))]
    pub apartment: String,
}

impl CreateTicketRequest {
    pub fn into_new_ticket(self) -> NewTicket {
        NewTicket {
            summary: self.summary,
            category: self.category,
            tenant_id: self.tenant_id,
            tenant_name: self.tenant_name,
            device: self.device,
            building_id: self.building_id,
            apartment: self.apartment,
        }
    }
}

/// Query parameters for listing tickets.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct ListTicketsQuery {
    /// Filter by status (comma-separated).
    pub status: Option<String>,
    /// Filter by building id.
    pub building: Option<u64>,
    /// Filter by assigned technician id.
    pub technician: Option<u64>,
    /// Free-text search over code, summary, and apartment.
    pub q: Option<String>,
    /// Page number (1-indexed).
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    /// Items per page.
    #[validate(range(min = 1, max = 200))]
    pub per_page: Option<u32>,
}

/// Paginated list response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationInfo,
}

/// Pagination metadata.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginationInfo {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

// ============================================================================
// Transition DTOs
// ============================================================================

/// Request to move a ticket to a new status from the detail view.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TransitionTicketRequest {
    /// Requested status (snake_case wire form).
    #[validate(length(min = 1, max = 32))]
    pub target_status: String,
    /// Justification comment; mandatory for resolved/closed/cancelled.
    pub comment: Option<String>,
    /// How the move was initiated (`drag` or `button`).
    pub trigger: TransitionTrigger,
}

/// One allowed next status for a ticket.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AllowedTransition {
    /// Target status.
    pub status: String,
    /// Whether moving there requires a justification comment.
    pub requires_comment: bool,
}

/// Response for the transition options of a ticket.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransitionOptionsResponse {
    pub ticket_id: u64,
    pub current_status: String,
    /// The allowed next statuses with their comment requirements.
    pub transitions: Vec<AllowedTransition>,
    /// Whether this session may drag the ticket on the board.
    pub can_move_by_drag: bool,
    /// Whether this session may use the detail-view action buttons.
    pub can_move_by_button: bool,
}

/// Response after a successful transition.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransitionResponse {
    pub ticket: TicketResponse,
    /// The history entry the transition appended.
    pub history_entry: HistoryEntryResponse,
}

/// Request to assign (or unassign, with `null`) a technician.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignTechnicianRequest {
    pub technician_id: Option<u64>,
}

/// Request to append a comment to the ticket history.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 2000))]
    pub body: String,
}

// ============================================================================
// Board DTOs
// ============================================================================

/// Query parameters for the board view.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct BoardQuery {
    /// Restrict to these statuses (comma-separated), overriding the role
    /// layout.
    pub status: Option<String>,
    /// Filter tickets by assigned technician id.
    pub technician: Option<u64>,
    /// Filter tickets by building id.
    pub building: Option<u64>,
}

/// Request to move a ticket between board columns.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MoveTicketRequest {
    pub ticket_id: u64,
    /// Column the ticket was dragged from.
    #[validate(length(min = 1, max = 32))]
    pub source_column: String,
    /// Column the ticket was dropped on.
    #[validate(length(min = 1, max = 32))]
    pub target_column: String,
    /// Justification comment; mandatory for resolved/closed/cancelled.
    pub comment: Option<String>,
}

/// Response after a board move.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MoveTicketResponse {
    /// False when the drop stayed in the same column (no-op).
    pub moved: bool,
    pub ticket: TicketResponse,
    /// The appended history entry, when a transition happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_entry: Option<HistoryEntryResponse>,
}

/// One board column with its tickets.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BoardColumnResponse {
    pub key: String,
    pub label: String,
    pub tickets: Vec<TicketResponse>,
}

impl From<BoardColumn> for BoardColumnResponse {
    fn from(column: BoardColumn) -> Self {
        Self {
            key: column.key.to_string(),
            label: column.label.to_string(),
            tickets: column.tickets.into_iter().map(TicketResponse::from).collect(),
        }
    }
}

/// The session's visible board.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BoardResponse {
    pub columns: Vec<BoardColumnResponse>,
    pub total_tickets: usize,
}

impl From<BoardView> for BoardResponse {
    fn from(view: BoardView) -> Self {
        let total_tickets = view.total_tickets();
        Self {
            columns: view.columns.into_iter().map(BoardColumnResponse::from).collect(),
            total_tickets,
        }
    }
}

// ============================================================================
// Session DTOs
// ============================================================================

/// The resolved session identity and capability set.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub actor_id: u64,
    pub actor_name: String,
    pub role: Role,
    pub capabilities: Vec<Capability>,
}

impl From<&SessionContext> for SessionResponse {
    fn from(session: &SessionContext) -> Self {
        let mut capabilities: Vec<Capability> = session.capabilities.iter().copied().collect();
        capabilities.sort_by_key(|c| format!("{c:?}"));
        Self {
            actor_id: session.actor_id,
            actor_name: session.actor_name.clone(),
            role: session.role,
            capabilities,
        }
    }
}

// ============================================================================
// Health DTOs
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: String,
    /// Server version.
    pub version: String,
    /// Ticket store health.
    pub store: StoreHealth,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
    /// Component details (detailed check only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<ComponentsHealth>,
}

/// Ticket store health.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StoreHealth {
    /// Whether the store answered the probe query.
    pub operational: bool,
    /// Number of tickets it currently holds.
    pub tickets: u64,
}

/// Component health details.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentsHealth {
    pub event_bus: EventBusHealth,
    pub directories: DirectoriesHealth,
}

/// Event bus health.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EventBusHealth {
    pub subscriber_count: usize,
    /// Events dropped for slow named subscribers since startup.
    pub dropped_events: u64,
    pub operational: bool,
}

/// Directory health.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DirectoriesHealth {
    pub technicians: usize,
    pub buildings: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ct_core::TicketStatus;

    fn sample_ticket() -> Ticket {
        let now = Utc::now();
        Ticket {
            id: 7,
            code: "TCK-2024-0007".to_string(),
            status: TicketStatus::InProgress,
            summary: "Dishwasher not draining".to_string(),
            category: "appliances".to_string(),
            tenant_id: 31,
            tenant_name: "Dana Ortiz".to_string(),
            technician_id: Some(4),
            device: Some("dishwasher".to_string()),
            building_id: 2,
            apartment: "5A".to_string(),
            reported_at: now,
            updated_at: now,
            history: vec![HistoryEntry::comment("Standing water reported", "member:31")],
        }
    }

    #[test]
    fn test_ticket_response_uses_wire_status() {
        let response = TicketResponse::from(sample_ticket());
        assert_eq!(response.status, "in_progress");
        assert_eq!(response.code, "TCK-2024-0007");
    }

    #[test]
    fn test_detail_response_flattens_ticket_fields() {
        let ticket = sample_ticket();
        let detail = TicketDetailResponse {
            history: ticket.history.iter().cloned().map(HistoryEntryResponse::from).collect(),
            allowed_transitions: vec![AllowedTransition {
                status: "resolved".to_string(),
                requires_comment: true,
            }],
            ticket: TicketResponse::from(ticket),
        };

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["code"], "TCK-2024-0007");
        assert_eq!(json["history"][0]["action"], "comment");
        assert_eq!(json["allowed_transitions"][0]["requires_comment"], true);
    }

    #[test]
    fn test_transition_request_parses_trigger() {
        let request: TransitionTicketRequest = serde_json::from_str(
            r#"{"target_status": "resolved", "comment": "Cleared the trap", "trigger": "button"}"#,
        )
        .unwrap();
        assert_eq!(request.trigger, TransitionTrigger::Button);
        assert_eq!(request.target_status, "resolved");
    }

    #[test]
    fn test_create_request_validation() {
        let request = CreateTicketRequest {
            summary: "ab".to_string(),
            category: "plumbing".to_string(),
            tenant_id: 31,
            tenant_name: "Dana Ortiz".to_string(),
            device: None,
            building_id: 2,
            apartment: "5A".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_session_response_sorts_capabilities() {
        let session = SessionContext::new(1, "Priya Nair", Role::SuperAdmin);
        let response = SessionResponse::from(&session);
        assert_eq!(response.capabilities.len(), 4);

        let mut sorted = response.capabilities.clone();
        sorted.sort_by_key(|c| format!("{c:?}"));
        assert_eq!(response.capabilities, sorted);
    }
}
