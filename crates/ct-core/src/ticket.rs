//! Ticket data models for Caretaker.
//!
//! This module defines the core data structures used throughout the system
//! to represent maintenance tickets, their status enumeration, and the
//! append-only history attached to each ticket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A reported device/maintenance issue tracked through the status workflow.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Ticket {
    /// Numeric identifier assigned by the store.
    pub id: u64,
    /// Human-readable ticket code (e.g. `TCK-2024-0001`).
    pub code: String,
    /// Current workflow status.
    pub status: TicketStatus,
    /// Short description of the reported issue.
    pub summary: String,
    /// Free-text category (plumbing, electrical, ...).
    pub category: String,
    /// Identifier of the reporting tenant.
    pub tenant_id: u64,
    /// Display name of the reporting tenant.
    pub tenant_name: String,
    /// Assigned technician, if any.
    pub technician_id: Option<u64>,
    /// Affected device label, if known.
    pub device: Option<String>,
    /// Building the ticket belongs to.
    pub building_id: u64,
    /// Apartment label within the building.
    pub apartment: String,
    /// Timestamp when the ticket was reported.
    pub reported_at: DateTime<Utc>,
    /// Timestamp of the last update.
    pub updated_at: DateTime<Utc>,
    /// Append-only history of actions taken on this ticket.
    pub history: Vec<HistoryEntry>,
}

impl Ticket {
    /// Returns true if the ticket is assigned to the given technician.
    pub fn is_assigned_to(&self, technician_id: u64) -> bool {
        self.technician_id == Some(technician_id)
    }

    /// Sets a new status and appends the matching history entry.
    ///
    /// Returns a copy of the appended entry so callers can forward it to the
    /// store. Validity of the move is the workflow module's concern; this
    /// method only records an already-validated transition.
    pub fn record_status(
        &mut self,
        status: TicketStatus,
        description: impl Into<String>,
        actor: &str,
    ) -> HistoryEntry {
        let entry = HistoryEntry::status_change(status, description, actor);
        self.status = status;
        self.updated_at = Utc::now();
        self.history.push(entry.clone());
        entry
    }

    /// Records a technician assignment (or unassignment) in the history.
    pub fn record_assignment(&mut self, technician_id: Option<u64>, actor: &str) -> HistoryEntry {
        self.technician_id = technician_id;
        self.updated_at = Utc::now();
        let description = match technician_id {
            Some(id) => format!("Technician {} assigned", id),
            None => "Technician unassigned".to_string(),
        };
        let entry = HistoryEntry::new("assigned", description, actor);
        self.history.push(entry.clone());
        entry
    }
}

/// Workflow status of a ticket.
///
/// The six values below are the entire enumeration; the workflow never
/// invents new statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Newly reported, waiting for a technician.
    Open,
    /// A technician is working on it.
    InProgress,
    /// Fixed, waiting for confirmation.
    Resolved,
    /// Confirmed fixed (terminal).
    Closed,
    /// Abandoned (terminal).
    Cancelled,
    /// Reopened after a premature resolution or closure.
    Reopened,
}

impl TicketStatus {
    /// All statuses in canonical display order.
    pub const ALL: [TicketStatus; 6] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::Resolved,
        TicketStatus::Closed,
        TicketStatus::Cancelled,
        TicketStatus::Reopened,
    ];

    /// Parses the wire representation. Returns `None` for anything outside
    /// the enumeration.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(TicketStatus::Open),
            "in_progress" => Some(TicketStatus::InProgress),
            "resolved" => Some(TicketStatus::Resolved),
            "closed" => Some(TicketStatus::Closed),
            "cancelled" => Some(TicketStatus::Cancelled),
            "reopened" => Some(TicketStatus::Reopened),
            _ => None,
        }
    }

    /// Returns the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
            TicketStatus::Cancelled => "cancelled",
            TicketStatus::Reopened => "reopened",
        }
    }

    /// Returns the human-readable column/board label.
    pub fn label(&self) -> &'static str {
        match self {
            TicketStatus::Open => "Open",
            TicketStatus::InProgress => "In Progress",
            TicketStatus::Resolved => "Resolved",
            TicketStatus::Closed => "Closed",
            TicketStatus::Cancelled => "Cancelled",
            TicketStatus::Reopened => "Reopened",
        }
    }

    /// Returns true for statuses with no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Closed | TicketStatus::Cancelled)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// History log entry for tracking all changes to a ticket.
///
/// Entries are append-only: they are never mutated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntry {
    /// Unique identifier for this entry.
    pub id: Uuid,
    /// Action label (e.g. `status_change_resolved`, `assigned`, `comment`).
    pub action: String,
    /// The justification or comment text.
    pub description: String,
    /// Actor (user or technician) who produced the entry.
    pub actor: String,
    /// Timestamp of the action.
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    /// Creates a new history entry.
    pub fn new(action: impl Into<String>, description: impl Into<String>, actor: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.into(),
            description: description.into(),
            actor: actor.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Creates the entry recorded alongside a status change, with the
    /// conventional `status_change_<status>` action label.
    pub fn status_change(
        status: TicketStatus,
        description: impl Into<String>,
        actor: &str,
    ) -> Self {
        Self::new(format!("status_change_{}", status.as_str()), description, actor)
    }

    /// Creates a free-standing comment entry.
    pub fn comment(description: impl Into<String>, actor: &str) -> Self {
        Self::new("comment", description, actor)
    }
}
