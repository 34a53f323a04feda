//! Ticket status workflow for Caretaker.
//!
//! This module implements the finite-state model governing how a ticket's
//! status may change and whether a justification comment is mandatory for
//! the move. The state table is a static adjacency structure: adding a
//! status or transition is a data change, not a code change.
//!
//! Role gating is layered on top by [`crate::auth`]; everything here is
//! role-agnostic and free of side effects except for
//! [`apply_transition`], which mutates the ticket handed to it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::ticket::{HistoryEntry, Ticket, TicketStatus};

/// Allowed next statuses per current status.
///
/// `closed` and `cancelled` carry empty sets: they are terminal.
pub const STATUS_FLOW: &[(TicketStatus, &[TicketStatus])] = &[
    (
        TicketStatus::Open,
        &[TicketStatus::InProgress, TicketStatus::Cancelled],
    ),
    (
        TicketStatus::InProgress,
        &[TicketStatus::Resolved, TicketStatus::Cancelled],
    ),
    (TicketStatus::Resolved, &[TicketStatus::Closed]),
    (TicketStatus::Closed, &[]),
    (TicketStatus::Cancelled, &[]),
    (
        TicketStatus::Reopened,
        &[
            TicketStatus::InProgress,
            TicketStatus::Resolved,
            TicketStatus::Cancelled,
        ],
    ),
];

/// Target statuses that demand a non-blank justification comment.
pub const COMMENT_REQUIRED: &[TicketStatus] = &[
    TicketStatus::Resolved,
    TicketStatus::Closed,
    TicketStatus::Cancelled,
];

/// Errors produced by the status workflow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The given status string lies outside the enumeration. This is a
    /// data-integrity problem, never silently coerced.
    #[error("Unknown ticket status: '{value}'")]
    InvalidStatus { value: String },

    /// The move is well-formed but not in the state table.
    #[error("Transition from '{from}' to '{to}' is not allowed")]
    IllegalTransition {
        from: TicketStatus,
        to: TicketStatus,
    },

    /// Moving to this status requires a justification comment.
    #[error("A justification comment is required to move a ticket to '{to}'")]
    MissingJustification { to: TicketStatus },
}

impl TransitionError {
    /// Stable machine-readable code for API payloads and logs.
    pub fn code(&self) -> &'static str {
        match self {
            TransitionError::InvalidStatus { .. } => "invalid_status",
            TransitionError::IllegalTransition { .. } => "illegal_transition",
            TransitionError::MissingJustification { .. } => "missing_justification",
        }
    }
}

/// An ephemeral, validated request to move a ticket to a new status.
///
/// Produced by the board projection's move handler; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    /// Ticket being moved.
    pub ticket_id: u64,
    /// Status the ticket currently holds.
    pub from: TicketStatus,
    /// Status being requested.
    pub to: TicketStatus,
    /// Justification text, when one was supplied.
    pub comment: Option<String>,
}

/// Returns the fixed set of statuses reachable from `current`, in table
/// order.
pub fn allowed_next_statuses(current: TicketStatus) -> &'static [TicketStatus] {
    STATUS_FLOW
        .iter()
        .find(|(from, _)| *from == current)
        .map(|(_, next)| *next)
        .unwrap_or(&[])
}

/// String-input form of [`allowed_next_statuses`].
///
/// Fails with [`TransitionError::InvalidStatus`] for anything outside the
/// six-value enumeration.
pub fn allowed_next_statuses_str(
    current: &str,
) -> Result<&'static [TicketStatus], TransitionError> {
    let status = TicketStatus::parse(current).ok_or_else(|| TransitionError::InvalidStatus {
        value: current.to_string(),
    })?;
    Ok(allowed_next_statuses(status))
}

/// Returns true iff moving a ticket to `target` requires a justification
/// comment.
pub fn requires_comment(target: TicketStatus) -> bool {
    COMMENT_REQUIRED.contains(&target)
}

/// Decides whether the move from `current` to `target` is permitted with the
/// given comment.
///
/// A whitespace-only comment counts as blank. On success the caller is
/// responsible for persisting the new status and appending the matching
/// history entry.
pub fn validate_transition(
    current: TicketStatus,
    target: TicketStatus,
    comment: &str,
) -> Result<(), TransitionError> {
    if !allowed_next_statuses(current).contains(&target) {
        return Err(TransitionError::IllegalTransition {
            from: current,
            to: target,
        });
    }

    if requires_comment(target) && comment.trim().is_empty() {
        return Err(TransitionError::MissingJustification { to: target });
    }

    Ok(())
}

/// Validates and applies a transition to the ticket in place.
///
/// On success the ticket carries the new status and an appended
/// `status_change_<target>` history entry; the entry is returned so the
/// caller can forward it to the store. On failure the ticket is untouched.
pub fn apply_transition(
    ticket: &mut Ticket,
    target: TicketStatus,
    comment: &str,
    actor: &str,
) -> Result<HistoryEntry, TransitionError> {
    let from = ticket.status;
    validate_transition(from, target, comment)?;

    let description = if comment.trim().is_empty() {
        format!("Status changed to {}", target.label())
    } else {
        comment.trim().to_string()
    };

    let entry = ticket.record_status(target, description, actor);

    info!(
        ticket = %ticket.code,
        from = %from,
        to = %target,
        actor = %actor,
        "Ticket status changed"
    );

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn create_test_ticket(status: TicketStatus) -> Ticket {
        let now = Utc::now();
        Ticket {
            id: 7,
            code: "TCK-2024-0007".to_string(),
            status,
            summary: "Intercom dead".to_string(),
            category: "electrical".to_string(),
            tenant_id: 21,
            tenant_name: "Priya Shah".to_string(),
            technician_id: Some(4),
            device: Some("intercom".to_string()),
            building_id: 1,
            apartment: "5A".to_string(),
            reported_at: now,
            updated_at: now,
            history: Vec::new(),
        }
    }

    // ============ State Table Tests ============

    #[test]
    fn test_allowed_next_statuses_matches_table() {
        assert_eq!(
            allowed_next_statuses(TicketStatus::Open),
            &[TicketStatus::InProgress, TicketStatus::Cancelled]
        );
        assert_eq!(
            allowed_next_statuses(TicketStatus::InProgress),
            &[TicketStatus::Resolved, TicketStatus::Cancelled]
        );
        assert_eq!(
            allowed_next_statuses(TicketStatus::Resolved),
            &[TicketStatus::Closed]
        );
        assert_eq!(
            allowed_next_statuses(TicketStatus::Reopened),
            &[
                TicketStatus::InProgress,
                TicketStatus::Resolved,
                TicketStatus::Cancelled
            ]
        );
    }

    #[test]
    fn test_terminal_statuses_have_no_successors() {
        assert!(allowed_next_statuses(TicketStatus::Closed).is_empty());
        assert!(allowed_next_statuses(TicketStatus::Cancelled).is_empty());
    }

    #[test]
    fn test_table_covers_every_status() {
        for status in TicketStatus::ALL {
            assert!(
                STATUS_FLOW.iter().any(|(from, _)| *from == status),
                "missing table entry for {status}"
            );
        }
    }

    #[test]
    fn test_unknown_status_string_is_rejected() {
        let result = allowed_next_statuses_str("archived");
        assert!(matches!(
            result,
            Err(TransitionError::InvalidStatus { ref value }) if value == "archived"
        ));

        assert!(allowed_next_statuses_str("").is_err());
        assert!(allowed_next_statuses_str("Open").is_err());
    }

    #[test]
    fn test_known_status_strings_resolve() {
        let next = allowed_next_statuses_str("open").unwrap();
        assert_eq!(next, &[TicketStatus::InProgress, TicketStatus::Cancelled]);

        let next = allowed_next_statuses_str("closed").unwrap();
        assert!(next.is_empty());
    }

    // ============ Comment Requirement Tests ============

    #[test]
    fn test_requires_comment_only_for_closing_statuses() {
        assert!(requires_comment(TicketStatus::Resolved));
        assert!(requires_comment(TicketStatus::Closed));
        assert!(requires_comment(TicketStatus::Cancelled));

        assert!(!requires_comment(TicketStatus::Open));
        assert!(!requires_comment(TicketStatus::InProgress));
        assert!(!requires_comment(TicketStatus::Reopened));
    }

    // ============ Validation Tests ============

    #[test]
    fn test_open_to_closed_is_illegal() {
        let result = validate_transition(TicketStatus::Open, TicketStatus::Closed, "");
        assert!(matches!(
            result,
            Err(TransitionError::IllegalTransition {
                from: TicketStatus::Open,
                to: TicketStatus::Closed,
            })
        ));
    }

    #[test]
    fn test_resolve_without_comment_needs_justification() {
        let result = validate_transition(TicketStatus::InProgress, TicketStatus::Resolved, "");
        assert!(matches!(
            result,
            Err(TransitionError::MissingJustification {
                to: TicketStatus::Resolved,
            })
        ));
    }

    #[test]
    fn test_whitespace_comment_counts_as_blank() {
        let result = validate_transition(TicketStatus::InProgress, TicketStatus::Resolved, "   ");
        assert!(matches!(
            result,
            Err(TransitionError::MissingJustification { .. })
        ));
    }

    #[test]
    fn test_resolve_with_comment_succeeds() {
        let result = validate_transition(
            TicketStatus::InProgress,
            TicketStatus::Resolved,
            "Replaced faulty cable",
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_closed_is_terminal() {
        let result = validate_transition(TicketStatus::Closed, TicketStatus::Open, "");
        assert!(matches!(
            result,
            Err(TransitionError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn test_moves_without_comment_requirement() {
        assert!(validate_transition(TicketStatus::Open, TicketStatus::InProgress, "").is_ok());
        assert!(validate_transition(TicketStatus::Reopened, TicketStatus::InProgress, "").is_ok());
    }

    #[test]
    fn test_cancel_requires_comment_from_any_source() {
        for from in [
            TicketStatus::Open,
            TicketStatus::InProgress,
            TicketStatus::Reopened,
        ] {
            let result = validate_transition(from, TicketStatus::Cancelled, "");
            assert!(
                matches!(result, Err(TransitionError::MissingJustification { .. })),
                "expected justification failure from {from}"
            );

            let result = validate_transition(from, TicketStatus::Cancelled, "Tenant moved out");
            assert!(result.is_ok(), "expected cancel from {from} to pass");
        }
    }

    // ============ Apply Tests ============

    #[test]
    fn test_apply_transition_records_history() {
        let mut ticket = create_test_ticket(TicketStatus::InProgress);
        let entry = apply_transition(
            &mut ticket,
            TicketStatus::Resolved,
            "Replaced faulty cable",
            "tech:4",
        )
        .unwrap();

        assert_eq!(ticket.status, TicketStatus::Resolved);
        assert_eq!(ticket.history.len(), 1);
        assert_eq!(entry.action, "status_change_resolved");
        assert_eq!(entry.description, "Replaced faulty cable");
        assert_eq!(entry.actor, "tech:4");
    }

    #[test]
    fn test_apply_transition_defaults_description_without_comment() {
        let mut ticket = create_test_ticket(TicketStatus::Open);
        let entry =
            apply_transition(&mut ticket, TicketStatus::InProgress, "", "tech:4").unwrap();

        assert_eq!(entry.action, "status_change_in_progress");
        assert_eq!(entry.description, "Status changed to In Progress");
    }

    #[test]
    fn test_apply_transition_leaves_ticket_untouched_on_failure() {
        let mut ticket = create_test_ticket(TicketStatus::Open);
        let result = apply_transition(&mut ticket, TicketStatus::Closed, "", "tech:4");

        assert!(matches!(
            result,
            Err(TransitionError::IllegalTransition { .. })
        ));
        assert_eq!(ticket.status, TicketStatus::Open);
        assert!(ticket.history.is_empty());
    }

    #[test]
    fn test_error_codes_are_stable() {
        let err = TransitionError::InvalidStatus {
            value: "bogus".to_string(),
        };
        assert_eq!(err.code(), "invalid_status");

        let err = TransitionError::IllegalTransition {
            from: TicketStatus::Open,
            to: TicketStatus::Closed,
        };
        assert_eq!(err.code(), "illegal_transition");

        let err = TransitionError::MissingJustification {
            to: TicketStatus::Resolved,
        };
        assert_eq!(err.code(), "missing_justification");
    }
}
