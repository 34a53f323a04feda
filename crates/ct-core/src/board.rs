//! Kanban board projection.
//!
//! Groups tickets into status columns for display and translates a
//! drag-initiated move into a [`TransitionRequest`] for the workflow
//! validator. The projection owns no state: callers supply the ticket
//! list fresh on every invocation.

use serde::Serialize;

use crate::auth::{capabilities_for_role, Capability, Role};
use crate::ticket::{Ticket, TicketStatus};
use crate::workflow::{validate_transition, TransitionError, TransitionRequest};

/// Column key for the triage column that collects `open` tickets.
pub const RECENTS_KEY: &str = "recents";

/// A board column header: stable key plus display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub key: &'static str,
    pub label: &'static str,
}

/// A populated board column.
#[derive(Debug, Clone, Serialize)]
pub struct BoardColumn {
    pub key: &'static str,
    pub label: &'static str,
    pub tickets: Vec<Ticket>,
}

/// The full board: ordered columns with their tickets.
#[derive(Debug, Clone, Serialize)]
pub struct BoardView {
    pub columns: Vec<BoardColumn>,
}

impl BoardView {
    /// Total number of tickets placed on the board.
    pub fn total_tickets(&self) -> usize {
        self.columns.iter().map(|c| c.tickets.len()).sum()
    }
}

/// Resolves the ticket status a column collects.
///
/// The `recents` column collects `open` tickets; every other column key is
/// a status name. Unknown keys fail with [`TransitionError::InvalidStatus`].
pub fn column_status(key: &str) -> Result<TicketStatus, TransitionError> {
    if key == RECENTS_KEY {
        return Ok(TicketStatus::Open);
    }
    TicketStatus::parse(key).ok_or_else(|| TransitionError::InvalidStatus {
        value: key.to_string(),
    })
}

/// Computes the ordered column set for a role, honoring an optional
/// comma-separated status filter.
///
/// A supplied filter wins over the role layout and yields exactly the
/// requested statuses in canonical order (`open, in_progress, resolved,
/// closed, cancelled, reopened`), regardless of input order. A blank
/// filter falls back to the role layout. Roles without the
/// [`Capability::ViewAllColumns`] grant get the four-column triage layout
/// headed by `recents`; everyone else gets the full six columns with the
/// first column labeled `Open`.
pub fn visible_columns(
    role: Role,
    status_filter: Option<&str>,
) -> Result<Vec<ColumnDescriptor>, TransitionError> {
    if let Some(filter) = status_filter {
        let requested = parse_status_filter(filter)?;
        if !requested.is_empty() {
            return Ok(TicketStatus::ALL
                .into_iter()
                .filter(|status| requested.contains(status))
                .map(|status| ColumnDescriptor {
                    key: status.as_str(),
                    label: status.label(),
                })
                .collect());
        }
    }

    if capabilities_for_role(role).contains(&Capability::ViewAllColumns) {
        Ok(TicketStatus::ALL
            .into_iter()
            .map(|status| ColumnDescriptor {
                key: status.as_str(),
                label: status.label(),
            })
            .collect())
    } else {
        Ok(vec![
            ColumnDescriptor {
                key: RECENTS_KEY,
                label: "Recents",
            },
            ColumnDescriptor {
                key: TicketStatus::InProgress.as_str(),
                label: TicketStatus::InProgress.label(),
            },
            ColumnDescriptor {
                key: TicketStatus::Resolved.as_str(),
                label: TicketStatus::Resolved.label(),
            },
            ColumnDescriptor {
                key: TicketStatus::Reopened.as_str(),
                label: TicketStatus::Reopened.label(),
            },
        ])
    }
}

fn parse_status_filter(filter: &str) -> Result<Vec<TicketStatus>, TransitionError> {
    let mut requested = Vec::new();
    for token in filter.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let status = TicketStatus::parse(token).ok_or_else(|| TransitionError::InvalidStatus {
            value: token.to_string(),
        })?;
        if !requested.contains(&status) {
            requested.push(status);
        }
    }
    Ok(requested)
}

/// Buckets tickets into the given columns, preserving input order.
///
/// Each ticket lands in at most one column: the one whose key resolves to
/// the ticket's status. Tickets whose status has no visible column are
/// omitted from the projection.
pub fn group_by_status(tickets: &[Ticket], columns: &[ColumnDescriptor]) -> BoardView {
    let mut board: Vec<BoardColumn> = columns
        .iter()
        .map(|descriptor| BoardColumn {
            key: descriptor.key,
            label: descriptor.label,
            tickets: Vec::new(),
        })
        .collect();

    let targets: Vec<Option<TicketStatus>> = columns
        .iter()
        .map(|descriptor| column_status(descriptor.key).ok())
        .collect();

    for ticket in tickets {
        let slot = targets
            .iter()
            .position(|status| *status == Some(ticket.status));
        if let Some(index) = slot {
            board[index].tickets.push(ticket.clone());
        }
    }

    BoardView { columns: board }
}

/// Translates a drag-and-drop move into a transition request.
///
/// Returns `Ok(None)` when the drop stays in the same column (including a
/// `recents`/`open` pairing, which name the same status). On a
/// [`TransitionError::MissingJustification`] failure the caller is
/// expected to prompt for a comment and call again with it; this is a
/// two-step interaction, not a retry.
pub fn on_move(
    ticket: &Ticket,
    source_column: &str,
    target_column: &str,
    comment: &str,
) -> Result<Option<TransitionRequest>, TransitionError> {
    let source = column_status(source_column)?;
    let target = column_status(target_column)?;

    if source == target {
        return Ok(None);
    }

    validate_transition(ticket.status, target, comment)?;

    let comment = comment.trim();
    Ok(Some(TransitionRequest {
        ticket_id: ticket.id,
        from: ticket.status,
        to: target,
        comment: (!comment.is_empty()).then(|| comment.to_string()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn create_test_ticket(id: u64, status: TicketStatus) -> Ticket {
        let now = Utc::now();
        Ticket {
            id,
            code: format!("TCK-2024-{id:04}"),
            status,
            summary: "Radiator leaking".to_string(),
            category: "plumbing".to_string(),
            tenant_id: 10 + id,
            tenant_name: "Jonas Weber".to_string(),
            technician_id: None,
            device: Some("radiator".to_string()),
            building_id: 2,
            apartment: "3B".to_string(),
            reported_at: now,
            updated_at: now,
            history: Vec::new(),
        }
    }

    fn keys(columns: &[ColumnDescriptor]) -> Vec<&'static str> {
        columns.iter().map(|c| c.key).collect()
    }

    // ============ Column Layout Tests ============

    #[test]
    fn test_member_sees_all_six_columns() {
        let columns = visible_columns(Role::Member, None).unwrap();
        assert_eq!(
            keys(&columns),
            vec![
                "open",
                "in_progress",
                "resolved",
                "closed",
                "cancelled",
                "reopened"
            ]
        );
        assert_eq!(columns[0].label, "Open");
    }

    #[test]
    fn test_technical_roles_see_triage_layout() {
        for role in [Role::Technical, Role::TechnicalDefault, Role::SuperAdmin] {
            let columns = visible_columns(role, None).unwrap();
            assert_eq!(
                keys(&columns),
                vec!["recents", "in_progress", "resolved", "reopened"],
                "unexpected layout for {role}"
            );
            assert_eq!(columns[0].label, "Recents");
        }
    }

    #[test]
    fn test_status_filter_uses_canonical_order() {
        let columns = visible_columns(Role::Member, Some("closed,open")).unwrap();
        assert_eq!(keys(&columns), vec!["open", "closed"]);

        let columns = visible_columns(Role::Technical, Some("reopened, resolved ,open")).unwrap();
        assert_eq!(keys(&columns), vec!["open", "resolved", "reopened"]);
    }

    #[test]
    fn test_status_filter_rejects_unknown_status() {
        let result = visible_columns(Role::Member, Some("open,archived"));
        assert!(matches!(
            result,
            Err(TransitionError::InvalidStatus { ref value }) if value == "archived"
        ));
    }

    #[test]
    fn test_blank_filter_falls_back_to_role_layout() {
        let columns = visible_columns(Role::Technical, Some("  ,, ")).unwrap();
        assert_eq!(keys(&columns), vec!["recents", "in_progress", "resolved", "reopened"]);
    }

    // ============ Grouping Tests ============

    #[test]
    fn test_group_by_status_places_each_ticket_once() {
        let tickets = vec![
            create_test_ticket(1, TicketStatus::Open),
            create_test_ticket(2, TicketStatus::Resolved),
        ];
        let columns = visible_columns(Role::Member, None).unwrap();
        let board = group_by_status(&tickets, &columns);

        let open = board.columns.iter().find(|c| c.key == "open").unwrap();
        let resolved = board.columns.iter().find(|c| c.key == "resolved").unwrap();
        assert_eq!(open.tickets.len(), 1);
        assert_eq!(open.tickets[0].id, 1);
        assert_eq!(resolved.tickets.len(), 1);
        assert_eq!(resolved.tickets[0].id, 2);
        assert_eq!(board.total_tickets(), tickets.len());
    }

    #[test]
    fn test_group_by_status_partitions_any_ticket_list() {
        let tickets: Vec<Ticket> = TicketStatus::ALL
            .into_iter()
            .enumerate()
            .map(|(i, status)| create_test_ticket(i as u64 + 1, status))
            .collect();
        let columns = visible_columns(Role::Member, None).unwrap();
        let board = group_by_status(&tickets, &columns);

        assert_eq!(board.total_tickets(), tickets.len());
        for column in &board.columns {
            assert_eq!(column.tickets.len(), 1, "column {} misfilled", column.key);
        }
    }

    #[test]
    fn test_recents_column_collects_open_tickets() {
        let tickets = vec![
            create_test_ticket(1, TicketStatus::Open),
            create_test_ticket(2, TicketStatus::InProgress),
        ];
        let columns = visible_columns(Role::Technical, None).unwrap();
        let board = group_by_status(&tickets, &columns);

        let recents = board.columns.iter().find(|c| c.key == "recents").unwrap();
        assert_eq!(recents.tickets.len(), 1);
        assert_eq!(recents.tickets[0].id, 1);
    }

    #[test]
    fn test_tickets_outside_visible_columns_are_omitted() {
        let tickets = vec![
            create_test_ticket(1, TicketStatus::Closed),
            create_test_ticket(2, TicketStatus::Resolved),
        ];
        let columns = visible_columns(Role::Technical, None).unwrap();
        let board = group_by_status(&tickets, &columns);

        assert_eq!(board.total_tickets(), 1);
        let resolved = board.columns.iter().find(|c| c.key == "resolved").unwrap();
        assert_eq!(resolved.tickets[0].id, 2);
    }

    #[test]
    fn test_grouping_preserves_input_order() {
        let tickets = vec![
            create_test_ticket(5, TicketStatus::Open),
            create_test_ticket(3, TicketStatus::Open),
            create_test_ticket(9, TicketStatus::Open),
        ];
        let columns = visible_columns(Role::Member, None).unwrap();
        let board = group_by_status(&tickets, &columns);

        let open = board.columns.iter().find(|c| c.key == "open").unwrap();
        let ids: Vec<u64> = open.tickets.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![5, 3, 9]);
    }

    // ============ Move Tests ============

    #[test]
    fn test_same_column_drop_is_a_no_op() {
        let ticket = create_test_ticket(1, TicketStatus::Open);
        let result = on_move(&ticket, "recents", "recents", "").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_recents_and_open_name_the_same_column() {
        let ticket = create_test_ticket(1, TicketStatus::Open);
        let result = on_move(&ticket, "recents", "open", "").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_move_from_recents_requests_transition_from_open() {
        let ticket = create_test_ticket(1, TicketStatus::Open);
        let request = on_move(&ticket, "recents", "in_progress", "")
            .unwrap()
            .unwrap();

        assert_eq!(request.ticket_id, 1);
        assert_eq!(request.from, TicketStatus::Open);
        assert_eq!(request.to, TicketStatus::InProgress);
        assert!(request.comment.is_none());
    }

    #[test]
    fn test_move_to_resolved_prompts_for_comment() {
        let ticket = create_test_ticket(1, TicketStatus::InProgress);

        let first = on_move(&ticket, "in_progress", "resolved", "");
        assert!(matches!(
            first,
            Err(TransitionError::MissingJustification {
                to: TicketStatus::Resolved,
            })
        ));

        let second = on_move(&ticket, "in_progress", "resolved", "Replaced faulty cable")
            .unwrap()
            .unwrap();
        assert_eq!(second.comment.as_deref(), Some("Replaced faulty cable"));
    }

    #[test]
    fn test_move_to_unreachable_column_is_rejected() {
        let ticket = create_test_ticket(1, TicketStatus::Open);
        let result = on_move(&ticket, "recents", "closed", "why not");
        assert!(matches!(
            result,
            Err(TransitionError::IllegalTransition {
                from: TicketStatus::Open,
                to: TicketStatus::Closed,
            })
        ));
    }

    #[test]
    fn test_move_with_unknown_column_fails() {
        let ticket = create_test_ticket(1, TicketStatus::Open);
        let result = on_move(&ticket, "recents", "archive", "");
        assert!(matches!(result, Err(TransitionError::InvalidStatus { .. })));
    }
}
