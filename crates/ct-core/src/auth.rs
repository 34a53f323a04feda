//! Roles, capabilities, and the per-session actor context.
//!
//! Permissions are expressed as an explicit capability set resolved once
//! when a session context is built, never re-derived from role flags at
//! call sites. The workflow validator stays role-agnostic; callers check
//! capabilities here before invoking it.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::ticket::Ticket;

/// User roles recognized by the ticketing system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// A tenant reporting and following their own tickets.
    Member,
    /// A technician who can be assigned tickets and drive transitions.
    Technical,
    /// A lead technician with assignment and dashboard access.
    TechnicalDefault,
    /// Full administrative access.
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Member,
        Role::Technical,
        Role::TechnicalDefault,
        Role::SuperAdmin,
    ];

    /// Parses the kebab-case wire form. Returns `None` for unknown input.
    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "member" => Some(Role::Member),
            "technical" => Some(Role::Technical),
            "technical-default" => Some(Role::TechnicalDefault),
            "super-admin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Technical => "technical",
            Role::TechnicalDefault => "technical-default",
            Role::SuperAdmin => "super-admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Permitted-action tags granted to a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Move tickets between board columns by drag-and-drop.
    MoveTicketByDrag,
    /// Change a ticket's status through the detail-view action buttons.
    MoveTicketByButton,
    /// Assign or reassign a technician to a ticket.
    AssignTechnician,
    /// See the full six-column board layout instead of the triage subset.
    ViewAllColumns,
    /// Access the KPI dashboard.
    ViewDashboard,
}

/// How a status transition was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransitionTrigger {
    /// Drag-and-drop on the board.
    Drag,
    /// Explicit action button on the ticket detail view.
    Button,
}

/// Resolves the fixed capability set for a role.
pub fn capabilities_for_role(role: Role) -> HashSet<Capability> {
    let granted: &[Capability] = match role {
        Role::Member => &[Capability::ViewAllColumns],
        Role::Technical => &[Capability::MoveTicketByDrag, Capability::MoveTicketByButton],
        Role::TechnicalDefault => &[
            Capability::MoveTicketByDrag,
            Capability::MoveTicketByButton,
            Capability::AssignTechnician,
            Capability::ViewDashboard,
        ],
        Role::SuperAdmin => &[
            Capability::MoveTicketByDrag,
            Capability::MoveTicketByButton,
            Capability::AssignTechnician,
            Capability::ViewDashboard,
        ],
    };
    granted.iter().copied().collect()
}

/// The acting user for the duration of one session.
///
/// Capabilities are resolved once at construction; call sites only test
/// membership.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub actor_id: u64,
    pub actor_name: String,
    pub role: Role,
    pub capabilities: HashSet<Capability>,
}

impl SessionContext {
    pub fn new(actor_id: u64, actor_name: impl Into<String>, role: Role) -> Self {
        Self {
            actor_id,
            actor_name: actor_name.into(),
            role,
            capabilities: capabilities_for_role(role),
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Stable actor string recorded on history entries, e.g. `technical:4`.
    pub fn audit_identity(&self) -> String {
        format!("{}:{}", self.role.as_str(), self.actor_id)
    }

    /// Decides whether this session may move the given ticket.
    ///
    /// Drag moves are gated purely on role capability. Button moves by a
    /// plain technician additionally require the ticket to be assigned to
    /// them; lead technicians and super-admins act on any ticket.
    pub fn can_transition(&self, ticket: &Ticket, trigger: TransitionTrigger) -> bool {
        match trigger {
            TransitionTrigger::Drag => self.has(Capability::MoveTicketByDrag),
            TransitionTrigger::Button => {
                if !self.has(Capability::MoveTicketByButton) {
                    return false;
                }
                match self.role {
                    Role::Technical => ticket.is_assigned_to(self.actor_id),
                    _ => true,
                }
            }
        }
    }

    pub fn can_assign(&self) -> bool {
        self.has(Capability::AssignTechnician)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::TicketStatus;
    use chrono::Utc;

    fn create_test_ticket(technician_id: Option<u64>) -> Ticket {
        let now = Utc::now();
        Ticket {
            id: 12,
            code: "TCK-2024-0012".to_string(),
            status: TicketStatus::InProgress,
            summary: "Boiler pressure low".to_string(),
            category: "heating".to_string(),
            tenant_id: 30,
            tenant_name: "Aicha Benali".to_string(),
            technician_id,
            device: Some("boiler".to_string()),
            building_id: 4,
            apartment: "9C".to_string(),
            reported_at: now,
            updated_at: now,
            history: Vec::new(),
        }
    }

    // ============ Role Tests ============

    #[test]
    fn test_role_parse_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn test_role_serde_uses_kebab_case() {
        let json = serde_json::to_string(&Role::TechnicalDefault).unwrap();
        assert_eq!(json, "\"technical-default\"");

        let role: Role = serde_json::from_str("\"super-admin\"").unwrap();
        assert_eq!(role, Role::SuperAdmin);
    }

    // ============ Capability Tests ============

    #[test]
    fn test_members_cannot_move_tickets() {
        let caps = capabilities_for_role(Role::Member);
        assert!(!caps.contains(&Capability::MoveTicketByDrag));
        assert!(!caps.contains(&Capability::MoveTicketByButton));
        assert!(caps.contains(&Capability::ViewAllColumns));
    }

    #[test]
    fn test_staff_roles_can_drag() {
        for role in [Role::Technical, Role::TechnicalDefault, Role::SuperAdmin] {
            assert!(
                capabilities_for_role(role).contains(&Capability::MoveTicketByDrag),
                "{role} should drag"
            );
        }
    }

    #[test]
    fn test_assignment_is_reserved_to_leads_and_admins() {
        assert!(!capabilities_for_role(Role::Member).contains(&Capability::AssignTechnician));
        assert!(!capabilities_for_role(Role::Technical).contains(&Capability::AssignTechnician));
        assert!(
            capabilities_for_role(Role::TechnicalDefault).contains(&Capability::AssignTechnician)
        );
        assert!(capabilities_for_role(Role::SuperAdmin).contains(&Capability::AssignTechnician));
    }

    // ============ Session Tests ============

    #[test]
    fn test_session_resolves_capabilities_once() {
        let session = SessionContext::new(4, "Lena Fischer", Role::Technical);
        assert_eq!(session.capabilities, capabilities_for_role(Role::Technical));
        assert!(session.has(Capability::MoveTicketByDrag));
        assert!(!session.has(Capability::AssignTechnician));
    }

    #[test]
    fn test_audit_identity_format() {
        let session = SessionContext::new(4, "Lena Fischer", Role::Technical);
        assert_eq!(session.audit_identity(), "technical:4");
    }

    #[test]
    fn test_drag_ignores_assignment() {
        let session = SessionContext::new(4, "Lena Fischer", Role::Technical);
        let unassigned = create_test_ticket(None);
        let foreign = create_test_ticket(Some(9));

        assert!(session.can_transition(&unassigned, TransitionTrigger::Drag));
        assert!(session.can_transition(&foreign, TransitionTrigger::Drag));
    }

    #[test]
    fn test_button_requires_assignment_for_plain_technicians() {
        let session = SessionContext::new(4, "Lena Fischer", Role::Technical);
        let mine = create_test_ticket(Some(4));
        let foreign = create_test_ticket(Some(9));

        assert!(session.can_transition(&mine, TransitionTrigger::Button));
        assert!(!session.can_transition(&foreign, TransitionTrigger::Button));
    }

    #[test]
    fn test_leads_and_admins_use_buttons_on_any_ticket() {
        let foreign = create_test_ticket(Some(9));
        for role in [Role::TechnicalDefault, Role::SuperAdmin] {
            let session = SessionContext::new(1, "Omar Haddad", role);
            assert!(
                session.can_transition(&foreign, TransitionTrigger::Button),
                "{role} should act on any ticket"
            );
        }
    }

    #[test]
    fn test_members_cannot_transition_at_all() {
        let session = SessionContext::new(30, "Aicha Benali", Role::Member);
        let ticket = create_test_ticket(Some(30));

        assert!(!session.can_transition(&ticket, TransitionTrigger::Drag));
        assert!(!session.can_transition(&ticket, TransitionTrigger::Button));
    }
}
