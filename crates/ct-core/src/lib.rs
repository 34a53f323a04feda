//! # ct-core
//!
//! Core domain library for Caretaker.
//!
//! This crate provides the ticket data model, the status workflow state
//! machine, the Kanban board projection, role capabilities, the ticket
//! store and directory seams, the event bus, and dashboard analytics.

pub mod analytics;
pub mod auth;
pub mod board;
pub mod directory;
pub mod events;
pub mod store;
pub mod ticket;
pub mod workflow;

pub use analytics::{
    compute_dashboard, compute_dashboard_at, DashboardSnapshot, TechnicianMetrics, TicketMetrics,
};
pub use auth::{capabilities_for_role, Capability, Role, SessionContext, TransitionTrigger};
pub use board::{
    column_status, group_by_status, on_move, visible_columns, BoardColumn, BoardView,
    ColumnDescriptor, RECENTS_KEY,
};
pub use directory::{
    Building, BuildingDirectory, MemoryBuildingDirectory, MemoryTechnicianDirectory, Technician,
    TechnicianDirectory,
};
pub use events::{EventBus, TicketEvent};
pub use store::{
    MemoryTicketStore, NewTicket, PaginatedResult, Pagination, StoreError, TicketFilter,
    TicketStore,
};
pub use ticket::{HistoryEntry, Ticket, TicketStatus};
pub use workflow::{
    allowed_next_statuses, allowed_next_statuses_str, apply_transition, requires_comment,
    validate_transition, TransitionError, TransitionRequest,
};
