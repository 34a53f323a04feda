//! Ticket storage.
//!
//! Persistence itself is owned by the hosting system; this module defines
//! the trait boundary the workflow talks through, plus an in-memory
//! implementation used by the server's demo mode and by tests. Per
//! successful transition, callers issue exactly one `update_status` call
//! followed by exactly one `append_history` call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::ticket::{HistoryEntry, Ticket, TicketStatus};

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Maximum allowed items per page.
pub const MAX_PAGE_SIZE: u32 = 200;

/// Errors that can occur during ticket storage operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Record not found.
    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// Conflicting write (e.g., duplicate identifier).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn ticket_not_found(id: u64) -> Self {
        StoreError::NotFound {
            entity: "ticket".to_string(),
            id: id.to_string(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Pagination options for listing queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    /// Page number (1-indexed).
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Creates a new Pagination. Page values below 1 are clamped to 1;
    /// per_page is clamped to the range [1, MAX_PAGE_SIZE].
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Creates a Pagination from optional query parameters with defaults.
    pub fn from_query(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self::new(page.unwrap_or(1), per_page.unwrap_or(DEFAULT_PAGE_SIZE))
    }

    pub fn offset(&self) -> u32 {
        (self.page.saturating_sub(1)) * self.per_page
    }

    pub fn limit(&self) -> u32 {
        self.per_page
    }

    /// Total pages for a total item count. Zero items still occupy one page.
    pub fn total_pages(&self, total_items: u64) -> u32 {
        if total_items == 0 {
            return 1;
        }
        ((total_items as f64) / (self.per_page as f64)).ceil() as u32
    }
}

/// A page of results plus pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    /// Total number of items matching the query (across all pages).
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: &Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
            total_pages: pagination.total_pages(total),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn has_next_page(&self) -> bool {
        self.page < self.total_pages
    }

    /// Maps the items while keeping the pagination metadata.
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        }
    }
}

/// Filter criteria for listing tickets.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    /// Filter by status (multiple allowed).
    pub status: Option<Vec<TicketStatus>>,
    /// Filter by assigned technician.
    pub technician_id: Option<u64>,
    /// Filter by reporting tenant.
    pub tenant_id: Option<u64>,
    /// Filter by building.
    pub building_id: Option<u64>,
    /// Filter by category (exact match).
    pub category: Option<String>,
    /// Case-insensitive substring search over code, summary, and apartment.
    pub query: Option<String>,
}

/// Input for creating a ticket. Status is always `open` at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTicket {
    pub summary: String,
    pub category: String,
    pub tenant_id: u64,
    pub tenant_name: String,
    pub device: Option<String>,
    pub building_id: u64,
    pub apartment: String,
}

/// Storage boundary for tickets and their history.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Creates a ticket in status `open` with a generated id and code.
    async fn create(&self, new_ticket: NewTicket) -> Result<Ticket, StoreError>;

    /// Gets a ticket by numeric id.
    async fn get(&self, id: u64) -> Result<Option<Ticket>, StoreError>;

    /// Gets a ticket by its human-readable code.
    async fn get_by_code(&self, code: &str) -> Result<Option<Ticket>, StoreError>;

    /// Lists tickets matching the filter, newest first.
    async fn list(
        &self,
        filter: &TicketFilter,
        pagination: &Pagination,
    ) -> Result<Vec<Ticket>, StoreError>;

    /// Counts tickets matching the filter.
    async fn count(&self, filter: &TicketFilter) -> Result<u64, StoreError>;

    /// Persists a new status for the ticket.
    async fn update_status(&self, id: u64, status: TicketStatus) -> Result<Ticket, StoreError>;

    /// Appends a history entry to the ticket. Entries are never mutated or
    /// deleted afterwards.
    async fn append_history(&self, id: u64, entry: HistoryEntry) -> Result<(), StoreError>;

    /// Sets or clears the assigned technician.
    async fn assign_technician(
        &self,
        id: u64,
        technician_id: Option<u64>,
    ) -> Result<Ticket, StoreError>;
}

/// In-memory TicketStore used by demo mode and tests.
pub struct MemoryTicketStore {
    tickets: Arc<RwLock<HashMap<u64, Ticket>>>,
    next_id: AtomicU64,
}

impl Default for MemoryTicketStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTicketStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            tickets: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates a store pre-populated with tickets.
    pub fn with_tickets(tickets: Vec<Ticket>) -> Self {
        let max_id = tickets.iter().map(|t| t.id).max().unwrap_or(0);
        let map: HashMap<u64, Ticket> = tickets.into_iter().map(|t| (t.id, t)).collect();
        Self {
            tickets: Arc::new(RwLock::new(map)),
            next_id: AtomicU64::new(max_id + 1),
        }
    }

    /// Gets a snapshot of all tickets in the store.
    pub async fn snapshot(&self) -> Vec<Ticket> {
        self.tickets.read().await.values().cloned().collect()
    }

    /// Clears all tickets.
    pub async fn clear(&self) {
        self.tickets.write().await.clear();
    }

    fn matches(ticket: &Ticket, filter: &TicketFilter) -> bool {
        if let Some(statuses) = &filter.status {
            if !statuses.contains(&ticket.status) {
                return false;
            }
        }
        if let Some(technician_id) = filter.technician_id {
            if ticket.technician_id != Some(technician_id) {
                return false;
            }
        }
        if let Some(tenant_id) = filter.tenant_id {
            if ticket.tenant_id != tenant_id {
                return false;
            }
        }
        if let Some(building_id) = filter.building_id {
            if ticket.building_id != building_id {
                return false;
            }
        }
        if let Some(category) = &filter.category {
            if !ticket.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(query) = &filter.query {
            let needle = query.to_lowercase();
            let haystack = format!(
                "{} {} {}",
                ticket.code.to_lowercase(),
                ticket.summary.to_lowercase(),
                ticket.apartment.to_lowercase()
            );
            if !haystack.contains(&needle) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn create(&self, new_ticket: NewTicket) -> Result<Ticket, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let ticket = Ticket {
            id,
            code: format!("TCK-{}-{:04}", now.year(), id),
            status: TicketStatus::Open,
            summary: new_ticket.summary,
            category: new_ticket.category,
            tenant_id: new_ticket.tenant_id,
            tenant_name: new_ticket.tenant_name,
            technician_id: None,
            device: new_ticket.device,
            building_id: new_ticket.building_id,
            apartment: new_ticket.apartment,
            reported_at: now,
            updated_at: now,
            history: Vec::new(),
        };

        let mut tickets = self.tickets.write().await;
        if tickets.contains_key(&ticket.id) {
            return Err(StoreError::Conflict(format!(
                "Ticket with id '{}' already exists",
                ticket.id
            )));
        }
        tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn get(&self, id: u64) -> Result<Option<Ticket>, StoreError> {
        let tickets = self.tickets.read().await;
        Ok(tickets.get(&id).cloned())
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Ticket>, StoreError> {
        let tickets = self.tickets.read().await;
        Ok(tickets.values().find(|t| t.code == code).cloned())
    }

    async fn list(
        &self,
        filter: &TicketFilter,
        pagination: &Pagination,
    ) -> Result<Vec<Ticket>, StoreError> {
        let tickets = self.tickets.read().await;

        let mut result: Vec<Ticket> = tickets
            .values()
            .filter(|t| Self::matches(t, filter))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.reported_at.cmp(&a.reported_at));

        let start = pagination.offset() as usize;
        let end = (start + pagination.limit() as usize).min(result.len());
        if start >= result.len() {
            return Ok(Vec::new());
        }
        Ok(result[start..end].to_vec())
    }

    async fn count(&self, filter: &TicketFilter) -> Result<u64, StoreError> {
        let tickets = self.tickets.read().await;
        Ok(tickets.values().filter(|t| Self::matches(t, filter)).count() as u64)
    }

    async fn update_status(&self, id: u64, status: TicketStatus) -> Result<Ticket, StoreError> {
        let mut tickets = self.tickets.write().await;
        let ticket = tickets
            .get_mut(&id)
            .ok_or_else(|| StoreError::ticket_not_found(id))?;
        ticket.status = status;
        ticket.updated_at = Utc::now();
        Ok(ticket.clone())
    }

    async fn append_history(&self, id: u64, entry: HistoryEntry) -> Result<(), StoreError> {
        let mut tickets = self.tickets.write().await;
        let ticket = tickets
            .get_mut(&id)
            .ok_or_else(|| StoreError::ticket_not_found(id))?;
        ticket.history.push(entry);
        Ok(())
    }

    async fn assign_technician(
        &self,
        id: u64,
        technician_id: Option<u64>,
    ) -> Result<Ticket, StoreError> {
        let mut tickets = self.tickets.write().await;
        let ticket = tickets
            .get_mut(&id)
            .ok_or_else(|| StoreError::ticket_not_found(id))?;
        ticket.technician_id = technician_id;
        ticket.updated_at = Utc::now();
        Ok(ticket.clone())
    }
}
