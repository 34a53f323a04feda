//! KPI aggregation for the dashboard views.
//!
//! Pure calculations over ticket lists; nothing here queries the store.
//! Resolution times are derived from the `status_change_resolved` history
//! entry a successful resolve transition appends.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::directory::Technician;
use crate::ticket::{Ticket, TicketStatus};

const RESOLVED_ACTION: &str = "status_change_resolved";

/// Window for the "recent activity" counters.
const RECENT_WINDOW_DAYS: i64 = 7;

// ============================================================================
// Ticket Metrics
// ============================================================================

/// Aggregate ticket metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TicketMetrics {
    /// Total number of tickets considered.
    pub total_tickets: u64,

    /// Tickets grouped by status.
    #[serde(default)]
    pub by_status: HashMap<String, u64>,

    /// Tickets grouped by building id.
    #[serde(default)]
    pub by_building: HashMap<u64, u64>,

    /// Tickets grouped by category.
    #[serde(default)]
    pub by_category: HashMap<String, u64>,

    /// Tickets reported within the last seven days.
    pub reported_last_7_days: u64,

    /// Tickets resolved within the last seven days.
    pub resolved_last_7_days: u64,

    /// Open tickets nobody has been assigned to yet.
    pub open_unassigned: u64,

    /// Mean time to resolve (in seconds), if any ticket was resolved.
    #[serde(default)]
    pub mttr_seconds: Option<f64>,
}

impl TicketMetrics {
    /// Recalculate the total from the status breakdown.
    pub fn recalculate_total(&mut self) {
        self.total_tickets = self.by_status.values().sum();
    }
}

// ============================================================================
// Technician Metrics
// ============================================================================

/// Performance metrics for a single technician.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TechnicianMetrics {
    pub technician_id: u64,
    pub name: String,

    /// Number of tickets currently or previously assigned.
    pub tickets_handled: u64,

    /// Number of handled tickets that reached `resolved`.
    pub tickets_resolved: u64,

    /// Average resolution time in seconds over resolved tickets.
    #[serde(default)]
    pub avg_resolution_time_secs: Option<f64>,

    /// Resolved share of handled tickets, when any are handled.
    #[serde(default)]
    pub resolution_rate: Option<f64>,
}

impl TechnicianMetrics {
    pub fn new(technician_id: u64, name: impl Into<String>) -> Self {
        Self {
            technician_id,
            name: name.into(),
            tickets_handled: 0,
            tickets_resolved: 0,
            avg_resolution_time_secs: None,
            resolution_rate: None,
        }
    }
}

// ============================================================================
// Dashboard Snapshot
// ============================================================================

/// A full dashboard computation at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardSnapshot {
    pub generated_at: DateTime<Utc>,
    pub tickets: TicketMetrics,
    pub technicians: Vec<TechnicianMetrics>,

    /// Tickets still open (or reopened), per building.
    #[serde(default)]
    pub open_by_building: HashMap<u64, u64>,
}

/// Timestamp of the first `resolved` transition recorded on the ticket.
fn resolved_at(ticket: &Ticket) -> Option<DateTime<Utc>> {
    ticket
        .history
        .iter()
        .find(|entry| entry.action == RESOLVED_ACTION)
        .map(|entry| entry.timestamp)
}

/// Seconds from report to the first `resolved` transition, if one happened.
fn resolution_seconds(ticket: &Ticket) -> Option<f64> {
    resolved_at(ticket).map(|at| (at - ticket.reported_at).num_milliseconds() as f64 / 1000.0)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Computes the dashboard snapshot for a set of tickets and the technician
/// roster, with the recent-activity window anchored at `now`.
pub fn compute_dashboard_at(
    tickets: &[Ticket],
    technicians: &[Technician],
    now: DateTime<Utc>,
) -> DashboardSnapshot {
    let window_start = now - Duration::days(RECENT_WINDOW_DAYS);

    let mut by_status: HashMap<String, u64> = HashMap::new();
    let mut by_building: HashMap<u64, u64> = HashMap::new();
    let mut by_category: HashMap<String, u64> = HashMap::new();
    let mut open_by_building: HashMap<u64, u64> = HashMap::new();
    let mut reported_last_7_days = 0u64;
    let mut resolved_last_7_days = 0u64;
    let mut open_unassigned = 0u64;
    let mut resolution_times = Vec::new();

    for ticket in tickets {
        *by_status.entry(ticket.status.as_str().to_string()).or_insert(0) += 1;
        *by_building.entry(ticket.building_id).or_insert(0) += 1;
        *by_category.entry(ticket.category.clone()).or_insert(0) += 1;

        if matches!(ticket.status, TicketStatus::Open | TicketStatus::Reopened) {
            *open_by_building.entry(ticket.building_id).or_insert(0) += 1;
        }
        if ticket.status == TicketStatus::Open && ticket.technician_id.is_none() {
            open_unassigned += 1;
        }
        if ticket.reported_at >= window_start {
            reported_last_7_days += 1;
        }
        if let Some(at) = resolved_at(ticket) {
            if at >= window_start {
                resolved_last_7_days += 1;
            }
        }
        if let Some(seconds) = resolution_seconds(ticket) {
            resolution_times.push(seconds);
        }
    }

    let ticket_metrics = TicketMetrics {
        total_tickets: tickets.len() as u64,
        by_status,
        by_building,
        by_category,
        reported_last_7_days,
        resolved_last_7_days,
        open_unassigned,
        mttr_seconds: mean(&resolution_times),
    };

    let technician_metrics = technicians
        .iter()
        .map(|technician| {
            let mut metrics = TechnicianMetrics::new(technician.id, technician.name.clone());
            let mut times = Vec::new();
            for ticket in tickets {
                if ticket.technician_id != Some(technician.id) {
                    continue;
                }
                metrics.tickets_handled += 1;
                if let Some(seconds) = resolution_seconds(ticket) {
                    metrics.tickets_resolved += 1;
                    times.push(seconds);
                }
            }
            metrics.avg_resolution_time_secs = mean(&times);
            if metrics.tickets_handled > 0 {
                metrics.resolution_rate =
                    Some(metrics.tickets_resolved as f64 / metrics.tickets_handled as f64);
            }
            metrics
        })
        .collect();

    DashboardSnapshot {
        generated_at: now,
        tickets: ticket_metrics,
        technicians: technician_metrics,
        open_by_building,
    }
}

/// Computes the dashboard snapshot as of now.
pub fn compute_dashboard(tickets: &[Ticket], technicians: &[Technician]) -> DashboardSnapshot {
    compute_dashboard_at(tickets, technicians, Utc::now())
}

// ============================================================================
// Tests
// ============================================================================
