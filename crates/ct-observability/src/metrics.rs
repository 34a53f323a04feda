//! Metrics collection for Caretaker.
//!
//! This module provides metrics collection using the metrics crate
//! with Prometheus export support.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tokio::sync::RwLock;

/// Installs the Prometheus recorder and returns the render handle.
///
/// Call once during server startup; the handle is kept in the shared
/// application state and rendered by the `/metrics` endpoint.
pub fn init_prometheus() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metrics collector for the ticketing system.
pub struct MetricsCollector {
    /// Report timestamps per ticket, for resolution-duration tracking.
    ticket_opened: Arc<RwLock<HashMap<u64, DateTime<Utc>>>>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self::register_metrics();

        Self {
            ticket_opened: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers metric descriptions.
    fn register_metrics() {
        describe_counter!(
            "ct_tickets_reported_total",
            "Total number of tickets reported"
        );
        describe_counter!(
            "ct_transitions_total",
            "Total number of successful status transitions"
        );
        describe_counter!(
            "ct_transitions_rejected_total",
            "Total number of rejected status transitions"
        );
        describe_counter!(
            "ct_assignments_total",
            "Total number of technician assignments"
        );
        describe_counter!("ct_errors_total", "Total number of errors");

        describe_counter!("ct_events_published", "Events published on the bus");
        describe_counter!(
            "ct_events_dropped",
            "Events dropped for slow named subscribers"
        );
        describe_counter!("ct_event_publish_failures", "Event publish failures");

        describe_counter!(
            "ct_history_entries_total",
            "History entries appended to tickets"
        );

        describe_gauge!("ct_open_tickets", "Number of tickets currently open");

        describe_histogram!(
            "ct_resolution_duration_seconds",
            "Time from report to resolution"
        );
    }

    /// Records a reported ticket.
    pub async fn record_ticket_reported(&self, ticket_id: u64, category: &str) {
        counter!("ct_tickets_reported_total", "category" => category.to_string()).increment(1);
        gauge!("ct_open_tickets").increment(1.0);

        let mut opened = self.ticket_opened.write().await;
        opened.insert(ticket_id, Utc::now());
    }

    /// Records a successful status transition.
    pub fn record_transition(&self, from: &str, to: &str) {
        counter!("ct_transitions_total", "from" => from.to_string(), "to" => to.to_string())
            .increment(1);
    }

    /// Records a rejected transition with its rejection reason code.
    pub fn record_transition_rejected(&self, reason: &str) {
        counter!("ct_transitions_rejected_total", "reason" => reason.to_string()).increment(1);
    }

    /// Records a resolution and returns the duration since the report, when
    /// the report was seen by this collector.
    pub async fn record_ticket_resolved(&self, ticket_id: u64) -> Option<f64> {
        gauge!("ct_open_tickets").decrement(1.0);

        let mut opened = self.ticket_opened.write().await;
        let duration = opened
            .remove(&ticket_id)
            .map(|at| (Utc::now() - at).num_milliseconds() as f64 / 1000.0);
        if let Some(seconds) = duration {
            histogram!("ct_resolution_duration_seconds").record(seconds);
        }
        duration
    }

    /// Records a technician assignment.
    pub fn record_assignment(&self) {
        counter!("ct_assignments_total").increment(1);
    }

    /// Records an appended history entry with its action label.
    pub fn record_history_appended(&self, action: &str) {
        counter!("ct_history_entries_total", "action" => action.to_string()).increment(1);
    }

    /// Records an error.
    pub fn record_error(&self, error_type: &str) {
        counter!("ct_errors_total", "type" => error_type.to_string()).increment(1);
    }

    /// Sets the open-ticket gauge to an absolute value.
    pub fn set_open_tickets(&self, count: u64) {
        gauge!("ct_open_tickets").set(count as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolution_duration_requires_a_known_report() {
        let collector = MetricsCollector::new();
        assert!(collector.record_ticket_resolved(1).await.is_none());

        collector.record_ticket_reported(1, "plumbing").await;
        let duration = collector.record_ticket_resolved(1).await;
        assert!(duration.is_some());
        assert!(duration.unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_resolution_is_recorded_once() {
        let collector = MetricsCollector::new();
        collector.record_ticket_reported(2, "electrical").await;

        assert!(collector.record_ticket_resolved(2).await.is_some());
        assert!(collector.record_ticket_resolved(2).await.is_none());
    }

    #[test]
    fn test_counter_recording_does_not_panic() {
        let collector = MetricsCollector::new();
        collector.record_transition("open", "in_progress");
        collector.record_transition_rejected("illegal_transition");
        collector.record_assignment();
        collector.record_history_appended("status_change_resolved");
        collector.record_error("store");
        collector.set_open_tickets(5);
    }
}
