//! Application state shared across handlers.

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::info;

use ct_core::{
    BuildingDirectory, EventBus, MemoryBuildingDirectory, MemoryTechnicianDirectory,
    MemoryTicketStore, TechnicianDirectory, TicketStore,
};
use ct_observability::MetricsCollector;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Ticket store (persistence boundary).
    pub store: Arc<dyn TicketStore>,
    /// Read-only technician directory.
    pub technicians: Arc<dyn TechnicianDirectory>,
    /// Read-only building directory.
    pub buildings: Arc<dyn BuildingDirectory>,
    /// Event bus for ticket lifecycle events.
    pub event_bus: Arc<EventBus>,
    /// Metrics collector for counters and resolution durations.
    pub metrics: Arc<MetricsCollector>,
    /// Prometheus metrics handle for rendering metrics.
    pub prometheus_handle: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        store: Arc<dyn TicketStore>,
        technicians: Arc<dyn TechnicianDirectory>,
        buildings: Arc<dyn BuildingDirectory>,
        event_bus: EventBus,
    ) -> Self {
        info!("Application state initialized");

        Self {
            store,
            technicians,
            buildings,
            event_bus: Arc::new(event_bus),
            metrics: Arc::new(MetricsCollector::new()),
            prometheus_handle: None,
        }
    }

    /// Creates a state backed entirely by empty in-memory implementations.
    ///
    /// Used by tests and by demo mode before seeding.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryTicketStore::new()),
            Arc::new(MemoryTechnicianDirectory::default()),
            Arc::new(MemoryBuildingDirectory::default()),
            EventBus::new(100),
        )
    }

    /// Creates a new application state with a Prometheus handle.
    pub fn with_prometheus_handle(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus_handle = Some(Arc::new(handle));
        self
    }
}
