//! Event bus for Caretaker.
//!
//! An in-process, asynchronous bus built on Tokio channels. Every
//! successful ticket mutation publishes an event here so that listeners
//! (the push-notification bridge, dashboards) can react without coupling
//! to the request path. Delivery transport beyond the process boundary is
//! owned by the hosting system.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::ticket::TicketStatus;

/// Errors that can occur in the event bus.
#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to send event: {0}")]
    SendError(String),

    #[error("Subscriber not found: {0}")]
    SubscriberNotFound(String),
}

/// Events that flow through the ticketing system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TicketEvent {
    /// A tenant reported a new ticket.
    TicketReported { ticket_id: u64, code: String },

    /// A ticket moved to a new status.
    StatusChanged {
        ticket_id: u64,
        old_status: TicketStatus,
        new_status: TicketStatus,
        actor: String,
    },

    /// A technician was assigned (or unassigned, when `technician_id` is
    /// `None`).
    TechnicianAssigned {
        ticket_id: u64,
        technician_id: Option<u64>,
        assigned_by: String,
    },

    /// A free-text comment was appended to the ticket history.
    CommentAdded { ticket_id: u64, actor: String },
}

impl TicketEvent {
    /// The ticket this event concerns.
    pub fn ticket_id(&self) -> u64 {
        match self {
            TicketEvent::TicketReported { ticket_id, .. } => *ticket_id,
            TicketEvent::StatusChanged { ticket_id, .. } => *ticket_id,
            TicketEvent::TechnicianAssigned { ticket_id, .. } => *ticket_id,
            TicketEvent::CommentAdded { ticket_id, .. } => *ticket_id,
        }
    }

    /// Returns the event type as a string for logging/metrics.
    pub fn event_type(&self) -> &'static str {
        match self {
            TicketEvent::TicketReported { .. } => "ticket_reported",
            TicketEvent::StatusChanged { .. } => "status_changed",
            TicketEvent::TechnicianAssigned { .. } => "technician_assigned",
            TicketEvent::CommentAdded { .. } => "comment_added",
        }
    }
}

type EventSubscriber = mpsc::Sender<TicketEvent>;

/// Central event bus for the ticketing system.
///
/// Supports a broadcast channel for fan-out plus named subscribers with
/// dedicated bounded channels. Slow named subscribers never block the
/// publisher: their events are dropped and counted instead.
pub struct EventBus {
    broadcast_tx: broadcast::Sender<TicketEvent>,
    subscribers: Arc<RwLock<HashMap<String, EventSubscriber>>>,
    history_size: usize,
    history: Arc<RwLock<VecDeque<TicketEvent>>>,
    dropped_events: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Creates a new event bus with the specified broadcast capacity.
    pub fn new(capacity: usize) -> Self {
        Self::with_history_size(capacity, 1000)
    }

    /// Creates a new event bus with custom history size.
    pub fn with_history_size(capacity: usize, history_size: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(capacity);
        Self {
            broadcast_tx,
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            history_size,
            history: Arc::new(RwLock::new(VecDeque::with_capacity(history_size))),
            dropped_events: AtomicU64::new(0),
        }
    }

    /// Returns the number of dropped events since the bus was created.
    pub fn dropped_event_count(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Publishes an event to all subscribers.
    pub async fn publish(&self, event: TicketEvent) -> Result<(), EventBusError> {
        debug!(event_type = event.event_type(), ticket_id = event.ticket_id(), "Publishing event");

        {
            let mut history = self.history.write().await;
            while history.len() >= self.history_size {
                history.pop_front();
            }
            history.push_back(event.clone());
        }

        // No broadcast receivers is fine: events still land in history.
        let _ = self.broadcast_tx.send(event.clone());
        metrics::counter!("ct_events_published").increment(1);

        let subscribers = self.subscribers.read().await;
        for (name, tx) in subscribers.iter() {
            if let Err(e) = tx.try_send(event.clone()) {
                let dropped = self.dropped_events.fetch_add(1, Ordering::Relaxed) + 1;
                // Log every 100 dropped events to avoid log spam.
                if dropped % 100 == 1 {
                    warn!(
                        "Event dropped for subscriber {} (total dropped: {}): {}",
                        name, dropped, e
                    );
                }
                metrics::counter!("ct_events_dropped").increment(1);
            }
        }

        Ok(())
    }

    /// Publishes an event, logging instead of propagating failures.
    ///
    /// Intended for fire-and-forget call sites inside request handlers,
    /// where a bus problem must not fail the ticket mutation it follows.
    pub async fn publish_with_fallback(&self, event: TicketEvent) {
        if let Err(e) = self.publish(event).await {
            tracing::error!(error = %e, "Event publish failed");
            metrics::counter!("ct_event_publish_failures").increment(1);
        }
    }

    /// Subscribes to the broadcast channel.
    pub fn subscribe_broadcast(&self) -> broadcast::Receiver<TicketEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Registers a named subscriber with a dedicated bounded channel.
    pub async fn register_subscriber(
        &self,
        name: &str,
        buffer_size: usize,
    ) -> mpsc::Receiver<TicketEvent> {
        let (tx, rx) = mpsc::channel(buffer_size);
        let mut subscribers = self.subscribers.write().await;
        subscribers.insert(name.to_string(), tx);
        info!("Registered subscriber: {}", name);
        rx
    }

    /// Unregisters a named subscriber.
    pub async fn unregister_subscriber(&self, name: &str) -> Result<(), EventBusError> {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.remove(name).is_some() {
            info!("Unregistered subscriber: {}", name);
            Ok(())
        } else {
            Err(EventBusError::SubscriberNotFound(name.to_string()))
        }
    }

    /// Gets recent event history, newest first when limited.
    pub async fn get_history(&self, limit: Option<usize>) -> Vec<TicketEvent> {
        let history = self.history.read().await;
        match limit {
            Some(n) => history.iter().rev().take(n).cloned().collect(),
            None => history.iter().cloned().collect(),
        }
    }

    /// Gets events for a specific ticket.
    pub async fn get_ticket_events(&self, ticket_id: u64) -> Vec<TicketEvent> {
        let history = self.history.read().await;
        history
            .iter()
            .filter(|event| event.ticket_id() == ticket_id)
            .cloned()
            .collect()
    }

    /// Gets the number of active subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len() + self.broadcast_tx.receiver_count()
    }
}
