//! # ct-observability
//!
//! Logging and metrics infrastructure for Caretaker.
//!
//! This crate provides structured logging with tracing and metrics
//! collection with Prometheus export support.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
pub use metrics::{init_prometheus, MetricsCollector};
