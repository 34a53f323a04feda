//! # ct-api
//!
//! REST API server for Caretaker.
//!
//! This crate provides the HTTP API for ticket management, the kanban board
//! projection, technician assignment, and the KPI dashboard.

pub mod dto;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod session;
pub mod state;

pub use error::ApiError;
pub use server::{ApiServer, ApiServerConfig};
pub use session::Session;
pub use state::AppState;
