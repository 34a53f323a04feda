//! The `serve` command: seed, wire up, and run the API server.

use anyhow::{Context, Result};
use colored::Colorize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ct_api::{ApiServer, ApiServerConfig, AppState};
use ct_core::{
    Building, EventBus, MemoryBuildingDirectory, MemoryTechnicianDirectory, MemoryTicketStore,
    NewTicket, Technician, TicketStore,
};
use ct_observability::metrics::init_prometheus;

use crate::config::AppConfig;

/// Server settings resolved from CLI flags and the config file.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub port: u16,
    pub host: String,
    pub enable_swagger: bool,
    pub timeout_secs: u64,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            enable_swagger: true,
            timeout_secs: 30,
        }
    }
}

/// Runs the API server.
pub async fn run_server(config: ServeConfig, app_config: AppConfig) -> Result<()> {
    println!("{} Starting Caretaker API Server...", "[server]".cyan());

    // Build the in-memory store, seeded from fixtures when configured
    let store = MemoryTicketStore::new();

    if let Some(path) = &app_config.seed.tickets {
        println!("  {} Seeding tickets from {}", "→".green(), path);
        let drafts: Vec<NewTicket> = load_fixture(path)?;
        let count = drafts.len();
        for draft in drafts {
            store.create(draft).await?;
        }
        println!("  {} Seeded {} tickets", "✓".green(), count);
    }

    let technicians: Vec<Technician> = match &app_config.seed.technicians {
        Some(path) => {
            println!("  {} Loading technicians from {}", "→".green(), path);
            load_fixture(path)?
        }
        None => Vec::new(),
    };

    let buildings: Vec<Building> = match &app_config.seed.buildings {
        Some(path) => {
            println!("  {} Loading buildings from {}", "→".green(), path);
            load_fixture(path)?
        }
        None => Vec::new(),
    };

    // Install the Prometheus recorder before any metric is emitted
    let prometheus = init_prometheus().context("Failed to install Prometheus recorder")?;

    let state = AppState::new(
        Arc::new(store),
        Arc::new(MemoryTechnicianDirectory::new(technicians)),
        Arc::new(MemoryBuildingDirectory::new(buildings)),
        EventBus::new(1024),
    )
    .with_prometheus_handle(prometheus);

    let bind_address: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.host, config.port))?;

    let server_config = ApiServerConfig {
        bind_address,
        request_timeout: Duration::from_secs(config.timeout_secs),
        enable_swagger: config.enable_swagger,
        shutdown_timeout: Duration::from_secs(30),
    };

    print_banner(&config, bind_address);

    let server = ApiServer::new(state, server_config);
    server.run().await.context("Server error")?;

    println!();
    println!("{} Server stopped", "[server]".cyan());

    Ok(())
}

fn print_banner(config: &ServeConfig, bind_address: SocketAddr) {
    println!();
    println!("{}", "Caretaker API Server".bold());
    println!("{}", "─".repeat(44));
    println!("  {:<12} http://{}", "address".cyan(), bind_address);
    if config.enable_swagger {
        println!(
            "  {:<12} http://{}/swagger-ui",
            "swagger".cyan(),
            bind_address
        );
    }
    println!();
    println!("{}", "Endpoints:".bold());
    for (route, what) in [
        ("GET  /health", "Health check"),
        ("GET  /ready", "Readiness probe"),
        ("GET  /live", "Liveness probe"),
        ("GET  /api/tickets", "List tickets"),
        ("POST /api/tickets", "Report ticket"),
        ("GET  /api/tickets/:id", "Get ticket"),
        ("POST /api/tickets/:id/transitions", "Move ticket"),
        ("POST /api/tickets/:id/assign", "Assign technician"),
        ("GET  /api/board", "Kanban board"),
        ("POST /api/board/move", "Drag-and-drop move"),
        ("GET  /api/analytics/dashboard", "KPI dashboard"),
        ("GET  /metrics", "Prometheus metrics"),
    ] {
        println!("  {:<34} {}", route, what);
    }
    println!();
    println!("Press {} to stop", "Ctrl+C".yellow());
    println!();
}

/// Reads and parses a YAML seed fixture.
fn load_fixture<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file: {}", path))?;
    serde_yaml::from_str(&raw).with_context(|| format!("Failed to parse seed file: {}", path))
}
