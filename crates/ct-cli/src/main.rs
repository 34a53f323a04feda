//! Caretaker CLI
//!
//! Command-line interface for the Caretaker building maintenance system.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod api_client;
mod commands;
mod config;
mod validator;

use api_client::{ApiClient, BoardParams, ListTicketsParams, TransitionRequestBody};
use commands::{run_server, ServeConfig};
use config::AppConfig;
use validator::ConfigValidator;

#[derive(Parser)]
#[command(name = "caretaker")]
#[command(author = "Caretaker Team")]
#[command(version)]
#[command(about = "Building maintenance ticketing for residential properties", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    /// API server URL (for remote commands)
    #[arg(long, default_value = "http://localhost:8080")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Disable Swagger UI
        #[arg(long)]
        no_swagger: bool,

        /// Validate configuration and exit without starting the server
        #[arg(long)]
        validate_only: bool,
    },

    /// Validate configuration
    Validate {
        /// Configuration file to validate
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show current configuration
    Config {
        /// Show the built-in defaults instead of the loaded file
        #[arg(long)]
        show_defaults: bool,
    },

    /// Manage tickets
    Ticket {
        #[command(subcommand)]
        action: TicketCommands,
    },

    /// Show the Kanban board for the configured actor
    Board {
        /// Filter by status
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by technician id
        #[arg(short, long)]
        technician: Option<u64>,

        /// Filter by building id
        #[arg(short, long)]
        building: Option<u64>,
    },

    /// View the KPI dashboard
    Dashboard,
}

#[derive(Subcommand)]
enum TicketCommands {
    /// List tickets
    List {
        /// Filter by status
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by building id
        #[arg(short, long)]
        building: Option<u64>,

        /// Filter by technician id
        #[arg(short, long)]
        technician: Option<u64>,

        /// Maximum number of tickets to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show ticket details
    Show {
        /// Ticket ID
        id: u64,
    },

    /// Move a ticket to a new status
    Move {
        /// Ticket ID
        id: u64,

        /// Target status
        #[arg(short, long)]
        status: String,

        /// Justification comment (required for resolved, closed, cancelled)
        #[arg(long)]
        comment: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first; the logging section feeds the subscriber setup
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = AppConfig::load(&config_path).unwrap_or_else(|_| {
        if cli.verbose {
            eprintln!("No config file found; using built-in defaults");
        }
        AppConfig::default()
    });

    // Initialize logging
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        parse_log_level(&config.logging.level)
    };

    ct_observability::logging::init_logging_with_config(ct_observability::logging::LoggingConfig {
        level: log_level,
        json_format: cli.format == OutputFormat::Json || config.logging.json,
        ..Default::default()
    });

    // Execute command
    match cli.command {
        Commands::Serve {
            port,
            host,
            no_swagger,
            validate_only,
        } => {
            let serve_config = ServeConfig {
                port: port.unwrap_or(config.server.port),
                host: host.unwrap_or_else(|| config.server.host.clone()),
                enable_swagger: !no_swagger && config.server.swagger,
                timeout_secs: config.server.timeout_secs,
            };
            cmd_serve(serve_config, config, validate_only).await
        }
        Commands::Validate { config: cfg_path } => {
            cmd_validate(cfg_path.unwrap_or(config_path)).await
        }
        Commands::Config { show_defaults } => cmd_config(config, show_defaults, cli.format).await,
        Commands::Ticket { action } => cmd_ticket(action, config, cli.format, &cli.api_url).await,
        Commands::Board {
            status,
            technician,
            building,
        } => {
            cmd_board(
                BoardParams {
                    status,
                    technician,
                    building,
                },
                config,
                cli.format,
                &cli.api_url,
            )
            .await
        }
        Commands::Dashboard => cmd_dashboard(config, cli.format, &cli.api_url).await,
    }
}

fn default_config_path() -> PathBuf {
    if let Some(dirs) = directories::ProjectDirs::from("com", "caretaker", "caretaker") {
        dirs.config_dir().join("config.yaml")
    } else {
        PathBuf::from("config/default.yaml")
    }
}

fn parse_log_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

/// Terminal color for a wire-format status string.
fn colored_status(status: &str) -> colored::ColoredString {
    match status {
        "open" => status.yellow(),
        "in_progress" => status.cyan(),
        "resolved" => status.green(),
        "closed" => status.blue(),
        "reopened" => status.magenta(),
        "cancelled" => status.red(),
        _ => status.white(),
    }
}

async fn cmd_serve(
    serve_config: ServeConfig,
    app_config: AppConfig,
    validate_only: bool,
) -> Result<()> {
    println!("{}", "Validating configuration...".cyan());

    // Run configuration validation
    let validation_result = ConfigValidator::validate(&app_config);
    validation_result.print();

    // If validate_only mode, exit after validation
    if validate_only {
        if validation_result.has_errors() {
            println!();
            println!(
                "{}",
                "Configuration has errors; the server will not start until they are fixed."
                    .red()
                    .bold()
            );
            std::process::exit(1);
        } else {
            println!();
            println!(
                "{}",
                "Configuration is valid; ready to serve.".green().bold()
            );
            return Ok(());
        }
    }

    // If there are errors, refuse to start
    if validation_result.has_errors() {
        println!();
        println!(
            "{}",
            "Refusing to start with an invalid configuration; fix the errors above."
                .red()
                .bold()
        );
        std::process::exit(1);
    }

    println!();
    run_server(serve_config, app_config).await
}

async fn cmd_validate(config_path: PathBuf) -> Result<()> {
    println!(
        "Checking configuration file {}",
        config_path.display().to_string().cyan()
    );

    // First, check if the file can be loaded
    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("{}: {}", "Configuration file error".red().bold(), e);
            std::process::exit(1);
        }
    };

    // Run comprehensive validation
    let validation_result = ConfigValidator::validate(&config);
    validation_result.print();

    // Summary
    println!();
    println!("{}", "Configuration Summary".bold());
    println!("─────────────────────");
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!(
        "  Actor: {} (id {}, role {})",
        config.actor.name, config.actor.id, config.actor.role
    );
    println!("  Seed files: {}", config.seed.configured_paths().len());
    println!("  Log level: {}", config.logging.level);

    if validation_result.has_errors() {
        println!();
        println!(
            "{}",
            "Configuration has errors; see above.".red().bold()
        );
        std::process::exit(1);
    } else if validation_result.has_warnings() {
        println!();
        println!(
            "{}",
            "Configuration is usable, but review the warnings above."
                .yellow()
                .bold()
        );
    } else {
        println!();
        println!("{}", "Configuration is valid.".green().bold());
    }

    Ok(())
}

async fn cmd_config(config: AppConfig, show_defaults: bool, format: OutputFormat) -> Result<()> {
    let display_config = if show_defaults {
        AppConfig::default()
    } else {
        config
    };

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&display_config)?);
    } else {
        let title = if show_defaults {
            "Default Configuration"
        } else {
            "Current Configuration"
        };
        println!("{}", title.bold());
        println!("─────────────────────────");
        println!(
            "Server: {}:{} (swagger: {})",
            display_config.server.host, display_config.server.port, display_config.server.swagger
        );
        println!(
            "Actor: {} (id {}, role {})",
            display_config.actor.name, display_config.actor.id, display_config.actor.role
        );
        println!("\nSeed files:");
        let paths = display_config.seed.configured_paths();
        if paths.is_empty() {
            println!("  (none - the server starts with an empty store)");
        } else {
            for (key, path) in paths {
                println!("  - {}: {}", key, path);
            }
        }
        println!(
            "\nLogging: {} (json: {})",
            display_config.logging.level, display_config.logging.json
        );
    }

    Ok(())
}

async fn cmd_ticket(
    action: TicketCommands,
    config: AppConfig,
    format: OutputFormat,
    api_url: &str,
) -> Result<()> {
    let client = ApiClient::new(api_url, config.actor)?;

    match action {
        TicketCommands::List {
            status,
            building,
            technician,
            limit,
        } => {
            let params = ListTicketsParams {
                status,
                building,
                technician,
                per_page: Some(limit as u32),
                ..Default::default()
            };

            match client.list_tickets(&params).await {
                Ok(response) => {
                    if format == OutputFormat::Json {
                        println!("{}", serde_json::to_string_pretty(&response)?);
                    } else {
                        println!("{}", "Tickets".bold());
                        println!("───────");
                        if response.data.is_empty() {
                            println!("No tickets found");
                        } else {
                            for ticket in response.data {
                                println!(
                                    "  {} [{}] {} - {}",
                                    ticket.code.cyan(),
                                    colored_status(&ticket.status),
                                    ticket.category,
                                    ticket.summary
                                );
                            }
                            println!();
                            println!(
                                "page {} of {}, {} tickets total",
                                response.pagination.page,
                                response.pagination.total_pages,
                                response.pagination.total_items
                            );
                        }
                    }
                }
                Err(e) => {
                    println!("{}: {}", "Error".red(), e);
                    println!("Make sure the API server is running (caretaker serve)");
                }
            }
        }
        TicketCommands::Show { id } => match client.get_ticket(id).await {
            Ok(detail) => {
                if format == OutputFormat::Json {
                    println!("{}", serde_json::to_string_pretty(&detail)?);
                } else {
                    println!("{} {}", "Ticket:".bold(), detail.ticket.code);
                    println!("─────────────────────────────────────────");
                    println!(
                        "  {} {}",
                        "Status:".cyan(),
                        colored_status(&detail.ticket.status)
                    );
                    println!("  {} {}", "Summary:".cyan(), detail.ticket.summary);
                    println!("  {} {}", "Category:".cyan(), detail.ticket.category);
                    println!(
                        "  {} {} (id {})",
                        "Tenant:".cyan(),
                        detail.ticket.tenant_name,
                        detail.ticket.tenant_id
                    );
                    println!(
                        "  {} {} / apartment {}",
                        "Building:".cyan(),
                        detail.ticket.building_id,
                        detail.ticket.apartment
                    );
                    if let Some(device) = &detail.ticket.device {
                        println!("  {} {}", "Device:".cyan(), device);
                    }
                    match detail.ticket.technician_id {
                        Some(technician_id) => {
                            println!("  {} {}", "Technician:".cyan(), technician_id)
                        }
                        None => println!("  {} {}", "Technician:".cyan(), "unassigned".yellow()),
                    }
                    println!("  {} {}", "Reported:".cyan(), detail.ticket.reported_at);
                    println!("  {} {}", "Updated:".cyan(), detail.ticket.updated_at);
                    println!();
                    println!(
                        "{} ({})",
                        "Allowed Transitions".bold(),
                        detail.allowed_transitions.len()
                    );
                    for transition in &detail.allowed_transitions {
                        if transition.requires_comment {
                            println!(
                                "  {} {} (requires comment)",
                                "→".green(),
                                transition.status
                            );
                        } else {
                            println!("  {} {}", "→".green(), transition.status);
                        }
                    }
                    println!();
                    println!("{} ({})", "History".bold(), detail.history.len());
                    for entry in &detail.history {
                        println!(
                            "  {} {} by {}",
                            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                            entry.action,
                            entry.actor
                        );
                    }
                }
            }
            Err(e) => {
                println!("{}: {}", "Error".red(), e);
            }
        },
        TicketCommands::Move {
            id,
            status,
            comment,
        } => {
            let request = TransitionRequestBody {
                target_status: status,
                comment,
                trigger: "button".to_string(),
            };

            match client.transition_ticket(id, &request).await {
                Ok(outcome) => {
                    if format == OutputFormat::Json {
                        println!("{}", serde_json::to_string_pretty(&outcome)?);
                    } else {
                        println!(
                            "{} Ticket {} moved to {}",
                            "✓".green(),
                            outcome.ticket.code.cyan(),
                            colored_status(&outcome.ticket.status)
                        );
                        println!("  {}", outcome.history_entry.description);
                    }
                }
                Err(e) => {
                    println!("{}: {}", "Error".red(), e);
                }
            }
        }
    }
    Ok(())
}

async fn cmd_board(
    params: BoardParams,
    config: AppConfig,
    format: OutputFormat,
    api_url: &str,
) -> Result<()> {
    let client = ApiClient::new(api_url, config.actor)?;

    match client.board(&params).await {
        Ok(board) => {
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&board)?);
            } else {
                println!(
                    "{} ({} tickets)",
                    "Caretaker Board".bold(),
                    board.total_tickets
                );
                println!("─────────────────────");
                for column in &board.columns {
                    println!();
                    println!("{} ({})", column.label.bold(), column.tickets.len());
                    if column.tickets.is_empty() {
                        println!("  (empty)");
                    }
                    for ticket in &column.tickets {
                        println!(
                            "  {} [{}] apt {} - {}",
                            ticket.code.cyan(),
                            ticket.category,
                            ticket.apartment,
                            ticket.summary
                        );
                    }
                }
            }
        }
        Err(e) => {
            println!("{}: {}", "Error".red(), e);
            println!("Make sure the API server is running (caretaker serve)");
        }
    }
    Ok(())
}

async fn cmd_dashboard(config: AppConfig, format: OutputFormat, api_url: &str) -> Result<()> {
    let client = ApiClient::new(api_url, config.actor)?;

    match client.dashboard().await {
        Ok(dashboard) => {
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
            } else {
                println!("{}", "Caretaker Dashboard".bold());
                println!("─────────────────────");
                println!();
                println!("{}", "Tickets".bold());
                println!("  Total: {}", dashboard.tickets.total_tickets);
                println!(
                    "  Reported (last 7 days): {}",
                    dashboard.tickets.reported_last_7_days
                );
                println!(
                    "  Resolved (last 7 days): {}",
                    dashboard.tickets.resolved_last_7_days
                );
                println!("  Open unassigned: {}", dashboard.tickets.open_unassigned);
                println!();
                println!("{}", "By Status".bold());
                for (status, count) in &dashboard.tickets.by_status {
                    println!("  {}: {}", status, count);
                }
                println!();
                println!("{}", "Open by Building".bold());
                for (building, count) in &dashboard.open_by_building {
                    println!("  building {}: {}", building, count);
                }
                println!();
                println!("{}", "Technicians".bold());
                for technician in &dashboard.technicians {
                    let rate = technician
                        .resolution_rate
                        .map(|r| format!("{:.1}%", r * 100.0))
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "  {}: {} handled, {} resolved ({})",
                        technician.name.cyan(),
                        technician.tickets_handled,
                        technician.tickets_resolved,
                        rate
                    );
                }
                println!();
                println!("{}", "Performance".bold());
                if let Some(mttr) = dashboard.tickets.mttr_seconds {
                    println!("  Mean Time to Resolve: {:.1}s", mttr);
                } else {
                    println!("  Mean Time to Resolve: no resolved tickets yet");
                }
            }
        }
        Err(e) => {
            println!("{}: {}", "Error".red(), e);
            println!("Make sure the API server is running (caretaker serve)");
        }
    }
    Ok(())
}
