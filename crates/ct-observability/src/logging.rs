//! Structured logging built on the tracing ecosystem.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Crates included in the default log filter.
const FILTERED_CRATES: &[&str] = &["ct_core", "ct_api", "ct_observability", "ct_cli"];

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level applied to all workspace crates.
    pub level: Level,
    /// Emit JSON lines instead of the human-readable format.
    pub json_format: bool,
    /// Emit span open/close events.
    pub span_events: bool,
    /// Include file and line numbers.
    pub location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            span_events: true,
            location: true,
        }
    }
}

impl LoggingConfig {
    /// Verbose human-readable output for local development.
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            ..Self::default()
        }
    }

    /// JSON output without span noise, for log shippers.
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            json_format: true,
            span_events: false,
            location: false,
        }
    }

    /// The filter for this config, unless `RUST_LOG` overrides it.
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let directives = FILTERED_CRATES
                .iter()
                .map(|krate| format!("{}={}", krate, self.level))
                .collect::<Vec<_>>()
                .join(",");
            EnvFilter::new(directives)
        })
    }
}

/// Initializes the logging system with default configuration.
pub fn init_logging() {
    init_logging_with_config(LoggingConfig::default());
}

/// Initializes the logging system with the given configuration.
pub fn init_logging_with_config(config: LoggingConfig) {
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let registry = tracing_subscriber::registry().with(config.env_filter());

    if config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_span_events(span_events)
                    .with_file(config.location)
                    .with_line_number(config.location),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_span_events(span_events)
                    .with_file(config.location)
                    .with_line_number(config.location),
            )
            .init();
    }
}

/// Creates a span for ticket processing.
#[macro_export]
macro_rules! ticket_span {
    ($ticket_id:expr) => {
        tracing::info_span!("ticket", ticket_id = %$ticket_id)
    };
    ($ticket_id:expr, $($field:tt)*) => {
        tracing::info_span!("ticket", ticket_id = %$ticket_id, $($field)*)
    };
}
