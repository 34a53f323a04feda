//! Configuration validation for Caretaker.
//!
//! This module provides startup validation so misconfiguration is reported
//! before the server starts instead of failing on the first request.

use crate::config::AppConfig;
use colored::Colorize;
use ct_core::Role;
use std::fmt;
use std::path::Path;

/// How bad a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    /// Should be addressed, does not prevent startup.
    Warning,
    /// Prevents startup.
    Error,
}

/// A single problem found in the configuration.
#[derive(Debug)]
struct Finding {
    severity: Severity,
    message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    findings: Vec<Finding>,
}

impl ValidationResult {
    fn push(&mut self, severity: Severity, message: impl Into<String>) {
        self.findings.push(Finding {
            severity,
            message: message.into(),
        });
    }

    fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message);
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message);
    }

    fn of_severity(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.severity == severity)
    }

    /// Returns true if any finding prevents startup.
    pub fn has_errors(&self) -> bool {
        self.of_severity(Severity::Error).next().is_some()
    }

    /// Returns true if any finding is a warning.
    pub fn has_warnings(&self) -> bool {
        self.of_severity(Severity::Warning).next().is_some()
    }

    /// Prints the findings to the console, warnings before errors.
    pub fn print(&self) {
        if self.findings.is_empty() {
            println!("  {} Configuration OK", "✓".green());
            return;
        }

        if self.has_warnings() {
            println!();
            println!("{}", "Configuration Warnings:".yellow().bold());
            for finding in self.of_severity(Severity::Warning) {
                println!("  {} {}", "⚠".yellow(), finding);
            }
        }

        if self.has_errors() {
            println!();
            println!("{}", "Configuration Errors:".red().bold());
            for finding in self.of_severity(Severity::Error) {
                println!("  {} {}", "✗".red(), finding);
            }
        }
    }
}

/// Validates application configuration before startup.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Runs every check and collects the findings.
    pub fn validate(config: &AppConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::check_actor(config, &mut result);
        Self::check_server(config, &mut result);
        Self::check_seed(config, &mut result);
        Self::check_logging(config, &mut result);

        result
    }

    /// The actor identity the CLI presents to the API.
    fn check_actor(config: &AppConfig, result: &mut ValidationResult) {
        if Role::parse(&config.actor.role).is_none() {
            let valid: Vec<&str> = Role::ALL.iter().map(|r| r.as_str()).collect();
            result.error(format!(
                "Invalid actor role '{}'. Must be one of: {}",
                config.actor.role,
                valid.join(", ")
            ));
        }

        if config.actor.name.trim().is_empty() {
            result.warning(
                "Actor name is empty. The API rejects requests without an identity, \
                 so remote commands will fail until actor.name is set.",
            );
        }
    }

    /// Server bind settings.
    fn check_server(config: &AppConfig, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.error(
                "Server port 0 is not a valid listen port. \
                 Set server.port to a port in the range 1-65535.",
            );
        }

        if matches!(config.server.host.as_str(), "0.0.0.0" | "::" | "[::]") {
            result.warning(format!(
                "Server binds to all interfaces ({}). The actor headers are trusted \
                 as-is, so expose the API only behind an authenticating proxy.",
                config.server.host
            ));
        }

        if config.server.timeout_secs == 0 {
            result.warning("Request timeout is 0 seconds; requests will never time out.");
        }
    }

    /// Every configured seed fixture must exist and parse as YAML.
    fn check_seed(config: &AppConfig, result: &mut ValidationResult) {
        for (key, path) in config.seed.configured_paths() {
            let fixture = Path::new(path);

            if !fixture.exists() {
                result.error(format!("Seed file not found: {} ({})", path, key));
                continue;
            }

            match std::fs::read_to_string(fixture) {
                Ok(contents) => {
                    if let Err(e) = serde_yaml::from_str::<serde_yaml::Value>(&contents) {
                        result.error(format!("Failed to parse seed file '{}': {}", path, e));
                    }
                }
                Err(e) => {
                    result.error(format!("Failed to read seed file '{}': {}", path, e));
                }
            }
        }
    }

    /// The logging level string.
    fn check_logging(config: &AppConfig, result: &mut ValidationResult) {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            result.warning(format!(
                "Unknown log level '{}'. Falling back to 'info'. Valid levels: {}",
                config.logging.level,
                valid_levels.join(", ")
            ));
        }
    }
}
