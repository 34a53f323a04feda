//! Configuration loading for the Caretaker CLI.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server settings used by `serve`.
    #[serde(default)]
    pub server: ServerConfig,

    /// Identity the CLI presents to the API on remote commands.
    #[serde(default)]
    pub actor: ActorConfig,

    /// Optional fixture files loaded into the in-memory store at startup.
    #[serde(default)]
    pub seed: SeedConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Loads configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_yaml::to_string(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Whether to serve the Swagger UI.
    #[serde(default = "default_true")]
    pub swagger: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            swagger: default_true(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Identity presented on remote commands via the actor headers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Actor id.
    #[serde(default = "default_actor_id")]
    pub id: u64,

    /// Actor display name.
    #[serde(default = "default_actor_name")]
    pub name: String,

    /// Actor role (member, technical, technical-default, super-admin).
    #[serde(default = "default_actor_role")]
    pub role: String,
}

fn default_actor_id() -> u64 {
    1
}

fn default_actor_name() -> String {
    "Caretaker Operator".to_string()
}

fn default_actor_role() -> String {
    "super-admin".to_string()
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            id: default_actor_id(),
            name: default_actor_name(),
            role: default_actor_role(),
        }
    }
}

/// Fixture files for the in-memory store. All optional; an unset entry
/// leaves that collection empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedConfig {
    /// YAML file with a list of tickets to create at startup.
    #[serde(default)]
    pub tickets: Option<String>,

    /// YAML file with the technician roster.
    #[serde(default)]
    pub technicians: Option<String>,

    /// YAML file with the building directory.
    #[serde(default)]
    pub buildings: Option<String>,
}

impl SeedConfig {
    /// All configured fixture paths with their config keys.
    pub fn configured_paths(&self) -> Vec<(&'static str, &str)> {
        let mut paths = Vec::new();
        if let Some(path) = &self.tickets {
            paths.push(("seed.tickets", path.as_str()));
        }
        if let Some(path) = &self.technicians {
            paths.push(("seed.technicians", path.as_str()));
        }
        if let Some(path) = &self.buildings {
            paths.push(("seed.buildings", path.as_str()));
        }
        paths
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to use JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
