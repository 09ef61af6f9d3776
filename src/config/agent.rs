// file: src/config/agent.rs
// version: 1.0.0
// guid: ca1192ef-1aa5-4b12-a56d-757be4e01735

//! Agent configuration file model

use super::{DEFAULT_SOCKET_SERVER, LOG_LEVELS};
use crate::platform::InstallLayout;
use crate::{FixpanicError, Result};
use serde::{Deserialize, Serialize};

/// Agent configuration as written to `agent.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub app: AppSection,
    #[serde(default)]
    pub connection: ConnectionSection,
    #[serde(default)]
    pub security: SecuritySection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Agent identity and credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSection {
    pub agent_id: String,
    pub api_key: String,
}

/// How the agent reaches the FixPanic socket server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSection {
    pub socket_server: String,
    pub tls_enabled: bool,
    pub tls_skip_verify: bool,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub reconnect_interval_secs: u64,
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            socket_server: DEFAULT_SOCKET_SERVER.to_string(),
            tls_enabled: true,
            tls_skip_verify: false,
            max_connections: 10,
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
            reconnect_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    pub rules_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub file: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: String::new(),
        }
    }
}

impl AgentConfig {
    /// Build a configuration with defaults, taking file locations from the layout
    pub fn new(agent_id: impl Into<String>, api_key: impl Into<String>, layout: &InstallLayout) -> Self {
        Self {
            app: AppSection {
                agent_id: agent_id.into(),
                api_key: api_key.into(),
            },
            connection: ConnectionSection::default(),
            security: SecuritySection {
                rules_file: layout.rules_path().display().to_string(),
            },
            logging: LoggingSection {
                level: "info".to_string(),
                file: layout.log_path().display().to_string(),
            },
        }
    }

    /// Use a different socket server
    pub fn with_socket_server(mut self, socket_server: impl Into<String>) -> Self {
        self.connection.socket_server = socket_server.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.app.agent_id.trim().is_empty() {
            return Err(FixpanicError::validation("agent ID is required"));
        }
        if self.app.api_key.trim().is_empty() {
            return Err(FixpanicError::validation("API key is required"));
        }

        validate_socket_server(&self.connection.socket_server)?;

        if self.connection.max_connections == 0 {
            return Err(FixpanicError::validation(
                "max_connections must be greater than zero",
            ));
        }
        if self.connection.connect_timeout_secs == 0 || self.connection.read_timeout_secs == 0 {
            return Err(FixpanicError::validation("timeouts must be greater than zero"));
        }
        if self.connection.tls_skip_verify && !self.connection.tls_enabled {
            return Err(FixpanicError::validation(
                "tls_skip_verify requires tls_enabled",
            ));
        }

        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(FixpanicError::validation(format!(
                "unknown log level '{}' (expected one of: {})",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }
}

/// Check a `host:port` address
pub fn validate_socket_server(address: &str) -> Result<()> {
    let address = address.trim();
    if address.is_empty() {
        return Err(FixpanicError::validation("socket server address is required"));
    }

    let (host, port) = address.rsplit_once(':').ok_or_else(|| {
        FixpanicError::validation(format!(
            "socket server '{}' must be in host:port form",
            address
        ))
    })?;

    if host.trim_matches(|c| c == '[' || c == ']').is_empty() {
        return Err(FixpanicError::validation(format!(
            "socket server '{}' is missing a host",
            address
        )));
    }

    match port.parse::<u16>() {
        Ok(p) if p > 0 => Ok(()),
        _ => Err(FixpanicError::validation(format!(
            "socket server '{}' has an invalid port",
            address
        ))),
    }
}
