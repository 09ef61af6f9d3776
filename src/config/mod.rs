// file: src/config/mod.rs
// version: 2.0.0
// guid: a1b2c3d4-e5f6-7a8b-9c0d-1e2f3a4b5c6d

//! Configuration module for the FixPanic CLI
//!
//! Handles the agent's YAML configuration file and the command security rules
//! the agent enforces.

pub mod agent;
pub mod loader;
pub mod rules;

pub use agent::{AgentConfig, AppSection, ConnectionSection, LoggingSection, SecuritySection};
pub use loader::ConfigLoader;
pub use rules::SecurityRules;

/// Default socket server the agent connects to
pub const DEFAULT_SOCKET_SERVER: &str = "socket.fixpanic.com:8080";

/// Log levels the agent understands
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
