// file: src/error.rs
// version: 3.0.0
// guid: 57b83a63-07b6-4534-aa6c-51e8797254e0

use thiserror::Error;

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, FixpanicError>;

/// Error types for the FixPanic CLI
#[derive(Error, Debug)]
pub enum FixpanicError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Upgrade error: {0}")]
    Upgrade(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("FixPanic Agent is already installed. Use --force to reinstall")]
    AlreadyInstalled,

    #[error("FixPanic Agent is not installed. Run 'fixpanic agent install' first")]
    NotInstalled,
}

impl FixpanicError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new platform error
    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform(msg.into())
    }

    /// Create a new network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a new service error
    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service(msg.into())
    }

    /// Create a new process error
    pub fn process(msg: impl Into<String>) -> Self {
        Self::Process(msg.into())
    }

    /// Create a new upgrade error
    pub fn upgrade(msg: impl Into<String>) -> Self {
        Self::Upgrade(msg.into())
    }
}
