// file: src/service/mod.rs
// version: 1.0.0
// guid: 42ce6462-f29c-4586-b4db-897b15ea9b0f

//! OS service manager integration
//!
//! The agent is registered with whatever the host uses to supervise
//! long-running programs: systemd on Linux, launchd on macOS and the Service
//! Control Manager on Windows. The managers themselves are driven purely
//! through their command line tools. When none is available, [`detect`]
//! returns `None` and callers fall back to [`crate::process`].

pub mod launchd;
pub mod logfile;
pub mod systemd;
pub mod windows;

pub use launchd::LaunchdManager;
pub use systemd::SystemdManager;
pub use windows::WindowsServiceManager;

use crate::platform::{command_available, InstallLayout, Os};
use crate::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Which service manager backs a [`ServiceManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Systemd,
    Launchd,
    WindowsScm,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Systemd => f.write_str("systemd"),
            ServiceKind::Launchd => f.write_str("launchd"),
            ServiceKind::WindowsScm => f.write_str("Windows Service Manager"),
        }
    }
}

/// State of the agent service as reported by the service manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceStatus {
    Running,
    Stopped,
    Starting,
    Stopping,
    NotInstalled,
    Unknown(String),
}

impl ServiceStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ServiceStatus::Running | ServiceStatus::Starting)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::Running => f.write_str("running"),
            ServiceStatus::Stopped => f.write_str("stopped"),
            ServiceStatus::Starting => f.write_str("starting"),
            ServiceStatus::Stopping => f.write_str("stopping"),
            ServiceStatus::NotInstalled => f.write_str("not installed"),
            ServiceStatus::Unknown(state) => write!(f, "unknown ({})", state),
        }
    }
}

/// Lifecycle operations on the agent's OS service
#[async_trait]
pub trait ServiceManager: Send + Sync {
    fn kind(&self) -> ServiceKind;

    /// Unit name, launchd label or SCM service name
    fn service_name(&self) -> &str;

    /// Where the service definition file lives, if the manager uses one
    fn definition_path(&self) -> Option<PathBuf>;

    /// Register the service to run `binary --config <config>`
    async fn install(&self, binary: &Path, config: &Path) -> Result<()>;

    /// Stop and remove the service registration
    async fn uninstall(&self) -> Result<()>;

    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Start the service at boot / login
    async fn enable(&self) -> Result<()>;

    async fn disable(&self) -> Result<()>;

    async fn status(&self) -> ServiceStatus;

    async fn is_enabled(&self) -> bool;

    async fn is_installed(&self) -> bool;

    /// Pid of the service's main process while it runs
    async fn main_pid(&self) -> Option<u32>;

    /// The last `lines` lines of service output
    async fn logs(&self, lines: usize) -> Result<String>;

    /// Stream service output until interrupted
    async fn follow_logs(&self) -> Result<()>;
}

/// The service manager for this host, or `None` when it is unavailable
pub fn detect(layout: &InstallLayout) -> Option<Box<dyn ServiceManager>> {
    match layout.platform.os {
        Os::Linux => {
            if command_available("systemctl") && Path::new("/run/systemd/system").is_dir() {
                return SystemdManager::for_layout(layout)
                    .map(|m| Box::new(m) as Box<dyn ServiceManager>);
            }
        }
        Os::Darwin => {
            if command_available("launchctl") {
                return LaunchdManager::for_layout(layout)
                    .map(|m| Box::new(m) as Box<dyn ServiceManager>);
            }
        }
        Os::Windows => {
            if command_available("sc.exe") || command_available("sc") {
                return Some(Box::new(WindowsServiceManager::new(layout.log_path())));
            }
        }
    }

    debug!("No service manager available on {}", layout.platform);
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(ServiceStatus::Running.to_string(), "running");
        assert_eq!(ServiceStatus::NotInstalled.to_string(), "not installed");
        assert_eq!(
            ServiceStatus::Unknown("failed".to_string()).to_string(),
            "unknown (failed)"
        );
    }

    #[test]
    fn test_status_is_running() {
        assert!(ServiceStatus::Running.is_running());
        assert!(ServiceStatus::Starting.is_running());
        assert!(!ServiceStatus::Stopping.is_running());
        assert!(!ServiceStatus::Stopped.is_running());
        assert!(!ServiceStatus::Unknown("failed".into()).is_running());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ServiceKind::Systemd.to_string(), "systemd");
        assert_eq!(ServiceKind::WindowsScm.to_string(), "Windows Service Manager");
    }
}
