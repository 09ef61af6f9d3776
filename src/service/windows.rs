// file: src/service/windows.rs
// version: 1.0.0
// guid: 885ff3f7-a202-4141-ae54-9c4fdcc69919

//! Windows Service Control Manager backend, driven through `sc.exe`

use super::{logfile, ServiceKind, ServiceManager, ServiceStatus};
use crate::utils::{CommandOutput, SystemUtils};
use crate::{FixpanicError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// SCM name of the agent service
pub const SERVICE_NAME: &str = "FixpanicAgent";

/// Display name shown in services.msc
pub const DISPLAY_NAME: &str = "FixPanic Agent";

// sc.exe exit code for "The specified service does not exist"
const ERROR_SERVICE_DOES_NOT_EXIST: i32 = 1060;

/// Arguments for `sc.exe create`.
///
/// sc.exe wants each `key=` and its value as separate arguments.
pub fn create_args(binary: &Path, config: &Path) -> Vec<String> {
    vec![
        "create".to_string(),
        SERVICE_NAME.to_string(),
        "binPath=".to_string(),
        format!("\"{}\" --config \"{}\"", binary.display(), config.display()),
        "start=".to_string(),
        "auto".to_string(),
        "DisplayName=".to_string(),
        DISPLAY_NAME.to_string(),
    ]
}

/// Map the `STATE` line of `sc.exe query` output to a status
pub fn parse_sc_state(output: &str) -> ServiceStatus {
    let state = output
        .lines()
        .find(|line| line.trim_start().starts_with("STATE"))
        .and_then(|line| line.split_whitespace().last());

    match state {
        Some("RUNNING") => ServiceStatus::Running,
        Some("STOPPED") => ServiceStatus::Stopped,
        Some("START_PENDING") => ServiceStatus::Starting,
        Some("STOP_PENDING") => ServiceStatus::Stopping,
        Some(other) => ServiceStatus::Unknown(other.to_string()),
        None => ServiceStatus::Unknown("no STATE in sc.exe output".to_string()),
    }
}

/// Extract the `PID` line of `sc.exe queryex` output
pub fn parse_sc_pid(output: &str) -> Option<u32> {
    output
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("PID"))
        .and_then(|line| line.split(':').nth(1))
        .and_then(|pid| pid.trim().parse::<u32>().ok())
        .filter(|pid| *pid != 0)
}

fn not_found(output: &CommandOutput) -> bool {
    output.code == Some(ERROR_SERVICE_DOES_NOT_EXIST)
        || output.stdout.contains(&ERROR_SERVICE_DOES_NOT_EXIST.to_string())
}

/// Windows SCM service manager
#[derive(Debug, Clone)]
pub struct WindowsServiceManager {
    log_path: PathBuf,
}

impl WindowsServiceManager {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
        }
    }

    async fn sc(&self, args: &[&str]) -> Result<String> {
        SystemUtils::run("sc.exe", args)
            .await
            .map(|o| o.stdout)
            .map_err(|e| FixpanicError::service(e.to_string()))
    }

    async fn query(&self, verb: &str) -> Option<CommandOutput> {
        SystemUtils::capture("sc.exe", &[verb, SERVICE_NAME]).await.ok()
    }
}

#[async_trait]
impl ServiceManager for WindowsServiceManager {
    fn kind(&self) -> ServiceKind {
        ServiceKind::WindowsScm
    }

    fn service_name(&self) -> &str {
        SERVICE_NAME
    }

    fn definition_path(&self) -> Option<PathBuf> {
        None
    }

    async fn install(&self, binary: &Path, config: &Path) -> Result<()> {
        let args = create_args(binary, config);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.sc(&args).await?;
        debug!("Registered service {}", SERVICE_NAME);
        Ok(())
    }

    async fn uninstall(&self) -> Result<()> {
        if !self.is_installed().await {
            return Ok(());
        }
        if self.status().await.is_running() {
            if let Err(e) = self.stop().await {
                debug!("Stopping {} before removal failed: {}", SERVICE_NAME, e);
            }
        }
        self.sc(&["delete", SERVICE_NAME]).await.map(|_| ())
    }

    async fn start(&self) -> Result<()> {
        self.sc(&["start", SERVICE_NAME]).await.map(|_| ())
    }

    async fn stop(&self) -> Result<()> {
        self.sc(&["stop", SERVICE_NAME]).await.map(|_| ())
    }

    async fn enable(&self) -> Result<()> {
        self.sc(&["config", SERVICE_NAME, "start=", "auto"])
            .await
            .map(|_| ())
    }

    async fn disable(&self) -> Result<()> {
        self.sc(&["config", SERVICE_NAME, "start=", "demand"])
            .await
            .map(|_| ())
    }

    async fn status(&self) -> ServiceStatus {
        match self.query("query").await {
            Some(out) if out.success => parse_sc_state(&out.stdout),
            Some(out) if not_found(&out) => ServiceStatus::NotInstalled,
            Some(out) => ServiceStatus::Unknown(out.trimmed().to_string()),
            None => ServiceStatus::Unknown("sc.exe unavailable".to_string()),
        }
    }

    async fn is_enabled(&self) -> bool {
        match self.query("qc").await {
            Some(out) if out.success => out
                .stdout
                .lines()
                .any(|l| l.contains("START_TYPE") && l.contains("AUTO_START")),
            _ => false,
        }
    }

    async fn is_installed(&self) -> bool {
        matches!(self.query("query").await, Some(out) if out.success)
    }

    async fn main_pid(&self) -> Option<u32> {
        let out = self.query("queryex").await?;
        if !out.success {
            return None;
        }
        parse_sc_pid(&out.stdout)
    }

    async fn logs(&self, lines: usize) -> Result<String> {
        logfile::read_tail(&self.log_path, lines)
    }

    async fn follow_logs(&self) -> Result<()> {
        logfile::follow(&self.log_path).await
    }
}
