// file: src/service/systemd.rs
// version: 1.0.0
// guid: 2e19b166-6f8d-47d3-a0b7-861c787069ad

//! systemd backend
//!
//! As root the unit goes to `/etc/systemd/system` and runs as `root`.
//! Otherwise it is installed as a user unit under `~/.config/systemd/user`
//! and every `systemctl` / `journalctl` call gets `--user`.

use super::{ServiceKind, ServiceManager, ServiceStatus};
use crate::platform::InstallLayout;
use crate::utils::fs::remove_if_exists;
use crate::utils::SystemUtils;
use crate::{FixpanicError, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Unit name of the agent service
pub const UNIT_NAME: &str = "fixpanic-agent.service";

const SYSTEM_UNIT_DIR: &str = "/etc/systemd/system";

/// Render the unit file for the agent
pub fn render_unit(binary: &Path, config: &Path, user_mode: bool) -> String {
    let (user_line, wanted_by) = if user_mode {
        ("", "default.target")
    } else {
        ("User=root\n", "multi-user.target")
    };

    format!(
        "[Unit]
Description=FixPanic Agent
Wants=network-online.target
After=network-online.target

[Service]
Type=simple
{user_line}ExecStart={binary} --config {config}
Restart=always
RestartSec=10
StandardOutput=journal
StandardError=journal

[Install]
WantedBy={wanted_by}
",
        user_line = user_line,
        binary = binary.display(),
        config = config.display(),
        wanted_by = wanted_by,
    )
}

/// Map `systemctl is-active` output to a status
pub fn parse_is_active(output: &str) -> ServiceStatus {
    match output.trim() {
        "active" | "reloading" => ServiceStatus::Running,
        "inactive" => ServiceStatus::Stopped,
        "activating" => ServiceStatus::Starting,
        "deactivating" => ServiceStatus::Stopping,
        other => ServiceStatus::Unknown(other.to_string()),
    }
}

/// Extract the pid from `systemctl show -p MainPID` output.
///
/// systemd reports `MainPID=0` for a unit with no running process.
pub fn parse_main_pid(output: &str) -> Option<u32> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("MainPID="))
        .and_then(|pid| pid.trim().parse::<u32>().ok())
        .filter(|pid| *pid != 0)
}

/// systemd service manager
#[derive(Debug, Clone)]
pub struct SystemdManager {
    unit_dir: PathBuf,
    user_mode: bool,
}

impl SystemdManager {
    pub fn new(unit_dir: impl Into<PathBuf>, user_mode: bool) -> Self {
        Self {
            unit_dir: unit_dir.into(),
            user_mode,
        }
    }

    /// System unit when running as root, user unit otherwise
    pub fn for_layout(layout: &InstallLayout) -> Option<Self> {
        if layout.is_root {
            return Some(Self::new(SYSTEM_UNIT_DIR, false));
        }
        let config_dir = dirs::config_dir()?;
        Some(Self::new(config_dir.join("systemd").join("user"), true))
    }

    pub fn is_user_mode(&self) -> bool {
        self.user_mode
    }

    pub fn unit_path(&self) -> PathBuf {
        self.unit_dir.join(UNIT_NAME)
    }

    fn systemctl_args<'a>(&self, args: &[&'a str]) -> Vec<&'a str> {
        let mut full = Vec::with_capacity(args.len() + 1);
        if self.user_mode {
            full.push("--user");
        }
        full.extend_from_slice(args);
        full
    }

    async fn systemctl(&self, args: &[&str]) -> Result<String> {
        let args = self.systemctl_args(args);
        let output = SystemUtils::run("systemctl", &args)
            .await
            .map_err(|e| FixpanicError::service(e.to_string()))?;
        Ok(output.stdout)
    }

    async fn systemctl_capture(&self, args: &[&str]) -> Option<String> {
        let args = self.systemctl_args(args);
        SystemUtils::capture("systemctl", &args)
            .await
            .ok()
            .map(|o| o.stdout)
    }

    async fn daemon_reload(&self) -> Result<()> {
        self.systemctl(&["daemon-reload"]).await.map(|_| ())
    }

    fn journalctl_args(&self, lines: Option<usize>) -> Vec<String> {
        let mut args = Vec::new();
        if self.user_mode {
            args.push("--user".to_string());
        }
        args.push("-u".to_string());
        args.push(UNIT_NAME.to_string());
        match lines {
            Some(n) => {
                args.push("-n".to_string());
                args.push(n.to_string());
                args.push("--no-pager".to_string());
            }
            None => args.push("-f".to_string()),
        }
        args
    }
}

#[async_trait]
impl ServiceManager for SystemdManager {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Systemd
    }

    fn service_name(&self) -> &str {
        UNIT_NAME
    }

    fn definition_path(&self) -> Option<PathBuf> {
        Some(self.unit_path())
    }

    async fn install(&self, binary: &Path, config: &Path) -> Result<()> {
        fs::create_dir_all(&self.unit_dir)?;
        let unit = render_unit(binary, config, self.user_mode);
        let path = self.unit_path();
        fs::write(&path, unit)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o644))?;
        }

        debug!("Wrote unit file {}", path.display());
        self.daemon_reload().await
    }

    async fn uninstall(&self) -> Result<()> {
        if let Err(e) = self.stop().await {
            debug!("Stopping {} before removal failed: {}", UNIT_NAME, e);
        }
        if let Err(e) = self.disable().await {
            debug!("Disabling {} before removal failed: {}", UNIT_NAME, e);
        }

        if remove_if_exists(&self.unit_path())? {
            self.daemon_reload().await?;
        }
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.systemctl(&["start", UNIT_NAME]).await.map(|_| ())
    }

    async fn stop(&self) -> Result<()> {
        self.systemctl(&["stop", UNIT_NAME]).await.map(|_| ())
    }

    async fn enable(&self) -> Result<()> {
        self.systemctl(&["enable", UNIT_NAME]).await.map(|_| ())
    }

    async fn disable(&self) -> Result<()> {
        self.systemctl(&["disable", UNIT_NAME]).await.map(|_| ())
    }

    async fn status(&self) -> ServiceStatus {
        if !self.is_installed().await {
            return ServiceStatus::NotInstalled;
        }
        // is-active exits non-zero for anything but "active", so read stdout
        // regardless of the exit code.
        match self.systemctl_capture(&["is-active", UNIT_NAME]).await {
            Some(out) => parse_is_active(&out),
            None => ServiceStatus::Unknown("systemctl unavailable".to_string()),
        }
    }

    async fn is_enabled(&self) -> bool {
        self.systemctl_capture(&["is-enabled", UNIT_NAME])
            .await
            .map(|out| out.trim() == "enabled")
            .unwrap_or(false)
    }

    async fn is_installed(&self) -> bool {
        self.unit_path().exists()
    }

    async fn main_pid(&self) -> Option<u32> {
        let out = self
            .systemctl_capture(&["show", "-p", "MainPID", UNIT_NAME])
            .await?;
        parse_main_pid(&out)
    }

    async fn logs(&self, lines: usize) -> Result<String> {
        let args = self.journalctl_args(Some(lines));
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = SystemUtils::run("journalctl", &args)
            .await
            .map_err(|e| FixpanicError::service(format!("failed to read journal: {}", e)))?;
        Ok(output.stdout)
    }

    async fn follow_logs(&self) -> Result<()> {
        let args = self.journalctl_args(None);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        SystemUtils::run_inherited("journalctl", &args).await.map_err(|e| {
            warn!("journalctl exited: {}", e);
            FixpanicError::service(format!("failed to follow journal: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_system_unit() {
        let unit = render_unit(
            Path::new("/usr/local/lib/fixpanic/fixpanic-agent"),
            Path::new("/etc/fixpanic/agent.yaml"),
            false,
        );

        assert!(unit.contains(
            "ExecStart=/usr/local/lib/fixpanic/fixpanic-agent --config /etc/fixpanic/agent.yaml"
        ));
        assert!(unit.contains("User=root\n"));
        assert!(unit.contains("After=network-online.target"));
        assert!(unit.contains("Restart=always"));
        assert!(unit.contains("RestartSec=10"));
        assert!(unit.contains("StandardOutput=journal"));
        assert!(unit.contains("WantedBy=multi-user.target"));
    }

    #[test]
    fn test_render_user_unit() {
        let unit = render_unit(Path::new("/bin/agent"), Path::new("/cfg.yaml"), true);
        assert!(!unit.contains("User="));
        assert!(unit.contains("WantedBy=default.target"));
    }

    #[test]
    fn test_parse_is_active() {
        assert_eq!(parse_is_active("active\n"), ServiceStatus::Running);
        assert_eq!(parse_is_active("inactive\n"), ServiceStatus::Stopped);
        assert_eq!(parse_is_active("activating"), ServiceStatus::Starting);
        assert_eq!(parse_is_active("deactivating"), ServiceStatus::Stopping);
        assert_eq!(
            parse_is_active("failed\n"),
            ServiceStatus::Unknown("failed".to_string())
        );
    }

    #[test]
    fn test_parse_main_pid() {
        assert_eq!(parse_main_pid("MainPID=4321\n"), Some(4321));
        assert_eq!(parse_main_pid("MainPID=0\n"), None);
        assert_eq!(parse_main_pid(""), None);
        assert_eq!(parse_main_pid("MainPID=abc"), None);
    }

    #[test]
    fn test_user_mode_prefixes_commands() {
        let user = SystemdManager::new("/tmp/units", true);
        assert_eq!(user.systemctl_args(&["start", UNIT_NAME]), vec!["--user", "start", UNIT_NAME]);
        assert_eq!(
            user.journalctl_args(Some(50)),
            vec!["--user", "-u", UNIT_NAME, "-n", "50", "--no-pager"]
        );

        let system = SystemdManager::new(SYSTEM_UNIT_DIR, false);
        assert_eq!(system.systemctl_args(&["stop", UNIT_NAME]), vec!["stop", UNIT_NAME]);
        assert_eq!(system.journalctl_args(None), vec!["-u", UNIT_NAME, "-f"]);
    }

    #[tokio::test]
    async fn test_status_not_installed_without_unit_file() {
        let dir = TempDir::new().unwrap();
        let manager = SystemdManager::new(dir.path(), true);

        assert!(!manager.is_installed().await);
        assert_eq!(manager.status().await, ServiceStatus::NotInstalled);
        assert_eq!(manager.definition_path(), Some(dir.path().join(UNIT_NAME)));
    }
}
