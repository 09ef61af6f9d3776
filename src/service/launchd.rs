// file: src/service/launchd.rs
// version: 1.0.0
// guid: 52839afa-ee7c-4eef-a88c-db3299b921fa

//! launchd backend for macOS

use super::{logfile, ServiceKind, ServiceManager, ServiceStatus};
use crate::platform::layout::LOG_FILE_NAME;
use crate::platform::InstallLayout;
use crate::utils::fs::remove_if_exists;
use crate::utils::SystemUtils;
use crate::{FixpanicError, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// launchd label of the agent job
pub const LABEL: &str = "com.fixpanic.agent";

/// File name for the agent's stderr under launchd
pub const ERROR_LOG_FILE_NAME: &str = "agent.error.log";

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render the launchd property list for the agent
pub fn render_plist(label: &str, binary: &Path, config: &Path, log_dir: &Path) -> String {
    let stdout = log_dir.join(LOG_FILE_NAME);
    let stderr = log_dir.join(ERROR_LOG_FILE_NAME);

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{label}</string>
    <key>ProgramArguments</key>
    <array>
        <string>{binary}</string>
        <string>--config</string>
        <string>{config}</string>
    </array>
    <key>RunAtLoad</key>
    <true/>
    <key>KeepAlive</key>
    <true/>
    <key>StandardOutPath</key>
    <string>{stdout}</string>
    <key>StandardErrorPath</key>
    <string>{stderr}</string>
</dict>
</plist>
"#,
        label = xml_escape(label),
        binary = xml_escape(&binary.display().to_string()),
        config = xml_escape(&config.display().to_string()),
        stdout = xml_escape(&stdout.display().to_string()),
        stderr = xml_escape(&stderr.display().to_string()),
    )
}

/// Extract the pid from `launchctl list <label>` output.
///
/// The output is a property-list style dictionary; a loaded but idle job has
/// no `"PID"` entry.
pub fn parse_launchctl_list(output: &str) -> Option<u32> {
    output.lines().find_map(|line| {
        let line = line.trim();
        let rest = line.strip_prefix("\"PID\"")?;
        let value = rest.trim_start().strip_prefix('=')?;
        value.trim().trim_end_matches(';').trim().parse::<u32>().ok()
    })
}

/// launchd service manager
#[derive(Debug, Clone)]
pub struct LaunchdManager {
    plist_dir: PathBuf,
    log_dir: PathBuf,
}

impl LaunchdManager {
    pub fn new(plist_dir: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            plist_dir: plist_dir.into(),
            log_dir: log_dir.into(),
        }
    }

    /// LaunchDaemons when running as root, the user's LaunchAgents otherwise
    pub fn for_layout(layout: &InstallLayout) -> Option<Self> {
        let plist_dir = if layout.is_root {
            PathBuf::from("/Library/LaunchDaemons")
        } else {
            dirs::home_dir()?.join("Library").join("LaunchAgents")
        };
        Some(Self::new(plist_dir, &layout.log_dir))
    }

    pub fn plist_path(&self) -> PathBuf {
        self.plist_dir.join(format!("{}.plist", LABEL))
    }

    fn log_path(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE_NAME)
    }

    async fn launchctl(&self, args: &[&str]) -> Result<String> {
        SystemUtils::run("launchctl", args)
            .await
            .map(|o| o.stdout)
            .map_err(|e| FixpanicError::service(e.to_string()))
    }

    /// `launchctl list <label>` output when the job is loaded
    async fn list(&self) -> Option<String> {
        let output = SystemUtils::capture("launchctl", &["list", LABEL]).await.ok()?;
        output.success.then_some(output.stdout)
    }
}

#[async_trait]
impl ServiceManager for LaunchdManager {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Launchd
    }

    fn service_name(&self) -> &str {
        LABEL
    }

    fn definition_path(&self) -> Option<PathBuf> {
        Some(self.plist_path())
    }

    async fn install(&self, binary: &Path, config: &Path) -> Result<()> {
        fs::create_dir_all(&self.plist_dir)?;
        fs::create_dir_all(&self.log_dir)?;

        let path = self.plist_path();
        fs::write(&path, render_plist(LABEL, binary, config, &self.log_dir))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o644))?;
        }

        debug!("Wrote launchd plist {}", path.display());
        Ok(())
    }

    async fn uninstall(&self) -> Result<()> {
        if self.list().await.is_some() {
            if let Err(e) = self.disable().await {
                debug!("Unloading {} failed: {}", LABEL, e);
            }
        }
        remove_if_exists(&self.plist_path())?;
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        if self.list().await.is_none() {
            self.enable().await?;
        }
        self.launchctl(&["start", LABEL]).await.map(|_| ())
    }

    async fn stop(&self) -> Result<()> {
        // KeepAlive restarts a job stopped with `launchctl stop`, so the job is
        // unloaded instead; `unload` without -w keeps it enabled for next boot.
        let plist = self.plist_path().display().to_string();
        self.launchctl(&["unload", &plist]).await.map(|_| ())
    }

    async fn enable(&self) -> Result<()> {
        let plist = self.plist_path().display().to_string();
        self.launchctl(&["load", "-w", &plist]).await.map(|_| ())
    }

    async fn disable(&self) -> Result<()> {
        let plist = self.plist_path().display().to_string();
        self.launchctl(&["unload", "-w", &plist]).await.map(|_| ())
    }

    async fn status(&self) -> ServiceStatus {
        if !self.is_installed().await {
            return ServiceStatus::NotInstalled;
        }
        match self.list().await {
            Some(out) if parse_launchctl_list(&out).is_some() => ServiceStatus::Running,
            _ => ServiceStatus::Stopped,
        }
    }

    async fn is_enabled(&self) -> bool {
        self.list().await.is_some()
    }

    async fn is_installed(&self) -> bool {
        self.plist_path().exists()
    }

    async fn main_pid(&self) -> Option<u32> {
        parse_launchctl_list(&self.list().await?)
    }

    async fn logs(&self, lines: usize) -> Result<String> {
        logfile::read_tail(&self.log_path(), lines)
    }

    async fn follow_logs(&self) -> Result<()> {
        logfile::follow(&self.log_path()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_plist() {
        let plist = render_plist(
            LABEL,
            Path::new("/Users/ops/.local/lib/fixpanic/fixpanic-agent"),
            Path::new("/Users/ops/.config/fixpanic/agent.yaml"),
            Path::new("/Users/ops/.local/log/fixpanic"),
        );

        assert!(plist.contains("<string>com.fixpanic.agent</string>"));
        assert!(plist.contains("<string>/Users/ops/.local/lib/fixpanic/fixpanic-agent</string>"));
        assert!(plist.contains("<string>--config</string>"));
        assert!(plist.contains("<key>RunAtLoad</key>\n    <true/>"));
        assert!(plist.contains("<key>KeepAlive</key>\n    <true/>"));
        assert!(plist.contains("<string>/Users/ops/.local/log/fixpanic/agent.log</string>"));
        assert!(plist.contains("<string>/Users/ops/.local/log/fixpanic/agent.error.log</string>"));
    }

    #[test]
    fn test_render_plist_escapes_paths() {
        let plist = render_plist(
            LABEL,
            Path::new("/opt/a&b/agent"),
            Path::new("/cfg.yaml"),
            Path::new("/logs"),
        );
        assert!(plist.contains("/opt/a&amp;b/agent"));
    }

    #[test]
    fn test_parse_launchctl_list() {
        let running = r#"{
	"LimitLoadToSessionType" = "Aqua";
	"Label" = "com.fixpanic.agent";
	"OnDemand" = false;
	"LastExitStatus" = 0;
	"PID" = 5120;
	"Program" = "/Users/ops/.local/lib/fixpanic/fixpanic-agent";
};"#;
        assert_eq!(parse_launchctl_list(running), Some(5120));

        let idle = r#"{
	"Label" = "com.fixpanic.agent";
	"LastExitStatus" = 256;
};"#;
        assert_eq!(parse_launchctl_list(idle), None);
    }

    #[tokio::test]
    async fn test_install_writes_plist_and_logs_come_from_file() {
        let dir = TempDir::new().unwrap();
        let manager = LaunchdManager::new(dir.path().join("LaunchAgents"), dir.path().join("log"));

        manager
            .install(Path::new("/bin/agent"), Path::new("/cfg.yaml"))
            .await
            .unwrap();
        assert!(manager.is_installed().await);

        std::fs::write(dir.path().join("log").join(LOG_FILE_NAME), "a\nb\nc\n").unwrap();
        assert_eq!(manager.logs(2).await.unwrap(), "b\nc\n");
    }
}
