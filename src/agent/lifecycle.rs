// file: src/agent/lifecycle.rs
// version: 1.0.0
// guid: 2c03c43f-c9ac-429d-bc33-0e74a5f14807

//! Agent lifecycle commands
//!
//! Every `fixpanic agent …` subcommand is a method on [`AgentManager`]. The
//! manager prefers the host service manager and falls back to a detached
//! process when there is none.

use super::{extract_version, AgentBinary};
use crate::config::rules::SAMPLE_COMMANDS;
use crate::config::{AgentConfig, ConfigLoader, SecurityRules, DEFAULT_SOCKET_SERVER};
use crate::logging::Console;
use crate::network::{self, same_version, ReleaseClient};
use crate::platform::InstallLayout;
use crate::process::{self, ProcessManager, SpawnConfig};
use crate::service::{self, logfile, ServiceManager, ServiceStatus};
use crate::utils::fs::{remove_dir_if_empty, remove_if_exists};
use crate::{FixpanicError, Result};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timeout for the socket server reachability check
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings that override the default layout and endpoints
#[derive(Debug, Clone, Default)]
pub struct AgentOptions {
    /// Configuration file to use instead of `<config_dir>/agent.yaml`
    pub config_path: Option<PathBuf>,
    /// Socket server to write into new configs and to probe
    pub socket_server: Option<String>,
    /// Alternative host for agent release artifacts
    pub releases_url: Option<String>,
    /// Alternative GitHub API root for release lookups
    pub api_base: Option<String>,
}

/// Runs the agent lifecycle commands against one installation
pub struct AgentManager {
    layout: InstallLayout,
    options: AgentOptions,
    console: Console,
    binary: AgentBinary,
    service: Option<Box<dyn ServiceManager>>,
    processes: Box<dyn ProcessManager>,
}

impl AgentManager {
    /// Manager for this host's layout and service manager
    pub fn for_host(options: AgentOptions) -> Result<Self> {
        let layout = InstallLayout::detect()?;
        let service = service::detect(&layout);
        Ok(Self::new(layout, options, service))
    }

    pub fn new(
        layout: InstallLayout,
        options: AgentOptions,
        service: Option<Box<dyn ServiceManager>>,
    ) -> Self {
        let mut binary = AgentBinary::new(&layout);
        if let Some(url) = &options.releases_url {
            binary = binary.with_releases_url(url.clone());
        }

        Self {
            layout,
            options,
            console: Console::new(),
            binary,
            service,
            processes: process::platform_manager(),
        }
    }

    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    pub fn binary(&self) -> &AgentBinary {
        &self.binary
    }

    pub fn config_path(&self) -> PathBuf {
        self.options
            .config_path
            .clone()
            .unwrap_or_else(|| self.layout.config_path())
    }

    fn client(&self) -> Result<ReleaseClient> {
        let client = ReleaseClient::new()?;
        Ok(match &self.options.api_base {
            Some(base) => client.with_api_base(base.clone()),
            None => client,
        })
    }

    fn require_installed(&self) -> Result<()> {
        if self.binary.is_installed() {
            Ok(())
        } else {
            Err(FixpanicError::NotInstalled)
        }
    }

    fn load_config(&self) -> Result<AgentConfig> {
        ConfigLoader::new().load(self.config_path())
    }

    /// Service manager that has the agent registered
    async fn installed_service(&self) -> Option<&dyn ServiceManager> {
        match self.service.as_deref() {
            Some(svc) if svc.is_installed().await => Some(svc),
            _ => None,
        }
    }

    /// Whether the agent runs under the service manager or as a process
    pub async fn is_running(&self) -> bool {
        if let Some(svc) = self.installed_service().await {
            if svc.status().await.is_running() {
                return true;
            }
        }
        !self.processes.find_by_binary(self.binary.path()).is_empty()
    }

    /// `fixpanic agent install`
    pub async fn install(&self, agent_id: &str, api_key: &str, force: bool, version: &str) -> Result<()> {
        self.console.header("Installing FixPanic Agent");

        self.console.step(1, "Detecting platform and configuration");
        self.console.key_value("Platform", self.layout.platform.to_string());
        if !self.layout.is_root {
            self.console
                .warning("Running as non-root user. Agent will be installed in user directories.");
            self.console
                .key_value("Binary location", self.layout.lib_dir.display().to_string());
            self.console
                .key_value("Config location", self.layout.config_dir.display().to_string());
        }

        let mut config = AgentConfig::new(agent_id, api_key, &self.layout);
        if let Some(server) = &self.options.socket_server {
            config = config.with_socket_server(server.clone());
        }
        config.validate()?;

        self.console.step(2, "Creating directories");
        self.layout.create_directories()?;

        self.console.step(3, "Checking for existing installation");
        if self.binary.is_installed() {
            if !force {
                return Err(FixpanicError::AlreadyInstalled);
            }
            self.console.info("Existing installation found, reinstalling");
            if self.is_running().await {
                if let Err(e) = self.stop_agent().await {
                    self.console
                        .warning(format!("Failed to stop running agent: {}", e));
                }
            }
        }

        self.console.step(4, "Downloading FixPanic Agent binary");
        let client = self.client()?;
        let size = self.binary.download(&client, version).await.map_err(|e| {
            FixpanicError::network(format!("failed to download FixPanic Agent binary: {}", e))
        })?;
        debug!("Agent binary is {} bytes", size);

        self.console.step(5, "Creating agent configuration");
        let config_path = self.config_path();
        ConfigLoader::new().save(&config, &config_path)?;
        self.console
            .success(format!("Configuration saved to: {}", config_path.display()));

        self.console.step(6, "Setting up system service");
        match self.service.as_deref() {
            Some(svc) => self.register_service(svc).await,
            None => self.console.info(
                "No service manager available. You can start the agent manually with: fixpanic agent start",
            ),
        }

        self.console.separator();
        self.console.success("FixPanic agent installed successfully!");
        self.console.separator();
        self.console.key_value("Agent ID", agent_id);
        self.console
            .key_value("Binary location", self.binary.path().display().to_string());
        self.console
            .key_value("Config location", config_path.display().to_string());

        if self.service.is_some() {
            self.console.separator();
            self.console.info("The agent will start automatically on system boot.");
            self.console.info("You can manage the agent with:");
            self.console.command("fixpanic agent status");
            self.console.command("fixpanic agent stop");
            self.console.command("fixpanic agent restart");
        }

        info!("Agent installed at {}", self.binary.path().display());
        Ok(())
    }

    async fn register_service(&self, svc: &dyn ServiceManager) {
        self.console.progress("Removing old service if it exists");
        if svc.is_installed().await {
            if let Err(e) = svc.uninstall().await {
                self.console
                    .warning(format!("Failed to remove old service: {}", e));
            }
        }

        self.console
            .progress(format!("Installing {} service", svc.kind()));
        if let Err(e) = svc.install(self.binary.path(), &self.config_path()).await {
            self.console
                .warning(format!("Failed to install {} service: {}", svc.kind(), e));
            self.console
                .info("You can start the agent manually with: fixpanic agent start");
            return;
        }

        if let Err(e) = svc.enable().await {
            self.console.warning(format!("Failed to enable service: {}", e));
        }

        match svc.start().await {
            Ok(()) => self
                .console
                .success("Agent service installed and started successfully"),
            Err(e) => {
                self.console.warning(format!("Failed to start service: {}", e));
                self.console
                    .info("You can start the agent manually with: fixpanic agent start");
            }
        }
    }

    /// `fixpanic agent start`
    pub async fn start(&self, no_update: bool) -> Result<()> {
        self.console.header("Starting FixPanic Agent");
        self.start_agent(no_update).await
    }

    async fn start_agent(&self, no_update: bool) -> Result<()> {
        self.console.step(1, "Checking agent installation");
        self.require_installed()?;

        let config_path = self.config_path();
        if !config_path.is_file() {
            return Err(FixpanicError::config(format!(
                "Configuration file not found: {}. Run 'fixpanic agent install' first",
                config_path.display()
            )));
        }

        if !no_update {
            let checked = match self.client() {
                Ok(client) => self.binary.ensure_latest(&client, &self.console).await,
                Err(e) => Err(e),
            };
            if let Err(e) = checked {
                self.console
                    .warning(format!("Failed to check for agent updates: {}", e));
                self.console.info("Continuing with existing agent binary");
            }
        }

        self.console.step(2, "Starting agent");
        match self.service.as_deref() {
            Some(svc) => self.start_service(svc).await,
            None => self.start_process().await,
        }
    }

    async fn start_service(&self, svc: &dyn ServiceManager) -> Result<()> {
        if !svc.is_installed().await {
            self.console
                .progress(format!("Registering {} service", svc.kind()));
            svc.install(self.binary.path(), &self.config_path()).await?;
        }

        self.console.progress("Checking service status");
        if svc.status().await.is_running() {
            self.console.success("Agent service is already running");
            return Ok(());
        }

        svc.start().await?;
        self.console.success("Agent service started successfully");
        self.console.key_value("Service", svc.service_name());
        Ok(())
    }

    async fn start_process(&self) -> Result<()> {
        if let Some(pid) = self
            .processes
            .find_by_binary(self.binary.path())
            .first()
        {
            self.console
                .success(format!("Agent is already running (PID: {})", pid));
            return Ok(());
        }

        self.console
            .warning("No service manager available. Starting agent as a background process.");
        self.console
            .info("The agent will not restart automatically if it crashes or the host reboots.");

        let log_path = self.layout.log_path();
        if let Some(dir) = log_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let spawn = SpawnConfig::new(self.binary.path())
            .arg("--config")
            .arg(self.config_path().display().to_string())
            .detached()
            .log_to(&log_path);
        let started = self.processes.start(&spawn).await?;

        self.console
            .success(format!("Agent started (PID: {})", started.pid));
        self.console
            .key_value("Log file", log_path.display().to_string());
        Ok(())
    }

    /// `fixpanic agent stop`
    pub async fn stop(&self) -> Result<()> {
        self.console.header("Stopping FixPanic Agent");
        self.require_installed()?;

        if self.stop_agent().await? {
            self.console.success("FixPanic Agent stopped successfully");
        }
        Ok(())
    }

    /// Stop the agent wherever it runs. Returns whether anything was stopped.
    async fn stop_agent(&self) -> Result<bool> {
        if let Some(svc) = self.installed_service().await {
            if svc.status().await.is_running() {
                self.console
                    .progress(format!("Stopping service {}", svc.service_name()));
                svc.stop().await?;
                return Ok(true);
            }
        }

        let pids = self.processes.find_by_binary(self.binary.path());
        if pids.is_empty() {
            self.console.info("FixPanic Agent is not running");
            return Ok(false);
        }

        let mut stopped = 0;
        for pid in &pids {
            self.console
                .progress(format!("Stopping FixPanic Agent (PID: {})", pid));
            match self.processes.stop(*pid).await {
                Ok(()) => stopped += 1,
                Err(e) => {
                    warn!("Failed to stop pid {}: {}", pid, e);
                    self.console
                        .warning(format!("Failed to stop process {}: {}", pid, e));
                }
            }
        }

        if stopped == 0 {
            return Err(FixpanicError::process("failed to stop any agent processes"));
        }
        if stopped > 1 {
            self.console
                .info(format!("{} processes stopped", stopped));
        }
        Ok(true)
    }

    /// `fixpanic agent restart`
    pub async fn restart(&self, no_update: bool) -> Result<()> {
        self.console.header("Restarting FixPanic Agent");

        self.console.step(1, "Stopping agent");
        match self.stop_agent().await {
            Ok(true) => self.console.success("Agent stopped successfully"),
            Ok(false) => {}
            Err(e) => {
                self.console.warning(format!("Stop failed: {}", e));
                self.console.info("Continuing with start...");
            }
        }

        self.start_agent(no_update).await?;

        self.console.separator();
        self.console.success("FixPanic agent restarted successfully!");
        Ok(())
    }

    /// `fixpanic agent status`
    pub async fn status(&self) -> Result<()> {
        self.console.header("FixPanic Agent Status");

        if !self.binary.is_installed() {
            self.console.error("Agent is not installed");
            self.console.separator();
            self.console.info("To install the agent, run:");
            self.console
                .command("fixpanic agent install --agent-id=<your-agent-id> --api-key=<your-api-key>");
            return Ok(());
        }

        self.console.success("Agent is installed");
        match self.binary.version().await {
            Ok(version) => self.console.key_value("Version", extract_version(&version)),
            Err(e) => self
                .console
                .warning(format!("Could not determine FixPanic Agent version: {}", e)),
        }

        let config_path = self.config_path();
        match self.load_config() {
            Ok(config) => {
                self.console
                    .key_value("Configuration file", config_path.display().to_string());
                self.console.key_value("Agent ID", &config.app.agent_id);
                self.console.key_value("Log level", &config.logging.level);
                self.console
                    .key_value("Socket server", &config.connection.socket_server);
            }
            Err(e) => self
                .console
                .warning(format!("Could not load configuration: {}", e)),
        }

        match self.service.as_deref() {
            Some(svc) => self.report_service(svc).await,
            None => {
                self.console
                    .info("No service manager available - checking process status directly");
                match self.processes.find_by_binary(self.binary.path()).first() {
                    Some(pid) => self
                        .console
                        .success(format!("Agent is running (PID: {})", pid)),
                    None => self.console.error("Agent is not running"),
                }
            }
        }

        self.console
            .key_value("Binary location", self.binary.path().display().to_string());
        let log_path = self.layout.log_path();
        if log_path.exists() {
            self.console
                .key_value("Log file", log_path.display().to_string());
        }

        self.console.separator();
        self.console.info("Useful commands:");
        self.console.command("fixpanic agent start");
        self.console.command("fixpanic agent stop");
        self.console.command("fixpanic agent logs");
        self.console.command("fixpanic agent uninstall");
        Ok(())
    }

    async fn report_service(&self, svc: &dyn ServiceManager) {
        self.console.key_value("Service manager", svc.kind().to_string());

        if svc.is_enabled().await {
            self.console.list("Service is enabled for auto-start");
        } else {
            self.console.warning("Service is not enabled for auto-start");
        }

        match svc.status().await {
            ServiceStatus::Running => {
                self.console.success("Service is running");
                if let Some(pid) = svc.main_pid().await {
                    self.console.key_value("Process ID", pid.to_string());
                }
            }
            ServiceStatus::Stopped => self.console.error("Service is not running"),
            ServiceStatus::NotInstalled => self
                .console
                .warning("Service is not registered. Run 'fixpanic agent start' to register it"),
            other => self.console.warning(format!("Service status: {}", other)),
        }
    }

    /// `fixpanic agent uninstall`
    pub async fn uninstall(&self, force: bool) -> Result<()> {
        self.uninstall_with(force, &mut std::io::stdin().lock()).await
    }

    /// Uninstall, reading the confirmation answer from `input`
    pub async fn uninstall_with(&self, force: bool, input: &mut dyn BufRead) -> Result<()> {
        self.console.header("Uninstalling FixPanic Agent");

        if !self.binary.is_installed() {
            self.console.info("FixPanic Agent is not installed");
            return Ok(());
        }

        let config_path = self.config_path();
        let rules_path = self.layout.rules_path();

        if !force {
            self.console
                .warning("This will completely remove the FixPanic agent from your system.");
            self.console.plain("The following will be removed:");
            self.console
                .key_value("Binary", self.binary.path().display().to_string());
            self.console
                .key_value("Configuration", config_path.display().to_string());
            self.console
                .key_value("Security rules", rules_path.display().to_string());
            if let Some(svc) = self.service.as_deref() {
                self.console.key_value("Service", svc.service_name());
            }
            if !confirm("Are you sure you want to continue? [y/N]: ", input) {
                self.console.plain("Uninstallation cancelled.");
                return Ok(());
            }
        }

        if let Err(e) = self.stop_agent().await {
            self.console.warning(format!("Failed to stop agent: {}", e));
        }

        if let Some(svc) = self.installed_service().await {
            self.console
                .progress(format!("Removing {} service", svc.kind()));
            if let Err(e) = svc.uninstall().await {
                self.console
                    .warning(format!("Failed to uninstall service: {}", e));
            }
        }

        self.console.progress("Removing FixPanic Agent binary");
        if let Err(e) = self.binary.remove() {
            self.console.warning(format!("Failed to remove binary: {}", e));
        }

        for (what, path) in [("configuration file", &config_path), ("security rules", &rules_path)] {
            match remove_if_exists(path) {
                Ok(true) => self
                    .console
                    .progress(format!("Removed {}: {}", what, path.display())),
                Ok(false) => {}
                Err(e) => self
                    .console
                    .warning(format!("Failed to remove {}: {}", what, e)),
            }
        }

        for dir in [&self.layout.lib_dir, &self.layout.config_dir, &self.layout.log_dir] {
            if remove_dir_if_empty(dir) {
                self.console
                    .progress(format!("Removed empty directory: {}", dir.display()));
            }
        }

        self.console.separator();
        self.console
            .success("FixPanic agent uninstalled successfully!");
        Ok(())
    }

    /// `fixpanic agent logs`
    pub async fn logs(&self, lines: usize, follow: bool) -> Result<()> {
        if let Some(svc) = self.service.as_deref() {
            if follow {
                self.console
                    .info("Following agent logs (press Ctrl+C to stop)...");
                return svc.follow_logs().await;
            }

            match svc.logs(lines).await {
                Ok(output) if output.trim().is_empty() => {
                    self.console.info("No logs found for the agent service.")
                }
                Ok(output) => self.console.plain(output.trim_end()),
                Err(e) => {
                    self.console
                        .warning(format!("Could not get service logs: {}", e));
                    self.console.info("Trying to read log file directly...");
                    return self.print_log_file(lines);
                }
            }
            return Ok(());
        }

        if follow {
            self.console
                .info("Following agent logs (press Ctrl+C to stop)...");
            return logfile::follow(&self.layout.log_path()).await;
        }
        self.print_log_file(lines)
    }

    fn print_log_file(&self, lines: usize) -> Result<()> {
        let log_path = self.layout.log_path();
        if !log_path.exists() {
            self.console
                .info(format!("No log file found at: {}", log_path.display()));
            self.console.info(
                "The agent might not have been started yet, or logging might be disabled.",
            );
            return Ok(());
        }

        let tail = logfile::read_tail(&log_path, lines)?;
        self.console.plain(tail.trim_end());
        Ok(())
    }

    /// `fixpanic agent validate`
    pub async fn validate(&self) -> Result<()> {
        self.console.header("Validating FixPanic Agent Configuration");
        self.require_installed()?;

        self.console.step(1, "Checking agent configuration");
        let config = self.load_config()?;
        config.validate()?;
        self.console.success("Agent configuration is valid");

        self.console.step(2, "Checking security rules");
        let rules_path = if config.security.rules_file.trim().is_empty() {
            self.layout.rules_path()
        } else {
            PathBuf::from(config.security.rules_file.trim())
        };
        self.console
            .key_value("Rules file", rules_path.display().to_string());

        if !rules_path.exists() {
            self.console.warning("Security rules file does not exist");
            SecurityRules::write_default(&rules_path)?;
            self.console.success(format!(
                "Created default security rules file: {}",
                rules_path.display()
            ));
        }

        let rules = ConfigLoader::new().load_rules(&rules_path)?;
        rules.validate()?;
        self.console.success("Security rules file is valid");
        self.console.key_value("Rules version", &rules.version);
        self.console
            .key_value("Allow patterns", rules.allow.len().to_string());
        self.console
            .key_value("Deny patterns", rules.deny.len().to_string());

        self.console.step(3, "Testing rule matching");
        for command in SAMPLE_COMMANDS {
            let verdict = if rules.is_command_allowed(command) {
                "ALLOWED"
            } else {
                "DENIED"
            };
            self.console.key_value(command, verdict);
        }

        self.console.separator();
        self.console
            .success("Security rules validation completed successfully!");
        Ok(())
    }

    /// `fixpanic agent test-connection`
    pub async fn test_connection(&self) -> Result<()> {
        self.console.header("Testing FixPanic Connectivity");
        self.require_installed()?;

        let address = match &self.options.socket_server {
            Some(server) => server.clone(),
            None => match self.load_config() {
                Ok(config) => config.connection.socket_server,
                Err(e) => {
                    self.console
                        .warning(format!("Could not load configuration: {}", e));
                    DEFAULT_SOCKET_SERVER.to_string()
                }
            },
        };
        self.console.key_value("Socket server", &address);
        self.console.progress(format!("Connecting to {}", address));

        let report = match network::test_connection(&address, CONNECTION_TIMEOUT).await {
            Ok(report) => report,
            Err(e) => {
                self.console.error(format!("Connection failed: {}", e));
                self.console.separator();
                self.console.info("Troubleshooting tips:");
                self.console.plain("   1. Check your internet connection");
                self.console
                    .plain("   2. Verify the socket server address is correct");
                self.console
                    .plain("   3. Check if your firewall is blocking the connection");
                self.console.plain(
                    "   4. Ensure the socket server is accessible from your network",
                );
                return Err(FixpanicError::network(format!(
                    "connection test to {} failed",
                    address
                )));
            }
        };

        self.console.success(format!(
            "TCP connection successful ({} ms)",
            report.connect_time.as_millis()
        ));

        match &report.resolved {
            Some(Ok(addrs)) => {
                let addrs: Vec<String> = addrs.iter().map(|a| a.to_string()).collect();
                self.console.success(format!(
                    "DNS resolution successful. IP addresses: {}",
                    addrs.join(", ")
                ));
            }
            Some(Err(e)) => self
                .console
                .warning(format!("DNS resolution failed: {}", e)),
            None => {}
        }

        match &report.recheck {
            Ok(elapsed) => self.console.success(format!(
                "Connection timeout test passed ({} ms)",
                elapsed.as_millis()
            )),
            Err(e) => self
                .console
                .warning(format!("Connection timeout test failed: {}", e)),
        }

        self.console.separator();
        self.console
            .success("Connection test completed successfully!");
        self.console
            .info("Your agent should be able to connect to the FixPanic infrastructure.");
        Ok(())
    }

    /// `fixpanic agent upgrade`
    pub async fn upgrade(&self, force: bool, version: &str) -> Result<()> {
        self.console.header("Upgrading FixPanic Agent");

        self.console.step(1, "Checking agent installation");
        self.require_installed()?;

        let current = match self.binary.version().await {
            Ok(output) => Some(extract_version(&output)),
            Err(e) => {
                self.console
                    .warning(format!("Could not determine current version: {}", e));
                None
            }
        };
        self.console
            .key_value("Current version", current.as_deref().unwrap_or("unknown"));

        let client = self.client()?;
        let target = if version == "latest" {
            self.binary.latest_version(&client).await?
        } else {
            version.to_string()
        };
        self.console.key_value("Target version", &target);

        if !force {
            if let Some(current) = &current {
                if same_version(current, &target) {
                    self.console
                        .success("Agent is already on the latest version");
                    return Ok(());
                }
            }
        }

        self.console.step(2, "Stopping agent for upgrade");
        let mut was_running = false;
        if self.is_running().await {
            match self.stop_agent().await {
                Ok(stopped) => {
                    was_running = stopped;
                    if stopped {
                        self.console.success("Agent stopped successfully");
                    }
                }
                Err(e) => self.console.warning(format!(
                    "Failed to stop agent, attempting upgrade anyway: {}",
                    e
                )),
            }
        } else {
            self.console
                .info("Agent is not running, proceeding with upgrade");
        }

        self.console.step(3, "Upgrading agent binary");
        self.binary.download(&client, &target).await.map_err(|e| {
            FixpanicError::network(format!("failed to upgrade agent binary: {}", e))
        })?;

        let new_version = match self.binary.version().await {
            Ok(output) => extract_version(&output),
            Err(e) => {
                self.console
                    .warning(format!("Could not determine new version: {}", e));
                target.clone()
            }
        };
        self.console.success("Agent upgraded successfully!");
        self.console.info(format!(
            "Upgraded: {} → {}",
            current.as_deref().unwrap_or("unknown"),
            new_version
        ));

        if was_running {
            self.console.step(4, "Restarting agent");
            match self.start_agent(true).await {
                Ok(()) => self
                    .console
                    .success("Agent restarted successfully with new version"),
                Err(e) => {
                    self.console
                        .warning(format!("Failed to restart agent: {}", e));
                    self.console
                        .info("You can start the agent manually with: fixpanic agent start");
                }
            }
        }

        self.console.separator();
        self.console
            .key_value("Binary location", self.binary.path().display().to_string());
        if !was_running {
            self.console.info("Agent was not running before upgrade");
            self.console
                .info("You can start the agent with: fixpanic agent start");
        }
        Ok(())
    }
}

/// Ask a yes/no question; only `y` or `Y` counts as yes
fn confirm(prompt: &str, input: &mut dyn BufRead) -> bool {
    print!("\n{}", prompt);
    let _ = std::io::stdout().flush();

    let mut answer = String::new();
    if input.read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Arch, Os, Platform};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> AgentManager {
        let layout = InstallLayout::rooted_at(dir.path(), Platform::new(Os::Linux, Arch::Amd64));
        AgentManager::new(layout, AgentOptions::default(), None).with_console(Console::with_colors(false))
    }

    fn fake_install(manager: &AgentManager) {
        manager.layout().create_directories().unwrap();
        std::fs::write(manager.binary().path(), "binary").unwrap();
    }

    #[test]
    fn test_confirm_accepts_only_y() {
        assert!(confirm("? ", &mut Cursor::new("y\n")));
        assert!(confirm("? ", &mut Cursor::new("Y\n")));
        assert!(!confirm("? ", &mut Cursor::new("yes\n")));
        assert!(!confirm("? ", &mut Cursor::new("\n")));
        assert!(!confirm("? ", &mut Cursor::new("")));
    }

    #[test]
    fn test_config_path_override() {
        let dir = TempDir::new().unwrap();
        let default = manager(&dir);
        assert_eq!(
            default.config_path(),
            dir.path().join(".config/fixpanic/agent.yaml")
        );

        let layout = default.layout().clone();
        let custom = dir.path().join("custom.yaml");
        let options = AgentOptions {
            config_path: Some(custom.clone()),
            ..Default::default()
        };
        assert_eq!(AgentManager::new(layout, options, None).config_path(), custom);
    }

    #[tokio::test]
    async fn test_install_rejects_empty_credentials_before_download() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        let result = manager.install("", "fp_key", false, "latest").await;

        assert!(matches!(result, Err(FixpanicError::Validation(_))));
        assert!(!manager.layout().lib_dir.exists());
    }

    #[tokio::test]
    async fn test_commands_require_installation() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        assert!(matches!(manager.start(true).await, Err(FixpanicError::NotInstalled)));
        assert!(matches!(manager.stop().await, Err(FixpanicError::NotInstalled)));
        assert!(matches!(manager.validate().await, Err(FixpanicError::NotInstalled)));
        assert!(matches!(
            manager.test_connection().await,
            Err(FixpanicError::NotInstalled)
        ));
        assert!(matches!(
            manager.upgrade(false, "latest").await,
            Err(FixpanicError::NotInstalled)
        ));
    }

    #[tokio::test]
    async fn test_status_without_installation_is_ok() {
        let dir = TempDir::new().unwrap();
        assert!(manager(&dir).status().await.is_ok());
    }

    #[tokio::test]
    async fn test_uninstall_declined_keeps_files() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        fake_install(&manager);

        manager
            .uninstall_with(false, &mut Cursor::new("n\n"))
            .await
            .unwrap();

        assert!(manager.binary().is_installed());
    }

    #[tokio::test]
    async fn test_validate_writes_default_rules() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        fake_install(&manager);
        let config = AgentConfig::new("agent_123", "fp_key", manager.layout());
        ConfigLoader::new().save(&config, manager.config_path()).unwrap();

        manager.validate().await.unwrap();

        let rules = ConfigLoader::new()
            .load_rules(manager.layout().rules_path())
            .unwrap();
        assert!(!rules.allow.is_empty());
        assert!(!rules.deny.is_empty());
    }

    #[tokio::test]
    async fn test_start_without_config_fails() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        fake_install(&manager);

        let result = manager.start(true).await;
        assert!(matches!(result, Err(FixpanicError::Config(_))));
    }

    #[tokio::test]
    async fn test_logs_without_log_file_is_ok() {
        let dir = TempDir::new().unwrap();
        assert!(manager(&dir).logs(50, false).await.is_ok());
    }
}
