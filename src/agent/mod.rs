// file: src/agent/mod.rs
// version: 1.0.0
// guid: 7676845d-a7f7-4e96-8864-5af3894946dc

//! The installed agent binary and the commands that manage it
//!
//! [`AgentBinary`] knows where the agent lives, which version it is and how
//! to fetch a new one. [`AgentManager`] sequences the user-facing lifecycle
//! commands on top of it.

pub mod lifecycle;

pub use lifecycle::{AgentManager, AgentOptions};

use crate::logging::Console;
use crate::network::{is_newer, ReleaseClient, AGENT_REPO};
use crate::platform::{InstallLayout, Platform, AGENT_RELEASES_URL};
use crate::utils::fs::remove_if_exists;
use crate::utils::SystemUtils;
use crate::{FixpanicError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Seconds allowed for `fixpanic-agent --version`
const VERSION_TIMEOUT_SECS: u64 = 10;

/// Pull the version token out of `--version` output.
///
/// `"fixpanic-agent v1.2.3 - built 2024-01-01"` yields `"v1.2.3"`. Output
/// without a recognisable version is returned trimmed.
pub fn extract_version(output: &str) -> String {
    let output = output.trim();
    match Regex::new(r"(?:^|\s)(v?\d+\.\d+(?:\.\d+)?(?:[-+][0-9A-Za-z.\-]+)?)") {
        Ok(re) => re
            .captures(output)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| output.to_string()),
        Err(_) => output.to_string(),
    }
}

/// The agent executable managed by the CLI
#[derive(Debug, Clone)]
pub struct AgentBinary {
    path: PathBuf,
    platform: Platform,
    releases_url: String,
}

impl AgentBinary {
    pub fn new(layout: &InstallLayout) -> Self {
        Self {
            path: layout.binary_path(),
            platform: layout.platform,
            releases_url: AGENT_RELEASES_URL.to_string(),
        }
    }

    /// Download agent artifacts from a different release host
    pub fn with_releases_url(mut self, url: impl Into<String>) -> Self {
        self.releases_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_installed(&self) -> bool {
        self.path.is_file()
    }

    /// Raw output of `<binary> --version`, trimmed
    pub async fn version(&self) -> Result<String> {
        if !self.is_installed() {
            return Err(FixpanicError::NotInstalled);
        }

        let binary = self.path.to_string_lossy();
        let output =
            SystemUtils::execute_with_timeout(&binary, &["--version"], VERSION_TIMEOUT_SECS)
                .await?;
        Ok(output.trim().to_string())
    }

    /// Remove the binary. A missing file is not an error.
    pub fn remove(&self) -> Result<bool> {
        debug!("Removing agent binary {}", self.path.display());
        remove_if_exists(&self.path)
    }

    /// Download `version` (a tag or `latest`) over the installed binary
    pub async fn download(&self, client: &ReleaseClient, version: &str) -> Result<u64> {
        let url = self
            .platform
            .agent_download_url(&self.releases_url, version)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        client.download_binary(&url, &self.path).await
    }

    /// Tag of the newest published agent release
    pub async fn latest_version(&self, client: &ReleaseClient) -> Result<String> {
        let (owner, repo) = AGENT_REPO;
        Ok(client.latest_release(owner, repo).await?.tag_name)
    }

    /// Compare the installed version with the latest release.
    ///
    /// Returns whether an update is available and the latest tag. A missing
    /// binary always needs one.
    pub async fn update_available(&self, client: &ReleaseClient) -> Result<(bool, String)> {
        let latest = self.latest_version(client).await?;
        if !self.is_installed() {
            return Ok((true, latest));
        }

        let current = extract_version(&self.version().await?);
        Ok((is_newer(&current, &latest), latest))
    }

    /// Bring the binary up to the latest release.
    ///
    /// Failing to check for updates is only a warning. Failing to download an
    /// update that was found is an error.
    pub async fn ensure_latest(&self, client: &ReleaseClient, console: &Console) -> Result<()> {
        console.progress("Checking for agent binary updates");

        let (available, latest) = match self.update_available(client).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Agent update check failed: {}", e);
                console.warning(format!("Failed to check for updates: {}", e));
                return Ok(());
            }
        };

        if !available {
            console.list("Agent binary is up to date");
            return Ok(());
        }

        if self.is_installed() {
            let current = self.version().await.map(|v| extract_version(&v));
            console.info(format!(
                "Agent update available: {} → {}",
                current.as_deref().unwrap_or("unknown"),
                latest
            ));
            console.progress("Downloading latest agent binary");
        } else {
            console.progress("Installing agent binary");
        }

        self.download(client, &latest).await.map_err(|e| {
            FixpanicError::network(format!("failed to download latest agent: {}", e))
        })?;

        match self.version().await {
            Ok(version) => console.success(format!("Agent binary updated to: {}", version)),
            Err(e) => console.warning(format!("Failed to verify new version: {}", e)),
        }
        Ok(())
    }
}
