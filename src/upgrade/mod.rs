// file: src/upgrade/mod.rs
// version: 1.1.0
// guid: 71bc87c8-f2a3-41c5-a678-81b2e5abf6e2

//! Self-upgrade of the `fixpanic` executable from its GitHub releases
//!
//! The new binary is downloaded into a temporary directory, checked against
//! a published SHA-256 when one exists, unpacked, sanity-checked and finally
//! swapped over the running executable with a backup kept until the swap
//! succeeds.

use crate::agent::extract_version;
use crate::logging::Console;
use crate::network::{is_newer, same_version, GithubRelease, ReleaseClient, CLI_REPO};
use crate::platform::{Platform, CLI_BINARY_NAME};
use crate::utils::fs::{is_executable, replace_with_backup, set_executable};
use crate::utils::SystemUtils;
use crate::{FixpanicError, Result};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Download attempts before giving up
pub const DOWNLOAD_ATTEMPTS: u32 = 3;

/// Base delay between download attempts, multiplied by the attempt number
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Anything smaller is not a real build of the CLI
pub const MIN_BINARY_SIZE: u64 = 1024;

/// Release notes longer than this are not printed
const MAX_NOTES_LEN: usize = 500;

/// Where releases come from
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn latest_release(&self) -> Result<GithubRelease>;

    /// Download `url` to `dest`, returning the byte count
    async fn download(&self, url: &str, dest: &Path) -> Result<u64>;

    async fn fetch_text(&self, url: &str) -> Result<String>;
}

/// Releases of the CLI published on GitHub
pub struct GithubUpdateSource {
    client: ReleaseClient,
}

impl GithubUpdateSource {
    pub fn new(client: ReleaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UpdateSource for GithubUpdateSource {
    async fn latest_release(&self) -> Result<GithubRelease> {
        let (owner, repo) = CLI_REPO;
        self.client.latest_release(owner, repo).await
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        self.client.download_to(url, dest).await
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.client.fetch_text(url).await
    }
}

/// What an upgrade run ended with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    UpToDate,
    /// `--check` found a newer release
    Available(String),
    Upgraded(String),
}

/// Replaces an installed `fixpanic` executable with the latest release
pub struct SelfUpgrader<S: UpdateSource> {
    source: S,
    platform: Platform,
    target: PathBuf,
    current_version: String,
    retry_delay: Duration,
    console: Console,
}

impl SelfUpgrader<GithubUpdateSource> {
    /// Upgrader for the running executable
    pub fn for_current_exe() -> Result<Self> {
        let exe = std::env::current_exe().map_err(|e| {
            FixpanicError::upgrade(format!("failed to get current binary path: {}", e))
        })?;
        let target = std::fs::canonicalize(&exe).unwrap_or(exe);
        let source = GithubUpdateSource::new(ReleaseClient::new()?);
        Ok(Self::new(source, Platform::current()?, target))
    }
}

impl<S: UpdateSource> SelfUpgrader<S> {
    pub fn new(source: S, platform: Platform, target: impl Into<PathBuf>) -> Self {
        Self {
            source,
            platform,
            target: target.into(),
            current_version: crate::VERSION.to_string(),
            retry_delay: RETRY_DELAY,
            console: Console::new(),
        }
    }

    pub fn with_current_version(mut self, version: impl Into<String>) -> Self {
        self.current_version = version.into();
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    /// Check for, and unless `check_only`, install the latest release
    pub async fn run(&self, check_only: bool, force: bool) -> Result<UpgradeOutcome> {
        self.console.header("FixPanic CLI Upgrade");

        self.console.step(1, "Checking current version");
        self.console.key_value("Current version", &self.current_version);

        self.console.step(2, "Fetching latest release information");
        let release = self
            .source
            .latest_release()
            .await
            .map_err(|e| FixpanicError::upgrade(format!("failed to fetch latest release: {}", e)))?;
        self.console.key_value("Latest version", &release.tag_name);
        if let Some(date) = release.published_date() {
            self.console.key_value("Release date", date);
        }

        let newer = is_newer(&self.current_version, &release.tag_name);
        if !newer && !force {
            self.console.success("You are already on the latest version!");
            return Ok(UpgradeOutcome::UpToDate);
        }

        if check_only {
            if !newer {
                self.console.success("You are on the latest version");
                return Ok(UpgradeOutcome::UpToDate);
            }
            self.console.info(format!(
                "Update available: {} → {}",
                self.current_version, release.tag_name
            ));
            let notes = parse_release_notes(release.body.as_deref().unwrap_or_default());
            if !notes.is_empty() {
                self.console
                    .plain(format!("Changes in {}:", release.tag_name));
                for note in &notes {
                    self.console.list(note);
                }
            }
            self.console.info("Run 'fixpanic upgrade' to install it");
            return Ok(UpgradeOutcome::Available(release.tag_name.clone()));
        }

        self.console.separator();
        if newer {
            self.console.info(format!(
                "Upgrading: {} → {}",
                self.current_version, release.tag_name
            ));
        } else {
            self.console.info("Forcing upgrade to same version");
        }
        self.console
            .key_value("Current binary", self.target.display().to_string());

        let asset_name = self.platform.cli_asset_name();
        let asset = release.find_asset(&asset_name).ok_or_else(|| {
            FixpanicError::upgrade(format!(
                "no binary found for platform {} (expected asset {})",
                self.platform, asset_name
            ))
        })?;
        self.console.key_value("Asset", &asset.name);
        self.console.key_value("Size", format_mb(asset.size));

        let workdir = tempfile::Builder::new()
            .prefix("fixpanic-upgrade-")
            .tempdir()?;
        let archive = workdir.path().join(&asset.name);

        self.console.step(3, "Downloading new version");
        self.download_with_retry(&asset.browser_download_url, &archive)
            .await?;

        let checksum_name = format!("{}.sha256", asset.name);
        match release.find_asset(&checksum_name) {
            Some(sidecar) => {
                self.console.progress("Verifying checksum");
                let published = self.source.fetch_text(&sidecar.browser_download_url).await?;
                verify_checksum(&archive, &published)?;
                self.console.success("Checksum verified");
            }
            None => debug!("No {} published, skipping checksum", checksum_name),
        }

        self.console.step(4, "Verifying new binary");
        let binary = if asset.name.ends_with(".tar.gz") {
            self.console.progress("Extracting binary from archive");
            extract_binary(&archive, workdir.path())?
        } else {
            archive.clone()
        };
        set_executable(&binary)?;
        let size = verify_binary(&binary)?;
        self.console.key_value("Binary size", format_mb(size));
        self.console.success("New binary verified successfully");

        self.console.step(5, "Installing new version");
        replace_with_backup(&self.target, &binary)?;
        info!("Replaced {} with {}", self.target.display(), release.tag_name);
        self.verify_installed(&release.tag_name).await;

        self.console.separator();
        self.console.success("FixPanic CLI upgraded successfully!");
        self.console.key_value("New version", &release.tag_name);

        if let Some(body) = release.body.as_deref().map(str::trim) {
            if !body.is_empty() && body.len() < MAX_NOTES_LEN {
                self.console.separator();
                self.console.info("Release notes:");
                self.console.plain(body);
            }
        }

        self.console.separator();
        self.console
            .info("Run 'fixpanic version' to confirm the new version");
        Ok(UpgradeOutcome::Upgraded(release.tag_name.clone()))
    }

    /// Version the installed executable reports through `--version`
    pub async fn installed_version(&self) -> Result<String> {
        let target = self.target.to_string_lossy();
        let output = SystemUtils::capture(&target, &["--version"]).await?;
        if !output.success {
            return Err(FixpanicError::upgrade(format!(
                "{} --version exited with code {}",
                target,
                output.code.unwrap_or(-1)
            )));
        }
        Ok(extract_version(&output.stdout))
    }

    /// Check the swapped-in executable reports `expected`. A mismatch or a
    /// binary that will not run is only a warning; the swap already happened.
    async fn verify_installed(&self, expected: &str) -> bool {
        self.console.progress("Verifying installed version");
        match self.installed_version().await {
            Ok(reported) if same_version(&reported, expected) => {
                self.console
                    .success(format!("Installed binary reports {}", reported));
                true
            }
            Ok(reported) => {
                warn!("Upgrade expected {} but binary reports {}", expected, reported);
                self.console.warning(format!(
                    "Version mismatch after upgrade: expected {}, binary reports {}",
                    expected, reported
                ));
                false
            }
            Err(e) => {
                warn!("Could not verify upgraded binary: {}", e);
                self.console
                    .warning(format!("Could not verify the new version: {}", e));
                false
            }
        }
    }

    async fn download_with_retry(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut attempt = 1;
        loop {
            match self.source.download(url, dest).await {
                Ok(size) => return Ok(size),
                Err(e) if attempt < DOWNLOAD_ATTEMPTS => {
                    warn!("Download attempt {} failed: {}", attempt, e);
                    self.console.warning(format!(
                        "Download attempt {}/{} failed: {}",
                        attempt, DOWNLOAD_ATTEMPTS, e
                    ));
                    tokio::time::sleep(self.retry_delay * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(FixpanicError::upgrade(format!(
                        "download failed after {} attempts: {}",
                        DOWNLOAD_ATTEMPTS, e
                    )))
                }
            }
        }
    }
}

/// Bullet points of a release body, at most five
pub fn parse_release_notes(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")))
        .map(|note| note.trim().to_string())
        .take(5)
        .collect()
}

/// Lowercase hex SHA-256 of a file
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Compare a file against a `sha256sum`-style line (`<hash>  <name>`)
pub fn verify_checksum(path: &Path, published: &str) -> Result<()> {
    let expected = published
        .split_whitespace()
        .next()
        .map(str::to_lowercase)
        .ok_or_else(|| FixpanicError::upgrade("invalid checksum file format"))?;
    let actual = sha256_file(path)?;

    if actual != expected {
        return Err(FixpanicError::upgrade(format!(
            "checksum mismatch: expected {}, got {}",
            expected, actual
        )));
    }
    Ok(())
}

/// Unpack the `fixpanic` executable from a release archive into `dest_dir`
pub fn extract_binary(archive: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let file = File::open(archive)?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));

    for entry in tar.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let name = entry
            .path()?
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if name == CLI_BINARY_NAME || name.starts_with(&format!("{}-", CLI_BINARY_NAME)) {
            let out = dest_dir.join(CLI_BINARY_NAME);
            entry.unpack(&out)?;
            return Ok(out);
        }
    }

    Err(FixpanicError::upgrade("binary not found in archive"))
}

/// Check that a downloaded binary is executable and plausibly sized
pub fn verify_binary(path: &Path) -> Result<u64> {
    let size = std::fs::metadata(path)
        .map_err(|e| FixpanicError::upgrade(format!("binary not found: {}", e)))?
        .len();

    if !is_executable(path) {
        return Err(FixpanicError::upgrade("binary is not executable"));
    }
    if size < MIN_BINARY_SIZE {
        return Err(FixpanicError::upgrade(format!(
            "binary seems too small ({} bytes)",
            size
        )));
    }
    Ok(size)
}

fn format_mb(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
}
