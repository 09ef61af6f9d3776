// file: src/network/download.rs
// version: 2.0.0
// guid: u1v2w3x4-y5z6-7890-1234-567890uvwxyz

//! Release downloads with progress tracking

use super::release::GithubRelease;
use super::GITHUB_API_URL;
use crate::utils::fs::{remove_if_exists, set_executable, with_suffix};
use crate::{FixpanicError, Result};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Connect timeout for every request
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for GitHub release metadata and artifacts
pub struct ReleaseClient {
    client: reqwest::Client,
    api_base: String,
    show_progress: bool,
}

impl ReleaseClient {
    /// Create a client talking to the public GitHub API
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(format!("fixpanic-cli/{}", crate::VERSION))
            .build()?;

        Ok(Self {
            client,
            api_base: GITHUB_API_URL.to_string(),
            show_progress: true,
        })
    }

    /// Point release lookups at a different API root
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Disable the progress bar
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(|e| {
            FixpanicError::network(format!("failed to download {}: {}", url, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FixpanicError::network(format!(
                "download of {} failed: HTTP {}",
                url,
                status.as_u16()
            )));
        }
        Ok(response)
    }

    fn progress_bar(&self, total_size: Option<u64>) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        match total_size {
            Some(total) if total > 0 => {
                let pb = ProgressBar::new(total);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                pb
            }
            _ => ProgressBar::new_spinner(),
        }
    }

    /// Stream a successful response body into `path`, returning the byte count
    async fn stream_to_file(&self, response: reqwest::Response, path: &Path) -> Result<u64> {
        let pb = self.progress_bar(response.content_length());
        let mut file = File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }

        file.flush().await?;
        file.sync_all().await?;
        pb.finish_and_clear();
        Ok(downloaded)
    }

    /// Download an executable to `dest` atomically.
    ///
    /// The body goes to `dest.tmp`, which is made executable and then renamed
    /// over `dest`. On any failure the temp file is removed and `dest` is left
    /// untouched.
    pub async fn download_binary(&self, url: &str, dest: &Path) -> Result<u64> {
        info!("Downloading {}", url);
        let tmp = with_suffix(dest, ".tmp");

        let result = async {
            let response = self.get(url).await?;
            let size = self.stream_to_file(response, &tmp).await?;
            set_executable(&tmp)?;
            tokio::fs::rename(&tmp, dest).await.map_err(|e| {
                FixpanicError::network(format!(
                    "failed to move binary to {}: {}",
                    dest.display(),
                    e
                ))
            })?;
            Ok::<u64, FixpanicError>(size)
        }
        .await;

        if result.is_err() {
            let _ = remove_if_exists(&tmp);
        }
        let size = result?;
        info!("Downloaded {} bytes to {}", size, dest.display());
        Ok(size)
    }

    /// Download to `dest` as-is (used for archives and checksum files)
    pub async fn download_to(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self.get(url).await?;
        let result = self.stream_to_file(response, dest).await;
        if result.is_err() {
            let _ = remove_if_exists(dest);
        }
        result
    }

    /// Fetch a small text resource
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        Ok(self.get(url).await?.text().await?)
    }

    /// Latest published release of `owner/repo`
    pub async fn latest_release(&self, owner: &str, repo: &str) -> Result<GithubRelease> {
        let url = format!("{}/repos/{}/{}/releases/latest", self.api_base, owner, repo);
        debug!("Fetching latest release from {}", url);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| FixpanicError::network(format!("failed to fetch latest release: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FixpanicError::network(format!(
                "GitHub API request failed: {}",
                status.as_u16()
            )));
        }

        response
            .json::<GithubRelease>()
            .await
            .map_err(|e| FixpanicError::network(format!("failed to parse release info: {}", e)))
    }
}
