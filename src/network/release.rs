// file: src/network/release.rs
// version: 1.0.0
// guid: 9f6eefe8-05b6-4953-9e60-0a946e70835f

//! GitHub release metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A release as returned by `GET /repos/{owner}/{repo}/releases/latest`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// A downloadable file attached to a release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

impl GithubRelease {
    /// Tag without a leading `v`
    pub fn version(&self) -> &str {
        strip_v(&self.tag_name)
    }

    pub fn find_asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name == name)
    }

    /// Publication date formatted like "January 2, 2006"
    pub fn published_date(&self) -> Option<String> {
        self.published_at
            .map(|at| at.format("%B %-d, %Y").to_string())
    }
}

/// Drop a single leading `v` from a version tag
pub fn strip_v(version: &str) -> &str {
    let version = version.trim();
    version.strip_prefix('v').unwrap_or(version)
}

fn parse_semver(version: &str) -> Option<semver::Version> {
    semver::Version::parse(strip_v(version)).ok()
}

/// Whether two version strings name the same release
pub fn same_version(a: &str, b: &str) -> bool {
    match (parse_semver(a), parse_semver(b)) {
        (Some(a), Some(b)) => a == b,
        _ => strip_v(a) == strip_v(b),
    }
}

/// Whether `latest` should replace `current`.
///
/// Semver ordering is used when both sides parse; otherwise any difference
/// counts as newer.
pub fn is_newer(current: &str, latest: &str) -> bool {
    match (parse_semver(current), parse_semver(latest)) {
        (Some(current), Some(latest)) => latest > current,
        _ => strip_v(current) != strip_v(latest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LATEST: &str = r#"{
        "tag_name": "v1.4.0",
        "name": "FixPanic CLI 1.4.0",
        "published_at": "2024-03-05T10:00:00Z",
        "body": "- Faster downloads",
        "assets": [
            {"name": "fixpanic-linux-amd64.tar.gz", "browser_download_url": "https://example.com/a", "size": 4096},
            {"name": "fixpanic-linux-amd64.tar.gz.sha256", "browser_download_url": "https://example.com/a.sha256", "size": 90}
        ],
        "draft": false
    }"#;

    #[test]
    fn test_parse_latest_release() {
        let release: GithubRelease = serde_json::from_str(LATEST).unwrap();

        assert_eq!(release.version(), "1.4.0");
        assert_eq!(release.published_date().as_deref(), Some("March 5, 2024"));
        let asset = release.find_asset("fixpanic-linux-amd64.tar.gz").unwrap();
        assert_eq!(asset.size, 4096);
        assert!(release.find_asset("fixpanic-darwin-arm64.tar.gz").is_none());
    }

    #[test]
    fn test_minimal_release() {
        let release: GithubRelease = serde_json::from_str(r#"{"tag_name": "v0.1.0"}"#).unwrap();
        assert!(release.assets.is_empty());
        assert!(release.published_date().is_none());
    }

    #[test]
    fn test_strip_v() {
        assert_eq!(strip_v("v1.2.3"), "1.2.3");
        assert_eq!(strip_v(" 1.2.3 "), "1.2.3");
        assert_eq!(strip_v("vv1"), "v1");
    }

    #[test]
    fn test_version_comparison() {
        assert!(same_version("v1.2.3", "1.2.3"));
        assert!(!same_version("v1.2.3", "v1.2.4"));
        assert!(same_version("dev", "vdev"));

        assert!(is_newer("1.0.0", "v1.1.0"));
        assert!(!is_newer("1.1.0", "v1.1.0"));
        assert!(!is_newer("2.0.0", "v1.9.9"));
        assert!(is_newer("dev", "v1.0.0"));
    }
}
