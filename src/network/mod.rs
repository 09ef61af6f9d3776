// file: src/network/mod.rs
// version: 2.0.0
// guid: s9t0u1v2-w3x4-5678-9012-345678stuvwx

//! Network operations module
//!
//! Release downloads from GitHub and reachability checks against the FixPanic
//! socket server.

pub mod connection;
pub mod download;
pub mod release;

pub use connection::{test_connection, ConnectionReport};
pub use download::ReleaseClient;
pub use release::{is_newer, same_version, GithubRelease, ReleaseAsset};

/// GitHub REST API root
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Repository publishing agent releases
pub const AGENT_REPO: (&str, &str) = ("fixpanic", "fixpanic-agent");

/// Repository publishing CLI releases
pub const CLI_REPO: (&str, &str) = ("fixpanic", "fixpanic-cli-tool");
