// file: src/platform/mod.rs
// version: 1.1.0
// guid: 8c68d247-a2a7-4bbb-819c-cb4519fea250

//! Host platform detection and release asset naming

pub mod layout;

pub use layout::InstallLayout;

use crate::{FixpanicError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Base URL for agent release artifacts
pub const AGENT_RELEASES_URL: &str = "https://github.com/fixpanic/fixpanic-agent/releases";

/// Name the agent is published under
pub const AGENT_BINARY_NAME: &str = "fixpanic-agent";

/// Name the CLI is published under
pub const CLI_BINARY_NAME: &str = "fixpanic";

/// Supported operating systems, named the way release assets name them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Linux,
    Darwin,
    Windows,
}

impl Os {
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::Darwin => "darwin",
            Os::Windows => "windows",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Os {
    type Err = FixpanicError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "linux" => Ok(Os::Linux),
            "darwin" | "macos" => Ok(Os::Darwin),
            "windows" => Ok(Os::Windows),
            other => Err(FixpanicError::platform(format!(
                "Unsupported operating system: {}",
                other
            ))),
        }
    }
}

/// Supported CPU architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arch {
    #[serde(rename = "amd64")]
    Amd64,
    #[serde(rename = "arm64")]
    Arm64,
    #[serde(rename = "386")]
    I386,
    #[serde(rename = "arm")]
    Arm,
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::Arm64 => "arm64",
            Arch::I386 => "386",
            Arch::Arm => "arm",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Arch {
    type Err = FixpanicError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_arch(s).as_str() {
            "amd64" => Ok(Arch::Amd64),
            "arm64" => Ok(Arch::Arm64),
            "386" => Ok(Arch::I386),
            "arm" => Ok(Arch::Arm),
            other => Err(FixpanicError::platform(format!(
                "Unsupported architecture: {}",
                other
            ))),
        }
    }
}

/// Map the many spellings of an architecture onto release asset names
pub fn normalize_arch(arch: &str) -> String {
    let arch = arch.to_lowercase();
    match arch.as_str() {
        "x86_64" | "amd64" => "amd64".to_string(),
        "aarch64" | "arm64" => "arm64".to_string(),
        "i386" | "i686" | "x86" | "386" => "386".to_string(),
        "armv7" | "armv7l" | "arm" => "arm".to_string(),
        _ => arch,
    }
}

/// An (OS, architecture) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

impl Platform {
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Platform of the running process
    pub fn current() -> Result<Self> {
        Ok(Self {
            os: std::env::consts::OS.parse()?,
            arch: std::env::consts::ARCH.parse()?,
        })
    }

    /// Whether agent releases are published for this pair
    pub fn is_supported(&self) -> bool {
        matches!(
            (self.os, self.arch),
            (Os::Linux, _)
                | (Os::Darwin, Arch::Amd64)
                | (Os::Darwin, Arch::Arm64)
                | (Os::Windows, Arch::Amd64)
                | (Os::Windows, Arch::Arm64)
                | (Os::Windows, Arch::I386)
        )
    }

    fn ensure_supported(&self) -> Result<()> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(FixpanicError::platform(format!(
                "No release is published for {}",
                self
            )))
        }
    }

    fn exe_suffix(&self) -> &'static str {
        if self.os == Os::Windows {
            ".exe"
        } else {
            ""
        }
    }

    /// File name of the installed agent binary
    pub fn agent_binary_name(&self) -> String {
        format!("{}{}", AGENT_BINARY_NAME, self.exe_suffix())
    }

    /// Release asset name for the agent, e.g. `fixpanic-agent-linux-amd64`
    pub fn agent_asset_name(&self) -> String {
        format!(
            "{}-{}-{}{}",
            AGENT_BINARY_NAME,
            self.os,
            self.arch,
            self.exe_suffix()
        )
    }

    /// Download URL for an agent release: `{base}/{version}/download/{asset}`.
    ///
    /// An empty version means `latest`.
    pub fn agent_download_url(&self, base: &str, version: &str) -> Result<String> {
        self.ensure_supported()?;
        let base = base.trim_end_matches('/');
        let asset = self.agent_asset_name();
        let version = version.trim();

        let version = if version.is_empty() { "latest" } else { version };

        Ok(format!("{}/{}/download/{}", base, version, asset))
    }

    /// Release asset name for the CLI itself
    pub fn cli_asset_name(&self) -> String {
        if self.os == Os::Windows {
            format!("{}-{}-{}.exe", CLI_BINARY_NAME, self.os, self.arch)
        } else {
            format!("{}-{}-{}.tar.gz", CLI_BINARY_NAME, self.os, self.arch)
        }
    }
}

/// Check whether a command is available in PATH
pub fn command_available(name: &str) -> bool {
    which::which(name).is_ok()
}
