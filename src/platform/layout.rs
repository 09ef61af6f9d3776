// file: src/platform/layout.rs
// version: 1.0.0
// guid: 21e520ca-953f-4ae0-b1b3-801349a18ebc

//! Where the agent, its configuration and its logs live on disk

use super::Platform;
use crate::utils::SystemUtils;
use crate::{FixpanicError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the agent configuration
pub const CONFIG_FILE_NAME: &str = "agent.yaml";

/// File name of the agent log
pub const LOG_FILE_NAME: &str = "agent.log";

/// File name of the command security rules
pub const RULES_FILE_NAME: &str = "security-rules.yaml";

/// Directory layout for one installation of the agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    pub platform: Platform,
    pub is_root: bool,
    pub lib_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl InstallLayout {
    /// Layout for the current host and privilege level
    pub fn detect() -> Result<Self> {
        let platform = Platform::current()?;
        let is_root = SystemUtils::is_root();

        if is_root {
            return Ok(Self::system(platform));
        }

        #[cfg(windows)]
        {
            let base = dirs::data_local_dir().ok_or_else(|| {
                FixpanicError::platform("Cannot determine the local application data directory")
            })?;
            let base = base.join("fixpanic");
            Ok(Self {
                platform,
                is_root,
                lib_dir: base.join("lib"),
                bin_dir: base.join("bin"),
                config_dir: base.join("config"),
                log_dir: base.join("log"),
            })
        }

        #[cfg(not(windows))]
        {
            let home = dirs::home_dir()
                .ok_or_else(|| FixpanicError::platform("Cannot determine the home directory"))?;
            Ok(Self::rooted_at(&home, platform))
        }
    }

    /// System-wide layout used when running as root
    pub fn system(platform: Platform) -> Self {
        Self {
            platform,
            is_root: true,
            lib_dir: PathBuf::from("/usr/local/lib/fixpanic"),
            bin_dir: PathBuf::from("/usr/local/bin"),
            config_dir: PathBuf::from("/etc/fixpanic"),
            log_dir: PathBuf::from("/var/log/fixpanic"),
        }
    }

    /// Per-user layout relative to `base` (normally the home directory)
    pub fn rooted_at(base: &Path, platform: Platform) -> Self {
        Self {
            platform,
            is_root: false,
            lib_dir: base.join(".local").join("lib").join("fixpanic"),
            bin_dir: base.join(".local").join("bin"),
            config_dir: base.join(".config").join("fixpanic"),
            log_dir: base.join(".local").join("log").join("fixpanic"),
        }
    }

    /// Create the lib, config and log directories
    pub fn create_directories(&self) -> Result<()> {
        for dir in [&self.lib_dir, &self.config_dir, &self.log_dir] {
            debug!("Creating directory {}", dir.display());
            fs::create_dir_all(dir).map_err(|e| {
                FixpanicError::platform(format!(
                    "Failed to create directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(dir, fs::Permissions::from_mode(0o755))?;
            }
        }
        Ok(())
    }

    pub fn binary_path(&self) -> PathBuf {
        self.lib_dir.join(self.platform.agent_binary_name())
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE_NAME)
    }

    pub fn rules_path(&self) -> PathBuf {
        self.config_dir.join(RULES_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Arch, Os};
    use tempfile::TempDir;

    fn linux() -> Platform {
        Platform::new(Os::Linux, Arch::Amd64)
    }

    #[test]
    fn test_system_layout_paths() {
        let layout = InstallLayout::system(linux());
        assert_eq!(
            layout.binary_path(),
            PathBuf::from("/usr/local/lib/fixpanic/fixpanic-agent")
        );
        assert_eq!(layout.config_path(), PathBuf::from("/etc/fixpanic/agent.yaml"));
        assert_eq!(layout.log_path(), PathBuf::from("/var/log/fixpanic/agent.log"));
        assert_eq!(
            layout.rules_path(),
            PathBuf::from("/etc/fixpanic/security-rules.yaml")
        );
    }

    #[test]
    fn test_user_layout_paths() {
        let layout = InstallLayout::rooted_at(Path::new("/home/ops"), linux());
        assert!(!layout.is_root);
        assert_eq!(layout.lib_dir, PathBuf::from("/home/ops/.local/lib/fixpanic"));
        assert_eq!(layout.bin_dir, PathBuf::from("/home/ops/.local/bin"));
        assert_eq!(layout.config_dir, PathBuf::from("/home/ops/.config/fixpanic"));
        assert_eq!(layout.log_dir, PathBuf::from("/home/ops/.local/log/fixpanic"));
    }

    #[test]
    fn test_windows_binary_has_exe_suffix() {
        let layout =
            InstallLayout::rooted_at(Path::new("/tmp"), Platform::new(Os::Windows, Arch::Amd64));
        assert!(layout.binary_path().ends_with("fixpanic-agent.exe"));
    }

    #[test]
    fn test_create_directories() {
        let temp = TempDir::new().unwrap();
        let layout = InstallLayout::rooted_at(temp.path(), linux());

        layout.create_directories().unwrap();

        assert!(layout.lib_dir.is_dir());
        assert!(layout.config_dir.is_dir());
        assert!(layout.log_dir.is_dir());
        // bin dir is only used for the CLI itself
        assert!(!layout.bin_dir.exists());
    }
}
