// file: src/process/mod.rs
// version: 1.1.0
// guid: b0decd8a-8d58-45fe-a7e4-f46a0a2c398b

//! Cross-platform process lifecycle for running the agent without a service
//! manager
//!
//! Each platform provides a [`ProcessManager`] that can launch the agent
//! detached from the CLI, stop it, and tell whether it is still alive.
//! Discovery of already running agents goes through the process table and is
//! shared by every platform.

#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod windows;

use crate::{FixpanicError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::{Pid, ProcessStatus, System};
use tracing::debug;

/// How long `stop` waits for a process to exit before forcing it
pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// What to launch and how
#[derive(Debug, Clone, Default)]
pub struct SpawnConfig {
    pub binary: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: HashMap<String, String>,
    /// Run in a new session / process group so the process outlives the CLI
    pub detach: bool,
    /// Append stdout and stderr to this file instead of discarding them
    pub log_file: Option<PathBuf>,
}

impl SpawnConfig {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn detached(mut self) -> Self {
        self.detach = true;
        self
    }

    pub fn log_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }
}

/// Snapshot of a process we know the pid of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub running: bool,
}

/// Platform process lifecycle operations
#[async_trait]
pub trait ProcessManager: Send + Sync {
    /// Launch a process and return its pid
    async fn start(&self, config: &SpawnConfig) -> Result<ProcessInfo>;

    /// Stop a process, escalating to a forced kill if it does not exit
    async fn stop(&self, pid: u32) -> Result<()>;

    /// Whether a process with this pid is alive
    fn is_running(&self, pid: u32) -> bool;

    /// Pids of running processes whose executable matches `binary`
    fn find_by_binary(&self, binary: &Path) -> Vec<u32> {
        find_processes(binary)
    }

    fn status(&self, pid: u32) -> ProcessInfo {
        ProcessInfo {
            pid,
            running: self.is_running(pid),
        }
    }
}

/// The process manager for the host platform
pub fn platform_manager() -> Box<dyn ProcessManager> {
    #[cfg(unix)]
    {
        Box::new(unix::UnixProcessManager::new())
    }
    #[cfg(windows)]
    {
        Box::new(windows::WindowsProcessManager::new())
    }
}

/// Reject pids that cannot name a single process. Zero and anything past
/// `i32::MAX` would address a process group or every process once converted
/// to a signed pid.
pub(crate) fn invalid_pid(pid: u32) -> Result<()> {
    if pid == 0 || pid > i32::MAX as u32 {
        return Err(FixpanicError::process(format!("invalid PID: {}", pid)));
    }
    Ok(())
}

/// Find live processes running `binary`, excluding the CLI itself.
///
/// See [`process_matches`] for what counts as running `binary`.
pub fn find_processes(binary: &Path) -> Vec<u32> {
    let own_pid = std::process::id();

    let system = System::new_all();
    let mut pids: Vec<u32> = system
        .processes()
        .iter()
        .filter(|(pid, _)| pid.as_u32() != own_pid)
        .filter(|(_, process)| !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
        .filter(|(_, process)| process_matches(binary, process.exe(), process.cmd(), process.name()))
        .map(|(pid, _)| pid.as_u32())
        .collect();

    pids.sort_unstable();
    debug!("Found {} process(es) for {}", pids.len(), binary.display());
    pids
}

/// Whether a process-table entry is an instance of `binary`.
///
/// With a readable executable path the match must be exact: either the
/// executable itself, or `binary` as the program (argv[0]) or as the script
/// handed to an interpreter (argv[1]). The command line still names the
/// binary after it has been replaced on disk. Only when the executable path is
/// unreadable, as for another user's processes, does the file name decide.
fn process_matches(binary: &Path, exe: Option<&Path>, cmd: &[OsString], name: &OsStr) -> bool {
    match exe {
        Some(exe) => {
            exe == binary
                || cmd
                    .iter()
                    .take(2)
                    .any(|arg| Path::new(arg) == binary)
        }
        None => name_matches(name, binary.file_name()),
    }
}

fn name_matches(name: &OsStr, wanted: Option<&OsStr>) -> bool {
    match wanted {
        Some(wanted) if !wanted.is_empty() => {
            // Linux truncates process names to 15 bytes
            let name = name.to_string_lossy();
            let wanted = wanted.to_string_lossy();
            name == wanted || (name.len() == 15 && wanted.starts_with(name.as_ref()))
        }
        _ => false,
    }
}

/// Whether the process table holds a live (non-zombie) process with this pid
pub(crate) fn table_has_live_process(pid: u32) -> bool {
    let system = System::new_all();
    system
        .process(Pid::from_u32(pid))
        .map(|p| !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
        .unwrap_or(false)
}
