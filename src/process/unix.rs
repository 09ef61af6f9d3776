// file: src/process/unix.rs
// version: 1.1.0
// guid: 53260f5b-d6e8-4718-bd99-9ed261b0a6d0

//! Process management on Linux and macOS

use super::{
    invalid_pid, table_has_live_process, ProcessInfo, ProcessManager, SpawnConfig,
    STOP_GRACE_PERIOD,
};
use crate::{FixpanicError, Result};
use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::{setsid, Pid};
use std::fs::OpenOptions;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Signal-based process manager
#[derive(Debug, Default)]
pub struct UnixProcessManager;

impl UnixProcessManager {
    pub fn new() -> Self {
        Self
    }

    /// Send `signal` (or just probe with `None`) to exactly one process
    fn signal(pid: u32, signal: Option<Signal>) -> Result<()> {
        invalid_pid(pid)?;
        let raw = i32::try_from(pid)
            .map_err(|_| FixpanicError::process(format!("invalid PID: {}", pid)))?;
        kill(Pid::from_raw(raw), signal).map_err(|e| {
            FixpanicError::process(format!("failed to signal process {}: {}", pid, e))
        })
    }

    async fn wait_for_exit(&self, pid: u32, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if !self.is_running(pid) {
                return true;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        !self.is_running(pid)
    }
}

#[async_trait]
impl ProcessManager for UnixProcessManager {
    async fn start(&self, config: &SpawnConfig) -> Result<ProcessInfo> {
        let mut command = Command::new(&config.binary);
        command.args(&config.args).envs(&config.env).stdin(Stdio::null());

        if let Some(dir) = &config.working_dir {
            command.current_dir(dir);
        }

        match &config.log_file {
            Some(path) => {
                let log = OpenOptions::new().create(true).append(true).open(path)?;
                command.stdout(log.try_clone()?).stderr(log);
            }
            None => {
                command.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        if config.detach {
            // SAFETY: setsid is async-signal-safe and touches no parent state.
            unsafe {
                command.pre_exec(|| setsid().map(|_| ()).map_err(std::io::Error::from));
            }
        }

        let child = command.spawn().map_err(|e| {
            FixpanicError::process(format!(
                "failed to start {}: {}",
                config.binary.display(),
                e
            ))
        })?;

        let pid = child.id();
        debug!("Started {} with PID {}", config.binary.display(), pid);

        Ok(ProcessInfo { pid, running: true })
    }

    async fn stop(&self, pid: u32) -> Result<()> {
        invalid_pid(pid)?;

        if let Err(e) = Self::signal(pid, Some(Signal::SIGTERM)) {
            warn!("SIGTERM to {} failed ({}), sending SIGKILL", pid, e);
            return Self::signal(pid, Some(Signal::SIGKILL));
        }

        if self.wait_for_exit(pid, STOP_GRACE_PERIOD).await {
            debug!("Process {} exited after SIGTERM", pid);
            return Ok(());
        }

        warn!("Process {} ignored SIGTERM, sending SIGKILL", pid);
        Self::signal(pid, Some(Signal::SIGKILL))?;
        self.wait_for_exit(pid, STOP_GRACE_PERIOD).await;
        Ok(())
    }

    fn is_running(&self, pid: u32) -> bool {
        if Self::signal(pid, None).is_err() {
            return false;
        }
        // A zombie still answers signal 0 until its parent reaps it.
        table_has_live_process(pid)
    }
}
