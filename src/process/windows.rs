// file: src/process/windows.rs
// version: 1.0.0
// guid: 4e24f32d-c435-4ccd-953e-f74f4da08848

//! Process management on Windows

use super::{invalid_pid, table_has_live_process, ProcessInfo, ProcessManager, SpawnConfig};
use crate::{FixpanicError, Result};
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::os::windows::process::CommandExt;
use std::process::{Command, Stdio};
use std::time::Duration;
use sysinfo::{Pid, System};
use tracing::debug;

const DETACHED_PROCESS: u32 = 0x0000_0008;
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

#[derive(Debug, Default)]
pub struct WindowsProcessManager;

impl WindowsProcessManager {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessManager for WindowsProcessManager {
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
            command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP | CREATE_NO_WINDOW);
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

        let system = System::new_all();
        let process = system
            .process(Pid::from_u32(pid))
            .ok_or_else(|| FixpanicError::process(format!("process {} not found", pid)))?;

        if !process.kill() {
            return Err(FixpanicError::process(format!(
                "failed to terminate process {}",
                pid
            )));
        }

        for _ in 0..50 {
            if !self.is_running(pid) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Ok(())
    }

    fn is_running(&self, pid: u32) -> bool {
        pid != 0 && table_has_live_process(pid)
    }
}
