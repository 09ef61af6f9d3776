// file: src/utils/system.rs
// version: 2.0.0
// guid: w3x4y5z6-a7b8-9012-3456-789012wxyzab

//! System utility functions

use crate::{FixpanicError, Result};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Captured result of an external command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Trimmed stdout, the form most service-manager queries want
    pub fn trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// System utility functions
pub struct SystemUtils;

impl SystemUtils {
    /// Check if a command exists in PATH
    pub fn command_exists(command: &str) -> bool {
        which::which(command).is_ok()
    }

    /// Check if running as root
    pub fn is_root() -> bool {
        #[cfg(unix)]
        {
            // SAFETY: geteuid has no preconditions and cannot fail.
            unsafe { libc::geteuid() == 0 }
        }
        #[cfg(windows)]
        {
            // On Windows, "root" concept doesn't apply; assume false
            false
        }
    }

    /// Run a command and capture its output, regardless of exit status.
    ///
    /// Only a failure to spawn is reported as an error; callers decide what a
    /// non-zero exit means for them.
    pub async fn capture(command: &str, args: &[&str]) -> Result<CommandOutput> {
        debug!("Running: {} {}", command, args.join(" "));

        let output = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                FixpanicError::process(format!("Failed to run {}: {}", command, e))
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Run a command and fail unless it exits successfully
    pub async fn run(command: &str, args: &[&str]) -> Result<CommandOutput> {
        let output = Self::capture(command, args).await?;
        if !output.success {
            let detail = if output.stderr.trim().is_empty() {
                output.stdout.trim().to_string()
            } else {
                output.stderr.trim().to_string()
            };
            return Err(FixpanicError::process(format!(
                "{} {} failed with exit code {}: {}",
                command,
                args.join(" "),
                output.code.unwrap_or(-1),
                detail
            )));
        }
        Ok(output)
    }

    /// Run a command with stdout/stderr attached to the terminal (used for
    /// following logs).
    pub async fn run_inherited(command: &str, args: &[&str]) -> Result<()> {
        let status = Command::new(command)
            .args(args)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| {
                FixpanicError::process(format!("Failed to run {}: {}", command, e))
            })?;

        if !status.success() {
            return Err(FixpanicError::process(format!(
                "{} exited with code {}",
                command,
                status.code().unwrap_or(-1)
            )));
        }
        Ok(())
    }

    /// Execute command with timeout
    pub async fn execute_with_timeout(
        command: &str,
        args: &[&str],
        timeout_secs: u64,
    ) -> Result<String> {
        let child = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                FixpanicError::process(format!("Failed to spawn command {}: {}", command, e))
            })?;

        let timeout = tokio::time::Duration::from_secs(timeout_secs);
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                FixpanicError::process(format!(
                    "Command {} timed out after {} seconds",
                    command, timeout_secs
                ))
            })?
            .map_err(|e| FixpanicError::process(format!("Command {} failed: {}", command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FixpanicError::process(format!(
                "Command {} failed with exit code {}: {}",
                command,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_exists() {
        assert!(!SystemUtils::command_exists("nonexistent-command-12345"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_capture_reports_failure_without_error() {
        let output = SystemUtils::capture("sh", &["-c", "echo out; exit 3"])
            .await
            .unwrap();
        assert!(!output.success);
        assert_eq!(output.code, Some(3));
        assert_eq!(output.trimmed(), "out");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_fails_on_non_zero_exit() {
        let result = SystemUtils::run("sh", &["-c", "echo boom >&2; exit 1"]).await;
        let message = result.unwrap_err().to_string();
        assert!(message.contains("boom"));
    }

    #[tokio::test]
    async fn test_capture_missing_binary_is_error() {
        let result = SystemUtils::capture("nonexistent-command-12345", &[]).await;
        assert!(matches!(result, Err(FixpanicError::Process(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_with_timeout_expires() {
        let result = SystemUtils::execute_with_timeout("sleep", &["5"], 1).await;
        assert!(result.unwrap_err().to_string().contains("timed out"));
    }
}
