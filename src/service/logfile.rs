// file: src/service/logfile.rs
// version: 1.0.0
// guid: 530f3e6f-f7c0-4e3e-9aac-254216f56cd6

//! Reading the agent's log file when the service manager keeps no journal

use crate::{FixpanicError, Result};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const FOLLOW_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// The last `lines` lines of `content`
pub fn tail_lines(content: &str, lines: usize) -> String {
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);
    let mut tail = all[start..].join("\n");
    if !tail.is_empty() {
        tail.push('\n');
    }
    tail
}

/// The last `lines` lines of the log file
pub fn read_tail(path: &Path, lines: usize) -> Result<String> {
    if !path.exists() {
        return Err(FixpanicError::config(format!(
            "Log file not found: {}",
            path.display()
        )));
    }
    let bytes = std::fs::read(path)?;
    Ok(tail_lines(&String::from_utf8_lossy(&bytes), lines))
}

/// Print data appended to the log file until the task is cancelled.
///
/// A file that shrinks (rotation or truncation) is read again from the start.
pub async fn follow(path: &Path) -> Result<()> {
    let mut position = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let mut stdout = tokio::io::stdout();

    loop {
        if let Ok(meta) = std::fs::metadata(path) {
            let len = meta.len();
            if len < position {
                position = 0;
            }
            if len > position {
                let mut file = std::fs::File::open(path)?;
                file.seek(SeekFrom::Start(position))?;
                let mut chunk = Vec::with_capacity((len - position) as usize);
                file.take(len - position).read_to_end(&mut chunk)?;
                position += chunk.len() as u64;
                stdout.write_all(&chunk).await?;
                stdout.flush().await?;
            }
        }
        tokio::time::sleep(FOLLOW_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_tail_lines() {
        let content = "one\ntwo\nthree\nfour\n";
        assert_eq!(tail_lines(content, 2), "three\nfour\n");
        assert_eq!(tail_lines(content, 10), content);
        assert_eq!(tail_lines(content, 0), "");
        assert_eq!(tail_lines("", 5), "");
    }

    #[test]
    fn test_read_tail_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = read_tail(&dir.path().join("agent.log"), 10);
        assert!(result.unwrap_err().to_string().contains("Log file not found"));
    }

    #[test]
    fn test_read_tail_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent.log");
        let content: String = (1..=100).map(|i| format!("line {}\n", i)).collect();
        std::fs::write(&path, content).unwrap();

        let tail = read_tail(&path, 3).unwrap();
        assert_eq!(tail, "line 98\nline 99\nline 100\n");
    }
}
