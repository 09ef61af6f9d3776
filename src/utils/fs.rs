// file: src/utils/fs.rs
// version: 1.1.0
// guid: ff544a74-5f6c-4ce0-9c49-46c4a56efd1c

//! Filesystem helpers shared by config writing, downloads and upgrades

use crate::{FixpanicError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Mode used for executables we install
pub const EXECUTABLE_MODE: u32 = 0o755;

/// Mode used for files holding credentials
pub const PRIVATE_MODE: u32 = 0o600;

/// Append a suffix to the full file name (`agent` + `.tmp` -> `agent.tmp`)
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Mark a file as executable (no-op on Windows)
pub fn set_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(EXECUTABLE_MODE))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Whether the file exists and carries an execute bit
pub fn is_executable(path: &Path) -> bool {
    match fs::metadata(path) {
        #[cfg(unix)]
        Ok(meta) => {
            use std::os::unix::fs::PermissionsExt;
            meta.is_file() && meta.permissions().mode() & 0o111 != 0
        }
        #[cfg(not(unix))]
        Ok(meta) => meta.is_file(),
        Err(_) => false,
    }
}

/// Write a file readable only by its owner, creating parent directories
pub fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(PRIVATE_MODE);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()?;

    // An existing file keeps its old mode on open, so tighten it explicitly.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(PRIVATE_MODE))?;
    }
    Ok(())
}

/// Remove a file, treating "already gone" as success.
///
/// Returns whether a file was actually removed.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Remove a directory only when it is empty. Returns whether it was removed.
pub fn remove_dir_if_empty(path: &Path) -> bool {
    match fs::remove_dir(path) {
        Ok(()) => true,
        Err(e) => {
            debug!("Keeping directory {}: {}", path.display(), e);
            false
        }
    }
}

/// Replace `current` with `replacement`, keeping a backup until the swap
/// succeeds.
///
/// The replacement is first copied next to the target so the final rename
/// never crosses a filesystem boundary. If that rename fails the backup is
/// moved back into place. No `.new` file survives a failure.
pub fn replace_with_backup(current: &Path, replacement: &Path) -> Result<()> {
    swap_with_backup(current, replacement, set_executable, |from, to| {
        fs::rename(from, to)
    })
}

fn swap_with_backup<P, R>(current: &Path, replacement: &Path, prepare: P, rename: R) -> Result<()>
where
    P: Fn(&Path) -> Result<()>,
    R: Fn(&Path, &Path) -> std::io::Result<()>,
{
    let backup = with_suffix(current, ".backup");
    let staged = with_suffix(current, ".new");

    debug!("Creating backup: {}", backup.display());
    let have_backup = match fs::copy(current, &backup) {
        Ok(_) => true,
        Err(e) => {
            warn!("Failed to create backup of {}: {}", current.display(), e);
            false
        }
    };

    let discard = || {
        let _ = remove_if_exists(&staged);
        if have_backup {
            let _ = remove_if_exists(&backup);
        }
    };

    if let Err(e) = fs::copy(replacement, &staged) {
        discard();
        return Err(FixpanicError::upgrade(format!(
            "failed to stage new binary next to {}: {}",
            current.display(),
            e
        )));
    }
    if let Err(e) = prepare(&staged) {
        discard();
        return Err(FixpanicError::upgrade(format!(
            "failed to make staged binary executable: {}",
            e
        )));
    }

    if let Err(e) = rename(&staged, current) {
        let _ = remove_if_exists(&staged);
        if have_backup {
            warn!("Failed to replace binary, attempting to restore backup");
            if let Err(restore) = rename(&backup, current) {
                return Err(FixpanicError::upgrade(format!(
                    "failed to replace binary and failed to restore backup: {} (restore error: {})",
                    e, restore
                )));
            }
            return Err(FixpanicError::upgrade(format!(
                "failed to replace binary (backup restored): {}",
                e
            )));
        }
        return Err(FixpanicError::upgrade(format!("failed to replace binary: {}", e)));
    }

    if have_backup {
        if let Err(e) = fs::remove_file(&backup) {
            warn!("Failed to remove backup file {}: {}", backup.display(), e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_with_suffix_keeps_extension() {
        let path = Path::new("/opt/fixpanic-agent.exe");
        assert_eq!(
            with_suffix(path, ".tmp"),
            PathBuf::from("/opt/fixpanic-agent.exe.tmp")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_write_private_sets_owner_only_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("agent.yaml");
        fs::write(dir.path().join("placeholder"), "x").unwrap();

        write_private(&path, b"api_key: secret").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert_eq!(fs::read_to_string(&path).unwrap(), "api_key: secret");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_private_tightens_existing_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent.yaml");
        fs::write(&path, "old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        write_private(&path, b"new").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_remove_if_exists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file");
        fs::write(&path, "x").unwrap();

        assert!(remove_if_exists(&path).unwrap());
        assert!(!remove_if_exists(&path).unwrap());
    }

    #[test]
    fn test_remove_dir_if_empty_keeps_populated_dirs() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty");
        let full = dir.path().join("full");
        fs::create_dir(&empty).unwrap();
        fs::create_dir(&full).unwrap();
        fs::write(full.join("keep"), "x").unwrap();

        assert!(remove_dir_if_empty(&empty));
        assert!(!remove_dir_if_empty(&full));
        assert!(full.exists());
    }

    #[test]
    fn test_replace_with_backup_swaps_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let current = dir.path().join("fixpanic");
        let replacement = dir.path().join("download").join("fixpanic");
        fs::create_dir_all(replacement.parent().unwrap()).unwrap();
        fs::write(&current, "old binary").unwrap();
        fs::write(&replacement, "new binary").unwrap();

        replace_with_backup(&current, &replacement).unwrap();

        assert_eq!(fs::read_to_string(&current).unwrap(), "new binary");
        assert!(!with_suffix(&current, ".backup").exists());
        assert!(!with_suffix(&current, ".new").exists());
        assert!(is_executable(&current));
    }

    #[test]
    fn test_replace_with_backup_missing_replacement_keeps_current() {
        let dir = TempDir::new().unwrap();
        let current = dir.path().join("fixpanic");
        fs::write(&current, "old binary").unwrap();

        let result = replace_with_backup(&current, &dir.path().join("missing"));

        assert!(matches!(result, Err(FixpanicError::Upgrade(_))));
        assert_eq!(fs::read_to_string(&current).unwrap(), "old binary");
        assert!(!with_suffix(&current, ".backup").exists());
    }

    fn swap_fixture(dir: &TempDir) -> (PathBuf, PathBuf) {
        let current = dir.path().join("fixpanic");
        let replacement = dir.path().join("download").join("fixpanic");
        fs::create_dir_all(replacement.parent().unwrap()).unwrap();
        fs::write(&current, "old binary").unwrap();
        fs::write(&replacement, "new binary").unwrap();
        (current, replacement)
    }

    #[test]
    fn test_failed_swap_restores_backup() {
        // Arrange
        let dir = TempDir::new().unwrap();
        let (current, replacement) = swap_fixture(&dir);
        let staged = with_suffix(&current, ".new");
        let fail_staged_rename = |from: &Path, to: &Path| -> std::io::Result<()> {
            if from == staged.as_path() {
                return Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "busy"));
            }
            fs::rename(from, to)
        };

        // Act
        let result = swap_with_backup(&current, &replacement, set_executable, fail_staged_rename);

        // Assert
        let message = result.unwrap_err().to_string();
        assert!(message.contains("backup restored"), "{}", message);
        assert_eq!(fs::read_to_string(&current).unwrap(), "old binary");
        assert!(!staged.exists());
        assert!(!with_suffix(&current, ".backup").exists());
    }

    #[test]
    fn test_failed_restore_keeps_backup() {
        let dir = TempDir::new().unwrap();
        let (current, replacement) = swap_fixture(&dir);
        let always_fail = |_: &Path, _: &Path| -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "busy"))
        };

        let result = swap_with_backup(&current, &replacement, set_executable, always_fail);

        let message = result.unwrap_err().to_string();
        assert!(message.contains("failed to restore backup"), "{}", message);
        assert_eq!(fs::read_to_string(&current).unwrap(), "old binary");
        assert!(!with_suffix(&current, ".new").exists());
        assert_eq!(
            fs::read_to_string(with_suffix(&current, ".backup")).unwrap(),
            "old binary"
        );
    }

    #[test]
    fn test_failed_prepare_cleans_staged_and_backup() {
        let dir = TempDir::new().unwrap();
        let (current, replacement) = swap_fixture(&dir);
        let refuse = |_: &Path| -> Result<()> {
            Err(FixpanicError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only filesystem",
            )))
        };

        let result = swap_with_backup(&current, &replacement, refuse, |from, to| fs::rename(from, to));

        assert!(matches!(result, Err(FixpanicError::Upgrade(_))));
        assert_eq!(fs::read_to_string(&current).unwrap(), "old binary");
        assert!(!with_suffix(&current, ".new").exists());
        assert!(!with_suffix(&current, ".backup").exists());
    }
}
