//! PID file handling.

use super::atomic::atomic_write_file;
use crate::error::{Result, RunkitError};
use std::path::{Path, PathBuf};

/// Path of the PID file for `name` in `directory`.
pub fn pid_file_path(directory: &Path, name: &str) -> PathBuf {
    directory.join(format!("{}.pid", name))
}

/// Write the current process ID, in decimal with no trailing newline.
pub fn write_pid_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    atomic_write_file(path, &std::process::id().to_string())?;
    tracing::debug!(path = %path.display(), "wrote pid file");
    Ok(())
}

/// Read a PID previously written by `write_pid_file`.
pub fn read_pid_file<P: AsRef<Path>>(path: P) -> Result<u32> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| RunkitError::filesystem(path, e))?;
    content.trim().parse().map_err(|e| {
        RunkitError::UserError(format!(
            "invalid pid file '{}': {}",
            path.display(),
            e
        ))
    })
}
