//! Atomic file writes.
//!
//! Content is staged in a hidden sibling file, synced, then renamed over the
//! target, so readers see either the old or the new content. A crash can
//! leave the staging file behind.

use crate::error::{Result, RunkitError};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Replace `path` with `content` in one rename, creating missing parent
/// directories first.
///
/// ```no_run
/// runkit::fs::atomic_write("run/svc.pid", b"4242")?;
/// # Ok::<(), runkit::error::RunkitError>(())
/// ```
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let target = path.as_ref();
    let staging = generate_temp_path(target)?;

    match staging.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|e| RunkitError::filesystem(dir, e))?
        }
        _ => {}
    }

    let committed = write_and_sync(&staging, content)
        .and_then(|()| fs::rename(&staging, target).map_err(|e| RunkitError::filesystem(target, e)));
    if committed.is_err() {
        let _ = fs::remove_file(&staging);
    }
    committed
}

pub fn atomic_write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}

/// Hidden sibling of `target` used for staging: `dir/.{file}.{pid}.tmp`.
fn generate_temp_path(target: &Path) -> Result<PathBuf> {
    let Some(file_name) = target.file_name() else {
        return Err(RunkitError::UserError(format!(
            "cannot write to '{}': not a file path",
            target.display()
        )));
    };
    let mut staged = OsString::from(".");
    staged.push(file_name);
    staged.push(format!(".{}.tmp", std::process::id()));
    Ok(target.with_file_name(staged))
}

fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| RunkitError::filesystem(path, e))?;
    file.write_all(content)
        .and_then(|()| file.sync_all())
        .map_err(|e| RunkitError::filesystem(path, e))
}
