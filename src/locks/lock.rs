//! Hard-link based single-instance lock.

use super::metadata::LockMetadata;
use crate::error::{Result, RunkitError};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// An acquired single-instance lock.
///
/// Releasing removes both the stable link and the PID-qualified file.
/// Release is idempotent and is normally performed by the exit chain;
/// dropping a `Lock` does not release it.
#[derive(Debug)]
pub struct Lock {
    /// PID-qualified file created by this process (`{name}-{pid}.lock`).
    lock_file: PathBuf,

    /// Stable link other instances contend for (`{name}.lock`).
    link: PathBuf,

    released: AtomicBool,
}

/// Path of the stable link for `name` in `directory`.
pub fn link_path(directory: &Path, name: &str) -> PathBuf {
    directory.join(format!("{}.lock", name))
}

/// Path of the PID-qualified lock file for `name` and `pid` in `directory`.
pub fn lock_file_path(directory: &Path, name: &str, pid: u32) -> PathBuf {
    directory.join(format!("{}-{}.lock", name, pid))
}

impl Lock {
    /// Acquire the lock for `name` within `directory`.
    ///
    /// Writes `{name}-{pid}.lock`, then hard-links it to `{name}.lock`.
    /// Link creation is atomic across processes, so exactly one concurrent
    /// attempt succeeds. On failure the PID-qualified file is removed again
    /// and a `LockError` is returned; callers treat this as fatal.
    pub fn acquire<P: AsRef<Path>>(directory: P, name: &str) -> Result<Self> {
        let directory = directory.as_ref();
        let metadata = LockMetadata::current();
        let lock_file = lock_file_path(directory, name, metadata.pid);
        let link = link_path(directory, name);

        write_lock_file(&lock_file, &metadata)?;

        if let Err(e) = fs::hard_link(&lock_file, &link) {
            // Re-acquiring in a process that already holds the lock targets
            // the same PID-qualified file the link points at; keep it.
            if !same_file(&lock_file, &link) {
                let _ = fs::remove_file(&lock_file);
            }
            return Err(contention_error(&link, e));
        }

        tracing::info!(link = %link.display(), pid = metadata.pid, "acquired process lock");

        Ok(Self {
            lock_file,
            link,
            released: AtomicBool::new(false),
        })
    }

    /// Path of the stable link.
    pub fn link(&self) -> &Path {
        &self.link
    }

    /// Path of the PID-qualified lock file.
    pub fn lock_file(&self) -> &Path {
        &self.lock_file
    }

    /// Whether this lock is still held.
    pub fn is_acquired(&self) -> bool {
        !self.released.load(Ordering::SeqCst)
    }

    /// Remove both lock files.
    ///
    /// Safe to call any number of times, from any thread. Files that are
    /// already gone are not an error; other removal failures are logged.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        remove_if_present(&self.lock_file);
        remove_if_present(&self.link);
        tracing::debug!(link = %self.link.display(), "released process lock");
    }
}

fn write_lock_file(path: &Path, metadata: &LockMetadata) -> Result<()> {
    let json = metadata.to_json()?;
    let mut file = fs::File::create(path).map_err(|e| RunkitError::filesystem(path, e))?;
    file.write_all(json.as_bytes()).map_err(|e| {
        let _ = fs::remove_file(path);
        RunkitError::filesystem(path, e)
    })
}

fn contention_error(link: &Path, cause: io::Error) -> RunkitError {
    if cause.kind() != io::ErrorKind::AlreadyExists {
        return RunkitError::LockError(format!(
            "failed to create lock link '{}': {}",
            link.display(),
            cause
        ));
    }

    let holder = match LockMetadata::from_file(link) {
        Ok(meta) => format!(
            "\nLock: {} (pid {}, created {} ago by {})",
            link.display(),
            meta.pid,
            meta.age_string(),
            meta.owner
        ),
        Err(_) => format!("\nLock: {}", link.display()),
    };
    RunkitError::LockError(format!(
        "another instance is already running{}",
        holder
    ))
}

fn remove_if_present(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove lock file"),
    }
}

#[cfg(unix)]
fn same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_file(_a: &Path, _b: &Path) -> bool {
    false
}
