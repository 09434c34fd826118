//! Tests for the locks subsystem.

use super::*;
use crate::error::RunkitError;
use chrono::{Duration, Utc};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Simulate another process holding `name` by linking its own PID file.
fn plant_foreign_lock(dir: &Path, name: &str, pid: u32) {
    let foreign = lock_file_path(dir, name, pid);
    let meta = LockMetadata {
        owner: "other@host".to_string(),
        pid,
        created_at: Utc::now(),
    };
    fs::write(&foreign, meta.to_json().unwrap()).unwrap();
    fs::hard_link(&foreign, link_path(dir, name)).unwrap();
}

#[test]
fn test_acquire_creates_both_files() {
    let temp_dir = TempDir::new().unwrap();
    let lock = Lock::acquire(temp_dir.path(), "svc").unwrap();

    assert!(lock.is_acquired());
    assert_eq!(lock.link(), temp_dir.path().join("svc.lock"));
    assert_eq!(
        lock.lock_file(),
        temp_dir
            .path()
            .join(format!("svc-{}.lock", std::process::id()))
    );
    assert!(lock.link().exists());
    assert!(lock.lock_file().exists());
}

#[test]
fn test_link_exposes_holder_metadata() {
    let temp_dir = TempDir::new().unwrap();
    let lock = Lock::acquire(temp_dir.path(), "svc").unwrap();

    let meta = LockMetadata::from_file(lock.link()).unwrap();
    assert_eq!(meta.pid, std::process::id());
    assert!(meta.owner.contains('@'));
    assert!(meta.age().num_minutes() < 1);
}

#[test]
fn test_second_acquire_fails_while_held() {
    let temp_dir = TempDir::new().unwrap();
    let first = Lock::acquire(temp_dir.path(), "svc").unwrap();

    let err = Lock::acquire(temp_dir.path(), "svc").unwrap_err();
    assert!(matches!(err, RunkitError::LockError(_)));
    assert!(err.to_string().contains("already running"));

    // The holder's files survive the failed attempt.
    assert!(first.link().exists());
    assert!(first.lock_file().exists());
}

#[test]
fn test_contention_with_another_process() {
    let temp_dir = TempDir::new().unwrap();
    let other_pid = std::process::id().wrapping_add(1);
    plant_foreign_lock(temp_dir.path(), "svc", other_pid);

    let err = Lock::acquire(temp_dir.path(), "svc").unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("already running"));
    assert!(msg.contains(&format!("pid {}", other_pid)));
    assert!(msg.contains("other@host"));

    // Our own PID-qualified file is cleaned up; the holder's is untouched.
    let ours = lock_file_path(temp_dir.path(), "svc", std::process::id());
    assert!(!ours.exists());
    assert!(lock_file_path(temp_dir.path(), "svc", other_pid).exists());
    assert!(link_path(temp_dir.path(), "svc").exists());
}

#[test]
fn test_release_removes_files_and_allows_reacquire() {
    let temp_dir = TempDir::new().unwrap();
    let lock = Lock::acquire(temp_dir.path(), "svc").unwrap();
    lock.release();

    assert!(!lock.is_acquired());
    assert!(!lock.link().exists());
    assert!(!lock.lock_file().exists());

    let again = Lock::acquire(temp_dir.path(), "svc").unwrap();
    assert!(again.is_acquired());
}

#[test]
fn test_release_twice_is_harmless() {
    let temp_dir = TempDir::new().unwrap();
    let lock = Lock::acquire(temp_dir.path(), "svc").unwrap();

    lock.release();
    lock.release();

    assert!(!lock.link().exists());
}

#[test]
fn test_release_tolerates_files_removed_externally() {
    let temp_dir = TempDir::new().unwrap();
    let lock = Lock::acquire(temp_dir.path(), "svc").unwrap();

    fs::remove_file(lock.link()).unwrap();
    fs::remove_file(lock.lock_file()).unwrap();

    lock.release();
    assert!(!lock.is_acquired());
}

#[test]
fn test_names_are_independent() {
    let temp_dir = TempDir::new().unwrap();
    let a = Lock::acquire(temp_dir.path(), "alpha").unwrap();
    let b = Lock::acquire(temp_dir.path(), "beta").unwrap();

    assert!(a.link().exists());
    assert!(b.link().exists());
}

#[test]
fn test_directories_are_independent() {
    let one = TempDir::new().unwrap();
    let two = TempDir::new().unwrap();

    let _a = Lock::acquire(one.path(), "svc").unwrap();
    let b = Lock::acquire(two.path(), "svc").unwrap();
    assert!(b.is_acquired());
}

#[test]
fn test_missing_directory_is_a_filesystem_error() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("does-not-exist");

    let err = Lock::acquire(&missing, "svc").unwrap_err();
    assert!(matches!(err, RunkitError::FilesystemError { .. }));
}

#[test]
fn test_lock_metadata_age_string() {
    let mut meta = LockMetadata::current();
    assert!(meta.age_string().ends_with('s'));

    meta.created_at = Utc::now() - Duration::minutes(12);
    assert!(meta.age_string().starts_with("12m "));

    meta.created_at = Utc::now() - Duration::hours(2);
    assert!(meta.age_string().starts_with("2h "));

    meta.created_at = Utc::now() - Duration::days(3) - Duration::hours(4);
    assert_eq!(meta.age_string(), "3d 4h");

    // Clock skew never yields a negative age.
    meta.created_at = Utc::now() + Duration::hours(1);
    assert_eq!(meta.age_string(), "0s");
}

#[test]
fn test_lock_metadata_round_trips_through_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("meta.lock");
    let meta = LockMetadata::current();
    fs::write(&path, meta.to_json().unwrap()).unwrap();

    assert_eq!(LockMetadata::from_file(&path).unwrap(), meta);
}

#[test]
fn test_unparseable_holder_still_reports_contention() {
    let temp_dir = TempDir::new().unwrap();
    let foreign = temp_dir.path().join("svc-1.lock");
    fs::write(&foreign, "").unwrap();
    fs::hard_link(&foreign, link_path(temp_dir.path(), "svc")).unwrap();

    let err = Lock::acquire(temp_dir.path(), "svc").unwrap_err();
    assert!(err.to_string().contains("already running"));
}
