//! Single-instance locking for runkit.
//!
//! At most one process with a given name may run against a given run
//! directory at a time.
//!
//! # Lock Files
//!
//! - `{dir}/{name}-{pid}.lock`: written by each contender, holds JSON metadata
//! - `{dir}/{name}.lock`: the stable link; its existence means "instance running"
//!
//! The stable link is created as a **hard link** to the PID-qualified file.
//! Link creation either fully succeeds or fully fails, so there is no
//! check-then-create window between two contenders.
//!
//! # Stale Locks
//!
//! A process killed without running its exit handlers leaves both files
//! behind and the next start is refused. Operators must remove the stale
//! link by hand.

mod lock;
mod metadata;

#[cfg(test)]
mod tests;

pub use lock::{Lock, link_path, lock_file_path};
pub use metadata::LockMetadata;
