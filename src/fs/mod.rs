//! Filesystem utilities for runkit.
//!
//! Atomic writes and the PID file written at startup.

pub mod atomic;
mod pidfile;

pub use atomic::{atomic_write, atomic_write_file};
pub use pidfile::{pid_file_path, read_pid_file, write_pid_file};
