//! Exit code constants for runkit.
//!
//! - 0: Success, including shutdown triggered by SIGINT/SIGTERM
//! - 1: Fatal error (lock contention, filesystem, config, logging setup)
//!
//! Codes passed explicitly to `Runtime::terminate` are used unchanged.

/// Clean shutdown.
pub const SUCCESS: i32 = 0;

/// Any fatal error reported through the error path.
pub const FAILURE: i32 = 1;
