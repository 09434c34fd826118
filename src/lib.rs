//! Runkit: runtime bootstrap for long-running server processes.
//!
//! The library provides the pieces a server needs before it starts serving:
//! a single-instance lock, a PID file, an ordered exit-handler chain, signal
//! dispatch, CPU detection and logging. `bootstrap` wires them together.

pub mod bootstrap;
pub mod command;
pub mod config;
pub mod context;
pub mod cpu;
pub mod error;
pub mod exit;
pub mod exit_codes;
pub mod fs;
pub mod locks;
pub mod logging;
pub mod runtime;
pub mod signals;

#[cfg(test)]
mod test_support;
