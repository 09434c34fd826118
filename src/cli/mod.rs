//! CLI argument parsing for runkit.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Runkit: bootstrap for long-running server processes.
///
/// Ensures a single running instance per name and run directory, writes a
/// PID file, and shuts down cleanly on SIGINT/SIGTERM.
#[derive(Parser, Debug)]
#[command(name = "runkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for runkit.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bootstrap an instance and run until signalled.
    ///
    /// Acquires the instance lock, writes the PID file, and waits for
    /// SIGINT or SIGTERM.
    Run(RunArgs),

    /// Print the detected CPU count and concurrency hint.
    Cpus,

    /// Run a command and print its standard output.
    Exec(ExecArgs),

    /// Print the default YAML config, or write it to a file.
    GenConfig(GenConfigArgs),
}

/// Arguments for the `run` command.
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Instance directory, or a YAML config file inside it.
    #[arg(value_name = "INSTANCE")]
    pub instance: PathBuf,

    /// Instance name used for the lock, PID and log files.
    #[arg(short, long, default_value = "runkit")]
    pub name: String,

    /// Enable debug logging.
    #[arg(short, long)]
    pub debug: bool,

    /// Disable logging to the console.
    #[arg(long)]
    pub no_console_log: bool,
}

/// Arguments for the `exec` command.
#[derive(Parser, Debug, Clone)]
pub struct ExecArgs {
    /// Program path followed by its arguments.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub argv: Vec<String>,
}

/// Arguments for the `gen-config` command.
#[derive(Parser, Debug, Clone)]
pub struct GenConfigArgs {
    /// Write the config to this file instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
