//! Command implementations for runkit.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. `run` lives in its own module; the small inspection
//! commands are implemented here.

mod run;

use crate::cli::{Command, ExecArgs, GenConfigArgs};
use runkit::command::run_command;
use runkit::config::Config;
use runkit::cpu;
use runkit::error::Result;
use runkit::fs::atomic_write_file;
use runkit::logging::init_console_logging;

/// Dispatch a command to its implementation.
pub fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Run(args) => run::cmd_run(args),
        Command::Cpus => cmd_cpus(),
        Command::Exec(args) => cmd_exec(args),
        Command::GenConfig(args) => cmd_gen_config(args),
    }
}

fn cmd_cpus() -> Result<()> {
    init_console_logging(false);

    let cpu_count = cpu::detect_cpu_count();
    println!("cpus: {}", cpu_count);
    println!("concurrency hint: {}", cpu::concurrency_hint(cpu_count));
    Ok(())
}

fn cmd_exec(args: ExecArgs) -> Result<()> {
    init_console_logging(false);

    let output = run_command(&args.argv)?;
    print!("{}", output);
    Ok(())
}

fn cmd_gen_config(args: GenConfigArgs) -> Result<()> {
    let yaml = Config::default().to_yaml()?;

    match args.output {
        Some(path) => {
            atomic_write_file(&path, &yaml)?;
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{}", yaml),
    }
    Ok(())
}
