//! External command runner for runkit.
//!
//! Runs a program synchronously and captures its standard output. Standard
//! input and standard error are discarded. Every failure (spawn, wait, or
//! reading the output pipe) collapses into a single `CommandError` naming
//! the command and its arguments.

use crate::error::{Result, RunkitError};
use std::io::Read;
use std::process::{Command, Stdio};

/// Something that can run an argument vector and return its stdout.
///
/// CPU detection goes through this trait so tests can substitute canned output.
pub trait CommandRunner {
    fn run(&self, argv: &[&str]) -> Result<String>;
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, argv: &[&str]) -> Result<String> {
        run_command(argv)
    }
}

/// Run `argv[0]` with `argv` as its arguments and return everything it
/// wrote to standard output.
///
/// The child inherits the caller's environment and working directory.
/// A non-zero exit status is not an error; the captured output is returned
/// regardless. Blocks until the child exits, with no timeout.
///
/// # Examples
///
/// ```no_run
/// use runkit::command::run_command;
///
/// let output = run_command(&["/bin/echo", "hello"])?;
/// assert_eq!(output, "hello\n");
/// # Ok::<(), runkit::error::RunkitError>(())
/// ```
pub fn run_command<S: AsRef<str>>(argv: &[S]) -> Result<String> {
    let args: Vec<String> = argv.iter().map(|a| a.as_ref().to_string()).collect();
    let fail = |source: std::io::Error| RunkitError::CommandError {
        command: args.first().cloned().unwrap_or_default(),
        args: args.clone(),
        source,
    };

    let Some(program) = args.first() else {
        return Err(fail(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "empty argument vector",
        )));
    };

    let mut child = Command::new(program)
        .args(&args[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(fail)?;

    // Drain stdout before waiting so a chatty child can't block on a full pipe.
    // The handle is dropped (and the pipe closed) at the end of this block on
    // every path.
    let mut buffer = Vec::new();
    let read_result = match child.stdout.take() {
        Some(mut stdout) => stdout.read_to_end(&mut buffer).map(|_| ()),
        None => Err(std::io::Error::other("stdout was not captured")),
    };

    let wait_result = child.wait();
    read_result.map_err(fail)?;
    let status = wait_result.map_err(fail)?;

    tracing::debug!(
        command = %program,
        exit_code = ?status.code(),
        output_bytes = buffer.len(),
        "command finished"
    );

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
