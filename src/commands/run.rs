//! Implementation of the `runkit run` command.
//!
//! Initialises the runtime (CPU detection, default signal handlers, signal
//! dispatch), bootstraps the instance and then idles until SIGINT or
//! SIGTERM terminates the process through the exit chain.

use crate::cli::RunArgs;
use runkit::bootstrap::{BootstrapOptions, bootstrap};
use runkit::error::Result;
use runkit::runtime::Runtime;

/// Execute the `runkit run` command. Only returns on a runtime init error.
pub fn cmd_run(args: RunArgs) -> Result<()> {
    let runtime = Runtime::init()?;

    let options = BootstrapOptions {
        name: args.name,
        instance: args.instance,
        debug: args.debug,
        no_console_log: args.no_console_log,
    };
    let instance = match bootstrap(&runtime, &options) {
        Ok(instance) => instance,
        Err(err) => runtime.fatal_error(&err),
    };

    tracing::info!(
        pid = std::process::id(),
        pid_file = %instance.pid_file.display(),
        lock = %instance.lock.link().display(),
        cpu_count = runtime.cpu_count(),
        concurrency_hint = runtime.concurrency_hint(),
        "instance running"
    );

    // Signal handlers run on the dispatcher thread and exit the process.
    loop {
        std::thread::park();
    }
}
