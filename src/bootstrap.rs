//! Instance bootstrap.
//!
//! Wires the pieces together in the order a long-running server needs them:
//! 1. Resolve the instance context (directory or config file)
//! 2. Create the log and run directories
//! 3. Initialise logging and hand the flush guards to the runtime
//! 4. Acquire the single-instance lock (release registered on the exit chain)
//! 5. Write the PID file
//!
//! A second instance fails at step 4, before any PID file is written.

use crate::context::InstanceContext;
use crate::error::Result;
use crate::fs::{pid_file_path, write_pid_file};
use crate::locks::Lock;
use crate::logging::{LogOptions, init_logging};
use crate::runtime::Runtime;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Inputs for `bootstrap`.
#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// Instance name; names the lock, PID and main log files.
    pub name: String,
    /// Instance directory or config file.
    pub instance: PathBuf,
    /// Force debug logging regardless of config.
    pub debug: bool,
    /// Force console logging off regardless of config.
    pub no_console_log: bool,
}

/// A bootstrapped instance.
#[derive(Debug)]
pub struct Instance {
    pub context: InstanceContext,
    pub lock: Arc<Lock>,
    pub pid_file: PathBuf,
}

/// Bootstrap an instance against `runtime`.
///
/// Errors are returned rather than terminating; callers report them through
/// `Runtime::fatal_error` so logs are flushed and exit handlers run.
pub fn bootstrap(runtime: &Runtime, options: &BootstrapOptions) -> Result<Instance> {
    let mut context = InstanceContext::resolve(&options.instance)?;
    context.config.debug |= options.debug;
    context.config.no_console_log |= options.no_console_log;

    context.ensure_directories()?;

    let log_dir = context.log_dir();
    let guards = init_logging(&LogOptions {
        name: &options.name,
        log_dir: &log_dir,
        debug: context.config.debug,
        no_console: context.config.no_console_log,
    })?;
    runtime.set_log_guards(guards);
    runtime.set_profile(context.profile.clone());

    tracing::info!(
        name = %options.name,
        profile = %context.profile,
        instance_dir = %context.instance_dir.display(),
        "bootstrapping instance"
    );

    let (lock, pid_file) = init_process(runtime, &context.run_dir(), &options.name)?;

    Ok(Instance {
        context,
        lock,
        pid_file,
    })
}

/// Acquire the process lock for `name` in `run_dir` and write the PID file.
pub fn init_process(runtime: &Runtime, run_dir: &Path, name: &str) -> Result<(Arc<Lock>, PathBuf)> {
    let lock = runtime.acquire_lock(run_dir, name)?;

    let pid_file = pid_file_path(run_dir, name);
    write_pid_file(&pid_file)?;

    Ok((lock, pid_file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunkitError;
    use crate::fs::read_pid_file;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_init_process_writes_lock_and_pid() {
        let temp_dir = TempDir::new().unwrap();
        let runtime = Runtime::with_cpu_count(1);

        let (lock, pid_file) = init_process(&runtime, temp_dir.path(), "svc").unwrap();

        assert!(lock.link().exists());
        assert_eq!(pid_file, temp_dir.path().join("svc.pid"));
        assert_eq!(read_pid_file(&pid_file).unwrap(), std::process::id());

        runtime.run_exit_handlers();
        assert!(!lock.link().exists());
        // The PID file is left in place.
        assert!(pid_file.exists());
    }

    #[test]
    fn test_second_init_process_fails_without_pid_file() {
        let temp_dir = TempDir::new().unwrap();
        let first = Runtime::with_cpu_count(1);
        let second = Runtime::with_cpu_count(1);

        let (_lock, pid_file) = init_process(&first, temp_dir.path(), "svc").unwrap();
        std::fs::remove_file(&pid_file).unwrap();

        let err = init_process(&second, temp_dir.path(), "svc").unwrap_err();
        assert!(matches!(err, RunkitError::LockError(_)));
        assert!(!pid_file.exists());
    }

    #[test]
    fn test_init_process_in_missing_run_dir_fails() {
        let temp_dir = TempDir::new().unwrap();
        let runtime = Runtime::with_cpu_count(1);

        let err = init_process(&runtime, &temp_dir.path().join("missing"), "svc").unwrap_err();
        assert!(matches!(err, RunkitError::FilesystemError { .. }));
    }

    #[test]
    #[serial]
    fn test_bootstrap_from_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("prod.yaml");
        std::fs::write(&config_path, "run_dir: state\nno_console_log: true\n").unwrap();

        let runtime = Runtime::with_cpu_count(2);
        let instance = bootstrap(
            &runtime,
            &BootstrapOptions {
                name: "svc".to_string(),
                instance: config_path,
                debug: false,
                no_console_log: false,
            },
        )
        .unwrap();

        assert_eq!(runtime.profile(), "prod");
        assert!(runtime.has_log_guards());
        assert_eq!(instance.context.run_dir(), temp_dir.path().join("state"));
        assert!(temp_dir.path().join("state/svc.lock").exists());
        assert!(temp_dir.path().join("state/svc.pid").exists());
        assert!(temp_dir.path().join("log/svc.log").exists());
        assert!(temp_dir.path().join("log/error.log").exists());

        runtime.flush_logs();
        runtime.run_exit_handlers();
        assert!(!instance.lock.link().exists());
    }
}
