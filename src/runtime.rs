//! Process-wide runtime state.
//!
//! `Runtime` is the single registry the bootstrap code passes around: it
//! owns the exit-handler chain, the signal dispatcher, the log flush guards
//! and the values computed once at startup (CPU count, concurrency hint,
//! profile).
//!
//! `terminate` is the one sanctioned way to end the process. Explicit
//! calls, fatal errors and the default SIGINT/SIGTERM handlers all funnel
//! into it, and the exit chain runs at most once however many of them race.

use crate::context::DEFAULT_PROFILE;
use crate::cpu;
use crate::error::{Result, RunkitError};
use crate::exit::ExitHandlerChain;
use crate::exit_codes;
use crate::locks::Lock;
use crate::logging::LogGuards;
use crate::signals::SignalDispatcher;
use std::fmt::Display;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

enum LockSlot {
    Pending,
    Held(Arc<Lock>),
    Closed,
}

fn shutting_down(name: &str) -> RunkitError {
    RunkitError::LockError(format!("process is shutting down; lock '{}' not acquired", name))
}

#[derive(Debug)]
pub struct Runtime {
    exit_handlers: ExitHandlerChain,
    signals: SignalDispatcher,
    log_guards: Mutex<Option<LogGuards>>,
    cpu_count: usize,
    profile: OnceLock<String>,
}

impl Runtime {
    /// Detect the CPU count, install the default signal handlers and start
    /// the signal dispatcher.
    pub fn init() -> Result<Arc<Self>> {
        let runtime = Self::with_cpu_count(cpu::detect_cpu_count());
        runtime.install_default_signal_handlers();
        runtime.start_signal_dispatch()?;
        tracing::debug!(
            cpu_count = runtime.cpu_count(),
            concurrency_hint = runtime.concurrency_hint(),
            "runtime initialised"
        );
        Ok(runtime)
    }

    /// A runtime with a fixed CPU count and nothing installed.
    pub fn with_cpu_count(cpu_count: usize) -> Arc<Self> {
        Arc::new(Self {
            exit_handlers: ExitHandlerChain::new(),
            signals: SignalDispatcher::new(),
            log_guards: Mutex::new(None),
            cpu_count: cpu_count.max(1),
            profile: OnceLock::new(),
        })
    }

    pub fn cpu_count(&self) -> usize {
        self.cpu_count
    }

    /// Suggested number of worker threads.
    pub fn concurrency_hint(&self) -> usize {
        cpu::concurrency_hint(self.cpu_count)
    }

    /// The active profile, `default` until one is set.
    pub fn profile(&self) -> &str {
        self.profile.get().map(String::as_str).unwrap_or(DEFAULT_PROFILE)
    }

    /// Set the profile. Only the first call has any effect.
    pub fn set_profile(&self, profile: impl Into<String>) {
        let _ = self.profile.set(profile.into());
    }

    // =========================================================================
    // Logging
    // =========================================================================

    /// Hand over the log guards so `terminate` can flush them.
    pub fn set_log_guards(&self, guards: LogGuards) {
        let mut slot = self.log_guards.lock().unwrap_or_else(|p| p.into_inner());
        *slot = Some(guards);
    }

    /// Whether file logging has been set up.
    pub fn has_log_guards(&self) -> bool {
        self.log_guards
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Flush pending log output. File logging continues synchronously.
    pub fn flush_logs(&self) {
        let guards = self
            .log_guards
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(guards) = guards {
            guards.flush();
        }
    }

    // =========================================================================
    // Exit handling
    // =========================================================================

    /// Register a cleanup callback to run once, in registration order,
    /// before the process exits.
    ///
    /// Returns `false` if the exit chain has already been drained, in which
    /// case `handler` never runs.
    pub fn register_exit_handler<F>(&self, handler: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.exit_handlers.register(handler)
    }

    /// Run the exit chain (once) without exiting.
    pub fn run_exit_handlers(&self) {
        self.exit_handlers.run_all();
    }

    /// Flush logs, run the exit chain and exit with `code`.
    pub fn terminate(&self, code: i32) -> ! {
        tracing::info!(code, "terminating");
        self.flush_logs();
        self.run_exit_handlers();
        std::process::exit(code)
    }

    /// Record `message` as an error and terminate with exit code 1.
    pub fn fatal(&self, message: impl Display) -> ! {
        if self.has_log_guards() {
            tracing::error!("{}", message);
        } else {
            eprintln!("Error: {}", message);
        }
        self.terminate(exit_codes::FAILURE)
    }

    /// Record `err` and terminate with its exit code.
    pub fn fatal_error(&self, err: &RunkitError) -> ! {
        if self.has_log_guards() {
            tracing::error!(error = %err, "fatal error");
        } else {
            eprintln!("Error: {}", err);
        }
        self.terminate(err.exit_code())
    }

    // =========================================================================
    // Locking
    // =========================================================================

    /// Acquire the single-instance lock for `name` in `directory` and
    /// register its release with the exit chain.
    ///
    /// The release is registered before the link is created, and the link is
    /// created while holding the slot that release waits on. A shutdown that
    /// races with acquisition therefore either prevents it or releases it.
    pub fn acquire_lock<P: AsRef<Path>>(&self, directory: P, name: &str) -> Result<Arc<Lock>> {
        let slot = Arc::new(Mutex::new(LockSlot::Pending));
        let release_slot = Arc::clone(&slot);
        let registered = self.register_exit_handler(move || {
            let mut slot = release_slot.lock().unwrap_or_else(|p| p.into_inner());
            if let LockSlot::Held(lock) = std::mem::replace(&mut *slot, LockSlot::Closed) {
                lock.release();
            }
        });
        if !registered {
            return Err(shutting_down(name));
        }

        let mut state = slot.lock().unwrap_or_else(|p| p.into_inner());
        if matches!(*state, LockSlot::Closed) {
            return Err(shutting_down(name));
        }
        let lock = Arc::new(Lock::acquire(directory, name)?);
        *state = LockSlot::Held(Arc::clone(&lock));
        Ok(lock)
    }

    // =========================================================================
    // Signals
    // =========================================================================

    /// Register `handler` to run on the dispatcher thread when `signal`
    /// arrives.
    pub fn register_signal_handler<F>(&self, signal: i32, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.signals.register_handler(signal, handler);
    }

    /// Whether a handler is registered for `signal`.
    pub fn has_signal_handler(&self, signal: i32) -> bool {
        self.signals.has_handler(signal)
    }

    /// Map SIGINT and SIGTERM to `terminate(0)`.
    #[cfg(unix)]
    pub fn install_default_signal_handlers(self: &Arc<Self>) {
        for signal in [libc::SIGINT, libc::SIGTERM] {
            let runtime = Arc::downgrade(self);
            self.register_signal_handler(signal, move || {
                if let Some(runtime) = runtime.upgrade() {
                    tracing::info!(signal, "received termination signal");
                    runtime.terminate(exit_codes::SUCCESS);
                }
            });
        }
    }

    #[cfg(not(unix))]
    pub fn install_default_signal_handlers(self: &Arc<Self>) {}

    /// Start the background signal dispatcher.
    pub fn start_signal_dispatch(&self) -> Result<()> {
        self.signals.start()
    }
}
