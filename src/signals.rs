//! Signal dispatch for runkit.
//!
//! A background listener receives every catchable signal delivered to the
//! process and routes it to the handler registered for that signal.
//! Signals without a handler are absorbed rather than taking their default
//! action.
//!
//! Two threads cooperate:
//! - `signal-listener` reads from `signal_hook::iterator::Signals` and
//!   forwards into a bounded channel (`SIGNAL_BUFFER` slots). Signals
//!   arriving while the channel is full are dropped.
//! - `signal-dispatcher` takes one signal at a time, in delivery order, and
//!   runs its handler synchronously.
//!
//! Handlers run on the dispatcher thread, concurrently with the rest of the
//! program.

use crate::error::{Result, RunkitError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};

/// Maximum number of signals waiting for dispatch.
pub const SIGNAL_BUFFER: usize = 100;

/// A handler invoked on the dispatcher thread.
pub type SignalHandler = Arc<dyn Fn() + Send + Sync + 'static>;

type HandlerTable = Arc<Mutex<HashMap<i32, SignalHandler>>>;

/// The standard signals the dispatcher listens for.
///
/// Excludes signals that cannot be caught (`SIGKILL`, `SIGSTOP`) and the
/// synchronous fault signals, which must keep their default behaviour.
#[cfg(unix)]
pub const DELIVERABLE_SIGNALS: &[i32] = &[
    libc::SIGHUP,
    libc::SIGINT,
    libc::SIGQUIT,
    libc::SIGUSR1,
    libc::SIGUSR2,
    libc::SIGPIPE,
    libc::SIGALRM,
    libc::SIGTERM,
    libc::SIGCHLD,
    libc::SIGCONT,
    libc::SIGTSTP,
    libc::SIGTTIN,
    libc::SIGTTOU,
    libc::SIGURG,
    libc::SIGXCPU,
    libc::SIGXFSZ,
    libc::SIGVTALRM,
    libc::SIGPROF,
    libc::SIGWINCH,
    libc::SIGIO,
];

/// Every signal the dispatcher listens for: `DELIVERABLE_SIGNALS` plus, on
/// Linux, the real-time range `SIGRTMIN()..=SIGRTMAX()` left to applications
/// by the C library.
#[cfg(unix)]
pub fn deliverable_signals() -> Vec<i32> {
    let mut signals = DELIVERABLE_SIGNALS.to_vec();
    #[cfg(target_os = "linux")]
    signals.extend(libc::SIGRTMIN()..=libc::SIGRTMAX());
    signals
}

/// Outcome of handing one signal to the dispatcher thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Forward {
    Queued,
    /// The buffer was full; the signal is lost.
    Dropped,
    /// The dispatcher thread is gone.
    Closed,
}

/// Queue `signal` without blocking.
fn forward(tx: &SyncSender<i32>, signal: i32) -> Forward {
    match tx.try_send(signal) {
        Ok(()) => Forward::Queued,
        Err(TrySendError::Full(signal)) => {
            tracing::warn!(signal, "signal buffer full, dropping signal");
            Forward::Dropped
        }
        Err(TrySendError::Disconnected(_)) => Forward::Closed,
    }
}

/// Routes OS signals to registered handlers.
pub struct SignalDispatcher {
    handlers: HandlerTable,
    started: AtomicBool,
}

impl SignalDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(HashMap::new())),
            started: AtomicBool::new(false),
        }
    }

    /// Register `handler` for `signal`, replacing any previous handler.
    ///
    /// May be called before or after `start`.
    pub fn register_handler<F>(&self, signal: i32, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut table = self.handlers.lock().unwrap_or_else(|p| p.into_inner());
        table.insert(signal, Arc::new(handler));
    }

    /// Whether a handler is registered for `signal`.
    pub fn has_handler(&self, signal: i32) -> bool {
        let table = self.handlers.lock().unwrap_or_else(|p| p.into_inner());
        table.contains_key(&signal)
    }

    /// Invoke the handler for `signal` on the calling thread.
    ///
    /// Returns `false` if no handler is registered.
    pub fn dispatch(&self, signal: i32) -> bool {
        dispatch_from(&self.handlers, signal)
    }

    /// Whether the background listener has been started.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Start the background listener and dispatcher threads.
    ///
    /// They run for the rest of the process lifetime. Calling `start` again
    /// does nothing.
    #[cfg(unix)]
    pub fn start(&self) -> Result<()> {
        use signal_hook::iterator::Signals;
        use std::thread;

        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let listened = deliverable_signals();
        let mut signals = Signals::new(&listened).map_err(|e| {
            self.started.store(false, Ordering::SeqCst);
            RunkitError::SignalError(format!("failed to register signal listener: {}", e))
        })?;

        let (tx, rx) = mpsc::sync_channel::<i32>(SIGNAL_BUFFER);

        thread::Builder::new()
            .name("signal-listener".to_string())
            .spawn(move || {
                for signal in signals.forever() {
                    if forward(&tx, signal) == Forward::Closed {
                        break;
                    }
                }
            })
            .map_err(|e| {
                RunkitError::SignalError(format!("failed to spawn signal listener: {}", e))
            })?;

        let handlers = Arc::clone(&self.handlers);
        thread::Builder::new()
            .name("signal-dispatcher".to_string())
            .spawn(move || {
                for signal in rx {
                    if !dispatch_from(&handlers, signal) {
                        tracing::trace!(signal, "absorbed signal without handler");
                    }
                }
            })
            .map_err(|e| {
                RunkitError::SignalError(format!("failed to spawn signal dispatcher: {}", e))
            })?;

        tracing::debug!(
            signals = listened.len(),
            buffer = SIGNAL_BUFFER,
            "signal dispatcher started"
        );
        Ok(())
    }

    /// Signal delivery is not supported on this platform.
    #[cfg(not(unix))]
    pub fn start(&self) -> Result<()> {
        self.started.store(true, Ordering::SeqCst);
        tracing::debug!("signal dispatch unavailable on this platform");
        Ok(())
    }
}

fn dispatch_from(handlers: &HandlerTable, signal: i32) -> bool {
    // Handlers run with the table unlocked.
    let handler = {
        let table = handlers.lock().unwrap_or_else(|p| p.into_inner());
        table.get(&signal).cloned()
    };

    match handler {
        Some(handler) => {
            tracing::debug!(signal, "dispatching signal");
            handler();
            true
        }
        None => false,
    }
}

impl Default for SignalDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SignalDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .handlers
            .lock()
            .map(|t| t.len())
            .unwrap_or_default();
        f.debug_struct("SignalDispatcher")
            .field("handlers", &count)
            .field("started", &self.is_started())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_dispatch_invokes_registered_handler() {
        let dispatcher = SignalDispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        dispatcher.register_handler(libc::SIGHUP, move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(dispatcher.has_handler(libc::SIGHUP));
        assert!(dispatcher.dispatch(libc::SIGHUP));
        assert!(dispatcher.dispatch(libc::SIGHUP));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dispatch_without_handler_is_absorbed() {
        let dispatcher = SignalDispatcher::new();
        assert!(!dispatcher.has_handler(libc::SIGUSR2));
        assert!(!dispatcher.dispatch(libc::SIGUSR2));
    }

    #[test]
    fn test_register_replaces_previous_handler() {
        let dispatcher = SignalDispatcher::new();
        let (tx, rx) = mpsc::channel();
        let first = tx.clone();
        dispatcher.register_handler(libc::SIGHUP, move || first.send("first").unwrap());
        dispatcher.register_handler(libc::SIGHUP, move || tx.send("second").unwrap());

        dispatcher.dispatch(libc::SIGHUP);
        assert_eq!(rx.try_recv().unwrap(), "second");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_handler_can_register_another_handler() {
        let dispatcher = Arc::new(SignalDispatcher::new());
        let inner = Arc::clone(&dispatcher);
        dispatcher.register_handler(libc::SIGHUP, move || {
            inner.register_handler(libc::SIGUSR2, || {});
        });

        dispatcher.dispatch(libc::SIGHUP);
        assert!(dispatcher.has_handler(libc::SIGUSR2));
    }

    #[test]
    fn test_deliverable_signals_exclude_uncatchable() {
        assert!(!DELIVERABLE_SIGNALS.contains(&libc::SIGKILL));
        assert!(!DELIVERABLE_SIGNALS.contains(&libc::SIGSTOP));
        assert!(!DELIVERABLE_SIGNALS.contains(&libc::SIGSEGV));
        assert!(DELIVERABLE_SIGNALS.contains(&libc::SIGINT));
        assert!(DELIVERABLE_SIGNALS.contains(&libc::SIGTERM));
    }

    #[test]
    #[serial]
    fn test_started_dispatcher_routes_raised_signal() {
        let dispatcher = SignalDispatcher::new();
        let (tx, rx) = mpsc::channel();
        dispatcher.register_handler(libc::SIGUSR1, move || {
            let _ = tx.send(libc::SIGUSR1);
        });

        dispatcher.start().unwrap();
        assert!(dispatcher.is_started());

        signal_hook::low_level::raise(libc::SIGUSR1).unwrap();

        let received = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(received, libc::SIGUSR1);
    }

    #[test]
    fn test_forward_drops_when_buffer_is_full() {
        let (tx, rx) = mpsc::sync_channel(SIGNAL_BUFFER);
        let sent: Vec<i32> = (0..SIGNAL_BUFFER as i32).map(|i| 1 + i % 30).collect();

        for &signal in &sent {
            assert_eq!(forward(&tx, signal), Forward::Queued);
        }
        // Returns at once instead of blocking the listener.
        assert_eq!(forward(&tx, libc::SIGTERM), Forward::Dropped);

        let received: Vec<i32> = rx.try_iter().collect();
        assert_eq!(received, sent);

        // Space frees up once the dispatcher catches up.
        assert_eq!(forward(&tx, libc::SIGTERM), Forward::Queued);
        assert_eq!(rx.try_recv().unwrap(), libc::SIGTERM);
    }

    #[test]
    fn test_forward_reports_closed_dispatcher() {
        let (tx, rx) = mpsc::sync_channel(SIGNAL_BUFFER);
        drop(rx);
        assert_eq!(forward(&tx, libc::SIGINT), Forward::Closed);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_deliverable_signals_include_realtime_range() {
        let signals = deliverable_signals();
        assert!(signals.contains(&libc::SIGRTMIN()));
        assert!(signals.contains(&libc::SIGRTMAX()));
        assert!(signals.contains(&libc::SIGTERM));
        assert!(!signals.contains(&libc::SIGKILL));
    }

    #[cfg(target_os = "linux")]
    #[test]
    #[serial]
    fn test_started_dispatcher_absorbs_realtime_signal() {
        let dispatcher = SignalDispatcher::new();
        let (tx, rx) = mpsc::channel();
        let signal = libc::SIGRTMIN() + 1;
        dispatcher.register_handler(signal, move || {
            let _ = tx.send(signal);
        });
        dispatcher.start().unwrap();

        // Default action would terminate the test process.
        signal_hook::low_level::raise(signal).unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), signal);
    }

    #[test]
    #[serial]
    fn test_start_is_idempotent() {
        let dispatcher = SignalDispatcher::new();
        dispatcher.start().unwrap();
        dispatcher.start().unwrap();
        assert!(dispatcher.is_started());
    }
}
