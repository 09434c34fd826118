//! Ordered, run-once exit handlers.
//!
//! Handlers are appended during normal operation and drained exactly once
//! when the process terminates. They run in registration order (FIFO): a
//! handler registered right after acquiring a resource runs before any
//! handler registered later by application code.

use std::sync::{Mutex, Once};

type ExitHandler = Box<dyn FnOnce() + Send + 'static>;

/// An append-only list of cleanup callbacks, invoked at most once.
pub struct ExitHandlerChain {
    // `None` once drained.
    handlers: Mutex<Option<Vec<ExitHandler>>>,
    ran: Once,
}

impl ExitHandlerChain {
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(Some(Vec::new())),
            ran: Once::new(),
        }
    }

    /// Append a handler.
    ///
    /// Returns `false` once the chain has been drained; the handler is
    /// dropped without running and the caller owns the cleanup.
    pub fn register<F>(&self, handler: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut handlers = self.handlers.lock().unwrap_or_else(|p| p.into_inner());
        match handlers.as_mut() {
            Some(pending) => {
                pending.push(Box::new(handler));
                true
            }
            None => false,
        }
    }

    /// Number of handlers waiting to run.
    pub fn len(&self) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the chain has already been drained.
    pub fn has_run(&self) -> bool {
        self.ran.is_completed()
    }

    /// Invoke every registered handler once, in registration order.
    ///
    /// Concurrent callers block until the single run has finished; every
    /// call after that is a no-op. The handler list is taken out of the
    /// mutex before any handler runs, so a handler may itself call
    /// `register` without deadlocking.
    pub fn run_all(&self) {
        self.ran.call_once(|| {
            let handlers = {
                let mut guard = self.handlers.lock().unwrap_or_else(|p| p.into_inner());
                guard.take().unwrap_or_default()
            };
            tracing::debug!(count = handlers.len(), "running exit handlers");
            for handler in handlers {
                handler();
            }
        });
    }
}

impl Default for ExitHandlerChain {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExitHandlerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExitHandlerChain")
            .field("pending", &self.len())
            .field("ran", &self.has_run())
            .finish()
    }
}
