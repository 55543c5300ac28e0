//! Shared running/stopped signal observed by both workers.
//!
//! The flag itself is an [`AtomicBool`], read at the top of every worker
//! iteration.  [`Lifecycle::pause`] replaces plain `thread::sleep` between
//! iterations: it sleeps on a condition variable that [`Lifecycle::stop`]
//! signals, so a stop request cuts every pause short instead of waiting the
//! delay out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

struct Shared {
    running: AtomicBool,
    started: AtomicBool,
    gate: Mutex<()>,
    wake: Condvar,
}

/// Cloneable handle to the pipeline's running flag.
#[derive(Clone)]
pub struct Lifecycle {
    shared: Arc<Shared>,
}

impl Lifecycle {
    /// A controller in the stopped state.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                started: AtomicBool::new(false),
                gate: Mutex::new(()),
                wake: Condvar::new(),
            }),
        }
    }

    /// Set the pipeline running.
    ///
    /// Succeeds exactly once per controller; returns `false` if it was
    /// already started (a stopped controller cannot be restarted).
    pub fn start(&self) -> bool {
        if self.shared.started.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.shared.running.store(true, Ordering::SeqCst);
        true
    }

    /// Clear the running flag and wake every pausing worker.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        // Taking the gate orders this notify after any concurrent pause()
        // has checked the flag and gone to sleep.
        let _gate = self
            .shared
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.shared.wake.notify_all();
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Whether [`start`](Self::start) has ever succeeded, stopped or not.
    pub fn is_started(&self) -> bool {
        self.shared.started.load(Ordering::SeqCst)
    }

    /// Sleep for up to `duration`, returning early if the pipeline stops.
    ///
    /// Returns whether the pipeline is still running afterwards.
    pub fn pause(&self, duration: Duration) -> bool {
        let gate = self
            .shared
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let _ = self
            .shared
            .wake
            .wait_timeout_while(gate, duration, |_| {
                self.shared.running.load(Ordering::SeqCst)
            })
            .unwrap_or_else(PoisonError::into_inner);
        self.is_running()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
