//! FIFO hand-off between the acquisition worker and the classification stage.
//!
//! Enqueue never blocks.  When a capacity is set and the queue is full, the
//! **oldest** window is evicted to make room and handed back to the caller,
//! so under sustained overload the classifier always works on the freshest
//! audio and memory stays bounded.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use chrono::Utc;
//! use soundscape_monitor::audio::SampleWindow;
//! use soundscape_monitor::pipeline::WindowQueue;
//!
//! let queue = WindowQueue::bounded(2);
//! for rate in [1, 2, 3] {
//!     queue.enqueue(SampleWindow::new(Utc::now(), rate, vec![]));
//! }
//! // Window #1 was evicted.
//! assert_eq!(queue.evicted(), 1);
//! assert_eq!(queue.dequeue(Duration::ZERO).unwrap().sample_rate(), 2);
//! ```

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::audio::SampleWindow;

// ---------------------------------------------------------------------------
// WindowQueue
// ---------------------------------------------------------------------------

/// Thread-safe FIFO of [`SampleWindow`]s with an optional drop-oldest bound.
///
/// Shared between the two workers as `Arc<WindowQueue>`; every operation
/// holds the internal lock for its whole duration.
pub struct WindowQueue {
    inner: Mutex<Inner>,
    available: Condvar,
    /// `None` means unbounded.
    capacity: Option<usize>,
}

struct Inner {
    windows: VecDeque<SampleWindow>,
    /// Total drop-oldest evictions since creation.
    evicted: u64,
}

impl WindowQueue {
    /// A queue that grows without limit.
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// A queue holding at most `capacity` windows.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn bounded(capacity: usize) -> Self {
        assert!(capacity > 0, "WindowQueue capacity must be > 0");
        Self::with_capacity(Some(capacity))
    }

    /// Build from a config value where `0` disables the bound.
    pub fn from_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            Self::unbounded()
        } else {
            Self::bounded(capacity)
        }
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                windows: VecDeque::new(),
                evicted: 0,
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The critical sections never panic mid-mutation, so a poisoned
        // lock still guards a consistent deque.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `window` at the back.
    ///
    /// Returns the evicted oldest window when the queue was full.
    pub fn enqueue(&self, window: SampleWindow) -> Option<SampleWindow> {
        let evicted = {
            let mut inner = self.lock();
            let evicted = match self.capacity {
                Some(cap) if inner.windows.len() >= cap => {
                    inner.evicted += 1;
                    inner.windows.pop_front()
                }
                _ => None,
            };
            inner.windows.push_back(window);
            evicted
        };
        self.available.notify_one();
        evicted
    }

    /// Remove the oldest window, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `None` when the queue is still empty at the deadline.  Never
    /// waits past `timeout`, spurious wake-ups included.
    pub fn dequeue(&self, timeout: Duration) -> Option<SampleWindow> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();

        loop {
            if let Some(window) = inner.windows.pop_front() {
                return Some(window);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            inner = self
                .available
                .wait_timeout(inner, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Remove the oldest window without waiting.
    pub fn try_dequeue(&self) -> Option<SampleWindow> {
        self.lock().windows.pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().windows.is_empty()
    }

    /// Maximum number of windows held, `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Number of windows evicted by the drop-oldest policy.
    pub fn evicted(&self) -> u64 {
        self.lock().evicted
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
