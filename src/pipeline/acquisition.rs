//! Acquisition worker — records windows and feeds the queue.
//!
//! ```text
//! while running:
//!     t0 = now
//!     capture(window) ── Ok  ─▶ SampleWindow(t0) ─▶ queue.enqueue
//!                     └─ Err ─▶ warn, skip cycle
//!     pause(delay)
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::audio::{AudioSource, SampleWindow};

use super::lifecycle::Lifecycle;
use super::queue::WindowQueue;

/// Counters returned when the worker exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionReport {
    /// Windows enqueued.
    pub captured: u64,
    /// Capture calls that failed.
    pub failed: u64,
    /// Older windows evicted from the queue to make room.
    pub evicted: u64,
}

/// Owns the audio source for the lifetime of the pipeline.
pub struct AcquisitionWorker {
    source: Box<dyn AudioSource>,
    queue: Arc<WindowQueue>,
    lifecycle: Lifecycle,
    window: Duration,
    delay: Duration,
}

impl AcquisitionWorker {
    pub fn new(
        source: Box<dyn AudioSource>,
        queue: Arc<WindowQueue>,
        lifecycle: Lifecycle,
        window: Duration,
        delay: Duration,
    ) -> Self {
        Self {
            source,
            queue,
            lifecycle,
            window,
            delay,
        }
    }

    /// Run until the lifecycle stops.  A capture already in progress when
    /// the stop arrives completes and is still enqueued.
    pub fn run(mut self) -> AcquisitionReport {
        let mut report = AcquisitionReport::default();
        log::info!("acquisition: started ({:?} windows)", self.window);

        while self.lifecycle.is_running() {
            let captured_at = Utc::now();

            match self.source.capture(self.window) {
                Ok(raw) => {
                    let window = SampleWindow::new(captured_at, raw.sample_rate, raw.samples);
                    log::debug!(
                        "acquisition: window {} ({} samples)",
                        captured_at.format("%Y-%m-%d %H:%M:%S"),
                        window.len()
                    );
                    if let Some(old) = self.queue.enqueue(window) {
                        report.evicted += 1;
                        log::warn!(
                            "acquisition: queue full, dropped window from {}",
                            old.captured_at().format("%H:%M:%S")
                        );
                    }
                    report.captured += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    log::warn!("acquisition: capture failed, skipping window: {e}");
                }
            }

            if !self.lifecycle.pause(self.delay) {
                break;
            }
        }

        log::info!(
            "acquisition: stopped ({} captured, {} failed)",
            report.captured,
            report.failed
        );
        report
    }
}
