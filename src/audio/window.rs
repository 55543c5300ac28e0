//! The unit of work handed from the acquisition worker to the classifier.

use std::time::Duration;

use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// SampleWindow
// ---------------------------------------------------------------------------

/// A fixed-duration chunk of mono audio together with the instant the
/// capture started.
///
/// Fields are private: once built, a window is only read.  It moves into the
/// [`WindowQueue`](crate::pipeline::WindowQueue) on enqueue and out to the
/// classification stage on dequeue, so it is never shared between threads.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleWindow {
    captured_at: DateTime<Utc>,
    sample_rate: u32,
    samples: Vec<f32>,
}

impl SampleWindow {
    pub fn new(captured_at: DateTime<Utc>, sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            captured_at,
            sample_rate,
            samples,
        }
    }

    /// Instant the capture call started.
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Mono samples in `[-1.0, 1.0]`.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Audio length implied by the sample count and rate (zero for a 0 Hz
    /// window).
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}
