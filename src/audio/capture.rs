//! Fixed-duration microphone capture.
//!
//! [`AudioSource`] is the seam between the acquisition worker and the audio
//! hardware: one call records one window and returns mono samples.
//! [`CpalRecorder`] is the production implementation built on `cpal`.  It
//! opens the input stream per call and drops it once enough samples have
//! arrived, so no `cpal::Stream` (which is not `Send` on every platform) is
//! ever held across calls.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::resample::downmix;

// ---------------------------------------------------------------------------
// RawCapture
// ---------------------------------------------------------------------------

/// Mono audio returned by a single [`AudioSource::capture`] call.
#[derive(Debug, Clone)]
pub struct RawCapture {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Mono samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while recording a window.
///
/// Every variant is recoverable from the pipeline's point of view: the
/// acquisition worker logs it and moves on to the next cycle.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("input device {0:?} not found")]
    DeviceNotFound(String),

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    /// The device stopped delivering samples before the window was full.
    #[error("audio stream stalled after {got} of {wanted} samples")]
    Stalled { got: usize, wanted: usize },

    /// The recording produced no samples at all.
    #[error("capture returned no samples")]
    Empty,

    /// Any other device-specific failure.
    #[error("capture failed: {0}")]
    Device(String),
}

// ---------------------------------------------------------------------------
// AudioSource trait
// ---------------------------------------------------------------------------

/// Records fixed-duration windows of mono audio.
///
/// Implementations are owned by exactly one worker thread, so `Send` is the
/// only bound.
pub trait AudioSource: Send {
    /// Block for roughly `duration` and return the captured samples.
    fn capture(&mut self, duration: Duration) -> Result<RawCapture, CaptureError>;
}

// Compile-time assertion: Box<dyn AudioSource> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn AudioSource>) {}
};

// ---------------------------------------------------------------------------
// CpalRecorder
// ---------------------------------------------------------------------------

/// Microphone recorder built on top of `cpal`.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use soundscape_monitor::audio::{AudioSource, CpalRecorder};
///
/// let mut recorder = CpalRecorder::new(None, Duration::from_secs(5));
/// let raw = recorder.capture(Duration::from_secs(10)).unwrap();
/// println!("{} samples @ {} Hz", raw.samples.len(), raw.sample_rate);
/// ```
pub struct CpalRecorder {
    /// Input device name; `None` selects the host default.
    device_name: Option<String>,
    /// How long past the window length to wait for the last samples.
    stall_grace: Duration,
}

impl CpalRecorder {
    pub fn new(device_name: Option<String>, stall_grace: Duration) -> Self {
        Self {
            device_name,
            stall_grace,
        }
    }

    fn open_device(&self) -> Result<cpal::Device, CaptureError> {
        let host = cpal::default_host();
        match &self.device_name {
            None => host.default_input_device().ok_or(CaptureError::NoDevice),
            Some(wanted) => host
                .input_devices()?
                .find(|d| d.name().is_ok_and(|n| n == *wanted))
                .ok_or_else(|| CaptureError::DeviceNotFound(wanted.clone())),
        }
    }
}

impl AudioSource for CpalRecorder {
    fn capture(&mut self, duration: Duration) -> Result<RawCapture, CaptureError> {
        let device = self.open_device()?;
        let supported = device.default_input_config()?;

        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        let frames = (duration.as_secs_f64() * sample_rate as f64).round() as usize;
        let wanted = frames * channels as usize;

        let (tx, rx) = mpsc::channel::<Vec<f32>>();
        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Ignore send errors; the receiver is gone once the window is full.
                let _ = tx.send(data.to_vec());
            },
            |err: cpal::StreamError| {
                log::error!("acquisition: cpal stream error: {err}");
            },
            None,
        )?;
        stream.play()?;

        let deadline = Instant::now() + duration + self.stall_grace;
        let mut interleaved = Vec::with_capacity(wanted);

        while interleaved.len() < wanted {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(chunk) => interleaved.extend_from_slice(&chunk),
                Err(_) => {
                    return Err(CaptureError::Stalled {
                        got: interleaved.len(),
                        wanted,
                    })
                }
            }
        }
        drop(stream);

        interleaved.truncate(wanted);
        let samples = downmix(&interleaved, channels);
        if samples.is_empty() {
            return Err(CaptureError::Empty);
        }

        log::debug!(
            "acquisition: captured {} samples @ {} Hz ({} ch)",
            samples.len(),
            sample_rate,
            channels
        );

        Ok(RawCapture {
            sample_rate,
            samples,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
