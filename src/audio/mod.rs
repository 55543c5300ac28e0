//! Audio side of the pipeline — capture, window type, conversion, metrics.
//!
//! # Flow
//!
//! ```text
//! Microphone → cpal callback → interleaved f32 (mpsc) → downmix
//!           → RawCapture → SampleWindow → WindowQueue
//!                                        → peak_to_peak / rms / spectrogram
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use soundscape_monitor::audio::{peak_to_peak, AudioSource, CpalRecorder};
//!
//! let mut recorder = CpalRecorder::new(None, Duration::from_secs(5));
//! let raw = recorder.capture(Duration::from_secs(2)).unwrap();
//! println!("ptp = {}", peak_to_peak(&raw.samples));
//! ```

pub mod capture;
pub mod features;
pub mod resample;
pub mod window;

pub use capture::{AudioSource, CaptureError, CpalRecorder, RawCapture};
pub use features::{peak_to_peak, rms_envelope, Spectrogram, SpectrogramBuilder};
pub use resample::{downmix, resample};
pub use window::SampleWindow;
