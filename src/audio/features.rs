//! Signal metrics derived from a sample window.
//!
//! Only [`peak_to_peak`] is published.  The RMS envelope and the magnitude
//! spectrogram are computed on demand (see
//! [`FeatureConfig`](crate::config::FeatureConfig)) for later analysis.
//!
//! Frames are taken at offsets `0, hop, 2·hop, …` without centre padding; the
//! last frame is zero-padded when the window is shorter than one frame.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Difference between the largest and smallest sample (`0.0` for an empty
/// window).
///
/// ```rust
/// use soundscape_monitor::audio::peak_to_peak;
///
/// assert_eq!(peak_to_peak(&[0.25, -0.5, 0.1]), 0.75);
/// assert_eq!(peak_to_peak(&[]), 0.0);
/// ```
pub fn peak_to_peak(samples: &[f32]) -> f32 {
    let mut iter = samples.iter().copied();
    let Some(first) = iter.next() else {
        return 0.0;
    };
    let (min, max) = iter.fold((first, first), |(lo, hi), s| (lo.min(s), hi.max(s)));
    max - min
}

fn frame_count(len: usize, frame_len: usize, hop: usize) -> usize {
    if len == 0 || frame_len == 0 || hop == 0 {
        return 0;
    }
    1 + len.saturating_sub(frame_len) / hop
}

/// Root-mean-square energy of each `frame_len`-sample frame, `hop` apart.
pub fn rms_envelope(samples: &[f32], frame_len: usize, hop: usize) -> Vec<f32> {
    (0..frame_count(samples.len(), frame_len, hop))
        .map(|i| {
            let start = i * hop;
            let end = (start + frame_len).min(samples.len());
            let sum_sq: f32 = samples[start..end].iter().map(|s| s * s).sum();
            // Zero padding counts towards the frame length.
            (sum_sq / frame_len as f32).sqrt()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Spectrogram
// ---------------------------------------------------------------------------

/// Short-time Fourier transform magnitudes, one row per frame.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    /// `frames[t][k]` is the magnitude of bin `k` in frame `t`.
    pub frames: Vec<Vec<f32>>,
    /// Bins per frame (`n_fft / 2 + 1`).
    pub bins: usize,
}

impl Spectrogram {
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }
}

/// Reusable STFT planner; a Hann window is applied to every frame.
pub struct SpectrogramBuilder {
    n_fft: usize,
    hop: usize,
    fft: Arc<dyn Fft<f32>>,
    hann: Vec<f32>,
}

impl SpectrogramBuilder {
    /// # Panics
    ///
    /// Panics if `n_fft` or `hop` is zero.
    pub fn new(n_fft: usize, hop: usize) -> Self {
        assert!(n_fft > 0 && hop > 0, "n_fft and hop must be non-zero");

        let fft = FftPlanner::new().plan_fft_forward(n_fft);
        let hann = (0..n_fft)
            .map(|i| {
                if n_fft == 1 {
                    1.0
                } else {
                    0.5 * (1.0
                        - (2.0 * std::f32::consts::PI * i as f32 / (n_fft - 1) as f32).cos())
                }
            })
            .collect();

        Self {
            n_fft,
            hop,
            fft,
            hann,
        }
    }

    pub fn compute(&self, samples: &[f32]) -> Spectrogram {
        let bins = self.n_fft / 2 + 1;
        let mut buffer = vec![Complex::new(0.0_f32, 0.0); self.n_fft];

        let frames = (0..frame_count(samples.len(), self.n_fft, self.hop))
            .map(|i| {
                let start = i * self.hop;
                for (k, slot) in buffer.iter_mut().enumerate() {
                    let s = samples.get(start + k).copied().unwrap_or(0.0);
                    *slot = Complex::new(s * self.hann[k], 0.0);
                }
                self.fft.process(&mut buffer);
                buffer[..bins].iter().map(|c| c.norm()).collect()
            })
            .collect();

        Spectrogram { frames, bins }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
