//! Core `Classifier` trait, score types and ranking helpers.
//!
//! The zero-shot model is opaque to the pipeline: it receives mono samples
//! and a list of candidate labels and returns one score per label.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// LabelScore
// ---------------------------------------------------------------------------

/// One candidate label with its model score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

// ---------------------------------------------------------------------------
// ClassificationError
// ---------------------------------------------------------------------------

/// Errors that can occur while scoring a window.
#[derive(Debug, Error)]
pub enum ClassificationError {
    /// The scorer could not be initialised.
    #[error("classifier warm-up failed: {0}")]
    WarmUp(String),

    /// HTTP transport or connection error.
    #[error("classifier request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("classifier request timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("classifier returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response could not be parsed as a score list.
    #[error("failed to parse classifier response: {0}")]
    Parse(String),

    /// The scorer returned no labels.
    #[error("classifier returned no scores")]
    EmptyResult,

    /// Any other failure inside the model.
    #[error("inference failed: {0}")]
    Inference(String),
}

impl From<reqwest::Error> for ClassificationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClassificationError::Timeout
        } else if e.is_decode() {
            ClassificationError::Parse(e.to_string())
        } else {
            ClassificationError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Classifier trait
// ---------------------------------------------------------------------------

/// Zero-shot audio scorer.
///
/// A classifier is owned by the classification stage alone, so methods take
/// `&mut self` and only `Send` is required.
///
/// # Contract
///
/// - [`warm_up`](Self::warm_up) is called once by the supervisor before the
///   first window, keeping model loading out of the per-window path.
/// - [`classify`](Self::classify) returns one entry per candidate label,
///   ideally ranked descending; callers re-rank with [`rank`] regardless.
pub trait Classifier: Send {
    fn warm_up(&mut self) -> Result<(), ClassificationError> {
        Ok(())
    }

    fn classify(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
        candidate_labels: &[String],
    ) -> Result<Vec<LabelScore>, ClassificationError>;
}

// Compile-time assertion: Box<dyn Classifier> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Classifier>) {}
};

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Sort `scores` descending by score.
///
/// The sort is stable, so equal scores keep the scorer's order, and uses
/// `total_cmp` so a NaN score cannot poison the ordering (NaN sorts last).
///
/// ```rust
/// use soundscape_monitor::classify::{rank, LabelScore};
///
/// let ranked = rank(vec![
///     LabelScore::new("wind", 0.1),
///     LabelScore::new("traffic", 0.7),
///     LabelScore::new("birds", 0.2),
/// ]);
/// assert_eq!(ranked[0].label, "traffic");
/// assert_eq!(ranked[2].label, "wind");
/// ```
pub fn rank(mut scores: Vec<LabelScore>) -> Vec<LabelScore> {
    scores.sort_by(|a, b| match (a.score.is_nan(), b.score.is_nan()) {
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        _ => b.score.total_cmp(&a.score),
    });
    scores
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
