//! Zero-shot classification of sample windows.
//!
//! This module provides:
//! * [`Classifier`] — trait implemented by every scorer backend.
//! * [`HttpClassifier`] — scorer backed by an HTTP inference service.
//! * [`LabelScore`], [`rank`] — score type and ranking helper.
//! * [`load_labels`] — resolves the candidate label set from config.
//! * [`ClassificationError`] — error variants for scoring.

pub mod http;
pub mod labels;
pub mod scorer;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use http::HttpClassifier;
pub use labels::load_labels;
pub use scorer::{rank, ClassificationError, Classifier, LabelScore};
