//! Urban soundscape monitor.
//!
//! Records fixed-length audio windows, scores them against a set of
//! candidate sound labels with a zero-shot classifier, and publishes one
//! JSON telemetry record per window to an MQTT broker.

pub mod audio;
pub mod classify;
pub mod config;
pub mod pipeline;
pub mod publish;
pub mod telemetry;
