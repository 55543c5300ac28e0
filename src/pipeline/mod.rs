//! Two-stage acquisition → classification pipeline.
//!
//! # Architecture
//!
//! ```text
//!  thread "acquisition"                      thread "classification"
//!  ────────────────────                      ───────────────────────
//!  AudioSource::capture ─▶ SampleWindow ─▶ WindowQueue ─▶ Classifier::classify
//!                                    (drop-oldest)        ─▶ ptp / Thermometer
//!                                                         ─▶ RecordBuilder
//!                                                         ─▶ PublishSink ─▶ broker
//!
//!                 Lifecycle (running flag, stop-aware pause)
//!                          ▲ start / stop
//!                      Supervisor
//! ```
//!
//! The queue is the only object both threads touch; every collaborator is
//! owned by exactly one worker.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use soundscape_monitor::audio::CpalRecorder;
//! use soundscape_monitor::classify::{load_labels, HttpClassifier};
//! use soundscape_monitor::config::{AppConfig, AppPaths};
//! use soundscape_monitor::pipeline::{Collaborators, PipelineSettings, Supervisor};
//! use soundscape_monitor::publish::MqttLink;
//! use soundscape_monitor::telemetry::SystemThermometer;
//!
//! # fn main() -> anyhow::Result<()> {
//! let paths = AppPaths::new();
//! let config = AppConfig::load_from(&paths.settings_file)?;
//! config.validate(&paths)?;
//! let labels = load_labels(&config.classifier, &paths)?;
//!
//! let supervisor = Supervisor::new(PipelineSettings::from_config(&config, labels));
//! let running = supervisor.start(Collaborators {
//!     source: Box::new(CpalRecorder::new(None, Duration::from_secs(5))),
//!     classifier: Box::new(HttpClassifier::from_config(&config.classifier)?),
//!     thermometer: Box::new(SystemThermometer::new()),
//!     link: Box::new(MqttLink::from_config(&config.broker)),
//! })?;
//!
//! std::thread::sleep(Duration::from_secs(60));
//! let report = running.shutdown();
//! println!("published {}", report.stage.published);
//! # Ok(())
//! # }
//! ```

pub mod acquisition;
pub mod lifecycle;
pub mod queue;
pub mod stage;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod mock;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use acquisition::{AcquisitionReport, AcquisitionWorker};
pub use lifecycle::Lifecycle;
pub use queue::WindowQueue;
pub use stage::{ClassificationStage, StageReport, StageTiming, WindowOutcome};
pub use supervisor::{
    Collaborators, PipelineError, PipelineSettings, RunningPipeline, ShutdownReport, Supervisor,
};
