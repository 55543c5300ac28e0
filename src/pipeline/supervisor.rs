//! Process supervisor — wires collaborators into the two workers and owns
//! startup and shutdown ordering.
//!
//! # Startup
//!
//! ```text
//! already started?      ── yes ─▶ PipelineError::AlreadyStarted
//! classifier.warm_up()  ── Err ─▶ PipelineError::WarmUp (fatal)
//! sink.open()           ── Err ─▶ warn, start Disconnected
//! lifecycle.start()     ── false ─▶ PipelineError::AlreadyStarted (lost race)
//! spawn "acquisition", spawn "classification"
//! ```
//!
//! # Shutdown
//!
//! ```text
//! lifecycle.stop() ─▶ join acquisition ─▶ join classification ─▶ sink.close()
//! ```
//!
//! Shutdown is cooperative: each worker finishes the step it is in (a
//! capture or a classification) and exits at its next lifecycle check.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;

use crate::audio::AudioSource;
use crate::classify::{ClassificationError, Classifier};
use crate::config::{AppConfig, FeatureConfig};
use crate::publish::{BrokerLink, PublishSink};
use crate::telemetry::{RecordBuilder, Thermometer};

use super::acquisition::{AcquisitionReport, AcquisitionWorker};
use super::lifecycle::Lifecycle;
use super::queue::WindowQueue;
use super::stage::{ClassificationStage, StageReport, StageTiming};

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Startup failures.  Nothing after startup is fatal.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("classifier warm-up failed: {0}")]
    WarmUp(#[source] ClassificationError),

    #[error("pipeline was already started")]
    AlreadyStarted,

    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Settings / collaborators
// ---------------------------------------------------------------------------

/// Everything the workers need besides their collaborators.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub window: Duration,
    pub inter_iteration_delay: Duration,
    pub dequeue_timeout: Duration,
    /// `0` means unbounded.
    pub queue_capacity: usize,
    pub top_k: usize,
    pub device_id: String,
    pub app_id: String,
    pub topic: String,
    pub labels: Vec<String>,
    pub features: FeatureConfig,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig, labels: Vec<String>) -> Self {
        Self {
            window: config.audio.window(),
            inter_iteration_delay: config.pipeline.inter_iteration_delay(),
            dequeue_timeout: config.pipeline.dequeue_timeout(),
            queue_capacity: config.pipeline.queue_capacity,
            top_k: config.pipeline.top_k,
            device_id: config.device.device_id.clone(),
            app_id: config.device.app_id.clone(),
            topic: config.broker.topic.clone(),
            labels,
            features: config.features.clone(),
        }
    }
}

/// The external collaborators, each handed to exactly one worker.
pub struct Collaborators {
    pub source: Box<dyn AudioSource>,
    pub classifier: Box<dyn Classifier>,
    pub thermometer: Box<dyn Thermometer>,
    pub link: Box<dyn BrokerLink>,
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

pub struct Supervisor {
    settings: PipelineSettings,
    lifecycle: Lifecycle,
}

impl Supervisor {
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            settings,
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Warm up, connect and launch both workers.
    ///
    /// # Errors
    ///
    /// See [`PipelineError`].  On error no worker is left running.
    pub fn start(&self, collaborators: Collaborators) -> Result<RunningPipeline, PipelineError> {
        let Collaborators {
            source,
            mut classifier,
            thermometer,
            link,
        } = collaborators;
        let settings = &self.settings;

        if self.lifecycle.is_started() {
            return Err(PipelineError::AlreadyStarted);
        }

        log::info!("pipeline: warming up classifier");
        classifier.warm_up().map_err(PipelineError::WarmUp)?;

        let mut sink = PublishSink::new(link, settings.topic.clone());
        if let Err(e) = sink.open() {
            log::warn!("publish: initial connection failed ({e}); will retry on first record");
        }

        if !self.lifecycle.start() {
            if let Err(e) = sink.close() {
                log::debug!("publish: close after rejected start failed: {e}");
            }
            return Err(PipelineError::AlreadyStarted);
        }

        let queue = Arc::new(WindowQueue::from_capacity(settings.queue_capacity));

        let acquisition = AcquisitionWorker::new(
            source,
            Arc::clone(&queue),
            self.lifecycle.clone(),
            settings.window,
            settings.inter_iteration_delay,
        );
        let stage = ClassificationStage::new(
            classifier,
            thermometer,
            sink,
            settings.labels.clone(),
            RecordBuilder::new(&settings.device_id, &settings.app_id, settings.top_k),
            settings.features.clone(),
            Arc::clone(&queue),
            self.lifecycle.clone(),
            StageTiming {
                dequeue_timeout: settings.dequeue_timeout,
                delay: settings.inter_iteration_delay,
            },
        );

        let acquisition = spawn_named("acquisition", move || acquisition.run())
            .inspect_err(|_| self.lifecycle.stop())?;

        let classification = match spawn_named("classification", move || stage.run()) {
            Ok(handle) => handle,
            Err(e) => {
                self.lifecycle.stop();
                let _ = acquisition.join();
                return Err(e);
            }
        };

        log::info!(
            "pipeline: running (window {:?}, queue capacity {}, topic {})",
            settings.window,
            settings.queue_capacity,
            settings.topic
        );

        Ok(RunningPipeline {
            lifecycle: self.lifecycle.clone(),
            queue,
            acquisition,
            classification,
        })
    }
}

fn spawn_named<T, F>(name: &'static str, f: F) -> Result<JoinHandle<T>, PipelineError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .spawn(f)
        .map_err(|source| PipelineError::Spawn { name, source })
}

// ---------------------------------------------------------------------------
// RunningPipeline
// ---------------------------------------------------------------------------

/// Totals gathered at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub acquisition: AcquisitionReport,
    pub stage: StageReport,
    /// Windows still queued when the workers exited.
    pub unprocessed: usize,
    /// False if a worker panicked.
    pub clean: bool,
}

/// Handle to a started pipeline.
pub struct RunningPipeline {
    lifecycle: Lifecycle,
    queue: Arc<WindowQueue>,
    acquisition: JoinHandle<AcquisitionReport>,
    classification: JoinHandle<(StageReport, PublishSink)>,
}

impl RunningPipeline {
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn queue(&self) -> &Arc<WindowQueue> {
        &self.queue
    }

    /// Stop both workers, wait for them, then close the broker session.
    pub fn shutdown(self) -> ShutdownReport {
        log::info!("pipeline: shutting down");
        self.lifecycle.stop();

        let mut report = ShutdownReport {
            clean: true,
            ..ShutdownReport::default()
        };

        match self.acquisition.join() {
            Ok(acq) => report.acquisition = acq,
            Err(_) => {
                log::error!("pipeline: acquisition worker panicked");
                report.clean = false;
            }
        }

        match self.classification.join() {
            Ok((stage, mut sink)) => {
                report.stage = stage;
                if let Err(e) = sink.close() {
                    log::warn!("publish: disconnect failed: {e}");
                }
            }
            Err(_) => {
                log::error!("pipeline: classification worker panicked");
                report.clean = false;
            }
        }

        report.unprocessed = self.queue.len();
        if report.unprocessed > 0 {
            log::info!(
                "pipeline: {} captured window(s) left unprocessed",
                report.unprocessed
            );
        }
        log::info!("pipeline: stopped");
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
