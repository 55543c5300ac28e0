//! Classification & metrics stage — turns queued windows into published
//! telemetry records.
//!
//! # Per-window flow
//!
//! ```text
//! queue.dequeue(timeout) ── None ─▶ next iteration
//!   └─▶ classifier.classify(samples, labels)
//!         ├─ Err ─▶ warn, no record for this window
//!         └─ Ok  ─▶ ptp (+ rms / spectrogram when enabled)
//!                   ─▶ thermometer.read_temperature()
//!                   ─▶ RecordBuilder::build (top-K)
//!                   ─▶ sink.publish ── Err ─▶ warn, record dropped
//! ```
//!
//! A failed classification returns before any record field is built, so a
//! record never leaves this stage half-filled.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::audio::{peak_to_peak, rms_envelope, SampleWindow, SpectrogramBuilder};
use crate::classify::Classifier;
use crate::config::FeatureConfig;
use crate::publish::{Delivery, PublishSink};
use crate::telemetry::{RecordBuilder, Thermometer};

use super::lifecycle::Lifecycle;
use super::queue::WindowQueue;

/// Counters returned when the stage exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageReport {
    /// Records handed to the broker.
    pub published: u64,
    /// Windows skipped because classification failed.
    pub classify_failed: u64,
    /// Records dropped because delivery failed.
    pub publish_failed: u64,
}

/// What happened to one dequeued window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOutcome {
    Published(Delivery),
    ClassificationFailed,
    PublishFailed,
}

/// Timing knobs for the stage loop.
#[derive(Debug, Clone, Copy)]
pub struct StageTiming {
    pub dequeue_timeout: Duration,
    pub delay: Duration,
}

/// Owns the classifier, thermometer and publish sink while the pipeline runs.
pub struct ClassificationStage {
    classifier: Box<dyn Classifier>,
    thermometer: Box<dyn Thermometer>,
    sink: PublishSink,
    labels: Vec<String>,
    builder: RecordBuilder,
    features: FeatureConfig,
    spectrogram: Option<SpectrogramBuilder>,
    queue: Arc<WindowQueue>,
    lifecycle: Lifecycle,
    timing: StageTiming,
}

impl ClassificationStage {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        classifier: Box<dyn Classifier>,
        thermometer: Box<dyn Thermometer>,
        sink: PublishSink,
        labels: Vec<String>,
        builder: RecordBuilder,
        features: FeatureConfig,
        queue: Arc<WindowQueue>,
        lifecycle: Lifecycle,
        timing: StageTiming,
    ) -> Self {
        let spectrogram = features
            .spectrogram
            .then(|| SpectrogramBuilder::new(features.n_fft, features.hop_length));

        Self {
            classifier,
            thermometer,
            sink,
            labels,
            builder,
            features,
            spectrogram,
            queue,
            lifecycle,
            timing,
        }
    }

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------

    /// Run until the lifecycle stops, then hand the sink back so the
    /// supervisor can close the broker session.
    pub fn run(mut self) -> (StageReport, PublishSink) {
        let mut report = StageReport::default();
        log::info!(
            "classification: started ({} candidate labels, top {})",
            self.labels.len(),
            self.builder.top_k()
        );

        while self.lifecycle.is_running() {
            let Some(window) = self.queue.dequeue(self.timing.dequeue_timeout) else {
                log::trace!("classification: queue empty, waiting for audio");
                continue;
            };

            match self.process(window) {
                WindowOutcome::Published(_) => report.published += 1,
                WindowOutcome::ClassificationFailed => report.classify_failed += 1,
                WindowOutcome::PublishFailed => report.publish_failed += 1,
            }

            if !self.lifecycle.pause(self.timing.delay) {
                break;
            }
        }

        log::info!(
            "classification: stopped ({} published, {} classification failures, {} dropped)",
            report.published,
            report.classify_failed,
            report.publish_failed
        );
        (report, self.sink)
    }

    // -----------------------------------------------------------------------
    // Per-window processing
    // -----------------------------------------------------------------------

    /// Classify, measure, build and publish one window.  The window and
    /// every buffer derived from it are dropped before this returns.
    pub fn process(&mut self, window: SampleWindow) -> WindowOutcome {
        log::debug!(
            "classification: processing window from {}",
            window.captured_at().format("%Y-%m-%d %H:%M:%S")
        );

        let scores = match self.classifier.classify(
            window.samples(),
            window.sample_rate(),
            &self.labels,
        ) {
            Ok(scores) => scores,
            Err(e) => {
                log::warn!("classification: window skipped, classifier failed: {e}");
                return WindowOutcome::ClassificationFailed;
            }
        };

        let ptp = peak_to_peak(window.samples());
        self.extra_features(&window);
        let rpi_temp = self.thermometer.read_temperature();

        let record = match self
            .builder
            .build(&window, scores, rpi_temp, ptp, Utc::now())
        {
            Ok(record) => record,
            Err(e) => {
                log::warn!("classification: window skipped: {e}");
                return WindowOutcome::ClassificationFailed;
            }
        };
        drop(window);

        if log::log_enabled!(log::Level::Info) {
            let summary: Vec<String> = record
                .payload
                .labels
                .iter()
                .map(|s| format!("{}: {:.5}", s.label, s.score))
                .collect();
            log::info!("classification: {}", summary.join(" | "));
        }

        match self.sink.publish(&record) {
            Ok(delivery) => {
                log::debug!("publish: record delivered ({delivery:?})");
                WindowOutcome::Published(delivery)
            }
            Err(e) => {
                log::warn!("publish: record dropped: {e}");
                WindowOutcome::PublishFailed
            }
        }
    }

    /// Optional RMS envelope / spectrogram.  Computed for inspection only and
    /// released on return.
    fn extra_features(&self, window: &SampleWindow) {
        if self.features.rms {
            let rms = rms_envelope(
                window.samples(),
                self.features.n_fft,
                self.features.hop_length,
            );
            log::debug!("classification: rms envelope, {} frames", rms.len());
        }
        if let Some(builder) = &self.spectrogram {
            let spec = builder.compute(window.samples());
            log::debug!(
                "classification: spectrogram {} frames × {} bins",
                spec.num_frames(),
                spec.bins
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::LabelScore;
    use crate::pipeline::mock::{
        wait_until, FixedThermometer, LinkTrace, RecordingLink, ScriptedClassifier,
    };
    use serde_json::Value;
    use std::thread;

    fn timing() -> StageTiming {
        StageTiming {
            dequeue_timeout: Duration::from_millis(20),
            delay: Duration::from_millis(1),
        }
    }

    fn stage(
        classifier: ScriptedClassifier,
        link: RecordingLink,
        features: FeatureConfig,
        queue: &Arc<WindowQueue>,
        lc: &Lifecycle,
    ) -> ClassificationStage {
        ClassificationStage::new(
            Box::new(classifier),
            Box::new(FixedThermometer(Some(51.5))),
            PublishSink::new(Box::new(link), "pipeline/test"),
            vec!["traffic".into(), "birds".into()],
            RecordBuilder::new("OE-007", "urbansounds", 5),
            features,
            Arc::clone(queue),
            lc.clone(),
            timing(),
        )
    }

    fn window(tag: f32) -> SampleWindow {
        SampleWindow::new(Utc::now(), 48_000, vec![tag, -tag, 0.0])
    }

    #[test]
    fn process_publishes_record_with_metrics() {
        let trace = LinkTrace::default();
        let queue = Arc::new(WindowQueue::unbounded());
        let mut st = stage(
            ScriptedClassifier::fixed(vec![LabelScore::new("traffic", 0.7)]),
            RecordingLink::connected(trace.clone()),
            FeatureConfig::default(),
            &queue,
            &Lifecycle::new(),
        );

        let outcome = st.process(window(0.25));
        assert_eq!(outcome, WindowOutcome::Published(Delivery::Direct));

        let (topic, payload) = trace.delivered().remove(0);
        assert_eq!(topic, "pipeline/test");
        let json: Value = serde_json::from_str(&payload).unwrap();
        let fields = &json["payload_fields"];
        assert!((fields["traffic"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert!((fields["ptp"].as_f64().unwrap() - 0.5).abs() < 1e-6);
        assert!((fields["RPI_temp"].as_f64().unwrap() - 51.5).abs() < 1e-6);
    }

    #[test]
    fn classifier_failure_emits_nothing() {
        let trace = LinkTrace::default();
        let queue = Arc::new(WindowQueue::unbounded());
        let mut st = stage(
            ScriptedClassifier::echo_tag().failing_at(&[0]),
            RecordingLink::connected(trace.clone()),
            FeatureConfig::default(),
            &queue,
            &Lifecycle::new(),
        );

        assert_eq!(st.process(window(1.0)), WindowOutcome::ClassificationFailed);
        assert!(trace.delivered().is_empty());
        assert_eq!(trace.connect_attempts(), 0);
    }

    #[test]
    fn empty_scores_emit_nothing() {
        let trace = LinkTrace::default();
        let queue = Arc::new(WindowQueue::unbounded());
        let mut st = stage(
            ScriptedClassifier::fixed(Vec::new()),
            RecordingLink::connected(trace.clone()),
            FeatureConfig::default(),
            &queue,
            &Lifecycle::new(),
        );

        assert_eq!(st.process(window(1.0)), WindowOutcome::ClassificationFailed);
        assert!(trace.delivered().is_empty());
    }

    #[test]
    fn publish_failure_is_reported_not_fatal() {
        let trace = LinkTrace::default();
        let mut link = RecordingLink::disconnected(trace.clone());
        link.refuse_connects(usize::MAX);
        let queue = Arc::new(WindowQueue::unbounded());
        let mut st = stage(
            ScriptedClassifier::echo_tag(),
            link,
            FeatureConfig::default(),
            &queue,
            &Lifecycle::new(),
        );

        assert_eq!(st.process(window(1.0)), WindowOutcome::PublishFailed);
        assert_eq!(st.process(window(2.0)), WindowOutcome::PublishFailed);
        assert_eq!(trace.connect_attempts(), 2);
    }

    #[test]
    fn optional_features_do_not_change_payload() {
        let trace = LinkTrace::default();
        let queue = Arc::new(WindowQueue::unbounded());
        let features = FeatureConfig {
            rms: true,
            spectrogram: true,
            n_fft: 64,
            hop_length: 32,
        };
        let mut st = stage(
            ScriptedClassifier::fixed(vec![LabelScore::new("wind", 0.4)]),
            RecordingLink::connected(trace.clone()),
            features,
            &queue,
            &Lifecycle::new(),
        );

        st.process(SampleWindow::new(Utc::now(), 8_000, vec![0.1; 1_000]));
        let json: Value = serde_json::from_str(&trace.delivered()[0].1).unwrap();
        let fields = json["payload_fields"].as_object().unwrap();
        let mut keys: Vec<&str> = fields.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["RPI_temp", "ptp", "start_recording", "wind"]);
    }

    #[test]
    fn run_processes_queue_until_stopped() {
        let trace = LinkTrace::default();
        let queue = Arc::new(WindowQueue::unbounded());
        let lc = Lifecycle::new();
        lc.start();

        for tag in 0..4 {
            queue.enqueue(window(tag as f32));
        }

        let st = stage(
            ScriptedClassifier::echo_tag().failing_at(&[1]),
            RecordingLink::connected(trace.clone()),
            FeatureConfig::default(),
            &queue,
            &lc,
        );
        let handle = thread::spawn(move || st.run());

        assert!(wait_until(Duration::from_secs(5), || trace.delivered().len() == 3));
        lc.stop();
        let (report, sink) = handle.join().unwrap();

        assert_eq!(report.published, 3);
        assert_eq!(report.classify_failed, 1);
        assert_eq!(sink.topic(), "pipeline/test");
        assert!(queue.is_empty());
    }
}
