//! Scripted collaborators shared by the pipeline, stage and sink tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::audio::{AudioSource, CaptureError, RawCapture};
use crate::classify::{ClassificationError, Classifier, LabelScore};
use crate::publish::{BrokerLink, PublishError};
use crate::telemetry::Thermometer;

use super::lifecycle::Lifecycle;

/// Poll `cond` every few milliseconds until it holds or `timeout` elapses.
pub(crate) fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

// ---------------------------------------------------------------------------
// ScriptedSource
// ---------------------------------------------------------------------------

/// Audio source replaying a fixed script of captures.
///
/// Call `i` yields a window whose samples all equal `i as f32` (or silence),
/// unless `i` was marked failing.
pub(crate) struct ScriptedSource {
    /// `None` means endless.
    total: Option<usize>,
    calls: usize,
    failing: HashSet<usize>,
    stop: Option<Lifecycle>,
    sample_rate: u32,
    len: usize,
    silent: bool,
}

impl ScriptedSource {
    /// `count` captures of four tagged samples each.
    pub fn tagged(count: usize) -> Self {
        Self {
            total: Some(count),
            calls: 0,
            failing: HashSet::new(),
            stop: None,
            sample_rate: 48_000,
            len: 4,
            silent: false,
        }
    }

    /// Tagged captures forever.
    pub fn endless() -> Self {
        Self {
            total: None,
            ..Self::tagged(0)
        }
    }

    /// `count` all-zero windows of `secs` seconds at `sample_rate`.
    pub fn silent(count: usize, sample_rate: u32, secs: u32) -> Self {
        Self {
            sample_rate,
            len: (sample_rate * secs) as usize,
            silent: true,
            ..Self::tagged(count)
        }
    }

    /// Make the given call indices fail with a device error.
    pub fn failing_at(mut self, calls: &[usize]) -> Self {
        self.failing.extend(calls.iter().copied());
        self
    }

    /// Stop `lifecycle` once the last scripted call has been made.
    pub fn stop_after(mut self, lifecycle: Lifecycle) -> Self {
        self.stop = Some(lifecycle);
        self
    }
}

impl AudioSource for ScriptedSource {
    fn capture(&mut self, _duration: Duration) -> Result<RawCapture, CaptureError> {
        let call = self.calls;
        self.calls += 1;

        if let Some(total) = self.total {
            if call >= total {
                return Err(CaptureError::Device("script exhausted".into()));
            }
            if call + 1 == total {
                if let Some(lc) = &self.stop {
                    lc.stop();
                }
            }
        } else {
            thread::sleep(Duration::from_millis(1));
        }

        if self.failing.contains(&call) {
            return Err(CaptureError::Device(format!("scripted failure #{call}")));
        }

        let value = if self.silent { 0.0 } else { call as f32 };
        Ok(RawCapture {
            sample_rate: self.sample_rate,
            samples: vec![value; self.len],
        })
    }
}

// ---------------------------------------------------------------------------
// ScriptedClassifier
// ---------------------------------------------------------------------------

enum Scores {
    Fixed(Vec<LabelScore>),
    /// One label named after the window's first sample.
    EchoTag,
}

pub(crate) struct ScriptedClassifier {
    scores: Scores,
    failing: HashSet<usize>,
    fail_warm_up: bool,
    calls: usize,
}

impl ScriptedClassifier {
    pub fn fixed(scores: Vec<LabelScore>) -> Self {
        Self {
            scores: Scores::Fixed(scores),
            failing: HashSet::new(),
            fail_warm_up: false,
            calls: 0,
        }
    }

    /// Answers `window-<tag>` with score 0.9, where `<tag>` is the first
    /// sample of the window.
    pub fn echo_tag() -> Self {
        Self {
            scores: Scores::EchoTag,
            ..Self::fixed(Vec::new())
        }
    }

    pub fn failing_at(mut self, calls: &[usize]) -> Self {
        self.failing.extend(calls.iter().copied());
        self
    }

    pub fn failing_warm_up(mut self) -> Self {
        self.fail_warm_up = true;
        self
    }
}

impl Classifier for ScriptedClassifier {
    fn warm_up(&mut self) -> Result<(), ClassificationError> {
        if self.fail_warm_up {
            return Err(ClassificationError::WarmUp("scripted".into()));
        }
        Ok(())
    }

    fn classify(
        &mut self,
        samples: &[f32],
        _sample_rate: u32,
        _candidate_labels: &[String],
    ) -> Result<Vec<LabelScore>, ClassificationError> {
        let call = self.calls;
        self.calls += 1;

        if self.failing.contains(&call) {
            return Err(ClassificationError::Inference(format!(
                "scripted failure #{call}"
            )));
        }

        Ok(match &self.scores {
            Scores::Fixed(scores) => scores.clone(),
            Scores::EchoTag => {
                let tag = samples.first().copied().unwrap_or_default();
                vec![LabelScore::new(format!("window-{tag}"), 0.9)]
            }
        })
    }
}

// ---------------------------------------------------------------------------
// FixedThermometer
// ---------------------------------------------------------------------------

pub(crate) struct FixedThermometer(pub Option<f32>);

impl Thermometer for FixedThermometer {
    fn read_temperature(&mut self) -> Option<f32> {
        self.0
    }
}

// ---------------------------------------------------------------------------
// RecordingLink / LinkTrace
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TraceState {
    connect_attempts: usize,
    disconnects: usize,
    delivered: Vec<(String, String)>,
}

/// Test-side view of everything a [`RecordingLink`] saw.
#[derive(Clone, Default)]
pub(crate) struct LinkTrace {
    state: Arc<Mutex<TraceState>>,
}

impl LinkTrace {
    pub fn connect_attempts(&self) -> usize {
        self.state.lock().unwrap().connect_attempts
    }

    pub fn disconnects(&self) -> usize {
        self.state.lock().unwrap().disconnects
    }

    /// `(topic, payload)` pairs in delivery order.
    pub fn delivered(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().delivered.clone()
    }
}

/// In-memory broker session with scriptable connection faults.
pub(crate) struct RecordingLink {
    trace: LinkTrace,
    connected: bool,
    refuse_connects: usize,
    broken_publishes: usize,
}

impl RecordingLink {
    pub fn connected(trace: LinkTrace) -> Self {
        Self {
            trace,
            connected: true,
            refuse_connects: 0,
            broken_publishes: 0,
        }
    }

    pub fn disconnected(trace: LinkTrace) -> Self {
        Self {
            connected: false,
            ..Self::connected(trace)
        }
    }

    /// Refuse the next `n` connect attempts.
    pub fn refuse_connects(&mut self, n: usize) {
        self.refuse_connects = n;
    }

    /// Fail the next `n` publishes with a dropped session.
    pub fn break_next_publishes(&mut self, n: usize) {
        self.broken_publishes = n;
    }
}

impl BrokerLink for RecordingLink {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self) -> Result<(), PublishError> {
        self.trace.state.lock().unwrap().connect_attempts += 1;
        if self.refuse_connects > 0 {
            self.refuse_connects -= 1;
            self.connected = false;
            return Err(PublishError::Connection("connection refused".into()));
        }
        self.connected = true;
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        if !self.connected {
            return Err(PublishError::NotConnected);
        }
        if self.broken_publishes > 0 {
            self.broken_publishes -= 1;
            self.connected = false;
            return Err(PublishError::Connection("session dropped".into()));
        }
        self.trace.state.lock().unwrap().delivered.push((
            topic.to_string(),
            String::from_utf8_lossy(payload).into_owned(),
        ));
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), PublishError> {
        self.trace.state.lock().unwrap().disconnects += 1;
        self.connected = false;
        Ok(())
    }
}
