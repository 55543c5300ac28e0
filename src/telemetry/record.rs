//! Telemetry record assembly and its JSON wire format.
//!
//! ```json
//! {
//!   "app_id": "urbansounds",
//!   "dev_id": "OE-007",
//!   "payload_fields": {
//!     "traffic": 0.9, "birds": 0.05, "wind": 0.03, "voices": 0.01, "music": 0.01,
//!     "start_recording": 1700000000,
//!     "RPI_temp": 48.3,
//!     "ptp": 0.0
//!   },
//!   "time": 1700000010123
//! }
//! ```
//!
//! Labels appear in rank order ahead of the auxiliary fields; `RPI_temp` is
//! omitted when the temperature could not be read.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::audio::SampleWindow;
use crate::classify::{rank, ClassificationError, LabelScore};

/// Payload keys that labels may not shadow.
pub const RESERVED_KEYS: [&str; 3] = ["start_recording", "RPI_temp", "ptp"];

// ---------------------------------------------------------------------------
// TelemetryRecord
// ---------------------------------------------------------------------------

/// One published observation.  Built fresh per window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    pub app_id: String,
    #[serde(rename = "dev_id")]
    pub device_id: String,
    #[serde(rename = "payload_fields")]
    pub payload: PayloadFields,
    /// Emission instant, epoch milliseconds.
    #[serde(rename = "time")]
    pub emitted_at: i64,
}

impl TelemetryRecord {
    /// Canonical JSON text for the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// The `payload_fields` object.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadFields {
    /// Top-K labels, highest score first.
    pub labels: Vec<LabelScore>,
    /// Capture start, epoch seconds.
    pub start_recording: i64,
    /// SoC temperature in °C, if known.
    pub rpi_temp: Option<f32>,
    /// Peak-to-peak amplitude of the window.
    pub ptp: f32,
}

impl Serialize for PayloadFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = if self.rpi_temp.is_some() { 3 } else { 2 };
        let mut map = serializer.serialize_map(Some(self.labels.len() + extra))?;
        for entry in &self.labels {
            map.serialize_entry(&entry.label, &entry.score)?;
        }
        map.serialize_entry("start_recording", &self.start_recording)?;
        if let Some(temp) = self.rpi_temp {
            map.serialize_entry("RPI_temp", &temp)?;
        }
        map.serialize_entry("ptp", &self.ptp)?;
        map.end()
    }
}

// ---------------------------------------------------------------------------
// RecordBuilder
// ---------------------------------------------------------------------------

/// Stamps device identity and top-K selection onto per-window results.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    device_id: String,
    app_id: String,
    top_k: usize,
}

impl RecordBuilder {
    pub fn new(device_id: impl Into<String>, app_id: impl Into<String>, top_k: usize) -> Self {
        Self {
            device_id: device_id.into(),
            app_id: app_id.into(),
            top_k,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Assemble a record from a successful classification.
    ///
    /// Scores are re-ranked; labels that collide with [`RESERVED_KEYS`] or
    /// repeat an earlier label are skipped before the top-K cut.  An empty
    /// score list yields [`ClassificationError::EmptyResult`] so no record
    /// with missing label fields ever leaves the stage.
    pub fn build(
        &self,
        window: &SampleWindow,
        scores: Vec<LabelScore>,
        rpi_temp: Option<f32>,
        ptp: f32,
        emitted_at: DateTime<Utc>,
    ) -> Result<TelemetryRecord, ClassificationError> {
        if scores.is_empty() {
            return Err(ClassificationError::EmptyResult);
        }

        let mut seen = HashSet::new();
        let labels: Vec<LabelScore> = rank(scores)
            .into_iter()
            .filter(|s| {
                if RESERVED_KEYS.contains(&s.label.as_str()) {
                    log::warn!("label {:?} collides with a payload field; skipped", s.label);
                    return false;
                }
                seen.insert(s.label.clone())
            })
            .take(self.top_k)
            .collect();

        Ok(TelemetryRecord {
            app_id: self.app_id.clone(),
            device_id: self.device_id.clone(),
            payload: PayloadFields {
                labels,
                start_recording: window.captured_at().timestamp(),
                rpi_temp,
                ptp,
            },
            emitted_at: emitted_at.timestamp_millis(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Value;

    fn window() -> SampleWindow {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        SampleWindow::new(at, 48_000, vec![0.0; 16])
    }

    fn emitted() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_010_123).unwrap()
    }

    fn scores() -> Vec<LabelScore> {
        vec![
            LabelScore::new("traffic", 0.9),
            LabelScore::new("birds", 0.05),
            LabelScore::new("wind", 0.03),
            LabelScore::new("voices", 0.01),
            LabelScore::new("music", 0.01),
        ]
    }

    #[test]
    fn wire_format_fields() {
        let builder = RecordBuilder::new("OE-007", "urbansounds", 5);
        let record = builder
            .build(&window(), scores(), Some(48.3), 0.0, emitted())
            .unwrap();

        let json: Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(json["app_id"], "urbansounds");
        assert_eq!(json["dev_id"], "OE-007");
        assert_eq!(json["time"], 1_700_000_010_123_i64);

        let fields = &json["payload_fields"];
        assert_eq!(fields["traffic"].as_f64(), Some(0.9));
        assert_eq!(fields["start_recording"], 1_700_000_000_i64);
        assert_eq!(fields["ptp"].as_f64(), Some(0.0));
        assert!((fields["RPI_temp"].as_f64().unwrap() - 48.3).abs() < 1e-4);
        assert_eq!(fields.as_object().unwrap().len(), 8);
    }

    #[test]
    fn labels_come_first_in_rank_order() {
        let builder = RecordBuilder::new("d", "a", 5);
        let mut shuffled = scores();
        shuffled.reverse();
        let record = builder
            .build(&window(), shuffled, None, 0.2, emitted())
            .unwrap();

        let text = record.to_json().unwrap();
        let traffic = text.find("\"traffic\"").unwrap();
        let birds = text.find("\"birds\"").unwrap();
        let start = text.find("\"start_recording\"").unwrap();
        assert!(traffic < birds && birds < start, "{text}");
    }

    #[test]
    fn unknown_temperature_is_omitted() {
        let builder = RecordBuilder::new("d", "a", 5);
        let record = builder
            .build(&window(), scores(), None, 0.1, emitted())
            .unwrap();
        let json: Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert!(json["payload_fields"].get("RPI_temp").is_none());
    }

    #[test]
    fn top_k_limits_labels() {
        let builder = RecordBuilder::new("d", "a", 2);
        let record = builder
            .build(&window(), scores(), None, 0.1, emitted())
            .unwrap();
        let labels: Vec<&str> = record
            .payload
            .labels
            .iter()
            .map(|s| s.label.as_str())
            .collect();
        assert_eq!(labels, ["traffic", "birds"]);
    }

    #[test]
    fn payload_keeps_five_highest_of_eight() {
        let eight = vec![
            LabelScore::new("rain", 0.02),
            LabelScore::new("traffic", 0.41),
            LabelScore::new("music", 0.04),
            LabelScore::new("birds", 0.22),
            LabelScore::new("siren", 0.01),
            LabelScore::new("voices", 0.13),
            LabelScore::new("wind", 0.09),
            LabelScore::new("construction", 0.08),
        ];
        let record = RecordBuilder::new("OE-007", "urbansounds", 5)
            .build(&window(), eight, None, 0.0, emitted())
            .unwrap();

        let json: Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        let fields = json["payload_fields"].as_object().unwrap();
        let mut labels: Vec<&str> = fields
            .keys()
            .map(String::as_str)
            .filter(|k| !RESERVED_KEYS.contains(k))
            .collect();
        labels.sort_unstable();
        assert_eq!(labels, ["birds", "construction", "traffic", "voices", "wind"]);

        assert_eq!(fields["traffic"].as_f64(), Some(0.41));
        assert_eq!(fields["birds"].as_f64(), Some(0.22));
        assert_eq!(fields["voices"].as_f64(), Some(0.13));
        assert_eq!(fields["wind"].as_f64(), Some(0.09));
        assert_eq!(fields["construction"].as_f64(), Some(0.08));
    }

    #[test]
    fn reserved_and_duplicate_labels_skipped() {
        let builder = RecordBuilder::new("d", "a", 5);
        let record = builder
            .build(
                &window(),
                vec![
                    LabelScore::new("ptp", 0.8),
                    LabelScore::new("rain", 0.1),
                    LabelScore::new("rain", 0.05),
                ],
                None,
                0.3,
                emitted(),
            )
            .unwrap();

        assert_eq!(record.payload.labels, vec![LabelScore::new("rain", 0.1)]);
        let json: Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert!((json["payload_fields"]["ptp"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn empty_scores_build_no_record() {
        let builder = RecordBuilder::new("d", "a", 5);
        let result = builder.build(&window(), Vec::new(), None, 0.0, emitted());
        assert!(matches!(result, Err(ClassificationError::EmptyResult)));
    }
}
