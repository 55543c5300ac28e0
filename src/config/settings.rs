//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and handed to worker
//! threads by value.  Every section is `#[serde(default)]`, so a settings
//! file only needs to list the values it overrides.

use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// DeviceConfig
// ---------------------------------------------------------------------------

/// Identity fields stamped on every telemetry record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device identifier (`dev_id` on the wire).
    pub device_id: String,
    /// Application identifier (`app_id` on the wire).
    pub app_id: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: "OE-007".into(),
            app_id: "urbansounds".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for the capture device and the sample window length.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Length of one sample window in seconds.
    pub window_secs: f32,
    /// Input device name — `None` means the system default.
    pub input_device: Option<String>,
    /// Extra time past `window_secs` the recorder waits for samples before
    /// reporting the stream as stalled.
    pub stall_grace_secs: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            window_secs: 10.0,
            input_device: None,
            stall_grace_secs: 5.0,
        }
    }
}

/// Upper bound accepted for `window_secs` and `stall_grace_secs`.
pub const MAX_AUDIO_SECS: f32 = 3_600.0;

/// Seconds to [`Duration`], clamped to `[0, MAX_AUDIO_SECS]`; NaN maps to zero.
fn bounded_secs(secs: f32) -> Duration {
    Duration::try_from_secs_f32(secs.max(0.0).min(MAX_AUDIO_SECS)).unwrap_or(Duration::ZERO)
}

impl AudioConfig {
    /// Window length as a [`Duration`].
    pub fn window(&self) -> Duration {
        bounded_secs(self.window_secs)
    }

    /// Stall grace period as a [`Duration`].
    pub fn stall_grace(&self) -> Duration {
        bounded_secs(self.stall_grace_secs)
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Worker pacing, queue bound and top-K selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pause between worker iterations in milliseconds.
    pub inter_iteration_delay_ms: u64,
    /// How long the classification stage waits for a window per dequeue.
    pub dequeue_timeout_ms: u64,
    /// Maximum number of queued windows before the oldest is evicted.
    /// `0` disables the bound.
    pub queue_capacity: usize,
    /// Number of top-ranked labels published per record.
    pub top_k: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inter_iteration_delay_ms: 100,
            dequeue_timeout_ms: 1_000,
            queue_capacity: 16,
            top_k: 5,
        }
    }
}

impl PipelineConfig {
    pub fn inter_iteration_delay(&self) -> Duration {
        Duration::from_millis(self.inter_iteration_delay_ms)
    }

    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// FeatureConfig
// ---------------------------------------------------------------------------

/// Optional signal features computed per window (never published).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Compute the frame-wise RMS envelope.
    pub rms: bool,
    /// Compute the STFT magnitude spectrogram.
    pub spectrogram: bool,
    /// FFT / frame size in samples.
    pub n_fft: usize,
    /// Hop between successive frames in samples.
    pub hop_length: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            rms: false,
            spectrogram: false,
            n_fft: 2_048,
            hop_length: 512,
        }
    }
}

// ---------------------------------------------------------------------------
// ClassifierConfig
// ---------------------------------------------------------------------------

/// Candidate labels used when neither `labels` nor `labels_file` is set.
pub const DEFAULT_LABELS: &[&str] = &[
    "traffic",
    "car horn",
    "siren",
    "construction",
    "birds",
    "dog barking",
    "voices",
    "children playing",
    "music",
    "wind",
    "rain",
    "water",
    "boat engine",
    "bicycle bell",
    "footsteps",
    "silence",
];

/// Settings for the zero-shot classifier service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// URL the audio window is POSTed to.
    pub endpoint: String,
    /// Optional readiness URL checked once at startup.
    pub health_url: Option<String>,
    /// Model identifier forwarded to the service.
    pub model: String,
    /// Sample rate the model expects; windows are resampled to it.
    pub sample_rate: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Inline candidate labels.  Ignored when `labels_file` is set.
    pub labels: Vec<String>,
    /// File with one candidate label per line (`#` starts a comment).
    pub labels_file: Option<std::path::PathBuf>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/classify".into(),
            health_url: None,
            model: "laion/larger_clap_general".into(),
            sample_rate: 48_000,
            timeout_secs: 30,
            labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
            labels_file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// BrokerConfig
// ---------------------------------------------------------------------------

/// MQTT broker connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    /// Username for broker authentication.  `None` connects anonymously.
    pub username: Option<String>,
    pub password: Option<String>,
    /// MQTT client identifier.
    pub client_id: String,
    /// Topic every record is published under.
    pub topic: String,
    pub keep_alive_secs: u64,
    /// Upper bound on waiting for the broker's CONNACK.
    pub connect_timeout_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 31_090,
            username: None,
            password: None,
            client_id: "soundscape-OE-007".into(),
            topic: "pipeline/urbansounds/OE-007".into(),
            keep_alive_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// TemperatureConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureConfig {
    /// Read the SoC temperature for each record (`RPI_temp`).
    pub enabled: bool,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use soundscape_monitor::config::{AppConfig, AppPaths};
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// config.validate(&AppPaths::new()).unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Device / application identity.
    pub device: DeviceConfig,
    /// Capture settings.
    pub audio: AudioConfig,
    /// Worker pacing and queue settings.
    pub pipeline: PipelineConfig,
    /// Optional per-window signal features.
    pub features: FeatureConfig,
    /// Zero-shot classifier service.
    pub classifier: ClassifierConfig,
    /// MQTT broker.
    pub broker: BrokerConfig,
    /// SoC temperature reading.
    pub temperature: TemperatureConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet,
    /// so a fresh device runs with defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    ///
    /// `paths` locates the optional `labels.txt` that can stand in for an
    /// empty inline label list.
    pub fn validate(&self, paths: &AppPaths) -> Result<()> {
        let window = self.audio.window_secs;
        if !(window.is_finite() && window > 0.0 && window <= MAX_AUDIO_SECS) {
            bail!("audio.window_secs must be in (0, {MAX_AUDIO_SECS}], got {window}");
        }
        let grace = self.audio.stall_grace_secs;
        if !(grace.is_finite() && (0.0..=MAX_AUDIO_SECS).contains(&grace)) {
            bail!("audio.stall_grace_secs must be in [0, {MAX_AUDIO_SECS}], got {grace}");
        }
        if self.pipeline.top_k == 0 {
            bail!("pipeline.top_k must be at least 1");
        }
        if self.classifier.sample_rate == 0 {
            bail!("classifier.sample_rate must be non-zero");
        }
        if self.classifier.labels.is_empty()
            && self.classifier.labels_file.is_none()
            && !paths.labels_file.is_file()
        {
            bail!("no candidate labels configured");
        }
        if self.broker.topic.trim().is_empty() {
            bail!("broker.topic must not be empty");
        }
        if self.features.n_fft == 0 || self.features.hop_length == 0 {
            bail!("features.n_fft and features.hop_length must be non-zero");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
