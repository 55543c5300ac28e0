//! Configuration module for the soundscape monitor.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for cross-platform config directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, AudioConfig, BrokerConfig, ClassifierConfig, DeviceConfig, FeatureConfig,
    PipelineConfig, TemperatureConfig,
};
