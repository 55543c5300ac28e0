//! Application entry point — urban soundscape monitor.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] (path from the first argument, otherwise the
//!    platform config dir) and validate it.
//! 3. Resolve the candidate label set (`labels.txt` beside the settings
//!    file is honoured).
//! 4. Build the production collaborators (cpal, HTTP classifier, thermal
//!    reader, MQTT link).
//! 5. Start the [`Supervisor`] — warm-up, broker connection, worker threads.
//! 6. Block on Ctrl-C inside a small tokio runtime, then shut down.

use std::path::PathBuf;

use anyhow::{Context, Result};
use soundscape_monitor::{
    audio::CpalRecorder,
    classify::{load_labels, HttpClassifier},
    config::{AppConfig, AppPaths},
    pipeline::{Collaborators, PipelineSettings, Supervisor},
    publish::MqttLink,
    telemetry::{NoThermometer, SystemThermometer, Thermometer},
};

fn load_config() -> Result<(AppConfig, AppPaths)> {
    let paths = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => AppPaths::for_settings_file(&path),
        None => AppPaths::new(),
    };
    log::info!("Loading config from {}", paths.settings_file.display());

    let config = AppConfig::load_from(&paths.settings_file)
        .with_context(|| format!("failed to read {}", paths.settings_file.display()))?;
    config.validate(&paths).context("invalid configuration")?;
    Ok((config, paths))
}

fn collaborators(config: &AppConfig) -> Result<Collaborators> {
    let thermometer: Box<dyn Thermometer> = if config.temperature.enabled {
        Box::new(SystemThermometer::new())
    } else {
        Box::new(NoThermometer)
    };

    Ok(Collaborators {
        source: Box::new(CpalRecorder::new(
            config.audio.input_device.clone(),
            config.audio.stall_grace(),
        )),
        classifier: Box::new(
            HttpClassifier::from_config(&config.classifier)
                .context("failed to build classifier client")?,
        ),
        thermometer,
        link: Box::new(MqttLink::from_config(&config.broker)),
    })
}

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Soundscape monitor starting up");

    // 2–3. Configuration and labels
    let (config, paths) = load_config()?;
    let labels = load_labels(&config.classifier, &paths)?;
    log::info!(
        "Device {} ({}), {} candidate labels, publishing to {}:{} on {}",
        config.device.device_id,
        config.device.app_id,
        labels.len(),
        config.broker.host,
        config.broker.port,
        config.broker.topic
    );

    // Signal runtime, built before any worker exists.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4–5. Collaborators and workers
    let supervisor = Supervisor::new(PipelineSettings::from_config(&config, labels));
    let running = supervisor.start(collaborators(&config)?)?;

    // 6. Wait for Ctrl-C
    let signal = rt.block_on(tokio::signal::ctrl_c());
    match &signal {
        Ok(()) => log::info!("Ctrl-C received"),
        Err(e) => log::error!("Cannot listen for Ctrl-C ({e}); shutting down"),
    }

    let report = running.shutdown();
    log::info!(
        "Captured {} window(s), published {} record(s), {} classification failure(s), {} dropped",
        report.acquisition.captured,
        report.stage.published,
        report.stage.classify_failed,
        report.stage.publish_failed
    );
    signal.context("failed to listen for Ctrl-C")
}
