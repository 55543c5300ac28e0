//! SoC temperature readings for the `RPI_temp` field.
//!
//! [`SystemThermometer`] asks the Raspberry Pi firmware (`vcgencmd
//! measure_temp`) first and falls back to the kernel thermal zone.  On other
//! hardware both fail and the reading is simply absent; the failure is
//! logged once at `warn` and afterwards only at `debug`.

use std::path::PathBuf;
use std::process::Command;

/// Source of the device temperature in °C.
pub trait Thermometer: Send {
    /// `None` when the temperature is unavailable on this hardware.
    fn read_temperature(&mut self) -> Option<f32>;
}

/// Thermometer that never has a reading (temperature reporting disabled).
#[derive(Debug, Default)]
pub struct NoThermometer;

impl Thermometer for NoThermometer {
    fn read_temperature(&mut self) -> Option<f32> {
        None
    }
}

/// Parse `vcgencmd measure_temp` output such as `temp=48.3'C`.
pub(crate) fn parse_vcgencmd(output: &str) -> Option<f32> {
    let value = output.trim().strip_prefix("temp=")?;
    let end = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(value.len());
    value[..end].parse().ok()
}

/// Parse a sysfs thermal zone reading in millidegrees (`48312`).
pub(crate) fn parse_millidegrees(content: &str) -> Option<f32> {
    content.trim().parse::<i64>().ok().map(|m| m as f32 / 1000.0)
}

/// Firmware reading with a sysfs fallback.
#[derive(Debug)]
pub struct SystemThermometer {
    thermal_zone: PathBuf,
    warned: bool,
}

impl SystemThermometer {
    pub fn new() -> Self {
        Self {
            thermal_zone: PathBuf::from("/sys/class/thermal/thermal_zone0/temp"),
            warned: false,
        }
    }

    fn from_vcgencmd() -> Option<f32> {
        let output = Command::new("vcgencmd").arg("measure_temp").output().ok()?;
        if !output.status.success() {
            return None;
        }
        parse_vcgencmd(&String::from_utf8_lossy(&output.stdout))
    }

    fn from_sysfs(&self) -> Option<f32> {
        let content = std::fs::read_to_string(&self.thermal_zone).ok()?;
        parse_millidegrees(&content)
    }
}

impl Default for SystemThermometer {
    fn default() -> Self {
        Self::new()
    }
}

impl Thermometer for SystemThermometer {
    fn read_temperature(&mut self) -> Option<f32> {
        let reading = Self::from_vcgencmd().or_else(|| self.from_sysfs());
        if reading.is_none() {
            if self.warned {
                log::debug!("temperature unavailable");
            } else {
                log::warn!(
                    "cannot read device temperature (no vcgencmd or thermal zone); \
                     RPI_temp will be omitted"
                );
                self.warned = true;
            }
        }
        reading
    }
}
