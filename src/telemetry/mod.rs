//! Telemetry records and the device readings that go into them.

pub mod record;
pub mod thermal;

pub use record::{PayloadFields, RecordBuilder, TelemetryRecord, RESERVED_KEYS};
pub use thermal::{NoThermometer, SystemThermometer, Thermometer};
