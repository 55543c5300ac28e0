//! Delivery of telemetry records to the MQTT broker.
//!
//! * [`PublishSink`] — serializes records and applies the
//!   reconnect-once, at-most-once delivery policy.
//! * [`BrokerLink`] — transport seam; [`MqttLink`] is the `rumqttc` backend.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use soundscape_monitor::config::BrokerConfig;
//! use soundscape_monitor::publish::{MqttLink, PublishSink};
//!
//! let config = BrokerConfig::default();
//! let mut sink = PublishSink::new(Box::new(MqttLink::from_config(&config)), &config.topic);
//! if let Err(e) = sink.open() {
//!     eprintln!("broker not reachable yet: {e}");
//! }
//! ```

pub mod mqtt;
pub mod sink;

pub use mqtt::MqttLink;
pub use sink::{BrokerLink, Delivery, PublishError, PublishSink, SinkState};
