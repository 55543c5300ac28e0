//! Publish sink — best-effort delivery of telemetry records to a broker.
//!
//! # Delivery state machine
//!
//! ```text
//! publish(record)
//!   ├─ Connected ──publish──▶ Ok(Direct)
//!   │              └─ connection error ─┐
//!   └─ Disconnected ────────────────────┴─▶ connect() once
//!                                            ├─ Err → record dropped
//!                                            └─ Ok → publish once
//!                                                     ├─ Ok  → Ok(Reconnected)
//!                                                     └─ Err → record dropped
//! ```
//!
//! There is no retry queue: a record is delivered at most once.

use thiserror::Error;

use crate::telemetry::TelemetryRecord;

// ---------------------------------------------------------------------------
// PublishError
// ---------------------------------------------------------------------------

/// Errors that can occur while delivering a record.
#[derive(Debug, Error)]
pub enum PublishError {
    /// No broker session is established.
    #[error("not connected to the broker")]
    NotConnected,

    /// Connecting failed or the session broke mid-delivery.
    #[error("broker connection error: {0}")]
    Connection(String),

    /// The record could not be encoded as JSON.
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    /// The client refused the publish request.
    #[error("publish rejected: {0}")]
    Rejected(String),
}

impl PublishError {
    /// Errors that warrant a reconnect attempt.
    pub fn is_connection(&self) -> bool {
        matches!(self, PublishError::NotConnected | PublishError::Connection(_))
    }
}

// ---------------------------------------------------------------------------
// BrokerLink trait
// ---------------------------------------------------------------------------

/// Transport-level broker session.
///
/// The link is owned by the classification stage alone (and by the
/// supervisor before and after the stage runs), so `Send` is the only bound.
pub trait BrokerLink: Send {
    fn is_connected(&self) -> bool;

    /// Establish (or re-establish) the session.
    fn connect(&mut self) -> Result<(), PublishError>;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError>;

    /// Close the session.  Only called during supervised shutdown.
    fn disconnect(&mut self) -> Result<(), PublishError>;
}

// Compile-time assertion: Box<dyn BrokerLink> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn BrokerLink>) {}
};

// ---------------------------------------------------------------------------
// SinkState / Delivery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Connected,
    Disconnected,
}

/// How a record made it to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Published on the existing session.
    Direct,
    /// Published after one reconnect.
    Reconnected,
}

// ---------------------------------------------------------------------------
// PublishSink
// ---------------------------------------------------------------------------

/// Serializes records and delivers them under a fixed topic.
pub struct PublishSink {
    link: Box<dyn BrokerLink>,
    topic: String,
}

impl PublishSink {
    pub fn new(link: Box<dyn BrokerLink>, topic: impl Into<String>) -> Self {
        Self {
            link,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> SinkState {
        if self.link.is_connected() {
            SinkState::Connected
        } else {
            SinkState::Disconnected
        }
    }

    /// Initial connection, made by the supervisor at startup.
    pub fn open(&mut self) -> Result<(), PublishError> {
        self.link.connect()
    }

    /// Deliver `record`, reconnecting at most once.
    ///
    /// # Errors
    ///
    /// Any error means the record was dropped; callers log it and move on.
    pub fn publish(&mut self, record: &TelemetryRecord) -> Result<Delivery, PublishError> {
        let payload = record.to_json()?;

        if self.link.is_connected() {
            match self.link.publish(&self.topic, payload.as_bytes()) {
                Ok(()) => return Ok(Delivery::Direct),
                Err(e) if e.is_connection() => {
                    log::warn!("publish: delivery failed ({e}), reconnecting");
                }
                Err(e) => return Err(e),
            }
        } else {
            log::info!("publish: broker disconnected, reconnecting");
        }

        self.link.connect()?;
        self.link.publish(&self.topic, payload.as_bytes())?;
        Ok(Delivery::Reconnected)
    }

    /// Tear the session down.  Only the supervisor calls this.
    pub fn close(&mut self) -> Result<(), PublishError> {
        self.link.disconnect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
