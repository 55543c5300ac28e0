//! MQTT implementation of [`BrokerLink`] on top of `rumqttc`.
//!
//! `rumqttc`'s synchronous [`Client`] only queues requests; the network I/O
//! happens while its [`Connection`] is iterated.  Every `connect()` therefore
//! creates a fresh client/connection pair and drives the connection on a
//! dedicated `mqtt-event-loop` thread:
//!
//! - the first `ConnAck` marks the link connected and releases `connect()`;
//! - any `ConnectionError` marks it disconnected and ends the thread, so the
//!   next publish goes through the sink's reconnect path instead of
//!   `rumqttc`'s built-in retry loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{Client, Connection, Event, MqttOptions, Outgoing, Packet, QoS};

use super::sink::{BrokerLink, PublishError};
use crate::config::BrokerConfig;

/// Request queue depth between the client and its event loop.
const REQUEST_CAPACITY: usize = 16;

/// `rumqttc` rejects keep-alive intervals shorter than this.
const MIN_KEEP_ALIVE_SECS: u64 = 5;

pub struct MqttLink {
    options: MqttOptions,
    connect_timeout: Duration,
    session: Option<Session>,
}

/// One client plus the flag its event loop maintains.  Each `connect()`
/// gets a fresh flag, so a loop outliving its session cannot flip the state
/// of a newer one.
struct Session {
    client: Client,
    connected: Arc<AtomicBool>,
}

impl MqttLink {
    pub fn from_config(config: &BrokerConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(
            config.keep_alive_secs.max(MIN_KEEP_ALIVE_SECS),
        ));
        options.set_clean_session(true);
        if let Some(user) = &config.username {
            options.set_credentials(user, config.password.as_deref().unwrap_or(""));
        }

        Self {
            options,
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            session: None,
        }
    }

    /// Drop the current session, which ends its event loop.
    fn release_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.connected.store(false, Ordering::SeqCst);
            let _ = session.client.disconnect();
        }
    }
}

/// Event-loop body.  Reports the outcome of the handshake once on `ack`.
fn drive(
    mut connection: Connection,
    connected: Arc<AtomicBool>,
    ack: mpsc::SyncSender<Result<(), String>>,
) {
    let mut ack = Some(ack);

    for notification in connection.iter() {
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected.store(true, Ordering::SeqCst);
                if let Some(tx) = ack.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                connected.store(false, Ordering::SeqCst);
            }
            Ok(_) => {}
            Err(e) => {
                connected.store(false, Ordering::SeqCst);
                match ack.take() {
                    Some(tx) => {
                        let _ = tx.send(Err(e.to_string()));
                    }
                    None => log::warn!("publish: broker connection lost: {e}"),
                }
                break;
            }
        }
    }

    log::debug!("publish: mqtt event loop exited");
}

impl BrokerLink for MqttLink {
    fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.connected.load(Ordering::SeqCst))
    }

    fn connect(&mut self) -> Result<(), PublishError> {
        self.release_session();

        let (client, connection) = Client::new(self.options.clone(), REQUEST_CAPACITY);
        let (ack_tx, ack_rx) = mpsc::sync_channel(1);
        let connected = Arc::new(AtomicBool::new(false));
        let loop_flag = Arc::clone(&connected);

        std::thread::Builder::new()
            .name("mqtt-event-loop".into())
            .spawn(move || drive(connection, loop_flag, ack_tx))
            .map_err(|e| PublishError::Connection(format!("cannot spawn event loop: {e}")))?;

        let (host, port) = self.options.broker_address();
        match ack_rx.recv_timeout(self.connect_timeout) {
            Ok(Ok(())) => {
                log::info!("publish: connected to mqtt://{host}:{port}");
                self.session = Some(Session { client, connected });
                Ok(())
            }
            Ok(Err(reason)) => Err(PublishError::Connection(reason)),
            Err(_) => {
                // Dropping the client ends the event loop once the pending
                // connect attempt resolves.
                let _ = client.disconnect();
                Err(PublishError::Connection(format!(
                    "no CONNACK from {host}:{port} within {:?}",
                    self.connect_timeout
                )))
            }
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        let session = self
            .session
            .as_ref()
            .filter(|s| s.connected.load(Ordering::SeqCst))
            .ok_or(PublishError::NotConnected)?;

        session
            .client
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .map_err(|e| PublishError::Connection(e.to_string()))
    }

    fn disconnect(&mut self) -> Result<(), PublishError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        session.connected.store(false, Ordering::SeqCst);
        session
            .client
            .disconnect()
            .map_err(|e| PublishError::Rejected(e.to_string()))?;
        log::info!("publish: disconnected from broker");
        Ok(())
    }
}

impl Drop for MqttLink {
    fn drop(&mut self) {
        self.release_session();
    }
}
