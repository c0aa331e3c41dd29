//! MqttTransport: publishes every reading as a BSON document.
//!
//! Absolute readings go to `TopicTemplate::topic(client_id, metric)`,
//! deltas to the matching `/diff` topic, both at QoS 1. The broker
//! connection is driven by a background event-loop thread that keeps
//! reconnecting after transient errors until shutdown. Requests never block
//! the caller: while the broker is down they queue up to
//! `REQUEST_CAPACITY`, after which sends fail with `SendError::Delivery`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, trace, warn};
use rumqttc::{
    Client, ConnectReturnCode, Connection, ConnectionError, Event, MqttOptions, Outgoing, Packet,
    QoS,
};
use serde::Serialize;

use hostpulse_core::{
    DeltaReading, MetricName, Reading, SendError, TopicTemplate, Transport, display_chain,
};

use crate::ConnectError;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 1883;
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(60);

/// Requests buffered between the client handle and the event loop.
const REQUEST_CAPACITY: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Broker location and identity.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub client_id: String,
    pub host: String,
    pub port: u16,
    pub keepalive: Duration,
    pub topics: TopicTemplate,
}

impl MqttConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            keepalive: DEFAULT_KEEPALIVE,
            topics: TopicTemplate::default(),
        }
    }

    /// Broker-side id of the publisher. Distinct from the listener's id so
    /// both can be connected at once.
    pub fn publisher_id(&self) -> String {
        format!("{}client", self.client_id)
    }

    pub(crate) fn options(&self, broker_client_id: String) -> MqttOptions {
        let mut options = MqttOptions::new(broker_client_id, self.host.clone(), self.port);
        options.set_keep_alive(self.keepalive);
        options
    }
}

/// Block until the broker acknowledges the connection.
pub(crate) fn wait_for_connack(
    connection: &mut Connection,
    config: &MqttConfig,
) -> Result<(), ConnectError> {
    for notification in connection.iter() {
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    info!(
                        "connected to broker {}:{}: {}",
                        config.host,
                        config.port,
                        connect_status(ack.code)
                    );
                    Ok(())
                } else {
                    Err(refused(config, ack.code))
                };
            }
            Ok(event) => trace!("before connack: {event:?}"),
            Err(ConnectionError::ConnectionRefused(code)) => return Err(refused(config, code)),
            Err(source) => {
                return Err(ConnectError::Unreachable {
                    host: config.host.clone(),
                    port: config.port,
                    source,
                });
            }
        }
    }
    Err(ConnectError::NoAck {
        host: config.host.clone(),
        port: config.port,
    })
}

fn refused(config: &MqttConfig, code: ConnectReturnCode) -> ConnectError {
    ConnectError::Refused {
        host: config.host.clone(),
        port: config.port,
        reason: connect_status(code).to_string(),
    }
}

/// Human-readable broker connection response.
pub fn connect_status(code: ConnectReturnCode) -> &'static str {
    match code {
        ConnectReturnCode::Success => "Success",
        ConnectReturnCode::RefusedProtocolVersion => "Refused - unacceptable protocol version",
        ConnectReturnCode::BadClientId => "Refused - identifier rejected",
        ConnectReturnCode::ServiceUnavailable => "Refused - server unavailable",
        ConnectReturnCode::BadUserNamePassword => "Refused - bad user name or password",
        ConnectReturnCode::NotAuthorized => "Refused - not authorised",
    }
}

/// Encode a reading as a BSON document.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, SendError> {
    bson::to_vec(value).map_err(|e| SendError::Encode(Box::new(e)))
}

/// Publishes readings to an MQTT broker.
pub struct MqttTransport {
    client: Client,
    client_id: String,
    topics: TopicTemplate,
    running: Arc<AtomicBool>,
    event_loop: Option<JoinHandle<()>>,
}

impl MqttTransport {
    /// Connect to the broker and start the event loop.
    ///
    /// Fails if the broker is unreachable or refuses the connection.
    pub fn connect(config: MqttConfig) -> Result<Self, ConnectError> {
        let (client, mut connection) =
            Client::new(config.options(config.publisher_id()), REQUEST_CAPACITY);
        wait_for_connack(&mut connection, &config)?;

        let running = Arc::new(AtomicBool::new(true));
        let event_loop = {
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("hostpulse-mqtt".into())
                .spawn(move || drive(connection, running))
                .map_err(|e| ConnectError::Unreachable {
                    host: config.host.clone(),
                    port: config.port,
                    source: ConnectionError::Io(e),
                })?
        };

        Ok(Self {
            client,
            client_id: config.client_id,
            topics: config.topics,
            running,
            event_loop: Some(event_loop),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn topics(&self) -> &TopicTemplate {
        &self.topics
    }

    fn publish(&self, topic: String, payload: Vec<u8>) -> Result<(), SendError> {
        debug!("publishing {} bytes to {topic}", payload.len());
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload)
            .map_err(|e| SendError::Delivery(Box::new(e)))
    }
}

fn drive(mut connection: Connection, running: Arc<AtomicBool>) {
    for notification in connection.iter() {
        match notification {
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("disconnect sent, stopping event loop");
                break;
            }
            Ok(event) => trace!("mqtt event: {event:?}"),
            Err(e) => {
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                warn!("mqtt connection error: {}; reconnecting", display_chain(&e));
                thread::sleep(RECONNECT_DELAY);
            }
        }
    }
}

impl Transport for MqttTransport {
    fn send_absolute(&mut self, name: MetricName, reading: &Reading) -> Result<(), SendError> {
        let payload = encode(reading)?;
        self.publish(self.topics.topic(&self.client_id, name), payload)
    }

    fn send_delta(&mut self, name: MetricName, delta: &DeltaReading) -> Result<(), SendError> {
        let payload = encode(delta)?;
        self.publish(self.topics.delta_topic(&self.client_id, name), payload)
    }

    fn on_shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        let Some(handle) = self.event_loop.take() else {
            return;
        };
        // A full request queue means the broker is unreachable; the event
        // loop exits on its next connection error.
        if let Err(e) = self.client.try_disconnect() {
            warn!("mqtt disconnect failed: {e}; not waiting for the event loop");
            return;
        }
        if handle.join().is_err() {
            warn!("mqtt event loop panicked");
        }
        info!("disconnected from broker");
    }
}
