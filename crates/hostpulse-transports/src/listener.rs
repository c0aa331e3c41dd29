//! MqttListener: the consumer side of [`MqttTransport`](crate::MqttTransport).
//!
//! Subscribes at QoS 0 to the absolute and `/diff` topic of each requested
//! metric and hands every decoded BSON document to a callback. The broker
//! forgets subscriptions when the connection drops, so they are issued
//! again after every reconnect.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bson::{Bson, Document};
use log::{debug, info, trace, warn};
use rumqttc::{Client, ConnectReturnCode, Connection, Event, Outgoing, Packet, QoS};

use hostpulse_core::{MetricName, TopicTemplate, display_chain};

use crate::ConnectError;
use crate::mqtt::{MqttConfig, connect_status, wait_for_connack};

const REQUEST_CAPACITY: usize = 32;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Absolute and delta topics for `metrics`, in that order per metric.
pub fn subscription_topics(
    template: &TopicTemplate,
    client_id: &str,
    metrics: &[MetricName],
) -> Vec<String> {
    metrics
        .iter()
        .flat_map(|&m| [template.topic(client_id, m), template.delta_topic(client_id, m)])
        .collect()
}

/// Convert a received document to JSON for printing.
pub fn document_to_json(doc: Document) -> serde_json::Value {
    Bson::Document(doc).into_relaxed_extjson()
}

/// Stops a running [`MqttListener`] from another thread.
#[derive(Clone)]
pub struct ListenerHandle {
    client: Client,
    stop: Arc<AtomicBool>,
}

impl ListenerHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Err(e) = self.client.disconnect() {
            debug!("listener disconnect: {e}");
        }
    }
}

pub struct MqttListener {
    client: Client,
    connection: Connection,
    topics: Vec<String>,
    stop: Arc<AtomicBool>,
}

impl MqttListener {
    /// Connect as `config.client_id` and subscribe to every metric in
    /// `metrics`.
    pub fn connect(config: &MqttConfig, metrics: &[MetricName]) -> Result<Self, ConnectError> {
        let (client, mut connection) =
            Client::new(config.options(config.client_id.clone()), REQUEST_CAPACITY);
        wait_for_connack(&mut connection, config)?;

        let topics = subscription_topics(&config.topics, &config.client_id, metrics);
        Ok(Self {
            client,
            connection,
            topics,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn handle(&self) -> ListenerHandle {
        ListenerHandle {
            client: self.client.clone(),
            stop: Arc::clone(&self.stop),
        }
    }

    /// Run the event loop on the calling thread until the handle is stopped.
    pub fn run<F>(self, mut on_message: F)
    where
        F: FnMut(&str, Document),
    {
        let Self {
            client,
            mut connection,
            topics,
            stop,
        } = self;
        subscribe_all(&client, &topics);

        for notification in connection.iter() {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            match notification {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    match bson::from_slice::<Document>(&publish.payload) {
                        Ok(doc) => on_message(&publish.topic, doc),
                        Err(e) => warn!("undecodable payload on {}: {e}", publish.topic),
                    }
                }
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!("reconnected: {}", connect_status(ack.code));
                    if ack.code == ConnectReturnCode::Success {
                        subscribe_all(&client, &topics);
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    debug!("subscription {} acknowledged", ack.pkid)
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                Ok(event) => trace!("listener event: {event:?}"),
                Err(e) => {
                    warn!("listener connection error: {}; reconnecting", display_chain(&e));
                    std::thread::sleep(RECONNECT_DELAY);
                }
            }
        }
        info!("listener stopped");
    }
}

// The event loop runs on this thread, so a blocking subscribe could wait on
// itself.
fn subscribe_all(client: &Client, topics: &[String]) {
    for topic in topics {
        info!("subscribing to topic {topic}");
        if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
            warn!("cannot subscribe to {topic}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn subscribes_to_absolute_and_diff_topics() {
        let topics = subscription_topics(
            &TopicTemplate::default(),
            "abc",
            &[MetricName::Cpu, MetricName::Net],
        );
        assert_eq!(
            topics,
            vec![
                "/ef/machine/abc/stats/cpu",
                "/ef/machine/abc/stats/cpu/diff",
                "/ef/machine/abc/stats/net",
                "/ef/machine/abc/stats/net/diff",
            ]
        );
    }

    #[test]
    fn all_metrics_make_ten_topics() {
        let topics = subscription_topics(&TopicTemplate::default(), "x", &MetricName::ALL);
        assert_eq!(topics.len(), 10);
    }

    #[test]
    fn documents_become_plain_json() {
        let json = document_to_json(doc! { "cache": 1024_i64, "mem": { "percent": 12.5 } });
        assert_eq!(json["cache"], 1024);
        assert_eq!(json["mem"]["percent"], 12.5);
    }
}
