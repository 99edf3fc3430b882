//! MQTT subscription transport.
//!
//! Connects to the configured broker, subscribes to the sample topic on every
//! successful connect, and forwards publish payloads. Reconnection and QoS
//! guarantees are left to the broker setup; a connection error ends the stream.

use crate::config::TransportConfig;
use crate::transport::{Transport, TransportError, TransportEvent};
use crossbeam_channel::{bounded, Receiver, Sender};
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};
use std::thread;
use std::time::Duration;

/// Capacity of rumqttc's outgoing request queue.
const REQUEST_CAPACITY: usize = 10;

pub struct MqttTransport {
    config: TransportConfig,
}

impl MqttTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

impl Transport for MqttTransport {
    fn start(self) -> Result<Receiver<TransportEvent>, TransportError> {
        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.host.clone(),
            self.config.port,
        );
        options.set_keep_alive(Duration::from_secs(self.config.keepalive_secs));

        let (client, connection) = Client::new(options, REQUEST_CAPACITY);
        let (sender, receiver) = bounded(self.config.queue_capacity.max(1));

        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            topic = %self.config.topic,
            client_id = %self.config.client_id,
            "Connecting to MQTT broker"
        );

        let topic = self.config.topic;
        thread::Builder::new()
            .name("mqtt-transport".to_string())
            .spawn(move || pump(client, connection, &topic, &sender))?;

        Ok(receiver)
    }
}

fn pump(client: Client, mut connection: Connection, topic: &str, sender: &Sender<TransportEvent>) {
    for notification in connection.iter() {
        let event = match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                if let Err(e) = client.try_subscribe(topic, QoS::AtMostOnce) {
                    let _ = sender.send(TransportEvent::Disconnected(Some(format!(
                        "subscribe to '{topic}' failed: {e}"
                    ))));
                    return;
                }
                tracing::info!(topic, "Subscribed");
                TransportEvent::Connected
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                TransportEvent::Message(publish.payload.to_vec())
            }
            Ok(_) => continue,
            Err(e) => {
                let _ = sender.send(TransportEvent::Disconnected(Some(e.to_string())));
                return;
            }
        };

        if sender.send(event).is_err() {
            return;
        }
    }

    let _ = sender.send(TransportEvent::Disconnected(None));
}
