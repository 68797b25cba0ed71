//! Impure I/O half of the rumqttc integration
//!
//! [`RumqttLink`] wraps the cloneable `AsyncClient` used for requests and
//! [`RumqttEvents`] wraps the `EventLoop` whose polling performs network I/O.

use super::connection::configure_mqtt_options;
use super::message_handler::MessageHandler;
use crate::config::{ClientSettings, Qos};
use crate::error::ConnackCode;
use crate::transport::{EventSource, LinkError, LinkEvent, MqttLink, PublishReceipt};
use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::{AsyncClient, ConnectionError, EventLoop};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Capacity of the request channel between client and event loop
const REQUEST_CAPACITY: usize = 10;

/// Create the request and event halves for one broker session
pub fn create_connection(settings: &ClientSettings) -> (RumqttLink, RumqttEvents) {
    let mqtt_options = configure_mqtt_options(settings);
    let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);

    // Last CONNACK refusal seen by the event loop, 0 while the session is accepted
    let refused = Arc::new(AtomicU8::new(0));

    (
        RumqttLink {
            client,
            refused: refused.clone(),
        },
        RumqttEvents {
            event_loop,
            refused,
        },
    )
}

/// Request half of a rumqttc session
#[derive(Clone)]
pub struct RumqttLink {
    client: AsyncClient,
    refused: Arc<AtomicU8>,
}

impl RumqttLink {
    /// Return code publishes are reported with, reflecting the last CONNACK
    pub fn session_code(&self) -> u8 {
        self.refused.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MqttLink for RumqttLink {
    fn subscribe(&self, topic: &str, qos: Qos) -> Result<(), LinkError> {
        debug!(topic = %topic, qos = %qos, "Queueing subscribe");
        self.client.try_subscribe(topic, qos.into())?;
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        qos: Qos,
        retain: bool,
        payload: Bytes,
    ) -> Result<PublishReceipt, LinkError> {
        let payload_len = payload.len();
        let rc = self.session_code();
        if rc == 0 {
            self.client
                .publish(topic, qos.into(), retain, payload.to_vec())
                .await?;
        }

        Ok(PublishReceipt {
            rc,
            topic: topic.to_string(),
            qos,
            retain,
            payload_len,
        })
    }

    async fn disconnect(&self) -> Result<(), LinkError> {
        self.client.disconnect().await?;
        Ok(())
    }
}

/// Event half of a rumqttc session
pub struct RumqttEvents {
    event_loop: EventLoop,
    refused: Arc<AtomicU8>,
}

#[async_trait]
impl EventSource for RumqttEvents {
    async fn next_event(&mut self) -> Result<LinkEvent, LinkError> {
        loop {
            match self.event_loop.poll().await {
                Ok(event) => {
                    let Some(route) = MessageHandler::route_mqtt_event(&event) else {
                        continue;
                    };
                    if let LinkEvent::ConnAck { code, .. } = route {
                        self.refused.store(code, Ordering::SeqCst);
                    }
                    return Ok(route);
                }
                // A refused CONNACK surfaces as an error from rumqttc
                Err(ConnectionError::ConnectionRefused(code)) => {
                    let code = ConnackCode::from(code).as_u8();
                    self.refused.store(code, Ordering::SeqCst);
                    return Ok(LinkEvent::ConnAck {
                        code,
                        session_present: false,
                    });
                }
                Err(e) => return Err(LinkError::Connection(e)),
            }
        }
    }
}
