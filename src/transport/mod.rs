//! Transport layer between the client assistant and the MQTT client library
//!
//! The assistant talks to the network only through two seams: an [`MqttLink`]
//! for outbound requests and an [`EventSource`] that yields inbound events.
//! The `mqtt` module implements both on top of rumqttc; `testing::mocks`
//! implements them in memory.

use crate::config::Qos;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod mqtt;

/// Events the assistant dispatches to its callback hooks
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Broker answered the CONNECT; `code` is the raw CONNACK return code
    ConnAck { code: u8, session_present: bool },
    /// Message received on a subscribed topic
    Message {
        topic: String,
        payload: Bytes,
        qos: Qos,
        retain: bool,
    },
    /// An outbound message completed its QoS flow
    Published { pkid: u16 },
    /// The session ended, either on request or because the network dropped
    Disconnected { reason: String },
    /// The client sent DISCONNECT; no further events will follow
    Closed,
}

/// Result of handing a message to the client library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Zero on success, otherwise the refusal code observed for the session
    pub rc: u8,
    pub topic: String,
    pub qos: Qos,
    pub retain: bool,
    pub payload_len: usize,
}

impl PublishReceipt {
    pub fn is_success(&self) -> bool {
        self.rc == 0
    }
}

/// Errors raised by the client library underneath the assistant
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("request failed: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("connection failed: {0}")]
    Connection(#[from] rumqttc::ConnectionError),
    #[error("link closed")]
    Closed,
    #[error("{0}")]
    Other(String),
}

/// Outbound half of an MQTT client
///
/// `subscribe` is non-blocking so hooks running on the event task can call it.
#[async_trait]
pub trait MqttLink: Send + Sync {
    /// Queue a SUBSCRIBE request
    fn subscribe(&self, topic: &str, qos: Qos) -> Result<(), LinkError>;

    /// Hand a message to the client for delivery
    async fn publish(
        &self,
        topic: &str,
        qos: Qos,
        retain: bool,
        payload: Bytes,
    ) -> Result<PublishReceipt, LinkError>;

    /// Queue a DISCONNECT request
    async fn disconnect(&self) -> Result<(), LinkError>;
}

/// Inbound half of an MQTT client; polling it drives the network
#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next event worth dispatching
    async fn next_event(&mut self) -> Result<LinkEvent, LinkError>;
}
