//! Mock implementations for testing
//!
//! [`MockLink`] records every request and [`MockEvents`] replays events pushed
//! through a [`MockFeed`], so the assistant can be driven without a broker.

use crate::config::Qos;
use crate::transport::{EventSource, LinkError, LinkEvent, MqttLink, PublishReceipt};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Topic, payload, QoS and retain flag of one recorded publish
pub type PublishedMessage = (String, Vec<u8>, Qos, bool);

/// Create a link and event source wired together like a real session
///
/// Disconnecting the link makes the event source yield [`LinkEvent::Closed`].
pub fn mock_session() -> (MockLink, MockEvents, MockFeed) {
    let (events, feed) = MockEvents::channel();
    let link = MockLink::with_feed(feed.clone());
    (link, events, feed)
}

/// Mock client that records requests
#[derive(Debug, Clone, Default)]
pub struct MockLink {
    pub subscriptions: Arc<Mutex<Vec<(String, Qos)>>>,
    pub published: Arc<Mutex<Vec<PublishedMessage>>>,
    pub disconnects: Arc<AtomicUsize>,
    pub should_fail: bool,
    publish_rc: Arc<AtomicU8>,
    feed: Option<MockFeed>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(feed: MockFeed) -> Self {
        Self {
            feed: Some(feed),
            ..Default::default()
        }
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    /// Make subsequent publishes report this return code
    pub fn set_publish_rc(&self, rc: u8) {
        self.publish_rc.store(rc, Ordering::SeqCst);
    }

    pub fn get_subscriptions(&self) -> Vec<(String, Qos)> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn get_published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap().clone()
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MqttLink for MockLink {
    fn subscribe(&self, topic: &str, qos: Qos) -> Result<(), LinkError> {
        if self.should_fail {
            return Err(LinkError::Other("Mock subscribe failure".to_string()));
        }
        self.subscriptions
            .lock()
            .unwrap()
            .push((topic.to_string(), qos));
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        qos: Qos,
        retain: bool,
        payload: Bytes,
    ) -> Result<PublishReceipt, LinkError> {
        if self.should_fail {
            return Err(LinkError::Other("Mock publish failure".to_string()));
        }

        let rc = self.publish_rc.load(Ordering::SeqCst);
        let payload_len = payload.len();
        if rc == 0 {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_vec(), qos, retain));
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
        if self.should_fail {
            return Err(LinkError::Other("Mock disconnect failure".to_string()));
        }
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        if let Some(feed) = &self.feed {
            feed.send(LinkEvent::Closed);
        }
        Ok(())
    }
}

/// Sending side used by tests to script broker behaviour
#[derive(Debug, Clone)]
pub struct MockFeed {
    tx: mpsc::UnboundedSender<Result<LinkEvent, LinkError>>,
}

impl MockFeed {
    pub fn send(&self, event: LinkEvent) {
        let _ = self.tx.send(Ok(event));
    }

    pub fn connack(&self, code: u8) {
        self.send(LinkEvent::ConnAck {
            code,
            session_present: false,
        });
    }

    pub fn message(&self, topic: &str, payload: &str) {
        self.send(LinkEvent::Message {
            topic: topic.to_string(),
            payload: Bytes::from(payload.to_string()),
            qos: Qos::AtMostOnce,
            retain: false,
        });
    }

    pub fn published(&self, pkid: u16) {
        self.send(LinkEvent::Published { pkid });
    }

    pub fn network_error(&self, reason: &str) {
        let _ = self.tx.send(Err(LinkError::Other(reason.to_string())));
    }
}

/// Event source fed by a [`MockFeed`]; idles once every feed is dropped
pub struct MockEvents {
    rx: mpsc::UnboundedReceiver<Result<LinkEvent, LinkError>>,
}

impl MockEvents {
    pub fn channel() -> (MockEvents, MockFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        (MockEvents { rx }, MockFeed { tx })
    }
}

#[async_trait]
impl EventSource for MockEvents {
    async fn next_event(&mut self) -> Result<LinkEvent, LinkError> {
        match self.rx.recv().await {
            Some(next) => next,
            None => std::future::pending().await,
        }
    }
}
