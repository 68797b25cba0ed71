//! Per-message record handed to the on-message hook

use crate::clock;
use serde::Serialize;

/// One inbound message, stamped with the local time it was dispatched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    pub time: String,
    pub topic: String,
    pub message: String,
}

impl MessageRecord {
    /// Build a record stamped with the current time
    pub fn assemble(topic: &str, payload: &[u8]) -> Self {
        Self::new(clock::timestamp(), topic, payload)
    }

    /// Build a record with an explicit time; invalid UTF-8 is replaced, not rejected
    pub fn new(time: String, topic: &str, payload: &[u8]) -> Self {
        Self {
            time,
            topic: topic.to_string(),
            message: String::from_utf8_lossy(payload).into_owned(),
        }
    }
}
