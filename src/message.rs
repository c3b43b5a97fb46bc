use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A message exchanged over the bus.
///
/// All six fields travel on the wire; every broker variant encodes them with
/// the same `bitcode` layout.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Channel the message belongs to (topic root).
    pub channel: String,
    /// Dot-separated subtopic, possibly empty.
    pub subtopic: String,
    /// Identity of the publishing client.
    pub publisher: String,
    /// Protocol the message arrived on (`http`, `mqtt`, `coap`, ...).
    pub protocol: String,
    pub payload: Vec<u8>,
    /// Creation time in nanoseconds since the Unix epoch.
    pub created: i64,
}

impl Message {
    /// Create a message for a channel, stamped with the current time.
    pub fn new(channel: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
            created: now_nanos(),
            ..Default::default()
        }
    }

    pub fn with_subtopic(mut self, subtopic: impl Into<String>) -> Self {
        self.subtopic = subtopic.into();
        self
    }

    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = publisher.into();
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// Encode to the wire format.
    pub fn encode(&self) -> Result<Vec<u8>> {
        bitcode::serialize(self).map_err(|e| Error::Codec(e.to_string()))
    }

    /// Decode from the wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bitcode::deserialize(bytes).map_err(|e| Error::Codec(e.to_string()))
    }

    /// Get the payload as a string (if valid UTF-8).
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Current time in nanoseconds since the Unix epoch.
pub fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or_default()
}
