//! Stream store that appends through a broker client.
//!
//! Each record becomes a [`Message`] on the events channel, with the stream
//! name as subtopic and the field map as a JSON payload. Trimming is left to
//! the broker's own retention.

use std::time::Duration;

use tracing::debug;

use super::record::EventRecord;
use super::store::{EventStore, StoreError};
use crate::bus::Publisher;
use crate::error::Error;
use crate::message::Message;

/// Channel carrying outbox records.
pub const EVENTS_CHANNEL: &str = "events";

const PUBLISHER_ID: &str = "outbox";
const PROTOCOL: &str = "event";

pub struct BrokerEventStore<P> {
    publisher: P,
    channel: String,
}

impl<P: Publisher> BrokerEventStore<P> {
    pub fn new(publisher: P) -> Self {
        Self::with_channel(publisher, EVENTS_CHANNEL)
    }

    pub fn with_channel(publisher: P, channel: impl Into<String>) -> Self {
        Self {
            publisher,
            channel: channel.into(),
        }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }
}

fn store_error(err: Error) -> StoreError {
    if err.is_connection() {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Rejected(err.to_string())
    }
}

impl<P: Publisher> EventStore for BrokerEventStore<P> {
    fn ping(&self, timeout: Duration) -> Result<(), StoreError> {
        self.publisher.ping(timeout).map_err(store_error)
    }

    fn append(&self, record: &EventRecord) -> Result<String, StoreError> {
        let payload = serde_json::to_vec(&record.values)
            .map_err(|e| StoreError::Rejected(format!("failed to encode record: {}", e)))?;
        let msg = Message::new(self.channel.as_str(), payload)
            .with_subtopic(record.stream.as_str())
            .with_publisher(PUBLISHER_ID)
            .with_protocol(PROTOCOL);

        self.publisher
            .publish(&self.channel, &msg)
            .map_err(store_error)?;

        debug!(stream = %record.stream, channel = %self.channel, "event appended through broker");
        Ok(format!("{}-{}", record.stream, msg.created))
    }
}
