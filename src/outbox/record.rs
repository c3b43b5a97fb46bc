use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Flat field map appended to a stream.
pub type EventFields = BTreeMap<String, String>;

/// Field holding the operation kind of every record.
pub const OPERATION_FIELD: &str = "operation";

/// Field holding the unix time (seconds) a record was built.
pub const OCCURRED_AT_FIELD: &str = "occurred_at";

/// A domain event that can be written to a stream.
///
/// Encoding is infallible: nested values are rendered to strings by the
/// implementation, so a record can always be built for a successful call.
pub trait Event {
    /// Operation kind, e.g. `config.create`.
    fn operation(&self) -> &'static str;

    /// Domain fields of the event. `operation` and `occurred_at` are added
    /// when the record is built if the event does not set them itself.
    fn encode(&self) -> EventFields;
}

/// An outbox entry, owned by the outbox until it is appended.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct EventRecord {
    pub stream: String,
    /// Approximate length cap of the stream.
    pub max_len: usize,
    pub values: EventFields,
}

impl EventRecord {
    pub fn new(stream: impl Into<String>, max_len: usize, values: EventFields) -> Self {
        Self {
            stream: stream.into(),
            max_len,
            values,
        }
    }

    /// Build the record for `event`, tagging it with its operation and time.
    pub fn from_event(stream: impl Into<String>, max_len: usize, event: &dyn Event) -> Self {
        let mut values = event.encode();
        values
            .entry(OPERATION_FIELD.to_string())
            .or_insert_with(|| event.operation().to_string());
        values
            .entry(OCCURRED_AT_FIELD.to_string())
            .or_insert_with(|| unix_seconds().to_string());
        Self::new(stream, max_len, values)
    }

    pub fn operation(&self) -> Option<&str> {
        self.values.get(OPERATION_FIELD).map(String::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }
}

pub(crate) fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
