//! Stream store capability and outbox errors.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::record::EventRecord;

/// Errors raised by a stream store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("event store unavailable: {0}")]
    Unavailable(String),
    #[error("event store timed out after {0:?}")]
    Timeout(Duration),
    #[error("event store rejected record: {0}")]
    Rejected(String),
    #[error("lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

impl StoreError {
    /// Whether the store could not be reached, as opposed to refusing the record.
    pub fn is_connection(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

/// Errors surfaced by the outbox to a wrapped service.
#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("failed to append event: {0}")]
    Append(#[from] StoreError),
    #[error("lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

/// Append-only, length-capped log the outbox writes to.
pub trait EventStore: Send + Sync {
    /// Check the store is reachable, waiting at most `timeout`.
    fn ping(&self, timeout: Duration) -> Result<(), StoreError>;

    /// Append a record, trimming the stream to about `record.max_len`
    /// entries. Returns the id the store assigned.
    fn append(&self, record: &EventRecord) -> Result<String, StoreError>;
}

impl<T: EventStore + ?Sized> EventStore for Arc<T> {
    fn ping(&self, timeout: Duration) -> Result<(), StoreError> {
        (**self).ping(timeout)
    }

    fn append(&self, record: &EventRecord) -> Result<String, StoreError> {
        (**self).append(record)
    }
}

impl<T: EventStore + ?Sized> EventStore for Box<T> {
    fn ping(&self, timeout: Duration) -> Result<(), StoreError> {
        (**self).ping(timeout)
    }

    fn append(&self, record: &EventRecord) -> Result<String, StoreError> {
        (**self).append(record)
    }
}
