use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::buffer::UnpublishedBuffer;
use super::monitor::ConnectivityMonitor;
use super::record::{Event, EventRecord};
use super::store::{EventStore, OutboxError, StoreError};
use super::worker::FlushWorker;
use crate::config::OutboxConfig;

/// How an append failure is reported to the wrapped service's caller.
///
/// Store outages are never reported: the record is buffered and the call
/// succeeds. The policy only decides what happens when a reachable store
/// refuses the record; refused records are never buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitPolicy {
    /// The event is part of the operation's contract; return the failure.
    Required,
    /// Log the failure and report success.
    BestEffort,
}

/// Outcome of one flush pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushResult {
    /// Records taken from the buffer and offered to the store.
    pub attempted: usize,
    /// Records the store accepted.
    pub published: usize,
    /// Records the store refused; they are dropped, not retried.
    pub dropped: usize,
    /// Records left in the buffer afterwards.
    pub remaining: usize,
    /// The store was unreachable and nothing was attempted.
    pub skipped: bool,
}

struct Inner {
    store: Arc<dyn EventStore>,
    stream: String,
    stream_len: usize,
    monitor: ConnectivityMonitor,
    buffer: UnpublishedBuffer,
}

/// Durable outbox for one service's event stream.
///
/// Cloning creates another handle to the same buffer and store, so the
/// publish path and the background flusher share state.
///
/// ## Example
///
/// ```
/// use relaybus::config::OutboxConfig;
/// use relaybus::outbox::{EmitPolicy, Event, EventFields, InMemoryEventStore, Outbox};
///
/// struct Ping;
///
/// impl Event for Ping {
///     fn operation(&self) -> &'static str {
///         "ping"
///     }
///
///     fn encode(&self) -> EventFields {
///         EventFields::new()
///     }
/// }
///
/// let store = InMemoryEventStore::new();
/// let outbox = Outbox::new(store.clone(), &OutboxConfig::for_stream("demo"));
///
/// store.set_available(false);
/// outbox.publish(&Ping, EmitPolicy::Required).unwrap();
/// assert_eq!(outbox.pending(), 1);
///
/// store.set_available(true);
/// outbox.flush().unwrap();
/// assert_eq!(outbox.pending(), 0);
/// assert_eq!(store.len("demo"), 1);
/// ```
#[derive(Clone)]
pub struct Outbox {
    inner: Arc<Inner>,
}

impl Outbox {
    pub fn new<S: EventStore + 'static>(store: S, config: &OutboxConfig) -> Self {
        Self::from_shared(Arc::new(store), config)
    }

    pub fn from_shared(store: Arc<dyn EventStore>, config: &OutboxConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                stream: config.stream.clone(),
                stream_len: config.stream_len,
                monitor: ConnectivityMonitor::new(config.probe_timeout()),
                buffer: UnpublishedBuffer::new(config.buffer_capacity),
            }),
        }
    }

    pub fn stream(&self) -> &str {
        &self.inner.stream
    }

    /// Build the record for `event` and append it, or buffer it if the store
    /// cannot be reached.
    pub fn publish(&self, event: &dyn Event, policy: EmitPolicy) -> Result<(), OutboxError> {
        let record = EventRecord::from_event(self.inner.stream.as_str(), self.inner.stream_len, event);

        if let Err(err) = self.inner.monitor.check(&*self.inner.store) {
            debug!(stream = %self.inner.stream, operation = event.operation(), error = %err, "event store unreachable, buffering event");
            self.buffer(record)?;
            return Ok(());
        }

        match self.inner.store.append(&record) {
            Ok(id) => {
                debug!(stream = %self.inner.stream, operation = event.operation(), id = %id, "event appended");
                Ok(())
            }
            Err(err) if err.is_connection() => {
                warn!(stream = %self.inner.stream, operation = event.operation(), error = %err, "event store dropped during append, buffering event");
                self.buffer(record)?;
                Ok(())
            }
            Err(err) => match policy {
                EmitPolicy::Required => Err(OutboxError::Append(err)),
                EmitPolicy::BestEffort => {
                    warn!(stream = %self.inner.stream, operation = event.operation(), error = %err, "event rejected by store, dropping it");
                    Ok(())
                }
            },
        }
    }

    /// Retry buffered records, oldest first.
    ///
    /// Records the store accepts leave the buffer and records it refuses
    /// are dropped. When the store drops mid-way the pass stops, and the
    /// failed and untried records are put back in front of anything
    /// buffered during the pass.
    pub fn flush(&self) -> Result<FlushResult, OutboxError> {
        let buffer = &self.inner.buffer;
        if buffer.is_empty() {
            return Ok(FlushResult::default());
        }

        if let Err(err) = self.inner.monitor.check(&*self.inner.store) {
            debug!(stream = %self.inner.stream, error = %err, "event store unreachable, skipping flush");
            return Ok(FlushResult {
                remaining: buffer.len(),
                skipped: true,
                ..Default::default()
            });
        }

        let records = buffer.take_all()?;
        let attempted = records.len();
        let mut published = 0;
        let mut dropped = 0;
        let mut failed = Vec::new();
        let mut outage: Option<StoreError> = None;

        for record in records {
            if outage.is_some() {
                failed.push(record);
                continue;
            }
            match self.inner.store.append(&record) {
                Ok(_) => published += 1,
                Err(err) if err.is_connection() => {
                    outage = Some(err);
                    failed.push(record);
                }
                Err(err) => {
                    warn!(stream = %record.stream, operation = record.operation().unwrap_or_default(), error = %err, "buffered event rejected by store, dropping it");
                    dropped += 1;
                }
            }
        }

        buffer.requeue_front(failed)?;
        let remaining = buffer.len();

        if let Some(err) = outage {
            warn!(stream = %self.inner.stream, error = %err, "event store dropped during flush");
        }
        info!(stream = %self.inner.stream, attempted, published, dropped, remaining, "flushed unpublished events");

        Ok(FlushResult {
            attempted,
            published,
            dropped,
            remaining,
            skipped: false,
        })
    }

    /// Number of buffered records.
    pub fn pending(&self) -> usize {
        self.inner.buffer.len()
    }

    /// Copy of the buffered records, oldest first.
    pub fn unpublished(&self) -> Vec<EventRecord> {
        self.inner.buffer.snapshot()
    }

    /// Records dropped because the buffer was full.
    pub fn evicted(&self) -> usize {
        self.inner.buffer.evicted()
    }

    /// Start a background thread that calls [`flush`](Self::flush) every
    /// `interval` until the returned worker is stopped or dropped.
    pub fn spawn_flusher(&self, interval: Duration) -> FlushWorker {
        FlushWorker::spawn(self.clone(), interval)
    }

    fn buffer(&self, record: EventRecord) -> Result<(), OutboxError> {
        self.inner.buffer.push(record)?;
        Ok(())
    }
}
