//! In-process stream store.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use super::record::{EventFields, EventRecord};
use super::store::{EventStore, StoreError};

/// An appended stream entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredEntry {
    pub id: String,
    pub values: EventFields,
}

struct Inner {
    streams: RwLock<HashMap<String, VecDeque<StoredEntry>>>,
    available: AtomicBool,
    latency_ms: AtomicU64,
    failing_appends: AtomicUsize,
    sequence: AtomicU64,
}

/// Thread-safe in-memory stream store.
///
/// Cloning creates another handle to the same streams. Besides acting as a
/// real store for single-process setups it can simulate outages
/// ([`set_available`](Self::set_available)), slow probes
/// ([`set_latency`](Self::set_latency)) and rejected appends
/// ([`fail_next_appends`](Self::fail_next_appends)).
#[derive(Clone)]
pub struct InMemoryEventStore {
    inner: Arc<Inner>,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                streams: RwLock::new(HashMap::new()),
                available: AtomicBool::new(true),
                latency_ms: AtomicU64::new(0),
                failing_appends: AtomicUsize::new(0),
                sequence: AtomicU64::new(0),
            }),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Delay every ping by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.inner
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Reject the next `n` appends with `StoreError::Rejected`.
    pub fn fail_next_appends(&self, n: usize) {
        self.inner.failing_appends.store(n, Ordering::SeqCst);
    }

    /// Entries of one stream, oldest first.
    pub fn entries(&self, stream: &str) -> Vec<StoredEntry> {
        self.inner
            .streams
            .read()
            .ok()
            .and_then(|streams| streams.get(stream).map(|s| s.iter().cloned().collect()))
            .unwrap_or_default()
    }

    /// Number of entries in one stream.
    pub fn len(&self, stream: &str) -> usize {
        self.inner
            .streams
            .read()
            .ok()
            .and_then(|streams| streams.get(stream).map(VecDeque::len))
            .unwrap_or_default()
    }

    pub fn is_empty(&self, stream: &str) -> bool {
        self.len(stream) == 0
    }

    fn take_injected_failure(&self) -> bool {
        self.inner
            .failing_appends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl EventStore for InMemoryEventStore {
    fn ping(&self, timeout: Duration) -> Result<(), StoreError> {
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store offline".into()));
        }
        let latency = Duration::from_millis(self.inner.latency_ms.load(Ordering::SeqCst));
        if latency > timeout {
            thread::sleep(timeout);
            return Err(StoreError::Timeout(timeout));
        }
        if !latency.is_zero() {
            thread::sleep(latency);
        }
        Ok(())
    }

    fn append(&self, record: &EventRecord) -> Result<String, StoreError> {
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store offline".into()));
        }
        if self.take_injected_failure() {
            return Err(StoreError::Rejected("injected append failure".into()));
        }

        let seq = self.inner.sequence.fetch_add(1, Ordering::SeqCst);
        let id = format!("{}-{}", super::record::unix_seconds() * 1000, seq);

        let mut streams = self
            .inner
            .streams
            .write()
            .map_err(|_| StoreError::LockPoisoned("append"))?;
        let stream = streams.entry(record.stream.clone()).or_default();
        stream.push_back(StoredEntry {
            id: id.clone(),
            values: record.values.clone(),
        });
        while record.max_len > 0 && stream.len() > record.max_len {
            stream.pop_front();
        }
        Ok(id)
    }
}
