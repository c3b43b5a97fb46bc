use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tracing::warn;

use super::record::EventRecord;
use super::store::OutboxError;

/// Records waiting for the stream store to come back, oldest first.
///
/// The buffer is bounded: once `capacity` is reached the oldest record is
/// evicted to make room. Evictions are counted and logged.
pub struct UnpublishedBuffer {
    records: Mutex<VecDeque<EventRecord>>,
    capacity: usize,
    evicted: AtomicUsize,
}

impl UnpublishedBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            evicted: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a record. Returns the evicted record, if the buffer was full.
    pub fn push(&self, record: EventRecord) -> Result<Option<EventRecord>, OutboxError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| OutboxError::LockPoisoned("buffer push"))?;
        records.push_back(record);
        Ok(self.evict_overflow(&mut records).pop())
    }

    /// Remove and return every buffered record.
    pub fn take_all(&self) -> Result<Vec<EventRecord>, OutboxError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| OutboxError::LockPoisoned("buffer drain"))?;
        Ok(records.drain(..).collect())
    }

    /// Put records back ahead of anything buffered since they were taken.
    /// Returns how many records were evicted to stay within capacity.
    pub fn requeue_front(&self, failed: Vec<EventRecord>) -> Result<usize, OutboxError> {
        if failed.is_empty() {
            return Ok(0);
        }
        let mut records = self
            .records
            .lock()
            .map_err(|_| OutboxError::LockPoisoned("buffer requeue"))?;
        for record in failed.into_iter().rev() {
            records.push_front(record);
        }
        Ok(self.evict_overflow(&mut records).len())
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the buffered records, oldest first.
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.records
            .lock()
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Total number of records dropped for lack of room.
    pub fn evicted(&self) -> usize {
        self.evicted.load(Ordering::SeqCst)
    }

    fn evict_overflow(&self, records: &mut VecDeque<EventRecord>) -> Vec<EventRecord> {
        let mut dropped = Vec::new();
        while records.len() > self.capacity {
            if let Some(oldest) = records.pop_front() {
                warn!(
                    stream = %oldest.stream,
                    operation = oldest.operation().unwrap_or_default(),
                    capacity = self.capacity,
                    "unpublished buffer full, evicting oldest event"
                );
                dropped.push(oldest);
            }
        }
        self.evicted.fetch_add(dropped.len(), Ordering::SeqCst);
        dropped
    }
}
