//! Bounded-timeout liveness probe for the stream store.

use std::time::{Duration, Instant};

use tracing::debug;

use super::store::{EventStore, StoreError};

/// Probes a store, treating any answer slower than `timeout` as a failure.
///
/// The store is expected to honor the timeout passed to its `ping`; the
/// elapsed-time check only catches stores that do not.
#[derive(Debug, Clone, Copy)]
pub struct ConnectivityMonitor {
    timeout: Duration,
}

impl ConnectivityMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn check<S: EventStore + ?Sized>(&self, store: &S) -> Result<(), StoreError> {
        let started = Instant::now();
        let result = store.ping(self.timeout);
        let elapsed = started.elapsed();

        match result {
            Ok(()) if elapsed > self.timeout => {
                debug!(?elapsed, timeout = ?self.timeout, "event store answered too late");
                Err(StoreError::Timeout(self.timeout))
            }
            other => other,
        }
    }

    pub fn is_reachable<S: EventStore + ?Sized>(&self, store: &S) -> bool {
        self.check(store).is_ok()
    }
}
