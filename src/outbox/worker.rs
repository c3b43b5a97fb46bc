//! Background flush of unpublished events.

use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use super::outbox::Outbox;

/// Statistics from a flush worker.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushStats {
    /// Flush passes run.
    pub ticks: usize,
    /// Passes skipped because the store was unreachable.
    pub skipped: usize,
    pub published: usize,
    /// Appends that failed and were left in the buffer.
    pub failed: usize,
    /// Records the store refused and that were dropped.
    pub dropped: usize,
}

/// A background thread that periodically flushes an outbox.
///
/// Stopping (or dropping) the worker is the cancellation signal: the thread
/// exits before its next pass and does not touch the buffer afterwards. A
/// pass already running is allowed to finish.
///
/// ## Example
///
/// ```
/// use std::time::Duration;
/// use relaybus::config::OutboxConfig;
/// use relaybus::outbox::{InMemoryEventStore, Outbox};
///
/// let outbox = Outbox::new(InMemoryEventStore::new(), &OutboxConfig::for_stream("demo"));
/// let worker = outbox.spawn_flusher(Duration::from_millis(10));
///
/// // ... serve requests ...
///
/// let stats = worker.stop();
/// assert_eq!(stats.failed, 0);
/// ```
pub struct FlushWorker {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<FlushStats>>,
}

impl FlushWorker {
    /// Spawn a worker flushing `outbox` every `interval`.
    pub fn spawn(outbox: Outbox, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = channel();

        let handle = thread::spawn(move || {
            let mut stats = FlushStats::default();
            debug!(stream = %outbox.stream(), ?interval, "flush worker started");

            loop {
                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }

                stats.ticks += 1;
                match outbox.flush() {
                    Ok(result) => {
                        if result.skipped {
                            stats.skipped += 1;
                        }
                        stats.published += result.published;
                        stats.dropped += result.dropped;
                        stats.failed += result.attempted - result.published - result.dropped;
                    }
                    Err(err) => {
                        warn!(stream = %outbox.stream(), error = %err, "flush failed");
                    }
                }
            }

            debug!(stream = %outbox.stream(), ticks = stats.ticks, "flush worker stopped");
            stats
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signal the worker to stop and wait for it to finish.
    /// Returns the worker statistics.
    pub fn stop(mut self) -> FlushStats {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap_or_default()
        } else {
            FlushStats::default()
        }
    }

    /// Signal the worker to stop without waiting.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(());
    }
}

impl Drop for FlushWorker {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}
