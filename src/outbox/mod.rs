//! Durable outbox - event-store middleware support
//!
//! Domain services wrap themselves in a decorator that turns every
//! successful call into an [`Event`] and hands it to an [`Outbox`]. The
//! outbox probes the stream store with a short timeout, appends inline when
//! it answers, and otherwise keeps the record in a bounded
//! [`UnpublishedBuffer`] until a [`FlushWorker`] gets it through.
//!
//! ```text
//! service call ──ok──▶ Event ──▶ Outbox::publish
//!                                    │
//!                      ConnectivityMonitor::check
//!                        │ reachable          │ unreachable
//!                        ▼                    ▼
//!                  EventStore::append   UnpublishedBuffer
//!                                             │
//!                          FlushWorker ── Outbox::flush (FIFO)
//! ```
//!
//! Stores: [`InMemoryEventStore`], [`BrokerEventStore`] (appends through a
//! bus [`Publisher`](crate::bus::Publisher)) and `RedisEventStore`
//! (feature `redis`).

mod broker;
mod buffer;
mod memory;
mod monitor;
mod outbox;
mod record;
#[cfg(feature = "redis")]
mod redis;
mod store;
mod worker;

pub use broker::{BrokerEventStore, EVENTS_CHANNEL};
pub use buffer::UnpublishedBuffer;
pub use memory::{InMemoryEventStore, StoredEntry};
pub use monitor::ConnectivityMonitor;
pub use outbox::{EmitPolicy, FlushResult, Outbox};
pub use record::{Event, EventFields, EventRecord, OCCURRED_AT_FIELD, OPERATION_FIELD};
#[cfg(feature = "redis")]
pub use self::redis::RedisEventStore;
pub use store::{EventStore, OutboxError, StoreError};
pub use worker::{FlushStats, FlushWorker};
