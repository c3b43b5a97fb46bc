pub mod bootstrap;
pub mod bus;
pub mod config;
mod error;
mod message;
pub mod outbox;
pub mod policies;
pub mod topic;

pub use bus::{connect, Bus, MessageHandler, PubSub, Publisher, Subscriber};
pub use config::{BrokerConfig, BrokerKind, OutboxConfig};
pub use error::{BoxError, Error, Result};
pub use message::{now_nanos, Message};
pub use outbox::{EmitPolicy, Event, EventRecord, EventStore, Outbox, OutboxError, StoreError};
