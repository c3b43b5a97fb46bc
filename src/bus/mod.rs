//! Broker clients - publish and subscribe over channel topics
//!
//! Every transport implements the same two traits, so domain code only ever
//! sees a [`Bus`] or an `Arc<dyn PubSub>`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Bus (per process)                         │
//! │  - Cloneable handle on one broker client                    │
//! │  - publish() / subscribe() / unsubscribe() / close()        │
//! └─────────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Publisher + Subscriber Traits                   │
//! │  Publisher: publish(channel, msg) / ping() / close()        │
//! │  Subscriber: subscribe(id, topic, handler) / unsubscribe()  │
//! └─────────────────────────────────────────────────────────────┘
//!          │                  │                     │
//!          ▼                  ▼                     ▼
//! ┌──────────────┐    ┌─────────────┐    ┌─────────────────────┐
//! │InMemoryBroker│    │ NatsPubSub  │    │    AmqpPubSub       │
//! │  (always)    │    │  (`nats`)   │    │     (`amqp`)        │
//! └──────────────┘    └─────────────┘    └─────────────────────┘
//!          │                  │                     │
//!          └──────────────────┴─────────────────────┘
//!                            │
//!                            ▼
//!               SubscriptionRegistry<Binding>
//! ```
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use relaybus::bus::{connect, handler_fn, Publisher, Subscriber};
//! use relaybus::config::BrokerConfig;
//! use relaybus::Message;
//!
//! let bus = connect(&BrokerConfig::default()).unwrap();
//! bus.subscribe("writer", "channels.>", Arc::new(handler_fn(|_| Ok(())))).unwrap();
//! bus.publish("c1", &Message::new("c1", "on")).unwrap();
//! bus.close().unwrap();
//! ```

#[cfg(feature = "amqp")]
mod amqp;
mod bus;
mod handler;
mod memory;
#[cfg(feature = "nats")]
mod nats;
mod publisher;
mod registry;
mod subscriber;

#[cfg(feature = "amqp")]
pub use amqp::{routing_key, AmqpPubSub};
pub use bus::{connect, Bus};
pub use handler::{handler_fn, FnHandler, MessageHandler};
pub use memory::InMemoryBroker;
#[cfg(feature = "nats")]
pub use nats::NatsPubSub;
pub use publisher::Publisher;
pub use registry::{validate, Binding, SubscriptionKey, SubscriptionRegistry};
pub use subscriber::{PubSub, Subscriber};
