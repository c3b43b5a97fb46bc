//! Bus - the publish path shared by domain services.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::handler::MessageHandler;
use super::memory::InMemoryBroker;
use super::publisher::Publisher;
use super::subscriber::{PubSub, Subscriber};
use crate::config::{BrokerConfig, BrokerKind};
use crate::error::Result;
use crate::message::Message;

/// Service bus - a cheap, cloneable handle on the active broker client.
///
/// The Bus holds no state of its own; every call goes straight to the
/// client it was built with. Each process typically creates one with
/// [`connect`] and hands clones to its producers and consumers.
///
/// ## Example
///
/// ```
/// use relaybus::bus::{Bus, InMemoryBroker};
/// use relaybus::{Message, Publisher};
///
/// let bus = Bus::new(InMemoryBroker::new());
/// bus.publish("c1", &Message::new("c1", "22.5").with_subtopic("temperature"))
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct Bus {
    client: Arc<dyn PubSub>,
}

impl Bus {
    /// Create a bus over the given broker client.
    pub fn new<C: PubSub + 'static>(client: C) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Create a bus over an already shared client.
    pub fn from_shared(client: Arc<dyn PubSub>) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying client.
    pub fn client(&self) -> &Arc<dyn PubSub> {
        &self.client
    }
}

impl Publisher for Bus {
    fn publish(&self, topic: &str, msg: &Message) -> Result<()> {
        debug!(topic = %topic, subtopic = %msg.subtopic, bytes = msg.payload.len(), "bus publish");
        self.client.publish(topic, msg)
    }

    fn ping(&self, timeout: Duration) -> Result<()> {
        self.client.ping(timeout)
    }

    fn close(&self) -> Result<()> {
        self.client.close()
    }
}

impl Subscriber for Bus {
    fn subscribe(&self, id: &str, topic: &str, handler: Arc<dyn MessageHandler>) -> Result<()> {
        self.client.subscribe(id, topic, handler)
    }

    fn unsubscribe(&self, id: &str, topic: &str) -> Result<()> {
        self.client.unsubscribe(id, topic)
    }
}

/// Connect the broker client selected by `config`.
///
/// Transports compiled out of this build fail with `Error::Config`.
pub fn connect(config: &BrokerConfig) -> Result<Bus> {
    config.validate()?;

    let bus = match config.kind {
        BrokerKind::Memory => Bus::new(InMemoryBroker::with_prefix(config.prefix.clone())),
        BrokerKind::Nats => connect_nats(config)?,
        BrokerKind::Amqp => connect_amqp(config)?,
    };
    info!(kind = %config.kind, url = %config.url, "broker client connected");
    Ok(bus)
}

#[cfg(feature = "nats")]
fn connect_nats(config: &BrokerConfig) -> Result<Bus> {
    super::nats::NatsPubSub::connect(&config.url, &config.prefix).map(Bus::new)
}

#[cfg(not(feature = "nats"))]
fn connect_nats(_config: &BrokerConfig) -> Result<Bus> {
    Err(crate::error::Error::Config(
        "NATS support requires the `nats` feature".into(),
    ))
}

#[cfg(feature = "amqp")]
fn connect_amqp(config: &BrokerConfig) -> Result<Bus> {
    super::amqp::AmqpPubSub::connect(&config.url, &config.prefix, &config.exchange).map(Bus::new)
}

#[cfg(not(feature = "amqp"))]
fn connect_amqp(_config: &BrokerConfig) -> Result<Bus> {
    Err(crate::error::Error::Config(
        "AMQP support requires the `amqp` feature".into(),
    ))
}
