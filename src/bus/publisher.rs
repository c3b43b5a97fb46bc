//! Core publisher trait for broker clients.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::message::Message;

/// Trait for publishing messages to a broker.
///
/// Implementations:
/// - `InMemoryBroker` - For testing and single-process scenarios
/// - `NatsPubSub` - For NATS (feature `nats`)
/// - `AmqpPubSub` - For RabbitMQ and other AMQP 0-9-1 brokers (feature `amqp`)
pub trait Publisher: Send + Sync {
    /// Publish a message on a channel.
    ///
    /// `topic` is the channel id; the wire destination is derived from it and
    /// the message's subtopic. Fails with `EmptyTopic` when `topic` is empty,
    /// `EmptyChannel` when the message carries no channel, `MalformedTopic`
    /// when the two disagree, and `Connection` when the transport call fails.
    fn publish(&self, topic: &str, msg: &Message) -> Result<()>;

    /// Check that the transport is reachable, waiting at most `timeout`.
    fn ping(&self, timeout: Duration) -> Result<()>;

    /// Release the underlying connection. Calling it again is a no-op.
    fn close(&self) -> Result<()>;
}

impl<T: Publisher + ?Sized> Publisher for Arc<T> {
    fn publish(&self, topic: &str, msg: &Message) -> Result<()> {
        (**self).publish(topic, msg)
    }

    fn ping(&self, timeout: Duration) -> Result<()> {
        (**self).ping(timeout)
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}

impl<T: Publisher + ?Sized> Publisher for Box<T> {
    fn publish(&self, topic: &str, msg: &Message) -> Result<()> {
        (**self).publish(topic, msg)
    }

    fn ping(&self, timeout: Duration) -> Result<()> {
        (**self).ping(timeout)
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}

/// Argument checks shared by every client, run before any wire activity.
pub(crate) fn check_publish(topic: &str, msg: &Message) -> Result<()> {
    if topic.is_empty() {
        return Err(Error::EmptyTopic);
    }
    if msg.channel.is_empty() {
        return Err(Error::EmptyChannel);
    }
    if msg.channel != topic {
        return Err(Error::MalformedTopic(format!(
            "message channel {} does not match topic {}",
            msg.channel, topic
        )));
    }
    Ok(())
}
