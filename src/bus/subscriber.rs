//! Core subscriber traits for broker clients.

use std::sync::Arc;

use super::handler::MessageHandler;
use super::publisher::Publisher;
use crate::error::Result;

/// Trait for push-based subscriptions keyed by `(client id, topic)`.
pub trait Subscriber: Send + Sync {
    /// Subscribe `handler` to `topic` on behalf of client `id`.
    ///
    /// Subscribing the same `(id, topic)` again replaces the previous handler
    /// after cancelling it; if that cancel fails the old subscription is kept
    /// and the error is returned.
    fn subscribe(&self, id: &str, topic: &str, handler: Arc<dyn MessageHandler>) -> Result<()>;

    /// Remove the subscription for `(id, topic)`.
    ///
    /// Fails with `NotSubscribed` if there is none. The subscription is
    /// removed even when the handler's cancel fails; that error is returned.
    fn unsubscribe(&self, id: &str, topic: &str) -> Result<()>;
}

impl<T: Subscriber + ?Sized> Subscriber for Arc<T> {
    fn subscribe(&self, id: &str, topic: &str, handler: Arc<dyn MessageHandler>) -> Result<()> {
        (**self).subscribe(id, topic, handler)
    }

    fn unsubscribe(&self, id: &str, topic: &str) -> Result<()> {
        (**self).unsubscribe(id, topic)
    }
}

/// Combined trait for bidirectional broker communication.
pub trait PubSub: Publisher + Subscriber {}

// Blanket implementation
impl<T: Publisher + Subscriber + ?Sized> PubSub for T {}
