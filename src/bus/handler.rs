//! Message handler capability.

use crate::error::BoxError;
use crate::message::Message;

/// Receives messages for one subscription.
///
/// `handle` is called once per delivered message, never concurrently with
/// itself for the same subscription. `cancel` is called when the
/// subscription is replaced or removed, before the transport detaches.
pub trait MessageHandler: Send + Sync {
    /// Process a delivered message. Errors are logged by the transport; the
    /// subscription stays active.
    fn handle(&self, msg: &Message) -> Result<(), BoxError>;

    /// Detach cleanly.
    fn cancel(&self) -> Result<(), BoxError>;
}

/// Handler built from a closure, with a no-op `cancel`.
pub struct FnHandler<F>(F);

impl<F> MessageHandler for FnHandler<F>
where
    F: Fn(&Message) -> Result<(), BoxError> + Send + Sync,
{
    fn handle(&self, msg: &Message) -> Result<(), BoxError> {
        (self.0)(msg)
    }

    fn cancel(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Wrap a closure as a [`MessageHandler`].
///
/// ```
/// use relaybus::bus::{handler_fn, MessageHandler};
/// use relaybus::Message;
///
/// let handler = handler_fn(|msg| {
///     assert_eq!(msg.channel, "c1");
///     Ok(())
/// });
/// handler.handle(&Message::new("c1", "on")).unwrap();
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&Message) -> Result<(), BoxError> + Send + Sync,
{
    FnHandler(f)
}
