//! Subscription bookkeeping shared by every broker client.
//!
//! The registry maps `(client id, topic)` to the active handler and the
//! transport-specific binding that feeds it. Transports supply the binding
//! through a closure, so replace and remove semantics are the same
//! everywhere.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::handler::MessageHandler;
use crate::error::{Error, Result};
use crate::topic;

/// A transport's native subscription, detached when the entry goes away.
pub trait Binding: Send {
    fn unbind(self) -> Result<()>;
}

/// Key of a subscription.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub client_id: String,
    pub topic: String,
}

impl SubscriptionKey {
    pub fn new(client_id: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            topic: topic.into(),
        }
    }
}

struct Subscription<B> {
    handler: Arc<dyn MessageHandler>,
    binding: B,
}

/// Reject empty client ids and topics before touching the transport.
pub fn validate(id: &str, topic: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::EmptyId);
    }
    if topic.is_empty() {
        return Err(Error::EmptyTopic);
    }
    Ok(())
}

/// Registry of active subscriptions for one broker client.
pub struct SubscriptionRegistry<B> {
    subscriptions: Mutex<HashMap<SubscriptionKey, Subscription<B>>>,
}

impl<B> Default for SubscriptionRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> SubscriptionRegistry<B> {
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.lock().map(|s| s.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `(id, topic)` currently has a subscription.
    pub fn contains(&self, id: &str, topic: &str) -> bool {
        self.subscriptions
            .lock()
            .map(|s| s.contains_key(&SubscriptionKey::new(id, topic)))
            .unwrap_or_default()
    }

    /// Visit the binding of every subscription whose topic matches `subject`.
    pub fn route<F>(&self, subject: &str, mut visit: F) -> Result<usize>
    where
        F: FnMut(&SubscriptionKey, &B),
    {
        let subscriptions = self
            .subscriptions
            .lock()
            .map_err(|_| Error::LockPoisoned("route"))?;

        let mut matched = 0;
        for (key, sub) in subscriptions.iter() {
            if topic::matches(&key.topic, subject) {
                visit(key, &sub.binding);
                matched += 1;
            }
        }
        Ok(matched)
    }
}

impl<B: Binding> SubscriptionRegistry<B> {
    /// Register `handler` for `(id, topic)`, binding it with `bind`.
    ///
    /// An existing entry is cancelled first; a failed cancel leaves it in
    /// place and is returned as `HandlerCancel`. The registry lock is not
    /// held while `cancel`, `bind` or `unbind` run, so handlers and
    /// transports may call back into the registry.
    ///
    /// If `bind` fails after the existing handler was cancelled, that entry
    /// is removed and detached as well: the key ends up unsubscribed.
    pub fn subscribe<F>(
        &self,
        id: &str,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
        bind: F,
    ) -> Result<()>
    where
        F: FnOnce(Arc<dyn MessageHandler>) -> Result<B>,
    {
        validate(id, topic)?;

        let key = SubscriptionKey::new(id, topic);
        let existing = self
            .subscriptions
            .lock()
            .map_err(|_| Error::LockPoisoned("subscribe"))?
            .get(&key)
            .map(|sub| Arc::clone(&sub.handler));

        if let Some(existing) = &existing {
            existing.cancel().map_err(Error::HandlerCancel)?;
        }

        let binding = match bind(Arc::clone(&handler)) {
            Ok(binding) => binding,
            Err(err) => {
                if let Some(existing) = &existing {
                    self.remove_cancelled(&key, existing);
                }
                return Err(err);
            }
        };

        let replaced = match self.subscriptions.lock() {
            Ok(mut subscriptions) => subscriptions.insert(key, Subscription { handler, binding }),
            Err(_) => {
                if let Err(err) = binding.unbind() {
                    warn!(client_id = %id, topic = %topic, error = %err, "failed to detach new subscription");
                }
                return Err(Error::LockPoisoned("subscribe"));
            }
        };

        if let Some(old) = replaced {
            // A concurrent subscribe may have slipped in after the cancel.
            let cancelled = existing
                .as_ref()
                .is_some_and(|e| Arc::ptr_eq(e, &old.handler));
            if !cancelled {
                if let Err(err) = old.handler.cancel() {
                    warn!(client_id = %id, topic = %topic, error = %err, "handler cancel failed on replace");
                }
            }
            if let Err(err) = old.binding.unbind() {
                warn!(client_id = %id, topic = %topic, error = %err, "failed to detach replaced subscription");
            }
        }
        debug!(client_id = %id, topic = %topic, "subscribed");
        Ok(())
    }

    fn remove_cancelled(&self, key: &SubscriptionKey, cancelled: &Arc<dyn MessageHandler>) {
        let removed = match self.subscriptions.lock() {
            Ok(mut subscriptions) => {
                let same = subscriptions
                    .get(key)
                    .is_some_and(|sub| Arc::ptr_eq(&sub.handler, cancelled));
                if same {
                    subscriptions.remove(key)
                } else {
                    None
                }
            }
            Err(_) => None,
        };
        if let Some(sub) = removed {
            if let Err(err) = sub.binding.unbind() {
                warn!(client_id = %key.client_id, topic = %key.topic, error = %err, "failed to detach cancelled subscription");
            }
        }
    }

    /// Remove the entry for `(id, topic)`.
    ///
    /// The entry is gone once this returns, whatever the result; a failing
    /// cancel is reported ahead of a failing unbind.
    pub fn unsubscribe(&self, id: &str, topic: &str) -> Result<()> {
        validate(id, topic)?;

        let removed = self
            .subscriptions
            .lock()
            .map_err(|_| Error::LockPoisoned("unsubscribe"))?
            .remove(&SubscriptionKey::new(id, topic))
            .ok_or(Error::NotSubscribed)?;

        let cancelled = removed.handler.cancel().map_err(Error::HandlerCancel);
        let unbound = removed.binding.unbind();
        debug!(client_id = %id, topic = %topic, "unsubscribed");
        cancelled.and(unbound)
    }

    /// Cancel and detach every subscription.
    pub fn clear(&self) -> Result<()> {
        let drained: Vec<_> = self
            .subscriptions
            .lock()
            .map_err(|_| Error::LockPoisoned("clear"))?
            .drain()
            .collect();

        for (key, sub) in drained {
            if let Err(err) = sub.handler.cancel() {
                warn!(client_id = %key.client_id, topic = %key.topic, error = %err, "handler cancel failed on close");
            }
            if let Err(err) = sub.binding.unbind() {
                warn!(client_id = %key.client_id, topic = %key.topic, error = %err, "failed to detach subscription on close");
            }
        }
        Ok(())
    }
}
