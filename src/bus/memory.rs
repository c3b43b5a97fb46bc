//! In-memory broker for testing and single-process deployments.
//!
//! Messages go through the same wire encoding as the network transports and
//! are routed with the same topic rules, so code exercised against this
//! broker behaves the same against NATS or AMQP.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::handler::MessageHandler;
use super::publisher::{check_publish, Publisher};
use super::registry::{Binding, SubscriptionRegistry};
use super::subscriber::Subscriber;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::topic::{self, CHANNELS_PREFIX};

/// Per-subscription delivery queue drained by a dedicated thread.
///
/// One thread per subscription keeps delivery ordered within a subscription
/// while different subscriptions run independently.
struct Delivery {
    tx: mpsc::Sender<Arc<Vec<u8>>>,
}

impl Binding for Delivery {
    fn unbind(self) -> Result<()> {
        // Dropping the sender ends the delivery thread once it drains.
        drop(self.tx);
        Ok(())
    }
}

struct Inner {
    prefix: String,
    registry: SubscriptionRegistry<Delivery>,
    available: AtomicBool,
    closed: AtomicBool,
    /// Present only on recording brokers.
    published: Option<RwLock<Vec<(String, Message)>>>,
}

/// In-process broker client.
///
/// Features:
/// - Thread-safe (can be shared across threads via `Clone`)
/// - Wildcard subscriptions (`channels.>`, `channels.c1.>`)
/// - Outage simulation via [`InMemoryBroker::set_available`]
/// - Optional log of every published `(subject, message)` pair
///   ([`InMemoryBroker::recording`])
///
/// ## Example
///
/// ```
/// use std::sync::{mpsc, Arc, Mutex};
/// use std::time::Duration;
/// use relaybus::bus::{handler_fn, InMemoryBroker, Publisher, Subscriber};
/// use relaybus::Message;
///
/// let broker = InMemoryBroker::new();
/// let (tx, rx) = mpsc::channel();
/// let tx = Mutex::new(tx);
///
/// broker
///     .subscribe("client-1", "channels.>", Arc::new(handler_fn(move |msg| {
///         tx.lock().unwrap().send(msg.clone()).unwrap();
///         Ok(())
///     })))
///     .unwrap();
///
/// broker.publish("c1", &Message::new("c1", "on").with_subtopic("engine")).unwrap();
///
/// let received = rx.recv_timeout(Duration::from_secs(1)).unwrap();
/// assert_eq!(received.subtopic, "engine");
/// ```
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    /// Create a broker publishing under the `channels` prefix.
    pub fn new() -> Self {
        Self::with_prefix(CHANNELS_PREFIX)
    }

    /// Create a broker publishing under a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::build(prefix.into(), false)
    }

    /// Create a broker that keeps every published message for inspection.
    /// The log is never trimmed, so this is meant for tests.
    pub fn recording() -> Self {
        Self::build(CHANNELS_PREFIX.to_string(), true)
    }

    fn build(prefix: String, record: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                prefix,
                registry: SubscriptionRegistry::new(),
                available: AtomicBool::new(true),
                closed: AtomicBool::new(false),
                published: record.then(|| RwLock::new(Vec::new())),
            }),
        }
    }

    /// Simulate the transport going down (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Whether `(id, topic)` has an active subscription.
    pub fn is_subscribed(&self, id: &str, topic: &str) -> bool {
        self.inner.registry.contains(id, topic)
    }

    /// Number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Every `(subject, message)` pair published so far. Always empty
    /// unless the broker was created with [`recording`](Self::recording).
    pub fn published(&self) -> Vec<(String, Message)> {
        self.inner
            .published
            .as_ref()
            .and_then(|log| log.read().ok().map(|log| log.clone()))
            .unwrap_or_default()
    }

    /// Messages published on one subject.
    pub fn published_on(&self, subject: &str) -> Vec<Message> {
        self.published()
            .into_iter()
            .filter(|(s, _)| s == subject)
            .map(|(_, m)| m)
            .collect()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        Ok(())
    }

    fn ensure_available(&self) -> Result<()> {
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(Error::Connection("in-memory broker unavailable".into()));
        }
        Ok(())
    }

    fn spawn_delivery(id: &str, topic: &str, handler: Arc<dyn MessageHandler>) -> Result<Delivery> {
        let (tx, rx) = mpsc::channel::<Arc<Vec<u8>>>();
        let client_id = id.to_string();
        let topic = topic.to_string();

        thread::Builder::new()
            .name(format!("delivery-{}", client_id))
            .spawn(move || {
                for data in rx {
                    let msg = match Message::decode(&data) {
                        Ok(msg) => msg,
                        Err(err) => {
                            warn!(client_id = %client_id, topic = %topic, error = %err, "dropping undecodable message");
                            continue;
                        }
                    };
                    if let Err(err) = handler.handle(&msg) {
                        warn!(client_id = %client_id, topic = %topic, error = %err, "message handler failed");
                    }
                }
            })
            .map_err(|e| Error::Connection(format!("failed to spawn delivery thread: {}", e)))?;

        Ok(Delivery { tx })
    }
}

impl Publisher for InMemoryBroker {
    fn publish(&self, topic: &str, msg: &Message) -> Result<()> {
        check_publish(topic, msg)?;
        self.ensure_open()?;
        self.ensure_available()?;

        let subject = topic::build_topic(&self.inner.prefix, topic, &msg.subtopic)?;
        let data = Arc::new(msg.encode()?);

        if let Some(log) = &self.inner.published {
            log.write()
                .map_err(|_| Error::LockPoisoned("publish"))?
                .push((subject.clone(), msg.clone()));
        }

        let delivered = self.inner.registry.route(&subject, |key, delivery| {
            if delivery.tx.send(Arc::clone(&data)).is_err() {
                debug!(client_id = %key.client_id, topic = %key.topic, "delivery thread gone");
            }
        })?;
        debug!(subject = %subject, delivered, "published");
        Ok(())
    }

    fn ping(&self, _timeout: Duration) -> Result<()> {
        self.ensure_open()?;
        self.ensure_available()
    }

    fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.registry.clear()?;
        info!(prefix = %self.inner.prefix, "in-memory broker closed");
        Ok(())
    }
}

impl Subscriber for InMemoryBroker {
    fn subscribe(&self, id: &str, topic: &str, handler: Arc<dyn MessageHandler>) -> Result<()> {
        self.ensure_open()?;
        self.inner
            .registry
            .subscribe(id, topic, handler, |h| Self::spawn_delivery(id, topic, h))
    }

    fn unsubscribe(&self, id: &str, topic: &str) -> Result<()> {
        self.ensure_open()?;
        self.inner.registry.unsubscribe(id, topic)
    }
}
