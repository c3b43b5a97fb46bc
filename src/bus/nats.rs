//! NATS broker client.
//!
//! Subjects are the topics themselves (`channels.<id>[.<subtopic>]`). NATS
//! handles `>` wildcards natively, but `channels.<id>.>` does not match the
//! bare `channels.<id>`, so such patterns get a second server subscription
//! on the base subject feeding the same delivery task. The async `async-nats` client runs on a
//! runtime owned by [`NatsPubSub`], so the client must not be used from
//! inside another tokio runtime. Handlers run on that runtime too and must
//! not call back into the client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::handler::MessageHandler;
use super::publisher::{check_publish, Publisher};
use super::registry::{Binding, SubscriptionRegistry};
use super::subscriber::Subscriber;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::topic::{self, WILDCARD_SUFFIX};

/// Delivery task of one NATS subscription. Aborting it drops the
/// `async_nats::Subscriber`s, which unsubscribes on the server.
struct NatsSubscription {
    task: JoinHandle<()>,
}

impl Binding for NatsSubscription {
    fn unbind(self) -> Result<()> {
        self.task.abort();
        Ok(())
    }
}

/// NATS publisher and subscriber.
pub struct NatsPubSub {
    runtime: Runtime,
    client: async_nats::Client,
    prefix: String,
    registry: SubscriptionRegistry<NatsSubscription>,
    closed: AtomicBool,
}

impl NatsPubSub {
    /// Connect to the NATS server at `url`.
    pub fn connect(url: &str, prefix: &str) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("relaybus-nats")
            .enable_all()
            .build()
            .map_err(|e| Error::Connection(format!("failed to start runtime: {}", e)))?;

        let client = runtime
            .block_on(async_nats::connect(url))
            .map_err(|e| Error::Connection(e.to_string()))?;

        info!(url = %url, "connected to NATS server");

        Ok(Self {
            runtime,
            client,
            prefix: prefix.to_string(),
            registry: SubscriptionRegistry::new(),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        Ok(())
    }

    fn bind(&self, id: &str, subject: &str, handler: Arc<dyn MessageHandler>) -> Result<NatsSubscription> {
        let mut deliveries: BoxStream<'static, async_nats::Message> =
            self.runtime.block_on(async {
                let wildcard = self
                    .client
                    .subscribe(subject.to_string())
                    .await
                    .map_err(|e| Error::Connection(e.to_string()))?;
                match subject.strip_suffix(WILDCARD_SUFFIX) {
                    Some(base) => {
                        let bare = self
                            .client
                            .subscribe(base.to_string())
                            .await
                            .map_err(|e| Error::Connection(e.to_string()))?;
                        Ok::<_, Error>(stream::select(wildcard, bare).boxed())
                    }
                    None => Ok(wildcard.boxed()),
                }
            })?;

        let client_id = id.to_string();
        let subject = subject.to_string();
        let task = self.runtime.spawn(async move {
            while let Some(delivery) = deliveries.next().await {
                let msg = match Message::decode(&delivery.payload) {
                    Ok(msg) => msg,
                    Err(err) => {
                        warn!(client_id = %client_id, subject = %subject, error = %err, "dropping undecodable message");
                        continue;
                    }
                };
                if let Err(err) = handler.handle(&msg) {
                    warn!(client_id = %client_id, subject = %subject, error = %err, "message handler failed");
                }
            }
            debug!(client_id = %client_id, subject = %subject, "NATS subscription ended");
        });

        Ok(NatsSubscription { task })
    }
}

impl Publisher for NatsPubSub {
    fn publish(&self, topic: &str, msg: &Message) -> Result<()> {
        check_publish(topic, msg)?;
        self.ensure_open()?;

        let subject = topic::build_topic(&self.prefix, topic, &msg.subtopic)?;
        let data = msg.encode()?;

        self.runtime.block_on(async {
            self.client
                .publish(subject.clone(), data.into())
                .await
                .map_err(|e| Error::Connection(e.to_string()))?;
            self.client
                .flush()
                .await
                .map_err(|e| Error::Connection(e.to_string()))
        })?;

        debug!(subject = %subject, "published to NATS");
        Ok(())
    }

    fn ping(&self, timeout: Duration) -> Result<()> {
        self.ensure_open()?;
        self.runtime.block_on(async {
            match tokio::time::timeout(timeout, self.client.flush()).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(Error::Connection(e.to_string())),
                Err(_) => Err(Error::Connection(format!("NATS ping timed out after {:?}", timeout))),
            }
        })
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.registry.clear()?;
        if let Err(err) = self.runtime.block_on(self.client.flush()) {
            warn!(error = %err, "failed to flush NATS connection on close");
        }
        info!("NATS client closed");
        Ok(())
    }
}

impl Subscriber for NatsPubSub {
    fn subscribe(&self, id: &str, topic: &str, handler: Arc<dyn MessageHandler>) -> Result<()> {
        self.ensure_open()?;
        self.registry
            .subscribe(id, topic, handler, |h| self.bind(id, topic, h))
    }

    fn unsubscribe(&self, id: &str, topic: &str) -> Result<()> {
        self.ensure_open()?;
        self.registry.unsubscribe(id, topic)
    }
}

impl Drop for NatsPubSub {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to close NATS client");
        }
    }
}
