//! AMQP 0-9-1 broker client (RabbitMQ).
//!
//! All channel traffic goes through one durable topic exchange. Topics are
//! used as routing keys, with the `.>` wildcard suffix rewritten to AMQP's
//! `.#`. Each subscription owns an exclusive, auto-deleted queue bound to
//! its routing key.
//!
//! As with the NATS client, calls block on a private runtime; handlers run
//! on it and must not call back into the client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use lapin::options::{
    BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::handler::MessageHandler;
use super::publisher::{check_publish, Publisher};
use super::registry::{Binding, SubscriptionRegistry};
use super::subscriber::Subscriber;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::topic::{self, WILDCARD_SUFFIX};

const CONTENT_TYPE: &str = "application/octet-stream";
const APP_ID: &str = "relaybus";

/// Translate a topic into an AMQP routing key.
pub fn routing_key(topic: &str) -> String {
    if topic == ">" {
        return "#".to_string();
    }
    match topic.strip_suffix(WILDCARD_SUFFIX) {
        Some(base) => format!("{}.#", base),
        None => topic.to_string(),
    }
}

fn connection_error(err: lapin::Error) -> Error {
    Error::Connection(err.to_string())
}

struct AmqpSubscription {
    channel: Channel,
    consumer_tag: String,
    handle: Handle,
    task: JoinHandle<()>,
}

impl Binding for AmqpSubscription {
    fn unbind(self) -> Result<()> {
        self.task.abort();
        self.handle
            .block_on(
                self.channel
                    .basic_cancel(&self.consumer_tag, BasicCancelOptions::default()),
            )
            .map_err(connection_error)
    }
}

/// AMQP publisher and subscriber.
pub struct AmqpPubSub {
    runtime: Runtime,
    connection: Connection,
    channel: Channel,
    prefix: String,
    exchange: String,
    registry: SubscriptionRegistry<AmqpSubscription>,
    closed: AtomicBool,
}

impl AmqpPubSub {
    /// Connect to the broker at `url` and declare the topic exchange.
    pub fn connect(url: &str, prefix: &str, exchange: &str) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("relaybus-amqp")
            .enable_all()
            .build()
            .map_err(|e| Error::Connection(format!("failed to start runtime: {}", e)))?;

        let (connection, channel) = runtime.block_on(async {
            let connection = Connection::connect(url, ConnectionProperties::default())
                .await
                .map_err(connection_error)?;
            let channel = connection.create_channel().await.map_err(connection_error)?;
            channel
                .exchange_declare(
                    exchange,
                    ExchangeKind::Topic,
                    ExchangeDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(connection_error)?;
            Ok::<_, Error>((connection, channel))
        })?;

        info!(url = %url, exchange = %exchange, "connected to AMQP broker");

        Ok(Self {
            runtime,
            connection,
            channel,
            prefix: prefix.to_string(),
            exchange: exchange.to_string(),
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

    fn bind(&self, id: &str, topic: &str, handler: Arc<dyn MessageHandler>) -> Result<AmqpSubscription> {
        let key = routing_key(topic);
        let queue_name = format!("{}.{}", topic, id);
        let consumer_tag = format!("{}:{}", id, topic);

        let mut consumer = self.runtime.block_on(async {
            let queue = self
                .channel
                .queue_declare(
                    &queue_name,
                    QueueDeclareOptions {
                        exclusive: true,
                        auto_delete: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(connection_error)?;
            self.channel
                .queue_bind(
                    queue.name().as_str(),
                    &self.exchange,
                    &key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(connection_error)?;
            self.channel
                .basic_consume(
                    queue.name().as_str(),
                    &consumer_tag,
                    BasicConsumeOptions {
                        no_ack: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(connection_error)
        })?;

        let client_id = id.to_string();
        let task_key = key.clone();
        let task = self.runtime.spawn(async move {
            while let Some(delivery) = consumer.next().await {
                let delivery = match delivery {
                    Ok(delivery) => delivery,
                    Err(err) => {
                        warn!(client_id = %client_id, routing_key = %task_key, error = %err, "AMQP consumer error");
                        break;
                    }
                };
                let msg = match Message::decode(&delivery.data) {
                    Ok(msg) => msg,
                    Err(err) => {
                        warn!(client_id = %client_id, routing_key = %task_key, error = %err, "dropping undecodable message");
                        continue;
                    }
                };
                if let Err(err) = handler.handle(&msg) {
                    warn!(client_id = %client_id, routing_key = %task_key, error = %err, "message handler failed");
                }
            }
            debug!(client_id = %client_id, routing_key = %task_key, "AMQP consumer ended");
        });

        Ok(AmqpSubscription {
            channel: self.channel.clone(),
            consumer_tag,
            handle: self.runtime.handle().clone(),
            task,
        })
    }
}

impl Publisher for AmqpPubSub {
    fn publish(&self, topic: &str, msg: &Message) -> Result<()> {
        check_publish(topic, msg)?;
        self.ensure_open()?;

        let subject = topic::build_topic(&self.prefix, topic, &msg.subtopic)?;
        let data = msg.encode()?;

        self.runtime.block_on(async {
            self.channel
                .basic_publish(
                    &self.exchange,
                    &subject,
                    BasicPublishOptions::default(),
                    &data,
                    BasicProperties::default()
                        .with_content_type(CONTENT_TYPE.into())
                        .with_app_id(APP_ID.into()),
                )
                .await
                .map_err(connection_error)?
                .await
                .map_err(connection_error)
        })?;

        debug!(exchange = %self.exchange, routing_key = %subject, "published to AMQP");
        Ok(())
    }

    fn ping(&self, _timeout: Duration) -> Result<()> {
        self.ensure_open()?;
        if self.connection.status().connected() && self.channel.status().connected() {
            Ok(())
        } else {
            Err(Error::Connection("AMQP connection is not open".into()))
        }
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.registry.clear()?;
        self.runtime
            .block_on(self.connection.close(200, "OK"))
            .map_err(connection_error)?;
        info!(exchange = %self.exchange, "AMQP client closed");
        Ok(())
    }
}

impl Subscriber for AmqpPubSub {
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

impl Drop for AmqpPubSub {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to close AMQP client");
        }
    }
}
