//! Redis Streams store.
//!
//! Records are written with `XADD <stream> MAXLEN ~ <cap> * field value ...`.
//! One connection is cached, shared by probes and appends, and re-opened
//! after a transport error. Every call sets read and write timeouts on it,
//! so a server that stops answering cannot block the caller.

use std::sync::Mutex;
use std::time::Duration;

use redis::{Client, Connection, RedisError};
use tracing::{debug, info};

use super::record::EventRecord;
use super::store::{EventStore, StoreError};
use crate::config::OutboxConfig;

pub struct RedisEventStore {
    client: Client,
    append_timeout: Duration,
    connection: Mutex<Option<Connection>>,
}

fn store_error(err: RedisError, timeout: Duration) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout(timeout)
    } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Rejected(err.to_string())
    }
}

fn is_transport_failure(err: &RedisError) -> bool {
    err.is_io_error() || err.is_connection_dropped() || err.is_timeout()
}

impl RedisEventStore {
    /// Create a store for the server at `url`, e.g. `redis://localhost:6379`,
    /// with the default append timeout. No connection is made until the
    /// first call.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        Self::with_config(url, &OutboxConfig::default())
    }

    /// Create a store using the append timeout from `config`.
    pub fn with_config(url: &str, config: &OutboxConfig) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(|e| StoreError::Rejected(e.to_string()))?;
        info!(url = %url, append_timeout = ?config.append_timeout(), "redis event store configured");
        Ok(Self {
            client,
            append_timeout: config.append_timeout(),
            connection: Mutex::new(None),
        })
    }

    pub fn append_timeout(&self) -> Duration {
        self.append_timeout
    }

    fn with_connection<T>(
        &self,
        op: &'static str,
        timeout: Duration,
        f: impl FnOnce(&mut Connection) -> Result<T, RedisError>,
    ) -> Result<T, StoreError> {
        let mut cached = self
            .connection
            .lock()
            .map_err(|_| StoreError::LockPoisoned(op))?;

        let mut conn = match cached.take() {
            Some(conn) => conn,
            None => self
                .client
                .get_connection_with_timeout(timeout)
                .map_err(|e| store_error(e, timeout))?,
        };

        let result = conn
            .set_read_timeout(Some(timeout))
            .and_then(|_| conn.set_write_timeout(Some(timeout)))
            .and_then(|_| f(&mut conn));

        match result {
            Ok(value) => {
                *cached = Some(conn);
                Ok(value)
            }
            Err(err) => {
                // Keep the connection only if the server answered.
                if !is_transport_failure(&err) {
                    *cached = Some(conn);
                }
                Err(store_error(err, timeout))
            }
        }
    }
}

impl EventStore for RedisEventStore {
    fn ping(&self, timeout: Duration) -> Result<(), StoreError> {
        self.with_connection("ping", timeout, |conn| {
            redis::cmd("PING").query::<String>(conn).map(|_| ())
        })
        .map_err(|err| match err {
            StoreError::Rejected(msg) => StoreError::Unavailable(msg),
            other => other,
        })
    }

    fn append(&self, record: &EventRecord) -> Result<String, StoreError> {
        let mut cmd = redis::cmd("XADD");
        cmd.arg(&record.stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(record.max_len)
            .arg("*");
        for (field, value) in &record.values {
            cmd.arg(field).arg(value);
        }

        let id: String = self.with_connection("append", self.append_timeout, |conn| cmd.query(conn))?;
        debug!(stream = %record.stream, id = %id, "event appended to redis stream");
        Ok(id)
    }
}
