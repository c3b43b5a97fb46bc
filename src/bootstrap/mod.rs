//! Bootstrap configuration service and its event-store decorator.
//!
//! The service itself (storage, certificates, thing provisioning) lives
//! elsewhere; this module defines the surface the decorator wraps and the
//! events it emits to the `iot.bootstrap` stream.

mod events;
mod middleware;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::outbox::OutboxError;

pub use events::*;
pub use middleware::EventStoreMiddleware;

/// Stream bootstrap events are appended to.
pub const STREAM: &str = "iot.bootstrap";

/// Provisioning state of a thing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    #[default]
    Inactive,
    Active,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Inactive => write!(f, "0"),
            State::Active => write!(f, "1"),
        }
    }
}

/// A channel a bootstrapped thing is connected to.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Bootstrap configuration of one thing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub thing_id: String,
    pub thing_key: String,
    pub owner: String,
    pub name: String,
    pub client_cert: String,
    pub client_key: String,
    pub ca_cert: String,
    pub channels: Vec<Channel>,
    pub external_id: String,
    pub external_key: String,
    pub content: String,
    pub state: State,
}

/// Metadata filter for listing configurations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub full_match: BTreeMap<String, String>,
    pub partial_match: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigsPage {
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
    pub configs: Vec<Config>,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("entity not found")]
    NotFound,
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("entity already exists")]
    Conflict,
    #[error("malformed entity: {0}")]
    MalformedEntity(String),
    #[error(transparent)]
    Outbox(#[from] OutboxError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Bootstrap service operations.
pub trait Service: Send + Sync {
    /// Add a configuration owned by the token's user.
    fn add(&self, token: &str, cfg: Config) -> Result<Config>;

    fn view(&self, token: &str, id: &str) -> Result<Config>;

    /// Update editable fields of a configuration.
    fn update(&self, token: &str, cfg: Config) -> Result<()>;

    /// Replace the certificates of the thing identified by `thing_key`.
    fn update_cert(
        &self,
        token: &str,
        thing_key: &str,
        client_cert: &str,
        client_key: &str,
        ca_cert: &str,
    ) -> Result<Config>;

    /// Replace the channel list of a configuration.
    fn update_connections(&self, token: &str, id: &str, connections: Vec<String>) -> Result<()>;

    fn list(&self, token: &str, filter: Filter, offset: u64, limit: u64) -> Result<ConfigsPage>;

    fn remove(&self, token: &str, id: &str) -> Result<()>;

    /// Return the configuration of the thing with the given external credentials.
    fn bootstrap(&self, external_key: &str, external_id: &str, secure: bool) -> Result<Config>;

    fn change_state(&self, token: &str, id: &str, state: State) -> Result<()>;

    /// Remove a configuration after its thing was deleted elsewhere.
    fn remove_config_handler(&self, id: &str) -> Result<()>;

    /// Drop a channel that was deleted elsewhere.
    fn remove_channel_handler(&self, id: &str) -> Result<()>;

    /// Sync a channel that was updated elsewhere.
    fn update_channel_handler(&self, channel: Channel) -> Result<()>;

    /// Drop a connection that was removed elsewhere.
    fn disconnect_thing_handler(&self, channel_id: &str, thing_id: &str) -> Result<()>;
}
