use crate::outbox::{Event, EventFields};

use super::{Channel, Config, Filter, State};

pub const CONFIG_CREATE: &str = "config.create";
pub const CONFIG_VIEW: &str = "config.view";
pub const CONFIG_UPDATE: &str = "config.update";
pub const CONFIG_LIST: &str = "config.list";
pub const CONFIG_REMOVE: &str = "config.remove";
pub const CERT_UPDATE: &str = "cert.update";
pub const THING_UPDATE_CONNECTIONS: &str = "thing.update_connections";
pub const THING_BOOTSTRAP: &str = "thing.bootstrap";
pub const THING_STATE_CHANGE: &str = "thing.state_change";
pub const THING_DISCONNECT: &str = "thing.disconnect";
pub const CONFIG_HANDLER_REMOVE: &str = "config.remove_handler";
pub const CHANNEL_HANDLER_REMOVE: &str = "channel.remove_handler";
pub const CHANNEL_HANDLER_UPDATE: &str = "channel.update_handler";

fn put(fields: &mut EventFields, key: &str, value: impl ToString) {
    fields.insert(key.to_string(), value.to_string());
}

fn put_nonempty(fields: &mut EventFields, key: &str, value: &str) {
    if !value.is_empty() {
        put(fields, key, value);
    }
}

fn channel_ids(channels: &[Channel]) -> String {
    channels
        .iter()
        .map(|c| c.id.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// A configuration was created, viewed or updated.
pub struct ConfigEvent {
    pub config: Config,
    pub operation: &'static str,
}

impl Event for ConfigEvent {
    fn operation(&self) -> &'static str {
        self.operation
    }

    fn encode(&self) -> EventFields {
        let cfg = &self.config;
        let mut fields = EventFields::new();
        put(&mut fields, "thing_id", &cfg.thing_id);
        put(&mut fields, "state", cfg.state);
        put_nonempty(&mut fields, "owner", &cfg.owner);
        put_nonempty(&mut fields, "name", &cfg.name);
        put_nonempty(&mut fields, "external_id", &cfg.external_id);
        put_nonempty(&mut fields, "content", &cfg.content);
        if !cfg.channels.is_empty() {
            put(&mut fields, "channels", channel_ids(&cfg.channels));
        }
        fields
    }
}

pub struct UpdateCertEvent {
    pub thing_key: String,
    pub client_cert: String,
    pub client_key: String,
    pub ca_cert: String,
}

impl Event for UpdateCertEvent {
    fn operation(&self) -> &'static str {
        CERT_UPDATE
    }

    fn encode(&self) -> EventFields {
        let mut fields = EventFields::new();
        put(&mut fields, "thing_key", &self.thing_key);
        put(&mut fields, "client_cert", &self.client_cert);
        put(&mut fields, "client_key", &self.client_key);
        put(&mut fields, "ca_cert", &self.ca_cert);
        fields
    }
}

pub struct UpdateConnectionsEvent {
    pub thing_id: String,
    pub channels: Vec<String>,
}

impl Event for UpdateConnectionsEvent {
    fn operation(&self) -> &'static str {
        THING_UPDATE_CONNECTIONS
    }

    fn encode(&self) -> EventFields {
        let mut fields = EventFields::new();
        put(&mut fields, "thing_id", &self.thing_id);
        put(&mut fields, "channels", self.channels.join(","));
        fields
    }
}

pub struct ListConfigsEvent {
    pub offset: u64,
    pub limit: u64,
    pub filter: Filter,
}

impl Event for ListConfigsEvent {
    fn operation(&self) -> &'static str {
        CONFIG_LIST
    }

    fn encode(&self) -> EventFields {
        let mut fields = EventFields::new();
        put(&mut fields, "offset", self.offset);
        put(&mut fields, "limit", self.limit);
        if !self.filter.full_match.is_empty() {
            put(&mut fields, "full_match", to_json(&self.filter.full_match));
        }
        if !self.filter.partial_match.is_empty() {
            put(&mut fields, "partial_match", to_json(&self.filter.partial_match));
        }
        fields
    }
}

pub struct RemoveConfigEvent {
    pub thing_id: String,
}

impl Event for RemoveConfigEvent {
    fn operation(&self) -> &'static str {
        CONFIG_REMOVE
    }

    fn encode(&self) -> EventFields {
        let mut fields = EventFields::new();
        put(&mut fields, "thing_id", &self.thing_id);
        fields
    }
}

/// A thing fetched its configuration.
pub struct BootstrapEvent {
    pub config: Config,
    pub external_id: String,
}

impl Event for BootstrapEvent {
    fn operation(&self) -> &'static str {
        THING_BOOTSTRAP
    }

    fn encode(&self) -> EventFields {
        let mut fields = EventFields::new();
        put(&mut fields, "external_id", &self.external_id);
        put(&mut fields, "thing_id", &self.config.thing_id);
        put(&mut fields, "state", self.config.state);
        if !self.config.channels.is_empty() {
            put(&mut fields, "channels", channel_ids(&self.config.channels));
        }
        fields
    }
}

pub struct ChangeStateEvent {
    pub thing_id: String,
    pub state: State,
}

impl Event for ChangeStateEvent {
    fn operation(&self) -> &'static str {
        THING_STATE_CHANGE
    }

    fn encode(&self) -> EventFields {
        let mut fields = EventFields::new();
        put(&mut fields, "thing_id", &self.thing_id);
        put(&mut fields, "state", self.state);
        fields
    }
}

/// A config or channel was removed in reaction to another service.
pub struct RemoveHandlerEvent {
    pub id: String,
    pub operation: &'static str,
}

impl Event for RemoveHandlerEvent {
    fn operation(&self) -> &'static str {
        self.operation
    }

    fn encode(&self) -> EventFields {
        let mut fields = EventFields::new();
        put(&mut fields, "config_id", &self.id);
        fields
    }
}

pub struct UpdateChannelHandlerEvent {
    pub channel: Channel,
}

impl Event for UpdateChannelHandlerEvent {
    fn operation(&self) -> &'static str {
        CHANNEL_HANDLER_UPDATE
    }

    fn encode(&self) -> EventFields {
        let mut fields = EventFields::new();
        put(&mut fields, "channel_id", &self.channel.id);
        put_nonempty(&mut fields, "name", &self.channel.name);
        if !self.channel.metadata.is_empty() {
            put(&mut fields, "metadata", to_json(&self.channel.metadata));
        }
        fields
    }
}

pub struct DisconnectThingEvent {
    pub channel_id: String,
    pub thing_id: String,
}

impl Event for DisconnectThingEvent {
    fn operation(&self) -> &'static str {
        THING_DISCONNECT
    }

    fn encode(&self) -> EventFields {
        let mut fields = EventFields::new();
        put(&mut fields, "channel_id", &self.channel_id);
        put(&mut fields, "thing_id", &self.thing_id);
        fields
    }
}
