use std::time::Duration;

use tracing::debug;

use super::events::*;
use super::{Channel, Config, ConfigsPage, Filter, Result, Service, State};
use crate::outbox::{EmitPolicy, Event, FlushStats, FlushWorker, Outbox};

/// Bootstrap service decorator that records every successful call on the
/// outbox's stream. Failed calls are returned untouched and emit nothing.
pub struct EventStoreMiddleware<S> {
    svc: S,
    outbox: Outbox,
    flusher: Option<FlushWorker>,
}

impl<S: Service> EventStoreMiddleware<S> {
    /// Wrap `svc` without a background flusher; buffered events are only
    /// retried by explicit [`Outbox::flush`] calls.
    pub fn new(svc: S, outbox: Outbox) -> Self {
        Self {
            svc,
            outbox,
            flusher: None,
        }
    }

    /// Wrap `svc` and start flushing buffered events every `flush_interval`.
    pub fn start(svc: S, outbox: Outbox, flush_interval: Duration) -> Self {
        let flusher = outbox.spawn_flusher(flush_interval);
        Self {
            svc,
            outbox,
            flusher: Some(flusher),
        }
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn inner(&self) -> &S {
        &self.svc
    }

    /// Stop the background flusher, if any, and return its statistics.
    pub fn shutdown(mut self) -> Option<FlushStats> {
        self.flusher.take().map(FlushWorker::stop)
    }

    fn emit(&self, event: &dyn Event, policy: EmitPolicy) -> Result<()> {
        debug!(operation = event.operation(), "emitting bootstrap event");
        self.outbox.publish(event, policy)?;
        Ok(())
    }
}

impl<S: Service> Service for EventStoreMiddleware<S> {
    fn add(&self, token: &str, cfg: Config) -> Result<Config> {
        let saved = self.svc.add(token, cfg)?;
        self.emit(
            &ConfigEvent {
                config: saved.clone(),
                operation: CONFIG_CREATE,
            },
            EmitPolicy::Required,
        )?;
        Ok(saved)
    }

    fn view(&self, token: &str, id: &str) -> Result<Config> {
        let cfg = self.svc.view(token, id)?;
        self.emit(
            &ConfigEvent {
                config: cfg.clone(),
                operation: CONFIG_VIEW,
            },
            EmitPolicy::BestEffort,
        )?;
        Ok(cfg)
    }

    fn update(&self, token: &str, cfg: Config) -> Result<()> {
        self.svc.update(token, cfg.clone())?;
        self.emit(
            &ConfigEvent {
                config: cfg,
                operation: CONFIG_UPDATE,
            },
            EmitPolicy::Required,
        )
    }

    fn update_cert(
        &self,
        token: &str,
        thing_key: &str,
        client_cert: &str,
        client_key: &str,
        ca_cert: &str,
    ) -> Result<Config> {
        let cfg = self
            .svc
            .update_cert(token, thing_key, client_cert, client_key, ca_cert)?;
        self.emit(
            &UpdateCertEvent {
                thing_key: thing_key.to_string(),
                client_cert: client_cert.to_string(),
                client_key: client_key.to_string(),
                ca_cert: ca_cert.to_string(),
            },
            EmitPolicy::Required,
        )?;
        Ok(cfg)
    }

    fn update_connections(&self, token: &str, id: &str, connections: Vec<String>) -> Result<()> {
        self.svc.update_connections(token, id, connections.clone())?;
        self.emit(
            &UpdateConnectionsEvent {
                thing_id: id.to_string(),
                channels: connections,
            },
            EmitPolicy::Required,
        )
    }

    fn list(&self, token: &str, filter: Filter, offset: u64, limit: u64) -> Result<ConfigsPage> {
        let page = self.svc.list(token, filter.clone(), offset, limit)?;
        self.emit(
            &ListConfigsEvent {
                offset,
                limit,
                filter,
            },
            EmitPolicy::BestEffort,
        )?;
        Ok(page)
    }

    fn remove(&self, token: &str, id: &str) -> Result<()> {
        self.svc.remove(token, id)?;
        self.emit(
            &RemoveConfigEvent {
                thing_id: id.to_string(),
            },
            EmitPolicy::Required,
        )
    }

    fn bootstrap(&self, external_key: &str, external_id: &str, secure: bool) -> Result<Config> {
        let cfg = self.svc.bootstrap(external_key, external_id, secure)?;
        self.emit(
            &BootstrapEvent {
                config: cfg.clone(),
                external_id: external_id.to_string(),
            },
            EmitPolicy::Required,
        )?;
        Ok(cfg)
    }

    fn change_state(&self, token: &str, id: &str, state: State) -> Result<()> {
        self.svc.change_state(token, id, state)?;
        self.emit(
            &ChangeStateEvent {
                thing_id: id.to_string(),
                state,
            },
            EmitPolicy::Required,
        )
    }

    fn remove_config_handler(&self, id: &str) -> Result<()> {
        self.svc.remove_config_handler(id)?;
        self.emit(
            &RemoveHandlerEvent {
                id: id.to_string(),
                operation: CONFIG_HANDLER_REMOVE,
            },
            EmitPolicy::Required,
        )
    }

    fn remove_channel_handler(&self, id: &str) -> Result<()> {
        self.svc.remove_channel_handler(id)?;
        self.emit(
            &RemoveHandlerEvent {
                id: id.to_string(),
                operation: CHANNEL_HANDLER_REMOVE,
            },
            EmitPolicy::Required,
        )
    }

    fn update_channel_handler(&self, channel: Channel) -> Result<()> {
        self.svc.update_channel_handler(channel.clone())?;
        self.emit(&UpdateChannelHandlerEvent { channel }, EmitPolicy::Required)
    }

    fn disconnect_thing_handler(&self, channel_id: &str, thing_id: &str) -> Result<()> {
        self.svc.disconnect_thing_handler(channel_id, thing_id)?;
        self.emit(
            &DisconnectThingEvent {
                channel_id: channel_id.to_string(),
                thing_id: thing_id.to_string(),
            },
            EmitPolicy::Required,
        )
    }
}
