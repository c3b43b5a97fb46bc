//! In-memory domain services wrapped by the event-store tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use relaybus::bootstrap::{self, Channel, Config, ConfigsPage, Filter, State};
use relaybus::policies::{self, AccessRequest, Page, Policy, PolicyPage};
use relaybus::config::OutboxConfig;
use relaybus::outbox::{InMemoryEventStore, Outbox};

pub const VALID_TOKEN: &str = "token";
pub const EXTERNAL_KEY: &str = "external-key";

pub fn outbox(store: &InMemoryEventStore, stream: &str) -> Outbox {
    Outbox::new(store.clone(), &OutboxConfig::for_stream(stream))
}

pub fn config(thing_id: &str) -> Config {
    Config {
        thing_id: thing_id.to_string(),
        thing_key: format!("{}-key", thing_id),
        name: format!("{}-name", thing_id),
        external_id: format!("{}-external", thing_id),
        external_key: EXTERNAL_KEY.to_string(),
        channels: vec![Channel {
            id: "c1".into(),
            name: "telemetry".into(),
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Bootstrap service over a hash map.
#[derive(Default)]
pub struct MockConfigService {
    configs: Mutex<HashMap<String, Config>>,
}

impl MockConfigService {
    fn authorize(token: &str) -> bootstrap::Result<()> {
        if token == VALID_TOKEN {
            Ok(())
        } else {
            Err(bootstrap::Error::AuthenticationFailed)
        }
    }

    fn with_config<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Config) -> T,
    ) -> bootstrap::Result<T> {
        let mut configs = self.configs.lock().unwrap();
        configs
            .get_mut(id)
            .map(f)
            .ok_or(bootstrap::Error::NotFound)
    }
}

impl bootstrap::Service for MockConfigService {
    fn add(&self, token: &str, mut cfg: Config) -> bootstrap::Result<Config> {
        Self::authorize(token)?;
        let mut configs = self.configs.lock().unwrap();
        if configs.contains_key(&cfg.thing_id) {
            return Err(bootstrap::Error::Conflict);
        }
        cfg.owner = "user@example.com".into();
        configs.insert(cfg.thing_id.clone(), cfg.clone());
        Ok(cfg)
    }

    fn view(&self, token: &str, id: &str) -> bootstrap::Result<Config> {
        Self::authorize(token)?;
        self.with_config(id, |cfg| cfg.clone())
    }

    fn update(&self, token: &str, cfg: Config) -> bootstrap::Result<()> {
        Self::authorize(token)?;
        self.with_config(&cfg.thing_id.clone(), |existing| {
            existing.name = cfg.name;
            existing.content = cfg.content;
        })
    }

    fn update_cert(
        &self,
        token: &str,
        thing_key: &str,
        client_cert: &str,
        client_key: &str,
        ca_cert: &str,
    ) -> bootstrap::Result<Config> {
        Self::authorize(token)?;
        let mut configs = self.configs.lock().unwrap();
        let cfg = configs
            .values_mut()
            .find(|c| c.thing_key == thing_key)
            .ok_or(bootstrap::Error::NotFound)?;
        cfg.client_cert = client_cert.into();
        cfg.client_key = client_key.into();
        cfg.ca_cert = ca_cert.into();
        Ok(cfg.clone())
    }

    fn update_connections(
        &self,
        token: &str,
        id: &str,
        connections: Vec<String>,
    ) -> bootstrap::Result<()> {
        Self::authorize(token)?;
        self.with_config(id, |cfg| {
            cfg.channels = connections
                .into_iter()
                .map(|id| Channel {
                    id,
                    ..Default::default()
                })
                .collect();
        })
    }

    fn list(
        &self,
        token: &str,
        _filter: Filter,
        offset: u64,
        limit: u64,
    ) -> bootstrap::Result<ConfigsPage> {
        Self::authorize(token)?;
        let configs = self.configs.lock().unwrap();
        let mut all: Vec<Config> = configs.values().cloned().collect();
        all.sort_by(|a, b| a.thing_id.cmp(&b.thing_id));
        Ok(ConfigsPage {
            total: all.len() as u64,
            offset,
            limit,
            configs: all
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect(),
        })
    }

    fn remove(&self, token: &str, id: &str) -> bootstrap::Result<()> {
        Self::authorize(token)?;
        self.configs.lock().unwrap().remove(id);
        Ok(())
    }

    fn bootstrap(
        &self,
        external_key: &str,
        external_id: &str,
        _secure: bool,
    ) -> bootstrap::Result<Config> {
        let configs = self.configs.lock().unwrap();
        configs
            .values()
            .find(|c| c.external_id == external_id && c.external_key == external_key)
            .cloned()
            .ok_or(bootstrap::Error::NotFound)
    }

    fn change_state(&self, token: &str, id: &str, state: State) -> bootstrap::Result<()> {
        Self::authorize(token)?;
        self.with_config(id, |cfg| cfg.state = state)
    }

    fn remove_config_handler(&self, id: &str) -> bootstrap::Result<()> {
        self.configs.lock().unwrap().remove(id);
        Ok(())
    }

    fn remove_channel_handler(&self, id: &str) -> bootstrap::Result<()> {
        for cfg in self.configs.lock().unwrap().values_mut() {
            cfg.channels.retain(|c| c.id != id);
        }
        Ok(())
    }

    fn update_channel_handler(&self, channel: Channel) -> bootstrap::Result<()> {
        for cfg in self.configs.lock().unwrap().values_mut() {
            for existing in cfg.channels.iter_mut().filter(|c| c.id == channel.id) {
                *existing = channel.clone();
            }
        }
        Ok(())
    }

    fn disconnect_thing_handler(&self, channel_id: &str, thing_id: &str) -> bootstrap::Result<()> {
        self.with_config(thing_id, |cfg| cfg.channels.retain(|c| c.id != channel_id))
    }
}

/// Policy service over a vector.
#[derive(Default)]
pub struct MockPolicyService {
    policies: Mutex<Vec<Policy>>,
}

impl MockPolicyService {
    fn authorize_token(token: &str) -> policies::Result<()> {
        if token == VALID_TOKEN {
            Ok(())
        } else {
            Err(policies::Error::AuthenticationFailed)
        }
    }
}

impl policies::Service for MockPolicyService {
    fn authorize(&self, request: &AccessRequest, _entity: &str) -> policies::Result<String> {
        let policies = self.policies.lock().unwrap();
        policies
            .iter()
            .find(|p| {
                p.subject == request.subject
                    && p.object == request.object
                    && p.actions.iter().any(|a| a == &request.action)
            })
            .map(|p| p.subject.clone())
            .ok_or(policies::Error::AuthorizationFailed)
    }

    fn add_policy(&self, token: &str, mut policy: Policy) -> policies::Result<Policy> {
        Self::authorize_token(token)?;
        policy.owner_id = "owner".into();
        policy.created_at = 1;
        self.policies.lock().unwrap().push(policy.clone());
        Ok(policy)
    }

    fn update_policy(&self, token: &str, policy: Policy) -> policies::Result<Policy> {
        Self::authorize_token(token)?;
        let mut policies = self.policies.lock().unwrap();
        let existing = policies
            .iter_mut()
            .find(|p| p.subject == policy.subject && p.object == policy.object)
            .ok_or(policies::Error::NotFound)?;
        existing.actions = policy.actions;
        existing.updated_at = 2;
        Ok(existing.clone())
    }

    fn list_policies(&self, token: &str, page: Page) -> policies::Result<PolicyPage> {
        Self::authorize_token(token)?;
        let policies = self.policies.lock().unwrap().clone();
        Ok(PolicyPage {
            page: Page {
                total: policies.len() as u64,
                ..page
            },
            policies,
        })
    }

    fn delete_policy(&self, token: &str, policy: Policy) -> policies::Result<()> {
        Self::authorize_token(token)?;
        self.policies
            .lock()
            .unwrap()
            .retain(|p| !(p.subject == policy.subject && p.object == policy.object));
        Ok(())
    }
}
