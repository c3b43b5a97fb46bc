use std::time::Duration;

use super::events::{AuthorizeEvent, ListPoliciesEvent, PolicyEvent, POLICY_ADD, POLICY_DELETE, POLICY_UPDATE};
use super::{AccessRequest, Page, Policy, PolicyPage, Result, Service};
use crate::outbox::{EmitPolicy, Event, FlushStats, FlushWorker, Outbox};

/// Policy service decorator that records successful calls on the outbox's
/// stream.
pub struct EventStoreMiddleware<S> {
    svc: S,
    outbox: Outbox,
    flusher: Option<FlushWorker>,
}

impl<S: Service> EventStoreMiddleware<S> {
    pub fn new(svc: S, outbox: Outbox) -> Self {
        Self {
            svc,
            outbox,
            flusher: None,
        }
    }

    /// Wrap `svc` and flush buffered events every `flush_interval`.
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

    pub fn shutdown(mut self) -> Option<FlushStats> {
        self.flusher.take().map(FlushWorker::stop)
    }

    fn emit(&self, event: &dyn Event, policy: EmitPolicy) -> Result<()> {
        self.outbox.publish(event, policy)?;
        Ok(())
    }
}

impl<S: Service> Service for EventStoreMiddleware<S> {
    fn authorize(&self, request: &AccessRequest, entity: &str) -> Result<String> {
        let id = self.svc.authorize(request, entity)?;
        self.emit(
            &AuthorizeEvent {
                request: request.clone(),
                entity: entity.to_string(),
            },
            EmitPolicy::BestEffort,
        )?;
        Ok(id)
    }

    fn add_policy(&self, token: &str, policy: Policy) -> Result<Policy> {
        let policy = self.svc.add_policy(token, policy)?;
        self.emit(
            &PolicyEvent {
                policy: policy.clone(),
                operation: POLICY_ADD,
            },
            EmitPolicy::Required,
        )?;
        Ok(policy)
    }

    fn update_policy(&self, token: &str, policy: Policy) -> Result<Policy> {
        let policy = self.svc.update_policy(token, policy)?;
        self.emit(
            &PolicyEvent {
                policy: policy.clone(),
                operation: POLICY_UPDATE,
            },
            EmitPolicy::Required,
        )?;
        Ok(policy)
    }

    fn list_policies(&self, token: &str, page: Page) -> Result<PolicyPage> {
        let result = self.svc.list_policies(token, page.clone())?;
        self.emit(&ListPoliciesEvent { page }, EmitPolicy::BestEffort)?;
        Ok(result)
    }

    fn delete_policy(&self, token: &str, policy: Policy) -> Result<()> {
        self.svc.delete_policy(token, policy.clone())?;
        self.emit(
            &PolicyEvent {
                policy,
                operation: POLICY_DELETE,
            },
            EmitPolicy::Required,
        )
    }
}
