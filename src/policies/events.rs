use crate::outbox::{Event, EventFields};

use super::{AccessRequest, Page, Policy};

pub const POLICY_AUTHORIZE: &str = "policy.authorize";
pub const POLICY_ADD: &str = "policy.add";
pub const POLICY_UPDATE: &str = "policy.update";
pub const POLICY_LIST: &str = "policy.list";
pub const POLICY_DELETE: &str = "policy.delete";

fn insert_nonempty(fields: &mut EventFields, key: &str, value: &str) {
    if !value.is_empty() {
        fields.insert(key.to_string(), value.to_string());
    }
}

pub struct AuthorizeEvent {
    pub request: AccessRequest,
    pub entity: String,
}

impl Event for AuthorizeEvent {
    fn operation(&self) -> &'static str {
        POLICY_AUTHORIZE
    }

    fn encode(&self) -> EventFields {
        let mut fields = EventFields::new();
        insert_nonempty(&mut fields, "subject", &self.request.subject);
        insert_nonempty(&mut fields, "object", &self.request.object);
        insert_nonempty(&mut fields, "action", &self.request.action);
        insert_nonempty(&mut fields, "entity_type", &self.entity);
        fields
    }
}

/// A policy was added, updated or deleted.
pub struct PolicyEvent {
    pub policy: Policy,
    pub operation: &'static str,
}

impl Event for PolicyEvent {
    fn operation(&self) -> &'static str {
        self.operation
    }

    fn encode(&self) -> EventFields {
        let policy = &self.policy;
        let mut fields = EventFields::new();
        insert_nonempty(&mut fields, "owner_id", &policy.owner_id);
        insert_nonempty(&mut fields, "subject", &policy.subject);
        insert_nonempty(&mut fields, "object", &policy.object);
        if !policy.actions.is_empty() {
            fields.insert("actions".into(), policy.actions.join(","));
        }
        if policy.created_at > 0 {
            fields.insert("created_at".into(), policy.created_at.to_string());
        }
        if policy.updated_at > 0 {
            fields.insert("updated_at".into(), policy.updated_at.to_string());
        }
        fields
    }
}

pub struct ListPoliciesEvent {
    pub page: Page,
}

impl Event for ListPoliciesEvent {
    fn operation(&self) -> &'static str {
        POLICY_LIST
    }

    fn encode(&self) -> EventFields {
        let page = &self.page;
        let mut fields = EventFields::new();
        fields.insert("offset".into(), page.offset.to_string());
        fields.insert("limit".into(), page.limit.to_string());
        insert_nonempty(&mut fields, "subject", &page.subject);
        insert_nonempty(&mut fields, "object", &page.object);
        insert_nonempty(&mut fields, "action", &page.action);
        fields
    }
}
