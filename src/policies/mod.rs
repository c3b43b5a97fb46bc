//! Thing access policies and their event-store decorator.

mod events;
mod middleware;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::outbox::OutboxError;

pub use events::{
    AuthorizeEvent, ListPoliciesEvent, PolicyEvent, POLICY_ADD, POLICY_AUTHORIZE, POLICY_DELETE,
    POLICY_LIST, POLICY_UPDATE,
};
pub use middleware::EventStoreMiddleware;

/// Stream policy events are appended to.
pub const STREAM: &str = "iot.things";

/// Who may do what on which object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub owner_id: String,
    pub subject: String,
    pub object: String,
    pub actions: Vec<String>,
    /// Unix seconds.
    pub created_at: u64,
    pub updated_at: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub subject: String,
    pub object: String,
    pub action: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
    pub subject: String,
    pub object: String,
    pub action: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyPage {
    pub page: Page,
    pub policies: Vec<Policy>,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("authorization failed")]
    AuthorizationFailed,
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("entity not found")]
    NotFound,
    #[error("malformed entity: {0}")]
    MalformedEntity(String),
    #[error(transparent)]
    Outbox(#[from] OutboxError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Policy service operations.
pub trait Service: Send + Sync {
    /// Check an access request against `entity` (`thing` or `channel`);
    /// returns the authorized subject id.
    fn authorize(&self, request: &AccessRequest, entity: &str) -> Result<String>;

    fn add_policy(&self, token: &str, policy: Policy) -> Result<Policy>;

    fn update_policy(&self, token: &str, policy: Policy) -> Result<Policy>;

    fn list_policies(&self, token: &str, page: Page) -> Result<PolicyPage>;

    fn delete_policy(&self, token: &str, policy: Policy) -> Result<()>;
}
