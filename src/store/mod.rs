pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::approval::{ApprovalRequest, RequestStatus};
use crate::models::chemical::{Chemical, StockDeduction, UsageRecord};
use crate::models::user::{ActorTier, UserAccount, UserStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("datastore unavailable")]
    Unavailable,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Mutation applied to a subject entity together with a status change.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    None,
    SetUserStatus { user_id: Uuid, status: UserStatus },
    DeleteUser { user_id: Uuid },
    DeleteChemical { chemical_id: String },
}

/// A conditional status write: `to` is stored only if the request is still at `from`.
#[derive(Debug, Clone)]
pub struct Transition {
    pub request_id: Uuid,
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub effect: SideEffect,
}

/// What the side effect of a committed transition actually touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectOutcome {
    /// The transition carried no side effect.
    Nothing,
    Applied,
    /// The subject entity was already gone.
    SubjectMissing,
}

/// Persistent records used by the workflow and the inventory endpoints.
#[async_trait]
pub trait Datastore: Send + Sync {
    async fn insert_request(&self, request: &ApprovalRequest) -> Result<(), StoreError>;

    /// Writes a pending user and its registration request as one unit.
    async fn insert_registration(
        &self,
        user: &UserAccount,
        request: &ApprovalRequest,
    ) -> Result<(), StoreError>;

    async fn get_request(&self, id: Uuid) -> Result<Option<ApprovalRequest>, StoreError>;

    async fn list_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<ApprovalRequest>, StoreError>;

    /// Atomically moves a request from `from` to `to` and applies the side effect.
    /// Returns `None` when the request is missing or no longer at `from`; nothing is
    /// written in that case.
    async fn apply_transition(
        &self,
        transition: &Transition,
    ) -> Result<Option<EffectOutcome>, StoreError>;

    async fn insert_user(&self, user: &UserAccount) -> Result<(), StoreError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<UserAccount>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError>;

    /// Email addresses of approved accounts acting in `tier`.
    async fn list_actor_emails(&self, tier: ActorTier) -> Result<Vec<String>, StoreError>;

    async fn insert_chemical(&self, chemical: &Chemical) -> Result<(), StoreError>;

    async fn get_chemical(&self, chemical_id: &str) -> Result<Option<Chemical>, StoreError>;

    async fn list_chemicals(&self) -> Result<Vec<Chemical>, StoreError>;

    /// Decrements stock only when enough is available, recording the usage.
    async fn deduct_stock(
        &self,
        chemical_id: &str,
        quantity: f64,
        usage: &UsageRecord,
    ) -> Result<StockDeduction, StoreError>;

    /// Stock issuances, newest first. `None` lists every user's records.
    async fn list_usage(&self, user_id: Option<Uuid>) -> Result<Vec<UsageRecord>, StoreError>;

    /// Atomically increments and returns the named counter (first value is 1).
    async fn next_sequence(&self, name: &str) -> Result<i64, StoreError>;
}
