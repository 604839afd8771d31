//! Persistence seams for PAT records and users.
//!
//! Both backends enforce the uniqueness rules (PAT name, public identifier,
//! single bootstrap record; user email and Google id) atomically on insert.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::token::PersonalAccessToken;
use crate::models::user::User;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique field would be duplicated. `field` names the column.
    #[error("conflict on {field}")]
    Conflict { field: &'static str },

    #[error("record not found")]
    NotFound,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fails with `Conflict` if the name, public identifier or (for a
    /// `SYSTEM` record) the bootstrap slot is taken.
    async fn insert(&self, pat: &PersonalAccessToken) -> Result<(), StoreError>;

    async fn find_by_public_identifier(
        &self,
        public_identifier: &str,
    ) -> Result<Option<PersonalAccessToken>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PersonalAccessToken>, StoreError>;

    async fn exists_bootstrap(&self) -> Result<bool, StoreError>;

    async fn mark_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Idempotent. Returns whether the record exists.
    async fn revoke(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Swap in a new identifier and hash and clear `last_used_at`.
    /// `NotFound` if the record is missing or revoked.
    async fn replace_secret(
        &self,
        id: Uuid,
        public_identifier: &str,
        secret_hash: &str,
    ) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<PersonalAccessToken>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_user_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError>;

    /// Case-insensitive.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    async fn update_user(&self, user: &User) -> Result<(), StoreError>;
}
