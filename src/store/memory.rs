//! In-process store. Used when no `DATABASE_URL` is configured, and by tests.
//!
//! Each write holds the map's write lock across its uniqueness checks and the
//! mutation, so concurrent inserts cannot both pass the checks.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CredentialStore, StoreError, UserStore};
use crate::models::token::PersonalAccessToken;
use crate::models::user::User;

#[derive(Default)]
pub struct MemoryStore {
    pats: RwLock<HashMap<Uuid, PersonalAccessToken>>,
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert(&self, pat: &PersonalAccessToken) -> Result<(), StoreError> {
        let mut pats = self.pats.write().await;
        for existing in pats.values() {
            if existing.name == pat.name {
                return Err(StoreError::Conflict { field: "name" });
            }
            if existing.public_identifier == pat.public_identifier {
                return Err(StoreError::Conflict { field: "public_identifier" });
            }
            if existing.is_bootstrap() && pat.is_bootstrap() {
                return Err(StoreError::Conflict { field: "bootstrap" });
            }
        }
        if pats.contains_key(&pat.id) {
            return Err(StoreError::Conflict { field: "id" });
        }
        pats.insert(pat.id, pat.clone());
        Ok(())
    }

    async fn find_by_public_identifier(
        &self,
        public_identifier: &str,
    ) -> Result<Option<PersonalAccessToken>, StoreError> {
        let pats = self.pats.read().await;
        Ok(pats
            .values()
            .find(|p| p.public_identifier == public_identifier)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PersonalAccessToken>, StoreError> {
        Ok(self.pats.read().await.get(&id).cloned())
    }

    async fn exists_bootstrap(&self) -> Result<bool, StoreError> {
        Ok(self.pats.read().await.values().any(|p| p.is_bootstrap()))
    }

    async fn mark_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(pat) = self.pats.write().await.get_mut(&id) {
            pat.last_used_at = Some(at);
        }
        Ok(())
    }

    async fn revoke(&self, id: Uuid) -> Result<bool, StoreError> {
        match self.pats.write().await.get_mut(&id) {
            Some(pat) => {
                pat.revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn replace_secret(
        &self,
        id: Uuid,
        public_identifier: &str,
        secret_hash: &str,
    ) -> Result<(), StoreError> {
        let mut pats = self.pats.write().await;
        if pats
            .values()
            .any(|p| p.id != id && p.public_identifier == public_identifier)
        {
            return Err(StoreError::Conflict { field: "public_identifier" });
        }
        match pats.get_mut(&id) {
            Some(pat) if !pat.revoked => {
                pat.public_identifier = public_identifier.to_string();
                pat.secret_hash = secret_hash.to_string();
                pat.last_used_at = None;
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }

    async fn list(&self) -> Result<Vec<PersonalAccessToken>, StoreError> {
        let mut all: Vec<_> = self.pats.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_user_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.google_id.as_deref() == Some(google_id))
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        check_user_unique(&users, user)?;
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(StoreError::NotFound);
        }
        check_user_unique(&users, user)?;
        users.insert(user.id, user.clone());
        Ok(())
    }
}

fn check_user_unique(users: &HashMap<Uuid, User>, user: &User) -> Result<(), StoreError> {
    for other in users.values().filter(|u| u.id != user.id) {
        if other.email.eq_ignore_ascii_case(&user.email) {
            return Err(StoreError::Conflict { field: "email" });
        }
        if user.google_id.is_some() && other.google_id == user.google_id {
            return Err(StoreError::Conflict { field: "google_id" });
        }
    }
    Ok(())
}
