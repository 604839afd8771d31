//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use authority::config::Config;
use authority::crypto::hasher::{Argon2Hasher, SecretHasher};
use authority::identity::{IdentityError, IdentityVerifier};
use authority::models::session::VerifiedIdentity;
use authority::models::token::PersonalAccessToken;
use authority::state::AppState;
use authority::store::memory::MemoryStore;
use authority::store::{CredentialStore, StoreError};

pub const ACCESS_SECRET: &str = "integration-access-secret-0123456789abcdef";
pub const REFRESH_SECRET: &str = "integration-refresh-secret-0123456789abcdef";

/// Development defaults with a cheap Argon2 policy so tests stay fast.
pub fn test_config() -> Config {
    Config {
        jwt_access_secret: ACCESS_SECRET.into(),
        jwt_refresh_secret: REFRESH_SECRET.into(),
        jwt_issuer: "test-issuer".into(),
        google_client_id: Some("test-client".into()),
        argon2_memory_kib: 8,
        argon2_iterations: 1,
        argon2_parallelism: 1,
        ..Config::default()
    }
}

pub fn fast_hasher() -> Arc<dyn SecretHasher> {
    Arc::new(Argon2Hasher::new(8, 1, 1).expect("valid params"))
}

pub fn app_state(store: Arc<MemoryStore>, identity: Arc<dyn IdentityVerifier>) -> Arc<AppState> {
    app_state_with(test_config(), store, identity)
}

pub fn app_state_with(
    config: Config,
    store: Arc<MemoryStore>,
    identity: Arc<dyn IdentityVerifier>,
) -> Arc<AppState> {
    Arc::new(AppState::new(config, store.clone(), store, identity).expect("state builds"))
}

/// Usage tracking runs detached from validation; poll until it lands.
pub async fn wait_for_usage(store: &dyn CredentialStore, id: Uuid) -> Option<DateTime<Utc>> {
    for _ in 0..100 {
        if let Some(at) = store.find_by_id(id).await.ok().flatten().and_then(|p| p.last_used_at) {
            return Some(at);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
// Identity provider stub
// ═══════════════════════════════════════════════════════════════════════════

/// Maps literal ID tokens to identities; anything else is rejected.
#[derive(Default)]
pub struct StubIdentity {
    known: HashMap<String, VerifiedIdentity>,
}

impl StubIdentity {
    pub fn with(mut self, id_token: &str, email: &str, subject: &str) -> Self {
        self.known.insert(
            id_token.to_string(),
            VerifiedIdentity {
                email: email.to_string(),
                subject: subject.to_string(),
                name: Some(format!("User {}", subject)),
            },
        );
        self
    }
}

#[async_trait]
impl IdentityVerifier for StubIdentity {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError> {
        self.known
            .get(id_token)
            .cloned()
            .ok_or_else(|| IdentityError::Rejected("unknown test token".into()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Misbehaving credential stores
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Lookups hang for the given duration before answering.
    SlowLookup(Duration),
    /// Lookups fail as if the database were unreachable.
    LookupUnavailable,
    /// Only usage tracking fails.
    MarkUsedFails,
    /// Usage tracking hangs for the given duration before landing.
    SlowMarkUsed(Duration),
}

/// Delegates to a [`MemoryStore`] and injects one fault.
pub struct FaultyStore {
    pub inner: Arc<MemoryStore>,
    pub fault: Fault,
}

#[async_trait]
impl CredentialStore for FaultyStore {
    async fn insert(&self, pat: &PersonalAccessToken) -> Result<(), StoreError> {
        self.inner.insert(pat).await
    }

    async fn find_by_public_identifier(
        &self,
        public_identifier: &str,
    ) -> Result<Option<PersonalAccessToken>, StoreError> {
        match self.fault {
            Fault::SlowLookup(delay) => tokio::time::sleep(delay).await,
            Fault::LookupUnavailable => {
                return Err(StoreError::Unavailable("connection refused".into()))
            }
            Fault::MarkUsedFails | Fault::SlowMarkUsed(_) => {}
        }
        self.inner.find_by_public_identifier(public_identifier).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PersonalAccessToken>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn exists_bootstrap(&self) -> Result<bool, StoreError> {
        self.inner.exists_bootstrap().await
    }

    async fn mark_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        match self.fault {
            Fault::MarkUsedFails => return Err(StoreError::Unavailable("write timeout".into())),
            Fault::SlowMarkUsed(delay) => tokio::time::sleep(delay).await,
            _ => {}
        }
        self.inner.mark_used(id, at).await
    }

    async fn revoke(&self, id: Uuid) -> Result<bool, StoreError> {
        self.inner.revoke(id).await
    }

    async fn replace_secret(
        &self,
        id: Uuid,
        public_identifier: &str,
        secret_hash: &str,
    ) -> Result<(), StoreError> {
        self.inner.replace_secret(id, public_identifier, secret_hash).await
    }

    async fn list(&self) -> Result<Vec<PersonalAccessToken>, StoreError> {
        self.inner.list().await
    }
}
