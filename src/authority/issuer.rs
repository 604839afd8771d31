//! PAT issuance, bootstrap guard and rotation.
//!
//! The issuer is the only place a plaintext secret is created. It is hashed on
//! the blocking pool, the hash is persisted, and the plaintext is handed back
//! exactly once inside an [`IssuedPat`]. Nothing here logs it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::config::Config;
use crate::crypto::hasher::{hash_off_thread, SecretHasher};
use crate::crypto::secret::{generate_public_identifier, generate_secret, PlaintextToken};
use crate::errors::AppError;
use crate::models::token::{CreatedBy, PatScope, PersonalAccessToken};
use crate::store::{CredentialStore, StoreError};

pub const BOOTSTRAP_PAT_NAME: &str = "bootstrap";

const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Clone)]
pub struct IssuancePolicy {
    pub secret_bytes: usize,
    /// `None` = the bootstrap PAT never expires.
    pub bootstrap_validity: Option<Duration>,
}

impl From<&Config> for IssuancePolicy {
    fn from(cfg: &Config) -> Self {
        Self {
            secret_bytes: cfg.pat_secret_bytes,
            bootstrap_validity: cfg.bootstrap_validity(),
        }
    }
}

/// A freshly issued (or rotated) PAT together with its one-time plaintext.
#[derive(Debug)]
pub struct IssuedPat {
    pub pat: PersonalAccessToken,
    pub token: PlaintextToken,
}

pub struct PatIssuer {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn SecretHasher>,
    policy: IssuancePolicy,
}

impl PatIssuer {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn SecretHasher>,
        policy: IssuancePolicy,
    ) -> Self {
        Self {
            store,
            hasher,
            policy,
        }
    }

    /// Issue the single genesis credential.
    ///
    /// The `exists_bootstrap` pre-check only avoids needless hashing; the store's
    /// bootstrap uniqueness is what decides a race.
    pub async fn issue_bootstrap(&self) -> Result<IssuedPat, AppError> {
        self.issue_bootstrap_at(Utc::now()).await
    }

    pub async fn issue_bootstrap_at(&self, now: DateTime<Utc>) -> Result<IssuedPat, AppError> {
        if self.store.exists_bootstrap().await? {
            return Err(AppError::AlreadyBootstrapped);
        }

        let expires_at = match self.policy.bootstrap_validity {
            Some(validity) => Some(now.checked_add_signed(validity).ok_or_else(|| {
                AppError::InvalidRequest("bootstrap validity out of range".into())
            })?),
            None => None,
        };
        let issued = self
            .mint(BOOTSTRAP_PAT_NAME, PatScope::Admin, expires_at, CreatedBy::System, now)
            .await?;

        match self.store.insert(&issued.pat).await {
            Ok(()) => {
                tracing::info!(
                    pat_id = %issued.pat.id,
                    public_identifier = %issued.pat.public_identifier,
                    expires_at = ?issued.pat.expires_at,
                    "bootstrap PAT issued"
                );
                Ok(issued)
            }
            Err(StoreError::Conflict { field }) => {
                tracing::info!(field, "bootstrap lost insert race");
                Err(AppError::AlreadyBootstrapped)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn issue(
        &self,
        name: &str,
        scope: PatScope,
        expires_at: Option<DateTime<Utc>>,
        created_by: CreatedBy,
    ) -> Result<IssuedPat, AppError> {
        self.issue_at(name, scope, expires_at, created_by, Utc::now()).await
    }

    pub async fn issue_at(
        &self,
        name: &str,
        scope: PatScope,
        expires_at: Option<DateTime<Utc>>,
        created_by: CreatedBy,
        now: DateTime<Utc>,
    ) -> Result<IssuedPat, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidRequest("name must not be blank".into()));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(AppError::InvalidRequest(format!(
                "name must be at most {} characters",
                MAX_NAME_LEN
            )));
        }
        if created_by.is_system() {
            return Err(AppError::InvalidRequest(
                "the SYSTEM principal is reserved for the bootstrap credential".into(),
            ));
        }
        if expires_at.is_some_and(|at| at <= now) {
            return Err(AppError::InvalidRequest("expiresAt must be in the future".into()));
        }

        let issued = self.mint(name, scope, expires_at, created_by, now).await?;
        self.store.insert(&issued.pat).await?;

        tracing::info!(
            pat_id = %issued.pat.id,
            name = %issued.pat.name,
            scope = %issued.pat.scope,
            created_by = %issued.pat.created_by,
            "PAT issued"
        );
        Ok(issued)
    }

    /// Replace identifier and secret of an active record. The old secret stops
    /// validating as soon as the store write lands.
    pub async fn rotate(&self, id: Uuid) -> Result<IssuedPat, AppError> {
        let mut pat = self.store.find_by_id(id).await?.ok_or(AppError::NotFound)?;
        if pat.revoked {
            return Err(AppError::InvalidRequest("cannot rotate a revoked token".into()));
        }

        let public_identifier = generate_public_identifier();
        let secret = generate_secret(self.policy.secret_bytes);
        let token = PlaintextToken::new(&public_identifier, &secret);
        let secret_hash = hash_off_thread(self.hasher.clone(), secret).await?;

        match self
            .store
            .replace_secret(id, &public_identifier, &secret_hash)
            .await
        {
            Ok(()) => {}
            // Revoked between the read and the write.
            Err(StoreError::NotFound) => {
                return Err(AppError::InvalidRequest("cannot rotate a revoked token".into()))
            }
            Err(e) => return Err(e.into()),
        }

        pat.public_identifier = public_identifier;
        pat.secret_hash = secret_hash;
        pat.last_used_at = None;
        tracing::info!(pat_id = %pat.id, name = %pat.name, "PAT rotated");
        Ok(IssuedPat { pat, token })
    }

    async fn mint(
        &self,
        name: &str,
        scope: PatScope,
        expires_at: Option<DateTime<Utc>>,
        created_by: CreatedBy,
        now: DateTime<Utc>,
    ) -> Result<IssuedPat, AppError> {
        let public_identifier = generate_public_identifier();
        let secret = generate_secret(self.policy.secret_bytes);
        let token = PlaintextToken::new(&public_identifier, &secret);
        let secret_hash = hash_off_thread(self.hasher.clone(), secret).await?;

        let pat = PersonalAccessToken {
            id: Uuid::new_v4(),
            name: name.to_string(),
            public_identifier,
            secret_hash,
            scope,
            expires_at,
            created_by,
            created_at: now,
            last_used_at: None,
            revoked: false,
        };
        Ok(IssuedPat { pat, token })
    }
}
