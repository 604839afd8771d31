//! PAT validation.
//!
//! Check order: lookup → secret → revoked → expired → scope. An unknown
//! identifier still pays for one hash verification against a decoy hash, so
//! "unknown" and "wrong secret" cost the same.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::hasher::{verify_off_thread, HashError, SecretHasher};
use crate::crypto::secret::generate_secret;
use crate::models::token::{PatScope, PersonalAccessToken};
use crate::models::validation::{AuthMethod, Principal, RejectReason, ValidationDecision};
use crate::store::CredentialStore;

pub struct PatValidator {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn SecretHasher>,
    decoy_hash: String,
}

impl PatValidator {
    pub fn new(store: Arc<dyn CredentialStore>, hasher: Arc<dyn SecretHasher>) -> Result<Self, HashError> {
        let decoy_hash = hasher.hash(&generate_secret(32))?;
        Ok(Self {
            store,
            hasher,
            decoy_hash,
        })
    }

    pub async fn validate(&self, public_identifier: &str, secret: &str) -> ValidationDecision {
        self.validate_at(public_identifier, secret, Utc::now()).await
    }

    pub async fn validate_at(
        &self,
        public_identifier: &str,
        secret: &str,
        now: DateTime<Utc>,
    ) -> ValidationDecision {
        self.validate_for_scope(public_identifier, secret, PatScope::ReadOnly, now)
            .await
    }

    /// Like [`validate_at`](Self::validate_at) but also requires `required` scope.
    pub async fn validate_for_scope(
        &self,
        public_identifier: &str,
        secret: &str,
        required: PatScope,
        now: DateTime<Utc>,
    ) -> ValidationDecision {
        let record = match self.store.find_by_public_identifier(public_identifier).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(error = %e, "PAT lookup failed");
                return ValidationDecision::Invalid(RejectReason::InternalError);
            }
        };

        let secret = Zeroizing::new(secret.to_string());
        let Some(pat) = record else {
            let _ = verify_off_thread(self.hasher.clone(), secret, self.decoy_hash.clone()).await;
            tracing::debug!(public_identifier, "PAT rejected: unknown credential");
            return ValidationDecision::Invalid(RejectReason::UnknownCredential);
        };

        match verify_off_thread(self.hasher.clone(), secret, pat.secret_hash.clone()).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(pat_id = %pat.id, "PAT rejected: bad credential");
                return ValidationDecision::Invalid(RejectReason::BadCredential);
            }
            Err(e) => {
                tracing::error!(pat_id = %pat.id, error = %e, "PAT verification failed");
                return ValidationDecision::Invalid(RejectReason::InternalError);
            }
        }

        if pat.revoked {
            return ValidationDecision::Invalid(RejectReason::Revoked);
        }
        if pat.is_expired_at(now) {
            return ValidationDecision::Invalid(RejectReason::Expired);
        }
        if !pat.scope.grants(required) {
            tracing::debug!(pat_id = %pat.id, has = %pat.scope, required = %required, "PAT rejected: insufficient scope");
            return ValidationDecision::Invalid(RejectReason::InsufficientScope);
        }

        self.record_usage(pat.id, now);
        ValidationDecision::Valid(principal_for(&pat))
    }

    /// Detached from the caller: a slow or failing write must not hold up or
    /// change the decision.
    fn record_usage(&self, id: Uuid, at: DateTime<Utc>) {
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.mark_used(id, at).await {
                tracing::warn!(pat_id = %id, error = %e, "failed to record PAT usage");
            }
        });
    }
}

/// A PAT acts as its own principal: id = record id, email = PAT name, role = scope.
fn principal_for(pat: &PersonalAccessToken) -> Principal {
    Principal {
        user_id: pat.id.to_string(),
        email: pat.name.clone(),
        role: pat.scope.as_str().to_string(),
        method: AuthMethod::Pat,
    }
}
