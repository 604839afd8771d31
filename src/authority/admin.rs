use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::token::{PatFilter, PatSummary};
use crate::store::CredentialStore;

/// Administrative reads and revocation of PAT records.
pub struct PatAdmin {
    store: Arc<dyn CredentialStore>,
}

impl PatAdmin {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Summaries (newest first) of records matching `filter` as of `now`.
    pub async fn list(&self, filter: PatFilter, now: DateTime<Utc>) -> Result<Vec<PatSummary>, AppError> {
        let pats = self.store.list().await?;
        Ok(pats
            .iter()
            .filter(|p| filter.matches(p, now))
            .map(|p| p.summary_at(now))
            .collect())
    }

    /// Permanent. Revoking twice is a no-op; unknown ids are `NotFound`.
    pub async fn revoke(&self, id: Uuid) -> Result<(), AppError> {
        if !self.store.revoke(id).await? {
            return Err(AppError::NotFound);
        }
        tracing::info!(pat_id = %id, "PAT revoked");
        Ok(())
    }
}
