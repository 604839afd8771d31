use std::sync::Arc;

use anyhow::Context;

use crate::authority::admin::PatAdmin;
use crate::authority::endpoint::TokenValidationService;
use crate::authority::issuer::{IssuancePolicy, PatIssuer};
use crate::authority::session::SessionIssuer;
use crate::authority::validator::PatValidator;
use crate::config::Config;
use crate::crypto::hasher::{Argon2Hasher, SecretHasher};
use crate::crypto::jwt::{JwtSigner, TokenSigner};
use crate::identity::{GoogleIdTokenVerifier, IdentityVerifier};
use crate::store::memory::MemoryStore;
use crate::store::postgres::PgStore;
use crate::store::{CredentialStore, UserStore};

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub config: Config,
    pub issuer: PatIssuer,
    pub admin: PatAdmin,
    pub sessions: SessionIssuer,
    pub validation: TokenValidationService,
}

impl AppState {
    pub fn new(
        config: Config,
        credentials: Arc<dyn CredentialStore>,
        users: Arc<dyn UserStore>,
        identity: Arc<dyn IdentityVerifier>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let hasher: Arc<dyn SecretHasher> = Arc::new(
            Argon2Hasher::new(
                config.argon2_memory_kib,
                config.argon2_iterations,
                config.argon2_parallelism,
            )
            .context("invalid Argon2 parameters")?,
        );
        let signer: Arc<dyn TokenSigner> = Arc::new(JwtSigner::from_config(&config));

        let validator = Arc::new(
            PatValidator::new(credentials.clone(), hasher.clone())
                .context("failed to initialise PAT validator")?,
        );

        Ok(Self {
            issuer: PatIssuer::new(credentials.clone(), hasher, IssuancePolicy::from(&config)),
            admin: PatAdmin::new(credentials),
            sessions: SessionIssuer::new(users, signer.clone(), identity, config.auto_create_users),
            validation: TokenValidationService::new(validator, signer, &config),
            config,
        })
    }

    /// Wire stores and collaborators from configuration. Runs migrations when
    /// a database is configured.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let identity: Arc<dyn IdentityVerifier> = Arc::new(GoogleIdTokenVerifier::new(
            config.google_client_id.clone(),
            config.google_jwks_uri.clone(),
        ));

        match config.database_url.clone() {
            Some(url) => {
                tracing::info!("Connecting to database...");
                let db = Arc::new(PgStore::connect(&url).await.context("database connection failed")?);
                tracing::info!("Running migrations...");
                db.migrate().await?;
                Self::new(config, db.clone(), db, identity)
            }
            None => {
                tracing::warn!("DATABASE_URL is not set, using the in-memory store; nothing will persist");
                let mem = Arc::new(MemoryStore::new());
                Self::new(config, mem.clone(), mem, identity)
            }
        }
    }
}
