//! Exchange of verified external identities for first-party session tokens.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::crypto::jwt::TokenSigner;
use crate::errors::AppError;
use crate::identity::{IdentityError, IdentityVerifier};
use crate::models::session::{SessionToken, VerifiedIdentity};
use crate::models::user::{User, UserInfo};
use crate::store::{StoreError, UserStore};

pub struct SessionIssuer {
    users: Arc<dyn UserStore>,
    signer: Arc<dyn TokenSigner>,
    identity: Arc<dyn IdentityVerifier>,
    auto_create_users: bool,
}

impl SessionIssuer {
    pub fn new(
        users: Arc<dyn UserStore>,
        signer: Arc<dyn TokenSigner>,
        identity: Arc<dyn IdentityVerifier>,
        auto_create_users: bool,
    ) -> Self {
        Self {
            users,
            signer,
            identity,
            auto_create_users,
        }
    }

    /// Verify a Google ID token, then [`login`](Self::login).
    pub async fn exchange(&self, id_token: &str) -> Result<SessionToken, AppError> {
        if id_token.trim().is_empty() {
            return Err(AppError::InvalidRequest("idToken must not be blank".into()));
        }
        let identity = self.identity.verify(id_token.trim()).await.map_err(|e| match e {
            IdentityError::Rejected(reason) => AppError::IdentityRejected(reason),
            IdentityError::Unavailable(reason) => {
                AppError::Internal(anyhow::anyhow!("identity provider: {}", reason))
            }
        })?;
        self.login(&identity).await
    }

    pub async fn login(&self, identity: &VerifiedIdentity) -> Result<SessionToken, AppError> {
        self.login_at(identity, Utc::now()).await
    }

    pub async fn login_at(
        &self,
        identity: &VerifiedIdentity,
        now: DateTime<Utc>,
    ) -> Result<SessionToken, AppError> {
        let mut user = self.resolve_user(identity).await?;
        if !user.active {
            return Err(AppError::IdentityRejected(format!("user {} is deactivated", user.id)));
        }

        user.last_login_at = Some(now);
        self.users.update_user(&user).await?;

        let tokens = self.signer.issue(&user)?;
        tracing::info!(user_id = %user.id, role = %user.role, "session issued");
        Ok(tokens)
    }

    /// Subject id first, then email (linking the subject), then auto-provision.
    async fn resolve_user(&self, identity: &VerifiedIdentity) -> Result<User, AppError> {
        if let Some(user) = self.users.find_user_by_google_id(&identity.subject).await? {
            return Ok(user);
        }

        if let Some(mut user) = self.users.find_user_by_email(&identity.email).await? {
            if user.google_id.is_some() {
                // Email already bound to another Google account.
                return Err(AppError::IdentityRejected(format!(
                    "email of user {} is linked to a different subject",
                    user.id
                )));
            }
            user.google_id = Some(identity.subject.clone());
            self.users.update_user(&user).await?;
            tracing::info!(user_id = %user.id, "linked Google account to existing user");
            return Ok(user);
        }

        if !self.auto_create_users {
            return Err(AppError::IdentityRejected("no account for identity".into()));
        }

        let name = identity
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| identity.email.clone());
        let user = User::new_player(&identity.email, &name, Some(identity.subject.clone()));
        match self.users.insert_user(&user).await {
            Ok(()) => {
                tracing::info!(user_id = %user.id, "provisioned user on first login");
                Ok(user)
            }
            // Concurrent first login for the same identity.
            Err(StoreError::Conflict { .. }) => self
                .users
                .find_user_by_google_id(&identity.subject)
                .await?
                .ok_or_else(|| AppError::IdentityRejected("account provisioning conflict".into())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<SessionToken, AppError> {
        let claims = self.signer.verify_refresh(refresh_token)?;
        let user = self.load_user(&claims.sub).await?;
        if !user.active {
            return Err(AppError::IdentityRejected(format!("user {} is deactivated", user.id)));
        }
        Ok(self.signer.issue(&user)?)
    }

    pub async fn current_user(&self, access_token: &str) -> Result<UserInfo, AppError> {
        let claims = self.signer.verify_access(access_token)?;
        let user = self.load_user(&claims.sub).await?;
        Ok(UserInfo::from(&user))
    }

    async fn load_user(&self, sub: &str) -> Result<User, AppError> {
        let id = Uuid::parse_str(sub).map_err(|_| AppError::Unauthorized)?;
        self.users
            .find_user_by_id(id)
            .await?
            .ok_or(AppError::Unauthorized)
    }
}
