//! First-party session tokens: HS256 JWTs with separate access and refresh keys.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::models::session::{SessionClaims, SessionToken, TokenKind, TOKEN_TYPE_BEARER};
use crate::models::user::User;

#[derive(Debug, Error)]
pub enum SessionTokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token")]
    Invalid,

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Signs and verifies session tokens on behalf of the session issuer and the
/// validation endpoint.
pub trait TokenSigner: Send + Sync {
    fn issue(&self, user: &User) -> Result<SessionToken, SessionTokenError>;
    fn verify_access(&self, token: &str) -> Result<SessionClaims, SessionTokenError>;
    fn verify_refresh(&self, token: &str) -> Result<SessionClaims, SessionTokenError>;
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

pub struct JwtSigner {
    access: KeyPair,
    refresh: KeyPair,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtSigner {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        issuer: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access: KeyPair::from_secret(access_secret),
            refresh: KeyPair::from_secret(refresh_secret),
            issuer: issuer.to_string(),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            &cfg.jwt_access_secret,
            &cfg.jwt_refresh_secret,
            &cfg.jwt_issuer,
            cfg.access_token_ttl(),
            cfg.refresh_token_ttl(),
        )
    }

    /// Issue a pair as if the current time were `now`.
    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<SessionToken, SessionTokenError> {
        let access = self.claims(user, TokenKind::Access, now, self.access_ttl)?;
        let refresh = self.claims(user, TokenKind::Refresh, now, self.refresh_ttl)?;
        Ok(SessionToken {
            access_token: self.sign(&access, &self.access)?,
            refresh_token: self.sign(&refresh, &self.refresh)?,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    fn claims(
        &self,
        user: &User,
        kind: TokenKind,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<SessionClaims, SessionTokenError> {
        let exp = now
            .checked_add_signed(ttl)
            .ok_or_else(|| SessionTokenError::Signing("token lifetime out of range".into()))?;
        Ok(SessionClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role.as_str().to_string(),
            kind,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            // Refresh tokens get a unique id so two refreshes in the same second differ.
            jti: (kind == TokenKind::Refresh).then(|| Uuid::new_v4().to_string()),
        })
    }

    fn sign(&self, claims: &SessionClaims, keys: &KeyPair) -> Result<String, SessionTokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &keys.encoding)
            .map_err(|e| SessionTokenError::Signing(e.to_string()))
    }

    fn verify(&self, token: &str, kind: TokenKind, keys: &KeyPair) -> Result<SessionClaims, SessionTokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;

        let data = decode::<SessionClaims>(token, &keys.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => SessionTokenError::Expired,
                _ => SessionTokenError::Invalid,
            }
        })?;
        if data.claims.kind != kind {
            return Err(SessionTokenError::Invalid);
        }
        Ok(data.claims)
    }
}

impl TokenSigner for JwtSigner {
    fn issue(&self, user: &User) -> Result<SessionToken, SessionTokenError> {
        self.issue_at(user, Utc::now())
    }

    fn verify_access(&self, token: &str) -> Result<SessionClaims, SessionTokenError> {
        self.verify(token, TokenKind::Access, &self.access)
    }

    fn verify_refresh(&self, token: &str) -> Result<SessionClaims, SessionTokenError> {
        self.verify(token, TokenKind::Refresh, &self.refresh)
    }
}
