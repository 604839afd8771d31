//! Google ID token verification.
//!
//! Workflow:
//! 1. Decode the JWT header → `kid`
//! 2. Look up the signing key in the cached JWKS (refetched on TTL expiry or `kid` miss)
//! 3. Verify RS256 signature, expiry, audience (our client id) and issuer
//! 4. Require a verified email and map the claims to a [`VerifiedIdentity`]
//!
//! Keys are cached in-memory with a 1-hour TTL.

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use once_cell::sync::Lazy;
use serde::Deserialize;
use thiserror::Error;

use crate::models::session::VerifiedIdentity;

pub const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

#[derive(Debug, Error)]
pub enum IdentityError {
    /// The token is not a valid proof of identity.
    #[error("identity token rejected: {0}")]
    Rejected(String),

    /// The provider (or our configuration for it) is unusable right now.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Exchanges an external ID token for a verified identity.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError>;
}

// ── Types ────────────────────────────────────────────────────

/// JSON Web Key Set.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// A single RSA JSON Web Key.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub kid: Option<String>,
    pub alg: Option<String>,
    pub n: Option<String>,
    pub e: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    email: Option<String>,
    /// Google sends a bool; some libraries re-encode it as a string.
    email_verified: Option<serde_json::Value>,
    name: Option<String>,
}

impl GoogleClaims {
    fn email_is_verified(&self) -> bool {
        match &self.email_verified {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

// ── JWKS Cache ───────────────────────────────────────────────

struct CachedJwks {
    jwks: Jwks,
    fetched_at: chrono::DateTime<Utc>,
}

static JWKS_CACHE: Lazy<DashMap<String, CachedJwks>> = Lazy::new(DashMap::new);

const JWKS_CACHE_TTL_SECS: i64 = 3600; // 1 hour

// ── Verifier ─────────────────────────────────────────────────

pub struct GoogleIdTokenVerifier {
    client_id: Option<String>,
    jwks_uri: String,
    http: reqwest::Client,
}

impl GoogleIdTokenVerifier {
    pub fn new(client_id: Option<String>, jwks_uri: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client_id,
            jwks_uri: jwks_uri.into(),
            http,
        }
    }

    async fn fetch_jwks(&self) -> Result<Jwks, IdentityError> {
        tracing::info!(jwks_uri = %self.jwks_uri, "Fetching JWKS keys");
        let resp = self
            .http
            .get(&self.jwks_uri)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| IdentityError::Unavailable(format!("JWKS fetch failed: {}", e)))?;
        let jwks: Jwks = resp
            .json()
            .await
            .map_err(|e| IdentityError::Unavailable(format!("JWKS decode failed: {}", e)))?;

        JWKS_CACHE.insert(
            self.jwks_uri.clone(),
            CachedJwks {
                jwks: jwks.clone(),
                fetched_at: Utc::now(),
            },
        );
        Ok(jwks)
    }

    fn cached_key(&self, kid: &str) -> Option<Jwk> {
        let cached = JWKS_CACHE.get(&self.jwks_uri)?;
        if Utc::now() - cached.fetched_at >= Duration::seconds(JWKS_CACHE_TTL_SECS) {
            return None;
        }
        find_key(&cached.jwks, kid)
    }

    /// Cached key if present, else refetch once (Google rotates keys).
    async fn signing_key(&self, kid: &str) -> Result<Jwk, IdentityError> {
        if let Some(key) = self.cached_key(kid) {
            return Ok(key);
        }
        let jwks = self.fetch_jwks().await?;
        find_key(&jwks, kid).ok_or_else(|| IdentityError::Rejected("no matching signing key".into()))
    }
}

fn find_key(jwks: &Jwks, kid: &str) -> Option<Jwk> {
    jwks.keys
        .iter()
        .find(|k| k.kty == "RSA" && k.kid.as_deref() == Some(kid))
        .cloned()
}

#[async_trait]
impl IdentityVerifier for GoogleIdTokenVerifier {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let client_id = self
            .client_id
            .as_deref()
            .ok_or_else(|| IdentityError::Unavailable("GOOGLE_CLIENT_ID is not configured".into()))?;

        let header = decode_header(id_token)
            .map_err(|e| IdentityError::Rejected(format!("malformed token: {}", e)))?;
        if header.alg != Algorithm::RS256 {
            return Err(IdentityError::Rejected("unexpected signing algorithm".into()));
        }
        let kid = header
            .kid
            .ok_or_else(|| IdentityError::Rejected("token header has no kid".into()))?;

        let jwk = self.signing_key(&kid).await?;
        let (n, e) = jwk
            .n
            .as_deref()
            .zip(jwk.e.as_deref())
            .ok_or_else(|| IdentityError::Unavailable("signing key missing modulus/exponent".into()))?;
        let key = DecodingKey::from_rsa_components(n, e)
            .map_err(|e| IdentityError::Unavailable(format!("bad signing key: {}", e)))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[client_id]);
        validation.set_issuer(&GOOGLE_ISSUERS);

        let claims = decode::<GoogleClaims>(id_token, &key, &validation)
            .map_err(|e| IdentityError::Rejected(e.to_string()))?
            .claims;

        if !claims.email_is_verified() {
            return Err(IdentityError::Rejected("email not verified".into()));
        }
        let email = claims
            .email
            .clone()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| IdentityError::Rejected("token carries no email".into()))?;

        Ok(VerifiedIdentity {
            email: email.to_ascii_lowercase(),
            subject: claims.sub,
            name: claims.name,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────
