//! One-way hashing of credential secrets (Argon2id, PHC string format).

use std::sync::Arc;

use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("invalid hasher parameters: {0}")]
    Params(String),

    #[error("hash computation failed: {0}")]
    Compute(String),

    #[error("stored hash is malformed")]
    MalformedHash,
}

/// Hashes and verifies secrets. Implementations never log or return the input.
pub trait SecretHasher: Send + Sync {
    fn hash(&self, secret: &str) -> Result<String, HashError>;

    /// `Ok(false)` on mismatch; `Err` only for computational faults.
    fn verify(&self, secret: &str, hash: &str) -> Result<bool, HashError>;
}

#[derive(Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, HashError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| HashError::Params(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl SecretHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> Result<String, HashError> {
        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);
        let salt = SaltString::encode_b64(&salt).map_err(|e| HashError::Compute(e.to_string()))?;
        self.argon2()
            .hash_password(secret.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| HashError::Compute(e.to_string()))
    }

    fn verify(&self, secret: &str, hash: &str) -> Result<bool, HashError> {
        let parsed = PasswordHash::new(hash).map_err(|_| HashError::MalformedHash)?;
        // Cost parameters come from the stored hash, so records hashed under an
        // older policy still verify.
        match self.argon2().verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(HashError::Compute(e.to_string())),
        }
    }
}

// ── Blocking-pool wrappers ───────────────────────────────────

/// Hash on the blocking pool; Argon2 is CPU-bound and must not stall the runtime.
pub async fn hash_off_thread(
    hasher: Arc<dyn SecretHasher>,
    secret: Zeroizing<String>,
) -> Result<String, HashError> {
    tokio::task::spawn_blocking(move || hasher.hash(&secret))
        .await
        .map_err(|e| HashError::Compute(format!("hashing task failed: {}", e)))?
}

pub async fn verify_off_thread(
    hasher: Arc<dyn SecretHasher>,
    secret: Zeroizing<String>,
    hash: String,
) -> Result<bool, HashError> {
    tokio::task::spawn_blocking(move || hasher.verify(&secret, &hash))
        .await
        .map_err(|e| HashError::Compute(format!("verification task failed: {}", e)))?
}
