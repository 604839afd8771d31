//! Credential cryptography: secret hashing, PAT generation, session JWTs.

pub mod hasher;
pub mod jwt;
pub mod secret;
