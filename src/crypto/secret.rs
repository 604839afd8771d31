//! Generation and parsing of PAT credentials.
//!
//! A PAT is presented as `pat_<publicIdentifier>_<secret>`:
//! - `publicIdentifier`: 32 lowercase hex chars, random and independent of the secret
//! - `secret`: base64url (unpadded) of N random bytes; only this part is hashed

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Serialize, Serializer};
use uuid::Uuid;
use zeroize::{Zeroize, Zeroizing};

pub const PAT_PREFIX: &str = "pat_";

/// Floor on secret entropy, regardless of configuration.
pub const MIN_SECRET_BYTES: usize = 32;

pub fn generate_public_identifier() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Random secret of at least [`MIN_SECRET_BYTES`] bytes, base64url-encoded.
pub fn generate_secret(bytes: usize) -> Zeroizing<String> {
    let mut buf = vec![0u8; bytes.max(MIN_SECRET_BYTES)];
    OsRng.fill_bytes(&mut buf);
    let encoded = URL_SAFE_NO_PAD.encode(&buf);
    buf.zeroize();
    Zeroizing::new(encoded)
}

/// The full plaintext credential, alive only between issuance and display.
///
/// Wiped on drop. `Debug` never prints the value.
pub struct PlaintextToken(Zeroizing<String>);

impl PlaintextToken {
    pub fn new(public_identifier: &str, secret: &str) -> Self {
        Self(Zeroizing::new(format!(
            "{}{}_{}",
            PAT_PREFIX, public_identifier, secret
        )))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for PlaintextToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PlaintextToken(<redacted>)")
    }
}

/// Serializes the plaintext in place, so response bodies need no unzeroized copy.
impl Serialize for PlaintextToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

/// A PAT split into its lookup key and secret. Borrowed from the request.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PresentedPat<'a> {
    pub public_identifier: &'a str,
    pub secret: &'a str,
}

impl fmt::Debug for PresentedPat<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresentedPat")
            .field("public_identifier", &self.public_identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Split `pat_<id>_<secret>`. The identifier is hex so the first `_` after the
/// prefix is the separator; the secret itself may contain `_`.
pub fn parse_pat(token: &str) -> Option<PresentedPat<'_>> {
    let rest = token.strip_prefix(PAT_PREFIX)?;
    let (public_identifier, secret) = rest.split_once('_')?;
    if public_identifier.is_empty()
        || secret.is_empty()
        || !public_identifier.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return None;
    }
    Some(PresentedPat {
        public_identifier,
        secret,
    })
}
