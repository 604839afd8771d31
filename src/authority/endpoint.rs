//! The validation contract answered on every protected request.
//!
//! Classifies the presented credential, delegates to session-token or PAT
//! validation, and always produces a [`ValidationDecision`]. Faults and
//! deadline overruns become `internal_error`; nothing here fails open.

use std::sync::Arc;
use std::time::Duration;

use crate::authority::validator::PatValidator;
use crate::authority::with_timeout;
use crate::config::Config;
use crate::crypto::jwt::{SessionTokenError, TokenSigner};
use crate::crypto::secret::{parse_pat, PresentedPat, PAT_PREFIX};
use crate::errors::AppError;
use crate::models::validation::{AuthMethod, Principal, RejectReason, ValidationDecision};

/// Longest credential accepted from a header.
pub const MAX_CREDENTIAL_BYTES: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential<'a> {
    Pat(PresentedPat<'a>),
    Session(&'a str),
}

/// Accepts `Bearer <token>` or a bare `pat_…` value. A PAT is recognised by
/// its prefix; any other bearer token is treated as a session token.
pub fn classify(raw: &str) -> Result<Credential<'_>, RejectReason> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RejectReason::MissingCredential);
    }
    if raw.len() > MAX_CREDENTIAL_BYTES {
        return Err(RejectReason::MalformedCredential);
    }

    let token = match raw.strip_prefix("Bearer ") {
        Some(rest) => rest.trim(),
        None if raw.starts_with(PAT_PREFIX) => raw,
        None => return Err(RejectReason::MalformedCredential),
    };
    if token.is_empty() {
        return Err(RejectReason::MissingCredential);
    }

    if token.starts_with(PAT_PREFIX) {
        return parse_pat(token)
            .map(Credential::Pat)
            .ok_or(RejectReason::MalformedCredential);
    }
    Ok(Credential::Session(token))
}

pub struct TokenValidationService {
    pats: Arc<PatValidator>,
    signer: Arc<dyn TokenSigner>,
    jwt_enabled: bool,
    pat_enabled: bool,
    timeout: Duration,
}

impl TokenValidationService {
    pub fn new(pats: Arc<PatValidator>, signer: Arc<dyn TokenSigner>, cfg: &Config) -> Self {
        Self {
            pats,
            signer,
            jwt_enabled: cfg.jwt_enabled,
            pat_enabled: cfg.pat_enabled,
            timeout: cfg.operation_timeout(),
        }
    }

    /// Validate under the configured deadline.
    pub async fn validate(&self, presented: Option<&str>) -> ValidationDecision {
        self.validate_within(presented, self.timeout).await
    }

    /// Validate under a caller-supplied deadline.
    pub async fn validate_within(&self, presented: Option<&str>, limit: Duration) -> ValidationDecision {
        let Some(raw) = presented else {
            return ValidationDecision::Invalid(RejectReason::MissingCredential);
        };
        let credential = match classify(raw) {
            Ok(c) => c,
            Err(reason) => return ValidationDecision::Invalid(reason),
        };

        let decision = with_timeout(limit, async { Ok::<_, AppError>(self.decide(credential).await) }).await;
        match decision {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(error = %e, "token validation did not complete");
                ValidationDecision::Invalid(RejectReason::InternalError)
            }
        }
    }

    async fn decide(&self, credential: Credential<'_>) -> ValidationDecision {
        match credential {
            Credential::Session(token) => {
                if !self.jwt_enabled {
                    return ValidationDecision::Invalid(RejectReason::CredentialTypeDisabled);
                }
                self.decide_session(token)
            }
            Credential::Pat(pat) => {
                if !self.pat_enabled {
                    return ValidationDecision::Invalid(RejectReason::CredentialTypeDisabled);
                }
                self.pats.validate(pat.public_identifier, pat.secret).await
            }
        }
    }

    fn decide_session(&self, token: &str) -> ValidationDecision {
        match self.signer.verify_access(token) {
            Ok(claims) => ValidationDecision::Valid(Principal {
                user_id: claims.sub,
                email: claims.email,
                role: claims.role,
                method: AuthMethod::Session,
            }),
            Err(SessionTokenError::Expired) => {
                ValidationDecision::Invalid(RejectReason::ExpiredSessionToken)
            }
            Err(_) => ValidationDecision::Invalid(RejectReason::InvalidSessionToken),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_bearer_pat() {
        let c = classify("Bearer pat_abcdef_s3cr_et").unwrap();
        match c {
            Credential::Pat(p) => {
                assert_eq!(p.public_identifier, "abcdef");
                assert_eq!(p.secret, "s3cr_et");
            }
            other => panic!("expected PAT, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_raw_pat_without_bearer() {
        assert!(matches!(classify("pat_abc_def"), Ok(Credential::Pat(_))));
    }

    #[test]
    fn test_classify_session() {
        assert_eq!(classify("Bearer eyJ.a.b"), Ok(Credential::Session("eyJ.a.b")));
    }

    #[test]
    fn test_classify_rejections() {
        assert_eq!(classify(""), Err(RejectReason::MissingCredential));
        assert_eq!(classify("Bearer   "), Err(RejectReason::MissingCredential));
        assert_eq!(classify("Basic dXNlcjpwYXNz"), Err(RejectReason::MalformedCredential));
        assert_eq!(classify("Bearer pat_nosecret"), Err(RejectReason::MalformedCredential));

        let huge = format!("Bearer {}", "a".repeat(MAX_CREDENTIAL_BYTES));
        assert_eq!(classify(&huge), Err(RejectReason::MalformedCredential));
    }
}
