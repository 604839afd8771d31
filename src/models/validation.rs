//! Outcome of token validation and its wire shape.
//!
//! The JSON produced by [`ValidationResponse`] is parsed by the external
//! authorization layer; field names and presence rules must stay stable.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Session,
    Pat,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Session => "session",
            AuthMethod::Pat => "pat",
        }
    }
}

/// Why a credential was refused. Serialized as a stable snake_case code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    MissingCredential,
    MalformedCredential,
    UnknownCredential,
    BadCredential,
    Revoked,
    Expired,
    InsufficientScope,
    InvalidSessionToken,
    ExpiredSessionToken,
    CredentialTypeDisabled,
    InternalError,
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::MissingCredential => "missing_credential",
            RejectReason::MalformedCredential => "malformed_credential",
            RejectReason::UnknownCredential => "unknown_credential",
            RejectReason::BadCredential => "bad_credential",
            RejectReason::Revoked => "revoked",
            RejectReason::Expired => "expired",
            RejectReason::InsufficientScope => "insufficient_scope",
            RejectReason::InvalidSessionToken => "invalid_session_token",
            RejectReason::ExpiredSessionToken => "expired_session_token",
            RejectReason::CredentialTypeDisabled => "credential_type_disabled",
            RejectReason::InternalError => "internal_error",
        }
    }

    /// Human-readable text for the `error` field.
    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::MissingCredential => "missing credential",
            RejectReason::MalformedCredential => "malformed credential",
            RejectReason::UnknownCredential => "unknown credential",
            RejectReason::BadCredential => "bad credential",
            RejectReason::Revoked => "revoked",
            RejectReason::Expired => "expired",
            RejectReason::InsufficientScope => "insufficient scope",
            RejectReason::InvalidSessionToken => "invalid token",
            RejectReason::ExpiredSessionToken => "token expired",
            RejectReason::CredentialTypeDisabled => "credential type disabled",
            RejectReason::InternalError => "internal error",
        }
    }
}

/// Identity attached to a credential that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub email: String,
    pub role: String,
    pub method: AuthMethod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationDecision {
    Valid(Principal),
    Invalid(RejectReason),
}

impl ValidationDecision {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationDecision::Valid(_))
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            ValidationDecision::Valid(p) => Some(p),
            ValidationDecision::Invalid(_) => None,
        }
    }

    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            ValidationDecision::Valid(_) => None,
            ValidationDecision::Invalid(r) => Some(*r),
        }
    }
}

/// `{ valid, userId?, email?, role?, error?, reason? }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

impl From<&ValidationDecision> for ValidationResponse {
    fn from(decision: &ValidationDecision) -> Self {
        match decision {
            ValidationDecision::Valid(p) => Self {
                valid: true,
                user_id: Some(p.user_id.clone()),
                email: Some(p.email.clone()),
                role: Some(p.role.clone()),
                error: None,
                reason: None,
            },
            ValidationDecision::Invalid(r) => Self {
                valid: false,
                user_id: None,
                email: None,
                role: None,
                error: Some(r.message().to_string()),
                reason: Some(*r),
            },
        }
    }
}
