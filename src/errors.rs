use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::crypto::hasher::HashError;
use crate::crypto::jwt::SessionTokenError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("conflict on {field}")]
    Conflict { field: &'static str },

    #[error("bootstrap credential already exists")]
    AlreadyBootstrapped,

    #[error("identity rejected: {0}")]
    IdentityRejected(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("operation timed out")]
    Timeout,

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("hashing error: {0}")]
    Hashing(#[from] HashError),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict { field } => AppError::Conflict { field },
            StoreError::NotFound => AppError::NotFound,
            other => AppError::Store(other),
        }
    }
}

impl From<SessionTokenError> for AppError {
    fn from(e: SessionTokenError) -> Self {
        match e {
            SessionTokenError::Expired | SessionTokenError::Invalid => AppError::Unauthorized,
            SessionTokenError::Signing(msg) => AppError::Signing(msg),
        }
    }
}

fn internal(kind: &str, cause: &dyn std::fmt::Display) -> (StatusCode, &'static str, &'static str, String) {
    tracing::error!("{} error: {}", kind, cause);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal_server_error",
        "internal server error".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::Conflict { field } => (
                StatusCode::CONFLICT,
                "invalid_request_error",
                "conflict",
                format!("{} already in use", field),
            ),
            AppError::AlreadyBootstrapped => (
                StatusCode::CONFLICT,
                "invalid_request_error",
                "already_bootstrapped",
                "bootstrap credential already exists".to_string(),
            ),
            AppError::IdentityRejected(reason) => {
                // Reason stays in the logs; callers get a generic message.
                tracing::info!(reason = %reason, "login rejected");
                (
                    StatusCode::UNAUTHORIZED,
                    "authentication_error",
                    "identity_rejected",
                    "login failed".to_string(),
                )
            }
            AppError::InvalidRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_request",
                msg.clone(),
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "unauthorized",
                "invalid or missing token".to_string(),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "permission_error",
                "forbidden",
                "insufficient privileges".to_string(),
            ),
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                "invalid_request_error",
                "not_found",
                "resource not found".to_string(),
            ),
            AppError::Timeout => (
                StatusCode::SERVICE_UNAVAILABLE,
                "timeout_error",
                "operation_timeout",
                "operation timed out".to_string(),
            ),
            AppError::Store(e) => internal("Store", e),
            AppError::Hashing(e) => internal("Hashing", e),
            AppError::Signing(e) => internal("Signing", e),
            AppError::Internal(e) => internal("Internal", e),
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}
