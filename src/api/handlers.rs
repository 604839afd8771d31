use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::authorization;
use crate::authority::issuer::IssuedPat;
use crate::authority::with_timeout;
use crate::crypto::secret::PlaintextToken;
use crate::errors::AppError;
use crate::models::session::{LoginRequest, RefreshRequest, SessionToken};
use crate::models::token::{CreatedBy, PatFilter, PatScope, PatSummary};
use crate::models::user::UserInfo;
use crate::models::validation::{AuthMethod, Principal, RejectReason, ValidationDecision, ValidationResponse};
use crate::state::AppState;

pub const HEADER_USER_ID: &str = "x-user-id";
pub const HEADER_USER_EMAIL: &str = "x-user-email";
pub const HEADER_USER_ROLE: &str = "x-user-role";
pub const HEADER_AUTH_METHOD: &str = "x-auth-method";

// ── Session Handlers ─────────────────────────────────────────

/// POST /api/v1/auth/google/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionToken>, AppError> {
    let tokens = with_timeout(
        state.config.operation_timeout(),
        state.sessions.exchange(&payload.id_token),
    )
    .await?;
    Ok(Json(tokens))
}

/// POST /api/v1/auth/refresh
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<SessionToken>, AppError> {
    let tokens = with_timeout(
        state.config.operation_timeout(),
        state.sessions.refresh(&payload.refresh_token),
    )
    .await?;
    Ok(Json(tokens))
}

/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<UserInfo>, AppError> {
    let token = authorization(&headers)
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthorized)?;
    let info = with_timeout(
        state.config.operation_timeout(),
        state.sessions.current_user(token),
    )
    .await?;
    Ok(Json(info))
}

// ── Validation Handlers ──────────────────────────────────────

/// GET /api/v1/auth/validate-token
///
/// Always 200; the verdict is in the body.
pub async fn validate_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<ValidationResponse> {
    let decision = state.validation.validate(authorization(&headers)).await;
    Json(ValidationResponse::from(&decision))
}

/// ANY /auth/check (ext_authz contract).
///
/// 200 with identity headers when valid, 401 when no credential was sent,
/// 500 when validation could not complete, 403 for every other rejection.
pub async fn ext_authz_check(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let decision = state.validation.validate(authorization(&headers)).await;
    let body = ValidationResponse::from(&decision);
    match decision {
        ValidationDecision::Valid(principal) => {
            let mut resp = (StatusCode::OK, Json(body)).into_response();
            insert_identity_headers(resp.headers_mut(), &principal);
            resp
        }
        ValidationDecision::Invalid(RejectReason::MissingCredential) => {
            (StatusCode::UNAUTHORIZED, Json(body)).into_response()
        }
        // A fault is not a policy denial; the proxy still rejects the request.
        ValidationDecision::Invalid(RejectReason::InternalError) => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
        ValidationDecision::Invalid(reason) => {
            tracing::debug!(reason = reason.code(), "ext_authz denied");
            (StatusCode::FORBIDDEN, Json(body)).into_response()
        }
    }
}

fn insert_identity_headers(headers: &mut HeaderMap, principal: &Principal) {
    let pairs = [
        (HEADER_USER_ID, principal.user_id.as_str()),
        (HEADER_USER_EMAIL, principal.email.as_str()),
        (HEADER_USER_ROLE, principal.role.as_str()),
        (HEADER_AUTH_METHOD, principal.method.as_str()),
    ];
    for (name, value) in pairs {
        match HeaderValue::from_str(value) {
            Ok(v) => {
                headers.insert(HeaderName::from_static(name), v);
            }
            Err(_) => tracing::warn!(header = name, "identity value not representable as a header"),
        }
    }
}

// ── PAT Admin Handlers ───────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatRequest {
    pub name: String,
    pub scope: PatScope,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Carries the plaintext token; returned only by create and rotate.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedPatResponse {
    pub token: PlaintextToken,
    pub pat: PatSummary,
}

impl From<IssuedPat> for IssuedPatResponse {
    fn from(issued: IssuedPat) -> Self {
        Self {
            token: issued.token,
            pat: issued.pat.summary_at(Utc::now()),
        }
    }
}

fn creator_of(principal: &Principal) -> Result<CreatedBy, AppError> {
    let id = Uuid::parse_str(&principal.user_id).map_err(|_| {
        tracing::error!("admin principal has a non-uuid id");
        AppError::Forbidden
    })?;
    Ok(match principal.method {
        AuthMethod::Session => CreatedBy::User(id),
        AuthMethod::Pat => CreatedBy::Token(id),
    })
}

/// POST /api/v1/admin/pats
pub async fn create_pat(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<CreatePatRequest>,
) -> Result<(StatusCode, Json<IssuedPatResponse>), AppError> {
    let created_by = creator_of(&principal)?;
    let issued = with_timeout(
        state.config.operation_timeout(),
        state
            .issuer
            .issue(&payload.name, payload.scope, payload.expires_at, created_by),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(IssuedPatResponse::from(issued))))
}

#[derive(Debug, Deserialize)]
pub struct ListPatsParams {
    pub filter: Option<String>,
    pub created_by: Option<String>,
}

/// GET /api/v1/admin/pats?filter=ACTIVE|REVOKED|EXPIRED|BY_CREATOR&created_by=...
pub async fn list_pats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListPatsParams>,
) -> Result<Json<Vec<PatSummary>>, AppError> {
    let filter = PatFilter::parse(params.filter.as_deref(), params.created_by.as_deref())
        .map_err(AppError::InvalidRequest)?;
    let pats = with_timeout(
        state.config.operation_timeout(),
        state.admin.list(filter, Utc::now()),
    )
    .await?;
    Ok(Json(pats))
}

#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    pub id: Uuid,
    pub revoked: bool,
}

/// DELETE /api/v1/admin/pats/:id
pub async fn revoke_pat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RevokeResponse>, AppError> {
    with_timeout(state.config.operation_timeout(), state.admin.revoke(id)).await?;
    Ok(Json(RevokeResponse { id, revoked: true }))
}

/// POST /api/v1/admin/pats/:id/rotate
pub async fn rotate_pat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<IssuedPatResponse>, AppError> {
    let issued = with_timeout(state.config.operation_timeout(), state.issuer.rotate(id)).await?;
    Ok(Json(IssuedPatResponse::from(issued)))
}
