use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::models::validation::{AuthMethod, Principal, ValidationDecision};
use crate::models::{token::PatScope, user::Role};
use crate::state::AppState;

pub mod handlers;

/// Build the full HTTP surface: health, ext_authz check, auth API and PAT admin API.
pub fn router(state: Arc<AppState>) -> Router {
    let auth = Router::new()
        .route("/auth/google/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/validate-token", get(handlers::validate_token))
        .route("/auth/me", get(handlers::me));

    let admin = Router::new()
        .route("/pats", get(handlers::list_pats).post(handlers::create_pat))
        .route("/pats/:id", delete(handlers::revoke_pat))
        .route("/pats/:id/rotate", post(handlers::rotate_pat))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth));

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/auth/check", any(handlers::ext_authz_check))
        .nest("/api/v1", auth.nest("/admin", admin))
        .fallback(fallback_404)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Raw `Authorization` header value, if present and valid UTF-8.
pub(crate) fn authorization(req_headers: &axum::http::HeaderMap) -> Option<&str> {
    req_headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

fn may_administer(principal: &Principal) -> bool {
    match principal.method {
        AuthMethod::Pat => principal.role == PatScope::Admin.as_str(),
        AuthMethod::Session => principal.role == Role::SuperAdmin.as_str(),
    }
}

/// Middleware: admits an ADMIN-scope PAT or a SUPER_ADMIN session.
/// The validated [`Principal`] is stored in request extensions for handlers.
async fn admin_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let decision = state.validation.validate(authorization(req.headers())).await;
    match decision {
        ValidationDecision::Valid(principal) if may_administer(&principal) => {
            req.extensions_mut().insert(principal);
            Ok(next.run(req).await)
        }
        ValidationDecision::Valid(principal) => {
            tracing::warn!(
                user_id = %principal.user_id,
                role = %principal.role,
                "admin API: insufficient privileges"
            );
            Err(AppError::Forbidden)
        }
        ValidationDecision::Invalid(reason) => {
            tracing::warn!(reason = reason.code(), "admin API: credential rejected");
            Err(AppError::Unauthorized)
        }
    }
}

/// Middleware: injects a unique X-Request-Id into every response.
async fn request_id_middleware(req: Request, next: Next) -> Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Middleware: security headers on every response. Auth responses must never
/// be cached or framed.
async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await.into_response();
    let headers = resp.headers_mut();
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    headers.remove(header::SERVER);
    resp
}
