//! Validation endpoint contract: credential classification, session tokens,
//! PATs, feature flags and fail-closed behaviour under store faults.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use authority::authority::endpoint::TokenValidationService;
use authority::authority::issuer::{IssuancePolicy, PatIssuer};
use authority::authority::validator::PatValidator;
use authority::config::Config;
use authority::crypto::jwt::{JwtSigner, TokenSigner};
use authority::models::token::{CreatedBy, PatScope};
use authority::models::user::{Role, User};
use authority::models::validation::{AuthMethod, RejectReason, ValidationDecision, ValidationResponse};
use authority::store::memory::MemoryStore;
use authority::store::CredentialStore;

use common::{fast_hasher, test_config, Fault, FaultyStore};

struct Harness {
    issuer: PatIssuer,
    signer: Arc<JwtSigner>,
    service: TokenValidationService,
}

fn harness_on(store: Arc<dyn CredentialStore>, cfg: Config) -> Harness {
    let signer = Arc::new(JwtSigner::from_config(&cfg));
    let validator = Arc::new(PatValidator::new(store.clone(), fast_hasher()).unwrap());
    Harness {
        issuer: PatIssuer::new(
            store,
            fast_hasher(),
            IssuancePolicy {
                secret_bytes: 48,
                bootstrap_validity: None,
            },
        ),
        service: TokenValidationService::new(validator, signer.clone(), &cfg),
        signer,
    }
}

fn harness() -> Harness {
    harness_on(Arc::new(MemoryStore::new()), test_config())
}

fn admin_user() -> User {
    let mut user = User::new_player("Admin@Example.com", "Admin", Some("g-1".into()));
    user.role = Role::Admin;
    user
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

// ═══════════════════════════════════════════════════════════════════════════
// Session tokens
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_valid_session_token() {
    let h = harness();
    let user = admin_user();
    let tokens = h.signer.issue(&user).unwrap();

    let decision = h.service.validate(Some(&bearer(&tokens.access_token))).await;
    match decision {
        ValidationDecision::Valid(p) => {
            assert_eq!(p.user_id, user.id.to_string());
            assert_eq!(p.email, "admin@example.com");
            assert_eq!(p.role, "ADMIN");
            assert_eq!(p.method, AuthMethod::Session);
        }
        other => panic!("expected valid, got {other:?}"),
    }
}

#[tokio::test]
async fn test_expired_session_token() {
    let h = harness();
    let tokens = h
        .signer
        .issue_at(&admin_user(), Utc::now() - chrono::Duration::hours(2))
        .unwrap();

    let decision = h.service.validate(Some(&bearer(&tokens.access_token))).await;
    assert_eq!(decision, ValidationDecision::Invalid(RejectReason::ExpiredSessionToken));
}

#[tokio::test]
async fn test_refresh_token_is_not_an_access_token() {
    let h = harness();
    let tokens = h.signer.issue(&admin_user()).unwrap();

    let decision = h.service.validate(Some(&bearer(&tokens.refresh_token))).await;
    assert_eq!(decision, ValidationDecision::Invalid(RejectReason::InvalidSessionToken));
}

#[tokio::test]
async fn test_session_token_from_other_issuer_rejected() {
    let h = harness();
    let foreign = JwtSigner::new(
        common::ACCESS_SECRET,
        common::REFRESH_SECRET,
        "someone-else",
        chrono::Duration::minutes(15),
        chrono::Duration::days(7),
    );
    let tokens = foreign.issue(&admin_user()).unwrap();

    let decision = h.service.validate(Some(&bearer(&tokens.access_token))).await;
    assert_eq!(decision, ValidationDecision::Invalid(RejectReason::InvalidSessionToken));
}

#[tokio::test]
async fn test_garbage_bearer_is_invalid_session_token() {
    let h = harness();
    let decision = h.service.validate(Some("Bearer not.a.jwt")).await;
    assert_eq!(decision, ValidationDecision::Invalid(RejectReason::InvalidSessionToken));
}

// ═══════════════════════════════════════════════════════════════════════════
// PATs and classification
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_pat_with_and_without_bearer() {
    let h = harness();
    let issued = h
        .issuer
        .issue("ci-bot", PatScope::Write, None, CreatedBy::Operator)
        .await
        .unwrap();
    let token = issued.token.expose();

    for presented in [bearer(token), token.to_string()] {
        let decision = h.service.validate(Some(&presented)).await;
        let principal = decision.principal().expect("valid PAT");
        assert_eq!(principal.method, AuthMethod::Pat);
        assert_eq!(principal.role, "WRITE");
    }
}

#[tokio::test]
async fn test_missing_and_malformed_credentials() {
    let h = harness();
    assert_eq!(
        h.service.validate(None).await,
        ValidationDecision::Invalid(RejectReason::MissingCredential)
    );
    assert_eq!(
        h.service.validate(Some("")).await,
        ValidationDecision::Invalid(RejectReason::MissingCredential)
    );
    assert_eq!(
        h.service.validate(Some("Basic dXNlcjpwYXNz")).await,
        ValidationDecision::Invalid(RejectReason::MalformedCredential)
    );
    assert_eq!(
        h.service.validate(Some("Bearer pat_onlyone")).await,
        ValidationDecision::Invalid(RejectReason::MalformedCredential)
    );
}

#[tokio::test]
async fn test_response_shape_for_ext_authz() {
    let h = harness();
    let issued = h
        .issuer
        .issue("ci-bot", PatScope::ReadOnly, None, CreatedBy::Operator)
        .await
        .unwrap();

    let ok = h.service.validate(Some(&bearer(issued.token.expose()))).await;
    let json = serde_json::to_value(ValidationResponse::from(&ok)).unwrap();
    assert_eq!(json["valid"], true);
    assert_eq!(json["userId"], issued.pat.id.to_string());
    assert_eq!(json["email"], "ci-bot");
    assert_eq!(json["role"], "READ_ONLY");
    assert!(json.get("error").is_none());

    let bad = h.service.validate(Some("Bearer pat_00112233445566778899aabbccddeeff_nope")).await;
    let json = serde_json::to_value(ValidationResponse::from(&bad)).unwrap();
    assert_eq!(json["valid"], false);
    assert_eq!(json["error"], "unknown credential");
    assert_eq!(json["reason"], "unknown_credential");
    assert!(json.get("userId").is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// Feature flags
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_disabled_credential_types() {
    let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::new());
    let mut cfg = test_config();
    cfg.pat_enabled = false;
    let h = harness_on(store, cfg);
    let issued = h
        .issuer
        .issue("ci-bot", PatScope::Write, None, CreatedBy::Operator)
        .await
        .unwrap();
    assert_eq!(
        h.service.validate(Some(&bearer(issued.token.expose()))).await,
        ValidationDecision::Invalid(RejectReason::CredentialTypeDisabled)
    );
    // Sessions unaffected.
    let tokens = h.signer.issue(&admin_user()).unwrap();
    assert!(h.service.validate(Some(&bearer(&tokens.access_token))).await.is_valid());

    let mut cfg = test_config();
    cfg.jwt_enabled = false;
    let h = harness_on(Arc::new(MemoryStore::new()), cfg);
    let tokens = h.signer.issue(&admin_user()).unwrap();
    assert_eq!(
        h.service.validate(Some(&bearer(&tokens.access_token))).await,
        ValidationDecision::Invalid(RejectReason::CredentialTypeDisabled)
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Fail closed
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_slow_store_times_out_as_internal_error() {
    let inner = Arc::new(MemoryStore::new());
    let store = Arc::new(FaultyStore {
        inner,
        fault: Fault::SlowLookup(Duration::from_secs(5)),
    });
    let h = harness_on(store, test_config());
    let issued = h
        .issuer
        .issue("ci-bot", PatScope::Write, None, CreatedBy::Operator)
        .await
        .unwrap();

    let decision = h
        .service
        .validate_within(Some(&bearer(issued.token.expose())), Duration::from_millis(50))
        .await;
    assert_eq!(decision, ValidationDecision::Invalid(RejectReason::InternalError));
}

#[tokio::test]
async fn test_unavailable_store_is_internal_error() {
    let store = Arc::new(FaultyStore {
        inner: Arc::new(MemoryStore::new()),
        fault: Fault::LookupUnavailable,
    });
    let h = harness_on(store, test_config());
    let issued = h
        .issuer
        .issue("ci-bot", PatScope::Write, None, CreatedBy::Operator)
        .await
        .unwrap();

    let decision = h.service.validate(Some(&bearer(issued.token.expose()))).await;
    assert_eq!(decision, ValidationDecision::Invalid(RejectReason::InternalError));
    assert!(!decision.is_valid());
}
