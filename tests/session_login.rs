//! Session issuance: Google identity exchange, user resolution, refresh and
//! current-user lookup.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};

use authority::authority::session::SessionIssuer;
use authority::crypto::jwt::{JwtSigner, TokenSigner};
use authority::errors::AppError;
use authority::models::session::{VerifiedIdentity, TOKEN_TYPE_BEARER};
use authority::models::user::{Role, User};
use authority::store::memory::MemoryStore;
use authority::store::UserStore;

use common::{test_config, StubIdentity};

fn signer() -> Arc<JwtSigner> {
    Arc::new(JwtSigner::from_config(&test_config()))
}

fn sessions(store: Arc<MemoryStore>, identity: StubIdentity, auto_create: bool) -> SessionIssuer {
    SessionIssuer::new(store, signer(), Arc::new(identity), auto_create)
}

fn identity(email: &str, subject: &str) -> VerifiedIdentity {
    VerifiedIdentity {
        email: email.to_string(),
        subject: subject.to_string(),
        name: Some("Pat Player".into()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Login
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_first_login_provisions_player() {
    let store = Arc::new(MemoryStore::new());
    let s = sessions(
        store.clone(),
        StubIdentity::default().with("tok-1", "new@example.com", "g-100"),
        true,
    );

    let tokens = s.exchange("tok-1").await.unwrap();
    assert_eq!(tokens.token_type, TOKEN_TYPE_BEARER);
    assert_eq!(tokens.expires_in, 900);

    let claims = signer().verify_access(&tokens.access_token).unwrap();
    assert_eq!(claims.email, "new@example.com");
    assert_eq!(claims.role, "PLAYER");

    let user = store.find_user_by_google_id("g-100").await.unwrap().unwrap();
    assert_eq!(user.id.to_string(), claims.sub);
    assert_eq!(user.role, Role::Player);
    assert_eq!(user.name, "User g-100");
    assert!(user.last_login_at.is_some());

    // Second login reuses the account.
    let again = s.exchange("tok-1").await.unwrap();
    assert_eq!(signer().verify_access(&again.access_token).unwrap().sub, claims.sub);
}

#[tokio::test]
async fn test_unknown_user_rejected_when_auto_create_disabled() {
    let store = Arc::new(MemoryStore::new());
    let s = sessions(
        store.clone(),
        StubIdentity::default().with("tok-1", "new@example.com", "g-100"),
        false,
    );

    let result = s.exchange("tok-1").await;
    assert!(matches!(result, Err(AppError::IdentityRejected(_))));
    assert!(store.find_user_by_email("new@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn test_deactivated_user_gets_no_tokens() {
    let store = Arc::new(MemoryStore::new());
    let mut user = User::new_player("gone@example.com", "Gone", Some("g-7".into()));
    user.active = false;
    store.insert_user(&user).await.unwrap();

    let s = sessions(
        store.clone(),
        StubIdentity::default().with("tok-7", "gone@example.com", "g-7"),
        true,
    );
    let result = s.exchange("tok-7").await;
    assert!(matches!(result, Err(AppError::IdentityRejected(_))));

    let stored = store.find_user_by_id(user.id).await.unwrap().unwrap();
    assert!(stored.last_login_at.is_none());
}

#[tokio::test]
async fn test_rejected_and_blank_id_tokens() {
    let s = sessions(Arc::new(MemoryStore::new()), StubIdentity::default(), true);

    assert!(matches!(s.exchange("forged").await, Err(AppError::IdentityRejected(_))));
    assert!(matches!(s.exchange("   ").await, Err(AppError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_existing_email_is_linked_to_subject() {
    let store = Arc::new(MemoryStore::new());
    let mut existing = User::new_player("coach@example.com", "Coach", None);
    existing.role = Role::SuperAdmin;
    store.insert_user(&existing).await.unwrap();

    let s = sessions(store.clone(), StubIdentity::default(), true);
    let tokens = s.login(&identity("coach@example.com", "g-55")).await.unwrap();

    let claims = signer().verify_access(&tokens.access_token).unwrap();
    assert_eq!(claims.sub, existing.id.to_string());
    assert_eq!(claims.role, "SUPER_ADMIN");

    let linked = store.find_user_by_google_id("g-55").await.unwrap().unwrap();
    assert_eq!(linked.id, existing.id);
}

#[tokio::test]
async fn test_email_bound_to_other_subject_rejected() {
    let store = Arc::new(MemoryStore::new());
    let existing = User::new_player("coach@example.com", "Coach", Some("g-1".into()));
    store.insert_user(&existing).await.unwrap();

    let s = sessions(store, StubIdentity::default(), true);
    let result = s.login(&identity("coach@example.com", "g-2")).await;
    assert!(matches!(result, Err(AppError::IdentityRejected(_))));
}

#[tokio::test]
async fn test_login_records_time() {
    let store = Arc::new(MemoryStore::new());
    let s = sessions(store.clone(), StubIdentity::default(), true);
    let at = Utc::now() - Duration::minutes(3);

    s.login_at(&identity("p@example.com", "g-9"), at).await.unwrap();
    let user = store.find_user_by_google_id("g-9").await.unwrap().unwrap();
    assert_eq!(user.last_login_at, Some(at));
}

// ═══════════════════════════════════════════════════════════════════════════
// Refresh and current user
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_refresh_issues_new_pair() {
    let store = Arc::new(MemoryStore::new());
    let s = sessions(store, StubIdentity::default(), true);
    let tokens = s.login(&identity("p@example.com", "g-9")).await.unwrap();

    let refreshed = s.refresh(&tokens.refresh_token).await.unwrap();
    assert_ne!(refreshed.refresh_token, tokens.refresh_token);
    let claims = signer().verify_access(&refreshed.access_token).unwrap();
    assert_eq!(claims.email, "p@example.com");

    // An access token cannot be used to refresh.
    assert!(matches!(
        s.refresh(&tokens.access_token).await,
        Err(AppError::Unauthorized)
    ));
}

#[tokio::test]
async fn test_refresh_refused_after_deactivation() {
    let store = Arc::new(MemoryStore::new());
    let s = sessions(store.clone(), StubIdentity::default(), true);
    let tokens = s.login(&identity("p@example.com", "g-9")).await.unwrap();

    let mut user = store.find_user_by_google_id("g-9").await.unwrap().unwrap();
    user.active = false;
    store.update_user(&user).await.unwrap();

    assert!(matches!(
        s.refresh(&tokens.refresh_token).await,
        Err(AppError::IdentityRejected(_))
    ));
}

#[tokio::test]
async fn test_current_user() {
    let store = Arc::new(MemoryStore::new());
    let s = sessions(store, StubIdentity::default(), true);
    let tokens = s.login(&identity("P@Example.com", "g-9")).await.unwrap();

    let me = s.current_user(&tokens.access_token).await.unwrap();
    assert_eq!(me.email, "p@example.com");
    assert_eq!(me.role, Role::Player);
    assert!(me.active);

    assert!(matches!(s.current_user("garbage").await, Err(AppError::Unauthorized)));

    // Valid signature but no such user.
    let ghost = User::new_player("ghost@example.com", "Ghost", None);
    let ghost_tokens = signer().issue(&ghost).unwrap();
    assert!(matches!(
        s.current_user(&ghost_tokens.access_token).await,
        Err(AppError::Unauthorized)
    ));
}
