mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{user, Harness};
use sample_exchange::api::{AuthResponse, OAuthProvider};
use sample_exchange::auth::{AuthError, SessionManager};
use sample_exchange::fetch::AuthHeader;
use sample_exchange::persist::{MemoryTokenStore, TokenStore};
use sample_exchange::router::{NavigationLog, Navigator};

#[tokio::test]
async fn test_restore_without_token_initializes_signed_out() {
    let h = Harness::new(|api| api);

    let restored = h.session.restore().await.unwrap();

    assert!(restored.is_none());
    let state = h.session.state();
    assert!(state.initialized);
    assert!(!state.is_authenticated());
    assert!(!state.has_token);
    assert_eq!(h.header.token(), None);
    assert_eq!(h.api.current_user_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_restore_with_valid_token() {
    let store = Arc::new(MemoryTokenStore::with_token("fake-token"));
    let h = Harness::with_store(store, |api| {
        api.with_valid_token("fake-token", user("1", "test@example.com"))
    });

    let restored = h.session.restore().await.unwrap();

    assert_eq!(restored.unwrap().id, "1");
    assert!(h.session.is_authenticated());
    assert!(h.session.is_initialized());
    assert_eq!(h.header.authorization().as_deref(), Some("Bearer fake-token"));
    assert_eq!(h.session.state().error, None);
}

#[tokio::test]
async fn test_failed_restore_clears_everything() {
    let store = Arc::new(MemoryTokenStore::with_token("invalid-token"));
    let h = Harness::with_store(store, |api| api);

    let err = h.session.restore().await.unwrap_err();

    assert!(matches!(err, AuthError::RestoreFailed(_)));
    let state = h.session.state();
    assert!(state.user.is_none());
    assert!(state.initialized);
    assert!(!state.loading);
    assert_eq!(h.stored_token(), None);
    assert_eq!(h.header.token(), None);
}

#[tokio::test]
async fn test_restore_twice_is_idempotent() {
    let store = Arc::new(MemoryTokenStore::with_token("fake-token"));
    let h = Harness::with_store(store, |api| {
        api.with_valid_token("fake-token", user("1", "test@example.com"))
    });

    let first = h.session.restore().await.unwrap();
    let header_after_first = h.header.authorization();
    let second = h.session.restore().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.header.authorization(), header_after_first);
    assert_eq!(h.stored_token().as_deref(), Some("fake-token"));
}

#[tokio::test]
async fn test_login_persists_token_and_user() {
    let h = Harness::new(|api| api.with_account("a@b.com", "pw", user("7", "a@b.com")));

    let logged_in = h.session.login("a@b.com", "pw").await.unwrap();

    assert_eq!(logged_in.id, "7");
    assert_eq!(h.stored_token().as_deref(), Some("token-7"));
    assert_eq!(h.header.token().as_deref(), Some("token-7"));
    let state = h.session.state();
    assert!(state.is_authenticated());
    assert!(state.initialized);
    assert!(!state.loading);
}

#[tokio::test]
async fn test_login_then_reload_restores_same_user() {
    let store = Arc::new(MemoryTokenStore::new());
    let h = Harness::with_store(store.clone(), |api| {
        api.with_account("a@b.com", "pw", user("7", "a@b.com"))
    });
    let logged_in = h.session.login("a@b.com", "pw").await.unwrap();

    // fresh header and manager over the same storage, as after a page reload
    let header = AuthHeader::new();
    let api = Arc::new(h.api.reloaded(header.clone()));
    let reloaded = SessionManager::new(api, store, header);
    let restored = reloaded.restore().await.unwrap().unwrap();

    assert_eq!(restored.id, logged_in.id);
}

#[tokio::test]
async fn test_login_without_token_is_malformed_and_keeps_user() {
    let store = Arc::new(MemoryTokenStore::with_token("fake-token"));
    let h = Harness::with_store(store, |api| {
        api.with_valid_token("fake-token", user("1", "old@example.com"))
            .with_login_body(AuthResponse {
                access_token: None,
                user: Some(user("2", "a@b.com")),
            })
    });
    h.session.restore().await.unwrap();
    let before = h.session.user();

    let err = h.session.login("a@b.com", "pw").await.unwrap_err();

    assert!(matches!(err, AuthError::MalformedResponse(_)));
    assert_eq!(h.session.user(), before);
    assert_eq!(h.stored_token().as_deref(), Some("fake-token"));
    assert_eq!(h.session.state().error.as_deref(), Some("Login failed"));
}

#[tokio::test]
async fn test_login_without_user_is_malformed() {
    let h = Harness::new(|api| {
        api.with_login_body(AuthResponse {
            access_token: Some("t".to_string()),
            user: None,
        })
    });

    let err = h.session.login("a@b.com", "pw").await.unwrap_err();

    assert!(matches!(err, AuthError::MalformedResponse(_)));
    assert!(h.session.user().is_none());
    assert_eq!(h.stored_token(), None);
    assert_eq!(h.header.token(), None);
}

#[tokio::test]
async fn test_rejected_login_sets_error() {
    let h = Harness::new(|api| api.with_account("a@b.com", "pw", user("7", "a@b.com")));

    let err = h.session.login("a@b.com", "wrong").await.unwrap_err();

    assert!(matches!(err, AuthError::LoginFailed(_)));
    let state = h.session.state();
    assert_eq!(state.error.as_deref(), Some("Login failed"));
    assert!(!state.loading);
    assert!(!state.is_authenticated());
}

#[tokio::test]
async fn test_oauth_exchange_looks_up_missing_user() {
    let navigator = Arc::new(NavigationLog::new());
    let header = AuthHeader::new();
    let api = Arc::new(
        common::FakeAuthApi::new(header.clone())
            .with_valid_token("new-token", user("1", "test@example.com"))
            .with_oauth_code(
                "auth-code",
                AuthResponse {
                    access_token: Some("new-token".to_string()),
                    user: None,
                },
            ),
    );
    let store = Arc::new(MemoryTokenStore::new());
    let session = SessionManager::new(api, store.clone(), header.clone())
        .with_navigator(navigator.clone());

    let signed_in = session
        .exchange_oauth_code("auth-code", OAuthProvider::Github)
        .await
        .unwrap();

    assert_eq!(signed_in.email, "test@example.com");
    assert_eq!(store.load().unwrap().as_deref(), Some("new-token"));
    assert_eq!(header.authorization().as_deref(), Some("Bearer new-token"));
    assert_eq!(navigator.last().as_deref(), Some("/"));
}

#[tokio::test]
async fn test_failed_oauth_exchange_leaves_state_alone() {
    let h = Harness::new(|api| api);

    let err = h
        .session
        .exchange_oauth_code("bad-code", OAuthProvider::Google)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::OAuthExchangeFailed(_)));
    assert!(h.session.user().is_none());
    assert_eq!(h.stored_token(), None);
    assert!(!h.session.is_initialized());
}

#[tokio::test]
async fn test_logout_resets_session_and_navigates_to_login() {
    let navigator = Arc::new(NavigationLog::new());
    let header = AuthHeader::new();
    let api = Arc::new(
        common::FakeAuthApi::new(header.clone()).with_account("a@b.com", "pw", user("7", "a@b.com")),
    );
    let store = Arc::new(MemoryTokenStore::new());
    let nav: Arc<dyn Navigator> = navigator.clone();
    let session = SessionManager::new(api, store.clone(), header.clone()).with_navigator(nav);
    session.login("a@b.com", "pw").await.unwrap();

    session.logout();

    let state = session.state();
    assert!(state.user.is_none());
    assert!(!state.initialized);
    assert_eq!(store.load().unwrap(), None);
    assert_eq!(header.token(), None);
    assert_eq!(navigator.last().as_deref(), Some("/login"));
}

#[tokio::test]
async fn test_login_resolving_after_logout_is_discarded() {
    let h = Harness::new(|api| api.with_account("a@b.com", "pw", user("7", "a@b.com")));
    let release = h.api.hold_next_login();

    let session = h.session.clone();
    let pending = tokio::spawn(async move { session.login("a@b.com", "pw").await });
    while !h.session.state().loading {
        tokio::task::yield_now().await;
    }

    h.session.logout();
    release.send(()).unwrap();
    let result = pending.await.unwrap();

    assert!(matches!(result, Err(AuthError::Superseded)));
    assert!(h.session.user().is_none());
    assert_eq!(h.stored_token(), None);
    assert_eq!(h.header.token(), None);
}

#[tokio::test]
async fn test_unauthorized_response_clears_session_and_navigates_to_login() {
    let navigator = Arc::new(NavigationLog::new());
    let header = AuthHeader::new();
    let api = Arc::new(
        common::FakeAuthApi::new(header.clone()).with_account("a@b.com", "pw", user("7", "a@b.com")),
    );
    let store = Arc::new(MemoryTokenStore::new());
    let session = SessionManager::new(api, store.clone(), header.clone())
        .with_navigator(navigator.clone());
    session.login("a@b.com", "pw").await.unwrap();

    session.handle_unauthorized();

    let state = session.state();
    assert!(!state.is_authenticated());
    assert!(state.initialized);
    assert_eq!(store.load().unwrap(), None);
    assert_eq!(header.token(), None);
    assert_eq!(navigator.last().as_deref(), Some("/login"));

    // a second rejection with no token held is a no-op
    session.handle_unauthorized();
    assert_eq!(navigator.history().len(), 1);
}

#[tokio::test]
async fn test_subscribers_see_login() {
    let h = Harness::new(|api| api.with_account("a@b.com", "pw", user("7", "a@b.com")));
    let mut rx = h.session.subscribe();

    h.session.login("a@b.com", "pw").await.unwrap();

    assert!(rx.has_changed().unwrap());
    let seen = rx.borrow_and_update().clone();
    assert_eq!(seen.user_id(), Some("7"));
    assert!(seen.has_token);
}

#[tokio::test]
async fn test_register_does_not_sign_in() {
    let h = Harness::new(|api| api);

    let response = h.session.register("new@example.com", "Secret1!").await.unwrap();

    assert_eq!(response.user.unwrap().email, "new@example.com");
    assert!(!h.session.is_authenticated());
    assert_eq!(h.stored_token(), None);

    let err = h.session.register("new@example.com", "Secret1!").await.unwrap_err();
    assert!(matches!(err, AuthError::RegistrationFailed(_)));
}

#[tokio::test]
async fn test_sign_in_with_token_from_dev_redirect() {
    let h = Harness::new(|api| api.with_valid_token("dev-token", user("9", "dev@example.com")));

    let signed_in = h.session.sign_in_with_token("dev-token").await.unwrap();

    assert_eq!(signed_in.id, "9");
    assert_eq!(h.stored_token().as_deref(), Some("dev-token"));
}
