//! Session token properties: one live token per principal, expiry at the
//! boundary instant, refresh and logout.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::Duration;
use shopfront_integration_tests::TestApp;
use shopfront_server::clock::Clock;

#[tokio::test]
async fn test_second_login_invalidates_first_token() {
    let app = TestApp::new();
    let credentials = app.state.credentials();
    let sessions = app.state.sessions();

    let (_, registered) = credentials
        .register_customer("Ada Shopper", "ada@example.com", "secret1")
        .await
        .unwrap();
    let (principal, logged_in) = credentials
        .login("ada@example.com", "secret1")
        .await
        .unwrap();

    assert_ne!(registered.value, logged_in.value);
    assert!(sessions.resolve(&registered.value).await.unwrap().is_none());

    let resolved = sessions.resolve(&logged_in.value).await.unwrap().unwrap();
    assert_eq!(resolved.id, principal.id);
    assert_eq!(app.store.token_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_issues_leave_one_live_token() {
    let app = TestApp::new();
    let (principal, _) = app
        .state
        .credentials()
        .register_customer("Grace Shopper", "grace@example.com", "secret1")
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let sessions = Arc::clone(app.state.sessions());
        let principal = principal.clone();
        handles.push(tokio::spawn(async move {
            sessions.issue(&principal).await.unwrap()
        }));
    }

    let mut issued = Vec::new();
    for handle in handles {
        issued.push(handle.await.unwrap());
    }

    let mut live = 0;
    for token in &issued {
        if app.state.sessions().resolve(&token.value).await.unwrap().is_some() {
            live += 1;
        }
    }
    assert_eq!(live, 1);
    assert_eq!(app.store.token_count(), 1);
}

#[tokio::test]
async fn test_token_expires_exactly_at_expiry() {
    let app = TestApp::new();
    let (_, token) = app
        .state
        .credentials()
        .register_customer("Linus Shopper", "linus@example.com", "secret1")
        .await
        .unwrap();
    assert_eq!(token.expires_at, app.clock.now() + Duration::days(7));

    app.clock.set(token.expires_at - Duration::seconds(1));
    assert!(app.state.sessions().resolve(&token.value).await.unwrap().is_some());

    app.clock.set(token.expires_at);
    assert!(app.state.sessions().resolve(&token.value).await.unwrap().is_none());
}

#[tokio::test]
async fn test_refresh_pushes_expiry_forward() {
    let app = TestApp::new();
    let sessions = app.state.sessions();
    let (_, token) = app
        .state
        .credentials()
        .register_customer("Barbara Shopper", "barbara@example.com", "secret1")
        .await
        .unwrap();

    app.clock.advance(Duration::days(6));
    let extended = sessions.refresh(&token.value).await.unwrap().unwrap();
    assert_eq!(extended, app.clock.now() + Duration::days(7));

    // Past the original expiry, still live after the refresh.
    app.clock.advance(Duration::days(2));
    assert!(sessions.resolve(&token.value).await.unwrap().is_some());

    app.clock.set(extended);
    assert!(sessions.refresh(&token.value).await.unwrap().is_none());
    assert!(sessions.resolve(&token.value).await.unwrap().is_none());
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let app = TestApp::new();
    let sessions = app.state.sessions();
    let (_, token) = app
        .state
        .credentials()
        .register_customer("Ken Shopper", "ken@example.com", "secret1")
        .await
        .unwrap();

    sessions.invalidate(&token.value).await.unwrap();
    sessions.invalidate(&token.value).await.unwrap();
    sessions.invalidate("never-issued").await.unwrap();

    assert!(sessions.resolve(&token.value).await.unwrap().is_none());
    assert_eq!(app.store.token_count(), 0);
}

#[tokio::test]
async fn test_sweep_keeps_live_tokens() {
    let app = TestApp::new();
    let credentials = app.state.credentials();

    let (_, stale) = credentials
        .register_customer("Old Shopper", "old@example.com", "secret1")
        .await
        .unwrap();
    app.clock.advance(Duration::days(3));
    let (_, fresh) = credentials
        .register_customer("New Shopper", "new@example.com", "secret1")
        .await
        .unwrap();

    app.clock.set(stale.expires_at + Duration::seconds(1));
    let removed = app
        .state
        .sessions()
        .sweep_expired(app.clock.now())
        .await
        .unwrap();

    assert_eq!(removed, 1);
    assert!(app.state.sessions().resolve(&fresh.value).await.unwrap().is_some());
}
