//! Token lifecycle against a mocked DRF token API.

mod common;

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use drf_core::Token;
use drf_sync::{
    AuthState, CredentialProvider, Credentials, SyncError, SyncResult, TokenLifecycle, TokenStore,
};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{client, forbid_authorized_refresh, lifecycle, mount_login, PASSWORD, USERNAME};

#[tokio::test]
async fn test_login_sets_bearer_and_persists() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let token_file = dir.path().join("token");
    mount_login(&server, "a1", "r1", 1).await;

    let auth = lifecycle(&server, &token_file);
    assert_eq!(auth.state(), AuthState::NoToken);
    assert!(auth.auth_header().await.is_none());

    auth.ensure_authenticated().await.unwrap();
    assert_eq!(auth.state(), AuthState::Authenticated);
    assert_eq!(auth.auth_header().await.as_deref(), Some("Bearer a1"));

    // Already authenticated, no second login.
    auth.ensure_authenticated().await.unwrap();

    let persisted = TokenStore::new(&token_file).load().unwrap();
    assert_eq!(persisted.access, "a1");
    assert_eq!(persisted.refresh, "r1");
}

#[tokio::test]
async fn test_persisted_token_needs_no_login() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let token_file = dir.path().join("token");
    mount_login(&server, "a1", "r1", 1).await;

    lifecycle(&server, &token_file).ensure_authenticated().await.unwrap();

    let second_run = lifecycle(&server, &token_file);
    assert_eq!(second_run.state(), AuthState::Authenticated);
    assert_eq!(second_run.access_token().await.unwrap(), "a1");
}

#[tokio::test]
async fn test_corrupt_token_file_is_removed() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let token_file = dir.path().join("token");
    std::fs::write(&token_file, "access=a1").unwrap();

    let auth = lifecycle(&server, &token_file);
    assert_eq!(auth.state(), AuthState::NoToken);
    assert!(!token_file.exists());
}

#[tokio::test]
async fn test_refresh_updates_access_only() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let token_file = dir.path().join("token");
    TokenStore::new(&token_file)
        .save(&Token::new("a1", "r1"))
        .unwrap();

    forbid_authorized_refresh(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .and(body_json(json!({"refresh": "r1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "a2"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_login(&server, "unused", "unused", 0).await;

    let auth = lifecycle(&server, &token_file);
    auth.refresh().await.unwrap();

    let token = auth.current_token().await.unwrap();
    assert_eq!(token.access, "a2");
    assert_eq!(token.refresh, "r1");
    assert_eq!(TokenStore::new(&token_file).load().unwrap().access, "a2");
}

#[tokio::test]
async fn test_rejected_refresh_falls_back_to_login() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let token_file = dir.path().join("token");
    TokenStore::new(&token_file)
        .save(&Token::new("a1", "r1"))
        .unwrap();

    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token_not_valid"))
        .expect(1)
        .mount(&server)
        .await;
    mount_login(&server, "a9", "r9", 1).await;

    let auth = lifecycle(&server, &token_file);
    auth.refresh().await.unwrap();

    assert_eq!(auth.state(), AuthState::Authenticated);
    assert_eq!(auth.auth_header().await.as_deref(), Some("Bearer a9"));
    assert_eq!(TokenStore::new(&token_file).load().unwrap().refresh, "r9");
}

#[tokio::test]
async fn test_forbidden_refresh_is_auth_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let token_file = dir.path().join("token");
    TokenStore::new(&token_file)
        .save(&Token::new("a1", "r1"))
        .unwrap();

    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(1)
        .mount(&server)
        .await;
    mount_login(&server, "unused", "unused", 0).await;

    let auth = lifecycle(&server, &token_file);
    let err = auth.refresh().await.unwrap_err();
    assert!(matches!(err, SyncError::Auth { status: 403, .. }));
    // The old pair is kept.
    assert_eq!(auth.access_token().await.unwrap(), "a1");
}

#[tokio::test]
async fn test_rejected_login_is_auth_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/api/token/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "No active account found with the given credentials"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = lifecycle(&server, &dir.path().join("token"));
    let err = auth.ensure_authenticated().await.unwrap_err();
    assert!(err.is_auth_error());
    assert_eq!(err.status(), Some(401));
    assert_eq!(auth.state(), AuthState::NoToken);
}

#[tokio::test]
async fn test_concurrent_rejections_refresh_once() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let token_file = dir.path().join("token");
    TokenStore::new(&token_file)
        .save(&Token::new("a1", "r1"))
        .unwrap();

    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "a2"})))
        .expect(1)
        .mount(&server)
        .await;

    let auth = lifecycle(&server, &token_file);
    let (first, second) = tokio::join!(
        auth.recover_from_rejection("a1"),
        auth.recover_from_rejection("a1"),
    );
    first.unwrap();
    second.unwrap();
    assert_eq!(auth.access_token().await.unwrap(), "a2");
}

#[tokio::test]
async fn test_forbidden_login_is_auth_error_with_status() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/api/token/"))
        .respond_with(ResponseTemplate::new(403).set_body_string("account disabled"))
        .expect(1)
        .mount(&server)
        .await;

    let auth = lifecycle(&server, &dir.path().join("token"));
    let err = auth.access_token().await.unwrap_err();
    match err {
        SyncError::Auth { status, body, .. } => {
            assert_eq!(status, 403);
            assert_eq!(body, "account disabled");
        }
        other => panic!("expected auth error, got {:?}", other),
    }
    assert_eq!(auth.state(), AuthState::NoToken);
}

#[tokio::test]
async fn test_failed_relogin_leaves_no_stale_token_file() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let token_file = dir.path().join("token");
    TokenStore::new(&token_file)
        .save(&Token::new("a1", "r1"))
        .unwrap();

    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let auth = lifecycle(&server, &token_file);
    let err = auth.refresh().await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(auth.state(), AuthState::NoToken);
    assert!(auth.auth_header().await.is_none());
    assert!(!token_file.exists());
}

/// Blocks until another task on the runtime signals, like a terminal prompt
/// waiting for input.
struct WaitingCredentials {
    signal: Mutex<mpsc::Receiver<()>>,
}

impl CredentialProvider for WaitingCredentials {
    fn credentials(&self) -> SyncResult<Credentials> {
        let signal = self
            .signal
            .lock()
            .map_err(|e| SyncError::Credentials(e.to_string()))?;
        signal
            .recv_timeout(Duration::from_secs(5))
            .map_err(|e| SyncError::Credentials(e.to_string()))?;
        Ok(Credentials::new(USERNAME, PASSWORD))
    }
}

#[tokio::test]
async fn test_blocking_credential_provider_does_not_stall_runtime() {
    let server = MockServer::start().await;
    mount_login(&server, "a1", "r1", 1).await;

    let (tx, rx) = mpsc::channel();
    let auth = TokenLifecycle::new(
        client(&server),
        Arc::new(WaitingCredentials {
            signal: Mutex::new(rx),
        }),
        None,
    );

    // On the single-threaded test runtime this task only runs if the
    // provider is not executing on the runtime thread.
    tokio::spawn(async move {
        let _ = tx.send(());
    });

    assert_eq!(auth.access_token().await.unwrap(), "a1");
}
