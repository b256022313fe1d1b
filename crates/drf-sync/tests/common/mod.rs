//! Shared fixtures for the wiremock-backed integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use drf_sync::{ApiClient, CacheManager, ResourceFetcher, StaticCredentials, TokenLifecycle, TokenStore};
use serde_json::{json, Value};
use url::Url;
use wiremock::matchers::{body_json, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "hunter2";

pub fn client(server: &MockServer) -> ApiClient {
    let api_base = Url::parse(&format!("{}/api/", server.uri())).unwrap();
    ApiClient::with_options(api_base, Duration::from_secs(5), false).unwrap()
}

pub fn lifecycle(server: &MockServer, token_file: &Path) -> Arc<TokenLifecycle> {
    Arc::new(TokenLifecycle::new(
        client(server),
        Arc::new(StaticCredentials::new(USERNAME, PASSWORD)),
        Some(TokenStore::new(token_file)),
    ))
}

pub fn fetcher(server: &MockServer, token_file: &Path, cache: CacheManager) -> (Arc<TokenLifecycle>, ResourceFetcher) {
    let auth = lifecycle(server, token_file);
    let fetcher = ResourceFetcher::new(client(server), Arc::clone(&auth), cache);
    (auth, fetcher)
}

/// `POST /api/token/` answering with the given pair.
pub async fn mount_login(server: &MockServer, access: &str, refresh: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path("/api/token/"))
        .and(body_json(json!({"username": USERNAME, "password": PASSWORD})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": access,
            "refresh": refresh,
        })))
        .expect(times)
        .mount(server)
        .await;
}

/// Fails the test if any refresh request carries an Authorization header.
pub async fn forbid_authorized_refresh(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(server)
        .await;
}

pub fn server_record(id: i64, ip: &str, description: &str, os: i64) -> Value {
    json!({
        "id": id,
        "ip": ip,
        "hostname": format!("host{}", id),
        "description": description,
        "is_manageable": true,
        "operating_system": os,
    })
}
