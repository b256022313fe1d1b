//! End-to-end runs against a mocked DRF API.

mod common;

use std::path::Path;
use std::sync::Arc;

use drf_core::{CoreError, Inventory, KeyedGroup, Token};
use drf_sync::{
    AuthState, CachePlugin, InventoryConfig, InventoryRun, RunOptions, StaticCredentials,
    SyncError, TemplateEvaluator, TokenStore,
};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{mount_login, server_record, PASSWORD, USERNAME};

fn config(server: &MockServer, dir: &Path) -> InventoryConfig {
    let mut config = InventoryConfig::new(7);
    config.base_url = server.uri();
    config.token_file = Some(dir.join("token"));
    config
}

fn run(config: InventoryConfig, options: RunOptions) -> InventoryRun<TemplateEvaluator> {
    InventoryRun::new(
        config,
        Arc::new(StaticCredentials::new(USERNAME, PASSWORD)),
        TemplateEvaluator::new(),
        options,
    )
    .unwrap()
}

async fn mount_api(server: &MockServer, operating_systems: Value, servers: Value, times: u64) {
    Mock::given(method("GET"))
        .and(path("/api/customers/7/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7, "name": "Acme"})))
        .expect(times)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/operating-systems/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": operating_systems })))
        .expect(times)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/servers/"))
        .and(query_param("customer_id", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(servers))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_single_server_with_compose() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login(&server, "a1", "r1", 1).await;
    mount_api(
        &server,
        json!([{"id": 3, "name": "linux"}]),
        json!([server_record(1, "10.0.0.5", "", 3)]),
        1,
    )
    .await;

    let mut config = config(&server, dir.path());
    config.rules.compose.insert("env".to_string(), "'prod'".to_string());

    let mut inventory = Inventory::new();
    let summary = run(config, RunOptions::default())
        .execute(&mut inventory)
        .await
        .unwrap();

    assert_eq!(summary.report.servers, 1);
    let vars = inventory.host("10.0.0.5").unwrap();
    assert_eq!(vars["ansible_host"], json!("10.0.0.5"));
    assert_eq!(vars["hostname"], json!("host1"));
    assert_eq!(vars["operating_system"], json!({"id": 3, "name": "linux"}));
    assert_eq!(vars["env"], json!("prod"));

    let all = inventory.group("all").unwrap();
    assert_eq!(all.vars["django_drf_url"], json!(server.uri()));
    assert_eq!(all.vars["django_drf_token"], json!("a1"));
    assert_eq!(all.vars["customer"], json!({"id": 7, "name": "Acme"}));
}

#[tokio::test]
async fn test_keyed_group_on_description() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login(&server, "a1", "r1", 1).await;
    mount_api(
        &server,
        json!([{"id": 3, "name": "linux"}]),
        json!([
            server_record(1, "10.0.0.5", "web", 3),
            server_record(2, "10.0.0.6", "web", 3),
        ]),
        1,
    )
    .await;

    let mut config = config(&server, dir.path());
    config.rules.keyed_groups.push(KeyedGroup::new("description"));
    config.rules.groups.insert(
        "linux_hosts".to_string(),
        "operating_system.name == 'linux'".to_string(),
    );

    let mut inventory = Inventory::new();
    run(config, RunOptions::default())
        .execute(&mut inventory)
        .await
        .unwrap();

    let web = inventory.group("web").unwrap();
    assert_eq!(web.hosts.len(), 2);
    assert!(web.hosts.contains("10.0.0.5"));
    assert!(web.hosts.contains("10.0.0.6"));
    assert_eq!(inventory.group("linux_hosts").unwrap().hosts.len(), 2);

    let rendered = inventory.to_ansible_json();
    assert_eq!(rendered["web"]["hosts"], json!(["10.0.0.5", "10.0.0.6"]));
}

#[tokio::test]
async fn test_empty_os_catalog_aborts_with_parse_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login(&server, "a1", "r1", 1).await;
    mount_api(&server, json!([]), json!([server_record(1, "10.0.0.5", "", 3)]), 1).await;

    let mut inventory = Inventory::new();
    let err = run(config(&server, dir.path()), RunOptions::default())
        .execute(&mut inventory)
        .await
        .unwrap_err();

    match err {
        SyncError::Parse { source_name, source } => {
            assert_eq!(source_name, "<inline config>");
            assert!(matches!(
                source,
                CoreError::OperatingSystemNotFound { server_id: 1, operating_system: 3 }
            ));
        }
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_strict_and_lenient_compose() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login(&server, "a1", "r1", 1).await;
    mount_api(
        &server,
        json!([{"id": 3, "name": "linux"}]),
        json!([server_record(1, "10.0.0.5", "", 3)]),
        2,
    )
    .await;

    let mut lenient = config(&server, dir.path());
    lenient.rules.compose.insert("stage".to_string(), "missing_var".to_string());
    lenient.rules.compose.insert("env".to_string(), "'prod'".to_string());

    let mut inventory = Inventory::new();
    let summary = run(lenient.clone(), RunOptions::default())
        .execute(&mut inventory)
        .await
        .unwrap();
    assert_eq!(summary.report.skipped.len(), 1);
    let vars = inventory.host("10.0.0.5").unwrap();
    assert!(!vars.contains_key("stage"));
    assert_eq!(vars["env"], json!("prod"));

    let mut strict = lenient;
    strict.rules.strict = true;
    let err = run(strict, RunOptions::default())
        .execute(&mut Inventory::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Could not set stage for host 10.0.0.5"));
}

#[tokio::test]
async fn test_cached_run_without_token_still_exports_real_token() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login(&server, "a1", "r1", 2).await;
    mount_api(
        &server,
        json!([{"id": 3, "name": "linux"}]),
        json!([server_record(1, "10.0.0.5", "", 3)]),
        1,
    )
    .await;

    let mut cached = config(&server, dir.path());
    cached.cache = true;
    cached.cache_plugin = CachePlugin::Jsonfile;
    cached.cache_connection = Some(dir.path().join("cache"));

    run(cached.clone(), RunOptions::default())
        .execute(&mut Inventory::new())
        .await
        .unwrap();

    // Same cache, but a token file that does not exist yet.
    cached.token_file = Some(dir.path().join("other-token"));
    let mut inventory = Inventory::new();
    let summary = run(cached, RunOptions::default())
        .execute(&mut inventory)
        .await
        .unwrap();

    assert_eq!(summary.cache_hits, 3);
    assert_eq!(
        inventory.group("all").unwrap().vars["django_drf_token"],
        json!("a1")
    );
}

#[tokio::test]
async fn test_duplicate_ips_are_reported() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login(&server, "a1", "r1", 1).await;
    mount_api(
        &server,
        json!([{"id": 3, "name": "linux"}]),
        json!([
            server_record(1, "10.0.0.5", "old", 3),
            server_record(2, "10.0.0.5", "new", 3),
        ]),
        1,
    )
    .await;

    let mut inventory = Inventory::new();
    let summary = run(config(&server, dir.path()), RunOptions::default())
        .execute(&mut inventory)
        .await
        .unwrap();

    assert_eq!(inventory.host_count(), 1);
    assert_eq!(summary.report.overwritten.len(), 1);
    assert_eq!(
        inventory.host("10.0.0.5").unwrap()["server"]["description"],
        json!("new")
    );
}

#[tokio::test]
async fn test_malformed_server_record() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login(&server, "a1", "r1", 1).await;
    mount_api(&server, json!([]), json!([{"id": 1}]), 1).await;

    let err = run(config(&server, dir.path()), RunOptions::default())
        .execute(&mut Inventory::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Record { .. }));
}

#[tokio::test]
async fn test_persisted_token_is_refreshed_once_per_run() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    TokenStore::new(dir.path().join("token"))
        .save(&Token::new("a1", "r1"))
        .unwrap();

    mount_login(&server, "unused", "unused", 0).await;
    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .and(body_json(json!({"refresh": "r1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "a2"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_api(
        &server,
        json!([{"id": 3, "name": "linux"}]),
        json!([server_record(1, "10.0.0.5", "", 3)]),
        1,
    )
    .await;

    let run = run(config(&server, dir.path()), RunOptions::default());
    assert_eq!(run.auth().state(), AuthState::Authenticated);

    let mut inventory = Inventory::new();
    run.execute(&mut inventory).await.unwrap();

    assert_eq!(server.received_requests().await.unwrap().len(), 4);
    assert_eq!(run.auth().state(), AuthState::Authenticated);
    assert_eq!(run.config().customer_id, 7);
    assert_eq!(
        inventory.group("all").unwrap().vars["django_drf_token"],
        json!("a2")
    );
}
