//! Failure injection: slow or failing identity store, unreachable upstream.

use std::sync::Arc;
use std::time::Duration;

use admission_gate::config::GateConfig;
use admission_gate::identity::AccountId;
use admission_gate::store::InMemoryIdentityStore;
use reqwest::StatusCode;
use serde_json::Value;

mod common;

fn config(upstream: std::net::SocketAddr) -> GateConfig {
    let mut config = GateConfig::default();
    config.upstream.address = upstream.to_string();
    config.rate_limit.burst_size = 100;
    config.routes.push(admission_gate::config::RouteConfig {
        name: "movies".into(),
        methods: vec![],
        path_prefix: "/v1/movies".into(),
        require_activated: true,
        permission: Some("movies:read".into()),
        priority: 0,
    });
    config
}

fn store() -> Arc<InMemoryIdentityStore> {
    let store = Arc::new(InMemoryIdentityStore::new());
    store.add_account(AccountId(1), true);
    store.grant(AccountId(1), ["movies:read"]);
    store
}

async fn error_code(res: reqwest::Response) -> String {
    let body: Value = res.json().await.unwrap();
    body["error"]["code"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn test_slow_store_surfaces_as_internal_error() {
    let upstream = common::start_echo_upstream().await;
    let store = store();
    let mut config = config(upstream);
    config.identity_store.deadline_ms = 50;
    let gate = common::start_gate(config, store.clone()).await;
    let bearer = gate.bearer(1).await;

    store.set_latency(Some(Duration::from_millis(500)));
    let res = common::client()
        .get(gate.url("/v1/movies"))
        .header("Authorization", bearer)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INTERNAL_SERVER_ERROR");
    assert_eq!(
        body["error"]["message"],
        "the server encountered a problem and could not process your request"
    );
}

#[tokio::test]
async fn test_store_outage_surfaces_as_internal_error() {
    let upstream = common::start_echo_upstream().await;
    let store = store();
    let gate = common::start_gate(config(upstream), store.clone()).await;
    let bearer = gate.bearer(1).await;

    store.set_outage(true);
    let res = common::client()
        .get(gate.url("/v1/movies"))
        .header("Authorization", bearer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    // Reserve a port, then free it so nothing listens there.
    let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = probe.local_addr().unwrap();
    drop(probe);

    let gate = common::start_gate(config(dead), store()).await;
    let res = common::client().get(gate.url("/v1/healthcheck")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(error_code(res).await, "BAD_GATEWAY");
}

