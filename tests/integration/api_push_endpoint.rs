//! Integration tests for the thin Axum API surface: health check and the
//! push endpoint's token-gated freshness recording.

#![cfg(feature = "api")]

use std::sync::Arc;

use peekaping_engine::api::{spawn_api_server, ApiConfig, ApiState};
use peekaping_engine::channels::default_registry as default_channel_registry;
use peekaping_engine::executor::push::{LastHeartbeat, PushTracker};
use peekaping_engine::executor::default_registry;
use peekaping_engine::hub::Hub;
use peekaping_engine::scheduler::{Scheduler, SchedulerDeps};
use peekaping_engine::store::memory::MemoryStore;
use peekaping_engine::store::HeartbeatStore;
use reqwest::StatusCode;
use serde_json::{json, Value};

mod helpers;
use helpers::{test_monitor, FixedConfigSource};

async fn spawn_test_api(monitors: Vec<peekaping_engine::model::Monitor>) -> (std::net::SocketAddr, Arc<PushTracker>) {
    let store: Arc<dyn HeartbeatStore> = Arc::new(MemoryStore::new());
    let push_tracker = Arc::new(PushTracker::new());
    let deps = SchedulerDeps {
        registry: Arc::new(default_registry(push_tracker.clone())),
        store: store.clone(),
        hub: Hub::new(),
        channel_registry: Arc::new(default_channel_registry()),
        config_source: FixedConfigSource::new(vec![], monitors),
    };
    let scheduler = Arc::new(Scheduler::new(deps.clone()));

    let state = ApiState {
        scheduler,
        store,
        hub: deps.hub,
        push_tracker: push_tracker.clone(),
        config_source: deps.config_source,
    };

    let addr = spawn_api_server(ApiConfig { bind_addr: "127.0.0.1:0".parse().unwrap(), enable_cors: true }, state)
        .await
        .unwrap();

    (addr, push_tracker)
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let (addr, _tracker) = spawn_test_api(vec![]).await;

    let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn push_endpoint_requires_matching_token() {
    let mut monitor = test_monitor("push1", "push", json!({ "token": "secret" }), 60);
    monitor.active = false;
    let (addr, tracker) = spawn_test_api(vec![monitor]).await;

    let client = reqwest::Client::new();

    let rejected = client.post(format!("http://{addr}/push/push1?token=wrong")).send().await.unwrap();
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

    let accepted = client.post(format!("http://{addr}/push/push1?token=secret")).send().await.unwrap();
    assert_eq!(accepted.status(), StatusCode::OK);

    assert!(tracker.last_heartbeat("push1").await.is_some());
}

#[tokio::test]
async fn push_endpoint_rejects_unknown_monitor() {
    let (addr, _tracker) = spawn_test_api(vec![]).await;

    let response = reqwest::Client::new().post(format!("http://{addr}/push/does-not-exist")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
