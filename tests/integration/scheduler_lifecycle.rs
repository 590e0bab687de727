//! End-to-end scheduler tests: an HTTP monitor ticks against a mock
//! server, its heartbeats land in the store and fan out through the hub.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use peekaping_engine::channels::default_registry as default_channel_registry;
use peekaping_engine::executor::push::PushTracker;
use peekaping_engine::executor::default_registry;
use peekaping_engine::hub::Hub;
use peekaping_engine::model::Status;
use peekaping_engine::scheduler::{Scheduler, SchedulerDeps};
use peekaping_engine::store::memory::MemoryStore;
use peekaping_engine::store::HeartbeatStore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod helpers;
use helpers::{http_monitor, FixedConfigSource};

fn test_deps(store: Arc<dyn HeartbeatStore>, hub: Hub) -> SchedulerDeps {
    SchedulerDeps {
        registry: Arc::new(default_registry(Arc::new(PushTracker::new()))),
        store,
        hub,
        channel_registry: Arc::new(default_channel_registry()),
        config_source: FixedConfigSource::new(vec![], vec![]),
    }
}

#[tokio::test]
async fn http_monitor_ticks_persist_up_heartbeats() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let store: Arc<dyn HeartbeatStore> = Arc::new(MemoryStore::new());
    let deps = test_deps(store.clone(), Hub::new());
    let scheduler = Scheduler::new(deps);

    let url = format!("{}/health", mock_server.uri());
    scheduler.start(http_monitor("m1", &url, 1)).await;

    tokio::time::sleep(Duration::from_millis(1200)).await;
    scheduler.shutdown(Duration::from_secs(1)).await;

    let latest = store.latest("m1", 5).await.unwrap();
    assert!(!latest.is_empty(), "expected at least one persisted heartbeat");
    assert_eq!(latest[0].status, Status::Up);
}

#[tokio::test]
async fn repeated_failures_cross_into_down_after_max_retries() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let store: Arc<dyn HeartbeatStore> = Arc::new(MemoryStore::new());
    let deps = test_deps(store.clone(), Hub::new());
    let scheduler = Scheduler::new(deps);

    let url = format!("{}/down", mock_server.uri());
    let mut monitor = http_monitor("m1", &url, 1);
    monitor.max_retries = 2;
    scheduler.start(monitor).await;

    tokio::time::sleep(Duration::from_millis(3200)).await;
    scheduler.shutdown(Duration::from_secs(1)).await;

    let latest = store.latest("m1", 10).await.unwrap();
    assert!(latest.iter().any(|hb| hb.status == Status::Down), "expected a Down heartbeat after exceeding max_retries");
}

#[tokio::test]
async fn reconfigure_changes_interval_without_losing_subscribers() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let hub = Hub::new();
    let store: Arc<dyn HeartbeatStore> = Arc::new(MemoryStore::new());
    let deps = test_deps(store, hub.clone());
    let scheduler = Scheduler::new(deps);

    let url = format!("{}/health", mock_server.uri());
    let monitor = http_monitor("m1", &url, 5);
    scheduler.start(monitor.clone()).await;

    hub.subscribe("session-1", ["m1".to_string()]).await;
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_task = seen.clone();
    let hub_task = hub.clone();
    tokio::spawn(async move {
        loop {
            hub_task.notified("session-1").await;
            seen_task.fetch_add(hub_task.drain("session-1").await.len(), Ordering::SeqCst);
        }
    });

    let mut faster = monitor;
    faster.interval_secs = 1;
    faster.revision = 2;
    scheduler.reconfigure(faster).await;

    tokio::time::sleep(Duration::from_millis(1500)).await;
    scheduler.shutdown(Duration::from_secs(1)).await;

    assert!(seen.load(Ordering::SeqCst) >= 1, "reconfigured monitor should still publish to existing subscribers");
}
