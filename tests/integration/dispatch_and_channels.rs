//! End-to-end test of the scheduler driving dispatch to a real channel
//! driver: a failing HTTP monitor should notify its webhook channel.

use std::sync::Arc;
use std::time::Duration;

use peekaping_engine::channels::default_registry as default_channel_registry;
use peekaping_engine::executor::push::PushTracker;
use peekaping_engine::executor::default_registry;
use peekaping_engine::hub::Hub;
use peekaping_engine::scheduler::{Scheduler, SchedulerDeps};
use peekaping_engine::store::memory::MemoryStore;
use peekaping_engine::store::HeartbeatStore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod helpers;
use helpers::{http_monitor, webhook_channel, FixedConfigSource};

#[tokio::test]
async fn down_monitor_notifies_its_webhook_channel() {
    let monitored_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&monitored_server)
        .await;

    let notification_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/incoming"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&notification_server)
        .await;

    let channel = webhook_channel("c1", &format!("{}/hooks/incoming", notification_server.uri()));

    let mut monitor = http_monitor("m1", &format!("{}/down", monitored_server.uri()), 1);
    monitor.max_retries = 1;
    monitor.notification_channel_ids = vec![channel.id.clone()];

    let store: Arc<dyn HeartbeatStore> = Arc::new(MemoryStore::new());
    let deps = SchedulerDeps {
        registry: Arc::new(default_registry(Arc::new(PushTracker::new()))),
        store: store.clone(),
        hub: Hub::new(),
        channel_registry: Arc::new(default_channel_registry()),
        config_source: FixedConfigSource::new(vec![channel], vec![]),
    };

    let scheduler = Scheduler::new(deps);
    scheduler.start(monitor).await;

    tokio::time::sleep(Duration::from_millis(1500)).await;
    scheduler.shutdown(Duration::from_secs(1)).await;

    let requests = notification_server.received_requests().await.unwrap();
    assert!(!requests.is_empty(), "expected the webhook channel to receive at least one notification");

    let body: serde_json::Value = requests[0].body_json().unwrap();
    assert!(body["body"].as_str().unwrap().len() > 0);
}
