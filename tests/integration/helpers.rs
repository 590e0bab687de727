//! Helper builders for integration tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use peekaping_engine::model::{ChannelKind, Monitor, NotificationChannel, Status};
use peekaping_engine::scheduler::ConfigSource;
use serde_json::json;

pub fn test_monitor(id: &str, kind: &str, config: serde_json::Value, interval_secs: u64) -> Monitor {
    let now = Utc::now();
    Monitor {
        id: id.to_string(),
        name: format!("test-{id}"),
        kind: kind.to_string(),
        interval_secs,
        timeout_secs: 5,
        max_retries: 1,
        retry_interval_secs: 1,
        resend_interval_secs: 0,
        active: true,
        status: Status::Pending,
        config,
        proxy: None,
        notification_channel_ids: vec![],
        created_at: now,
        updated_at: now,
        revision: 1,
    }
}

pub fn http_monitor(id: &str, url: &str, interval_secs: u64) -> Monitor {
    test_monitor(id, "http", json!({ "url": url, "method": "GET", "accepted_status_codes": ["2XX"] }), interval_secs)
}

pub fn webhook_channel(id: &str, url: &str) -> NotificationChannel {
    NotificationChannel {
        id: id.to_string(),
        name: format!("channel-{id}"),
        kind: ChannelKind::Webhook,
        config: json!({ "url": url }),
        default: false,
        active: true,
    }
}

/// A `ConfigSource` backed by in-memory vectors, for tests that need to
/// hand the scheduler/dispatcher a fixed channel/monitor set without
/// standing up a full `StaticConfigSource` file.
pub struct FixedConfigSource {
    pub channels: Vec<NotificationChannel>,
    pub monitors: Vec<Monitor>,
}

impl FixedConfigSource {
    pub fn new(channels: Vec<NotificationChannel>, monitors: Vec<Monitor>) -> Arc<Self> {
        Arc::new(Self { channels, monitors })
    }
}

#[async_trait]
impl ConfigSource for FixedConfigSource {
    async fn channels(&self) -> Vec<NotificationChannel> {
        self.channels.clone()
    }

    async fn maintenance_windows(&self) -> Vec<peekaping_engine::model::MaintenanceWindow> {
        vec![]
    }

    async fn monitor(&self, monitor_id: &str) -> Option<Monitor> {
        self.monitors.iter().find(|m| m.id == monitor_id).cloned()
    }
}
