//! Static config loading for the `server` binary (§1: "the persistence
//! layer itself... a mapping-style repository abstraction is assumed").
//! Generalizes the teacher's `config::read_config_file` (a JSON file
//! parsed once at startup) from servers/services to monitors, channels
//! and maintenance windows — a minimal stand-in for the real repository a
//! full deployment would plug in instead.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::trace;

use crate::model::{MaintenanceWindow, Monitor, NotificationChannel};
use crate::scheduler::ConfigSource;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SeedConfig {
    #[serde(default)]
    pub monitors: Vec<Monitor>,
    #[serde(default)]
    pub channels: Vec<NotificationChannel>,
    #[serde(default)]
    pub maintenance_windows: Vec<MaintenanceWindow>,
}

pub fn read_seed_file(path: &str) -> anyhow::Result<SeedConfig> {
    let contents = std::fs::read_to_string(path)?;
    let config: SeedConfig = serde_json::from_str(&contents).map_err(|e| anyhow::anyhow!("invalid seed config at {path}: {e}"))?;
    trace!(monitors = config.monitors.len(), channels = config.channels.len(), windows = config.maintenance_windows.len(), "loaded seed config");
    Ok(config)
}

/// A `ConfigSource` backed by the seed file's contents, fixed for the
/// process lifetime. Reconfiguration commands still flow through
/// `Scheduler::reconfigure`; this only answers "what channels/windows
/// currently apply" during a dispatch decision.
pub struct StaticConfigSource {
    config: SeedConfig,
}

impl StaticConfigSource {
    pub fn new(config: SeedConfig) -> Arc<Self> {
        Arc::new(Self { config })
    }
}

#[async_trait]
impl ConfigSource for StaticConfigSource {
    async fn channels(&self) -> Vec<NotificationChannel> {
        self.config.channels.clone()
    }

    async fn maintenance_windows(&self) -> Vec<MaintenanceWindow> {
        self.config.maintenance_windows.clone()
    }

    async fn monitor(&self, monitor_id: &str) -> Option<Monitor> {
        self.config.monitors.iter().find(|m| m.id == monitor_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_monitors_channels_and_windows_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "monitors": [{{
                    "id": "m1", "name": "example", "kind": "http", "interval_secs": 60,
                    "timeout_secs": 10, "max_retries": 3, "retry_interval_secs": 10,
                    "resend_interval_secs": 0, "active": true, "status": "pending",
                    "config": {{"url": "https://example.com"}}, "proxy": null,
                    "notification_channel_ids": [], "created_at": "2024-01-01T00:00:00Z",
                    "updated_at": "2024-01-01T00:00:00Z", "revision": 1
                }}],
                "channels": [],
                "maintenance_windows": []
            }}"#
        )
        .unwrap();

        let config = read_seed_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.monitors.len(), 1);
        assert_eq!(config.monitors[0].id, "m1");
    }
}
