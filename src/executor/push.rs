//! Push executor (§4.3): the inverted monitor. Instead of dialing out,
//! it reads back the latest heartbeat the monitor's own push endpoint
//! recorded and judges freshness against the monitor's interval.
//!
//! `execute` never performs I/O itself — the API layer's push endpoint
//! (§4.10) is what actually records a heartbeat; this executor only asks
//! a `LastHeartbeat` lookup (implemented by the store) what it last saw.
//! Declared here, not in `store`, so the executor stays the owner of its
//! own narrow contract (§9 design note: registry values only need
//! `{validate, execute}`, not a concrete store type).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config_codec::decode;
use crate::error::ConfigError;
use crate::model::{Heartbeat, Monitor, ProbeOutcome, Proxy, Status};

use super::{ExecutionContext, Executor};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PushConfig {
    #[serde(default)]
    pub token: Option<String>,
}

/// Narrow read contract the push executor needs from a store.
#[async_trait]
pub trait LastHeartbeat: Send + Sync {
    async fn last_heartbeat(&self, monitor_id: &str) -> Option<Heartbeat>;
}

pub struct PushExecutor {
    store: Option<Arc<dyn LastHeartbeat>>,
}

impl Default for PushExecutor {
    fn default() -> Self {
        Self { store: None }
    }
}

impl PushExecutor {
    pub fn with_store(store: Arc<dyn LastHeartbeat>) -> Self {
        Self { store: Some(store) }
    }
}

#[async_trait]
impl Executor for PushExecutor {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let _parsed: PushConfig = decode(config)?;
        Ok(())
    }

    async fn execute(&self, _ctx: ExecutionContext, monitor: &Monitor, _proxy: Option<&Proxy>) -> ProbeOutcome {
        let start = Utc::now();
        let Some(store) = &self.store else {
            return ProbeOutcome::new(Status::Pending, "push monitors are evaluated by the scheduler, not probed".to_string(), start);
        };

        match store.last_heartbeat(&monitor.id).await {
            None => ProbeOutcome::new(Status::Down, "No push received in time".to_string(), start),
            Some(heartbeat) => {
                let age = Utc::now().signed_duration_since(heartbeat.timestamp);
                if age.num_seconds() <= monitor.interval_secs as i64 {
                    ProbeOutcome::no_op(start)
                } else {
                    ProbeOutcome::new(Status::Down, "No push received in time".to_string(), start)
                }
            }
        }
    }
}

/// Tracks when each push monitor's `/push/<token>` endpoint was last hit,
/// independent of the heartbeat store. The official heartbeat the
/// scheduler appends every tick reflects this executor's own verdict, so
/// reading freshness back from that store would always look fresh —
/// freshness has to be measured against the raw external event instead.
pub struct PushTracker {
    last: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl PushTracker {
    pub fn new() -> Self {
        Self { last: RwLock::new(HashMap::new()) }
    }

    /// Called by the API's push handler on every inbound ping.
    pub async fn record(&self, monitor_id: &str) {
        self.last.write().await.insert(monitor_id.to_string(), Utc::now());
    }
}

impl Default for PushTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LastHeartbeat for PushTracker {
    async fn last_heartbeat(&self, monitor_id: &str) -> Option<Heartbeat> {
        let last = self.last.read().await;
        last.get(monitor_id).map(|timestamp| Heartbeat {
            monitor_id: monitor_id.to_string(),
            sequence: 0,
            timestamp: *timestamp,
            status: Status::Up,
            message: "push received".to_string(),
            latency_ms: 0,
            retries: 0,
            important: false,
        })
    }
}
