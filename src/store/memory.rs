//! In-memory heartbeat store: a ring buffer per monitor, useful for tests
//! and for running the engine without a configured database backend.
//! Generalizes the teacher's `MemoryBackend`, but with real interior
//! mutability via `RwLock` rather than the teacher's placeholder methods
//! (`storage/memory.rs` notes `insert_batch` "requires interior
//! mutability" and never provides it).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

use super::{uptime_ratio, HeartbeatStore, StoreResult, UptimeWindow};
use crate::executor::push::LastHeartbeat;
use crate::model::Heartbeat;

const MAX_HEARTBEATS_PER_MONITOR: usize = 10_000;

pub struct MemoryStore {
    heartbeats: RwLock<HashMap<String, VecDeque<Heartbeat>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            heartbeats: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HeartbeatStore for MemoryStore {
    async fn append(&self, heartbeat: Heartbeat) -> StoreResult<()> {
        let mut heartbeats = self.heartbeats.write().await;
        let deque = heartbeats.entry(heartbeat.monitor_id.clone()).or_default();
        deque.push_back(heartbeat);
        if deque.len() > MAX_HEARTBEATS_PER_MONITOR {
            deque.pop_front();
        }
        Ok(())
    }

    async fn latest(&self, monitor_id: &str, n: usize) -> StoreResult<Vec<Heartbeat>> {
        let heartbeats = self.heartbeats.read().await;
        Ok(heartbeats
            .get(monitor_id)
            .map(|deque| deque.iter().rev().take(n).cloned().collect())
            .unwrap_or_default())
    }

    async fn range(&self, monitor_id: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> StoreResult<Vec<Heartbeat>> {
        let heartbeats = self.heartbeats.read().await;
        Ok(heartbeats
            .get(monitor_id)
            .map(|deque| {
                deque
                    .iter()
                    .filter(|hb| hb.timestamp >= from && hb.timestamp <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn uptime_stats(&self, monitor_id: &str, windows: &[UptimeWindow]) -> StoreResult<HashMap<String, f64>> {
        let heartbeats = self.heartbeats.read().await;
        let Some(deque) = heartbeats.get(monitor_id) else {
            return Ok(windows.iter().map(|w| (w.name.clone(), 0.0)).collect());
        };

        let now = Utc::now();
        let mut stats = HashMap::new();
        for window in windows {
            let window_start = now - window.duration;
            let in_window: Vec<Heartbeat> = deque.iter().filter(|hb| hb.timestamp >= window_start).cloned().collect();
            stats.insert(window.name.clone(), uptime_ratio(&in_window, window_start, now));
        }
        Ok(stats)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let mut heartbeats = self.heartbeats.write().await;
        let mut deleted = 0u64;
        for deque in heartbeats.values_mut() {
            let before = deque.len();
            deque.retain(|hb| hb.timestamp >= cutoff);
            deleted += (before - deque.len()) as u64;
        }
        Ok(deleted)
    }

    async fn delete_by_monitor(&self, monitor_id: &str) -> StoreResult<u64> {
        let mut heartbeats = self.heartbeats.write().await;
        Ok(heartbeats.remove(monitor_id).map(|d| d.len() as u64).unwrap_or(0))
    }
}

#[async_trait]
impl LastHeartbeat for MemoryStore {
    async fn last_heartbeat(&self, monitor_id: &str) -> Option<Heartbeat> {
        let heartbeats = self.heartbeats.read().await;
        heartbeats.get(monitor_id).and_then(|deque| deque.back().cloned())
    }
}
