//! Heartbeat store (C7, §4.7): interface only, the engine never assumes a
//! particular backend. Generalizes the teacher's `StorageBackend` trait
//! (`storage/backend.rs`) from "batches of server metrics" to "one
//! heartbeat at a time, append-ordered, per monitor".

pub mod memory;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::StoreError;
use crate::model::Heartbeat;

pub type StoreResult<T> = Result<T, StoreError>;

/// A named time window for uptime ratio calculations (e.g. "24h", "30d").
#[derive(Debug, Clone)]
pub struct UptimeWindow {
    pub name: String,
    pub duration: chrono::Duration,
}

/// Ordering guarantee (§4.7): readers see a prefix of the total order of
/// appends; no gaps. Implementations must provide their own concurrency
/// safety; the engine treats the store as serialisable per monitor.
#[async_trait]
pub trait HeartbeatStore: Send + Sync {
    async fn append(&self, heartbeat: Heartbeat) -> StoreResult<()>;

    /// The `n` most recent heartbeats for a monitor, newest first.
    async fn latest(&self, monitor_id: &str, n: usize) -> StoreResult<Vec<Heartbeat>>;

    /// Heartbeats in `[from, to]`, oldest first.
    async fn range(&self, monitor_id: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> StoreResult<Vec<Heartbeat>>;

    /// Ratio of UP duration to total duration for each requested window,
    /// keyed by window name.
    async fn uptime_stats(&self, monitor_id: &str, windows: &[UptimeWindow]) -> StoreResult<HashMap<String, f64>>;

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;

    async fn delete_by_monitor(&self, monitor_id: &str) -> StoreResult<u64>;
}

/// Computes an uptime ratio from a chronologically-sorted heartbeat slice
/// by treating each heartbeat as "owning" the interval up to the next one
/// (or up to `window_end` for the last one). Shared by every backend so
/// the ratio definition lives in exactly one place.
pub(crate) fn uptime_ratio(heartbeats: &[Heartbeat], window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> f64 {
    if heartbeats.is_empty() {
        return 0.0;
    }

    let mut up_nanos: i64 = 0;
    let mut total_nanos: i64 = 0;

    for (i, hb) in heartbeats.iter().enumerate() {
        let segment_start = hb.timestamp.max(window_start);
        let segment_end = heartbeats
            .get(i + 1)
            .map(|next| next.timestamp)
            .unwrap_or(window_end)
            .min(window_end);

        if segment_end <= segment_start {
            continue;
        }

        let span = (segment_end - segment_start).num_nanoseconds().unwrap_or(0);
        total_nanos += span;
        if hb.status == crate::model::Status::Up {
            up_nanos += span;
        }
    }

    if total_nanos == 0 {
        0.0
    } else {
        up_nanos as f64 / total_nanos as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;

    fn hb(monitor_id: &str, seq: u64, status: Status, minutes_ago: i64) -> Heartbeat {
        Heartbeat {
            monitor_id: monitor_id.to_string(),
            sequence: seq,
            timestamp: Utc::now() - chrono::Duration::minutes(minutes_ago),
            status,
            message: String::new(),
            latency_ms: 0,
            retries: 0,
            important: false,
        }
    }

    #[test]
    fn uptime_ratio_is_one_when_always_up() {
        let now = Utc::now();
        let heartbeats = vec![hb("m1", 1, Status::Up, 10)];
        let ratio = uptime_ratio(&heartbeats, now - chrono::Duration::minutes(10), now);
        assert!((ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn uptime_ratio_is_zero_when_always_down() {
        let now = Utc::now();
        let heartbeats = vec![hb("m1", 1, Status::Down, 10)];
        let ratio = uptime_ratio(&heartbeats, now - chrono::Duration::minutes(10), now);
        assert!(ratio.abs() < 1e-9);
    }

    #[test]
    fn uptime_ratio_splits_between_segments() {
        let now = Utc::now();
        let heartbeats = vec![hb("m1", 1, Status::Down, 10), hb("m1", 2, Status::Up, 5)];
        let ratio = uptime_ratio(&heartbeats, now - chrono::Duration::minutes(10), now);
        assert!((ratio - 0.5).abs() < 0.05);
    }
}
