//! Live push hub (C11, §4.11).
//!
//! Generalizes the teacher's websocket broadcast (`api/websocket.rs`,
//! one `broadcast::Sender` fanning every event to every client) into a
//! per-session subscription model: sessions subscribe to specific
//! monitor ids, and a full sink drops its oldest pending update instead
//! of blocking the hub or the store — a `broadcast::channel` almost
//! gives this for free, but its per-subscriber lag is all-or-nothing
//! (`Lagged(n)` on the whole stream), not "drop just the oldest queued
//! item for this one sink", so sessions get their own bounded queue.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};

use crate::model::{Heartbeat, Status};

const DEFAULT_SINK_CAPACITY: usize = 64;

/// The compact update forwarded to subscribers (§6: WebSocket `hb` frame).
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatUpdate {
    pub monitor_id: String,
    pub status: Status,
    pub timestamp: DateTime<Utc>,
    pub latency_ms: i64,
    pub message: String,
    pub important: bool,
}

impl From<&Heartbeat> for HeartbeatUpdate {
    fn from(hb: &Heartbeat) -> Self {
        Self {
            monitor_id: hb.monitor_id.clone(),
            status: hb.status,
            timestamp: hb.timestamp,
            latency_ms: hb.latency_ms,
            message: hb.message.clone(),
            important: hb.important,
        }
    }
}

struct Sink {
    monitor_ids: HashSet<String>,
    queue: Mutex<VecDeque<HeartbeatUpdate>>,
    notify: Notify,
    capacity: usize,
}

/// Per-monitor fan-out hub. Cheaply cloneable; the scheduler/store hold
/// one shared instance.
#[derive(Clone)]
pub struct Hub {
    sinks: Arc<Mutex<HashMap<String, Arc<Sink>>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self {
            sinks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers a session, subscribed to the given monitor ids.
    pub async fn subscribe(&self, session_id: impl Into<String>, monitor_ids: impl IntoIterator<Item = String>) {
        let sink = Arc::new(Sink {
            monitor_ids: monitor_ids.into_iter().collect(),
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            capacity: DEFAULT_SINK_CAPACITY,
        });
        self.sinks.lock().await.insert(session_id.into(), sink);
    }

    /// Removes a session; the hub survives disconnects without leaking
    /// resources because nothing else holds a reference to its sink.
    pub async fn unsubscribe(&self, session_id: &str) {
        self.sinks.lock().await.remove(session_id);
    }

    /// Forwards one heartbeat to every subscriber of its monitor. Never
    /// blocks: a full sink drops its oldest queued update.
    pub async fn publish(&self, heartbeat: &Heartbeat) {
        let update = HeartbeatUpdate::from(heartbeat);
        let sinks = self.sinks.lock().await;
        for sink in sinks.values() {
            if !sink.monitor_ids.contains(&heartbeat.monitor_id) {
                continue;
            }
            let mut queue = sink.queue.lock().await;
            if queue.len() >= sink.capacity {
                queue.pop_front();
            }
            queue.push_back(update.clone());
            sink.notify.notify_one();
        }
    }

    /// Drains everything currently queued for `session_id`, oldest first.
    /// A transport adapter (WebSocket writer) calls this in a loop,
    /// awaiting the session's notifier between drains.
    pub async fn drain(&self, session_id: &str) -> Vec<HeartbeatUpdate> {
        let sinks = self.sinks.lock().await;
        let Some(sink) = sinks.get(session_id) else {
            return Vec::new();
        };
        let mut queue = sink.queue.lock().await;
        queue.drain(..).collect()
    }

    /// Awaits the next publish for `session_id`, or returns immediately
    /// if the session is unknown (already disconnected).
    pub async fn notified(&self, session_id: &str) {
        let notify = {
            let sinks = self.sinks.lock().await;
            match sinks.get(session_id) {
                Some(sink) => sink.clone(),
                None => return,
            }
        };
        notify.notify.notified().await;
    }

    pub async fn subscriber_count(&self) -> usize {
        self.sinks.lock().await.len()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hb(monitor_id: &str) -> Heartbeat {
        Heartbeat {
            monitor_id: monitor_id.to_string(),
            sequence: 1,
            timestamp: Utc::now(),
            status: Status::Up,
            message: "ok".into(),
            latency_ms: 5,
            retries: 0,
            important: false,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_only_its_monitor() {
        let hub = Hub::new();
        hub.subscribe("s1", ["m1".to_string()]).await;
        hub.publish(&hb("m1")).await;
        hub.publish(&hb("m2")).await;

        let drained = hub.drain("s1").await;
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].monitor_id, "m1");
    }

    #[tokio::test]
    async fn disconnect_removes_subscriber() {
        let hub = Hub::new();
        hub.subscribe("s1", ["m1".to_string()]).await;
        assert_eq!(hub.subscriber_count().await, 1);
        hub.unsubscribe("s1").await;
        assert_eq!(hub.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn full_sink_drops_oldest_update() {
        let hub = Hub::new();
        hub.subscribe("s1", ["m1".to_string()]).await;

        for i in 0..(DEFAULT_SINK_CAPACITY + 10) {
            let mut heartbeat = hb("m1");
            heartbeat.sequence = i as u64;
            hub.publish(&heartbeat).await;
        }

        let drained = hub.drain("s1").await;
        assert_eq!(drained.len(), DEFAULT_SINK_CAPACITY);
        assert_eq!(drained[0].monitor_id, "m1");
    }
}
