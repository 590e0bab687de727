//! Notification dispatcher (C9, §4.9).
//!
//! Gates on maintenance + resend policy, then sends to every channel
//! configured for the monitor, in order, sequentially per heartbeat (so
//! per-channel message order is preserved) while different heartbeats
//! may dispatch concurrently — callers achieve that by spawning one
//! `dispatch` call per heartbeat rather than awaiting inline.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{instrument, warn};

use crate::channels::{ChannelRegistry, NotificationPayload};
use crate::error::DispatchErrorKind;
use crate::maintenance::MaintenanceVerdict;
use crate::model::{Heartbeat, Monitor, NotificationChannel, ResendCursor, Status};
use crate::template::{placeholders, render};

const DEFAULT_CHANNEL_BUDGET: Duration = Duration::from_secs(10);
const RETRY_BACKOFFS: [Duration; 3] = [Duration::from_secs(1), Duration::from_secs(3), Duration::from_secs(9)];

/// Per-channel outcome recorded for one dispatch (§4.9: "other channels
/// continue unaffected").
#[derive(Debug, Clone)]
pub struct ChannelOutcome {
    pub channel_id: String,
    pub attempts: u32,
    pub ok: bool,
    pub last_error: Option<String>,
}

/// Decides whether `heartbeat` should be dispatched at all (§4.9 gate).
pub fn should_dispatch(heartbeat: &Heartbeat, maintenance: MaintenanceVerdict, resend_interval_secs: u64, cursor: Option<ResendCursor>, now: DateTime<Utc>) -> bool {
    if maintenance == MaintenanceVerdict::SuppressAlerts {
        return false;
    }
    if heartbeat.important {
        return true;
    }
    if heartbeat.status == Status::Down && resend_interval_secs > 0 {
        if let Some(cursor) = cursor {
            let elapsed = (now - cursor.last_notified_at).num_seconds().max(0) as u64;
            return cursor.last_notified_status == Status::Down && elapsed >= resend_interval_secs;
        }
    }
    false
}

/// Sends `heartbeat` to every channel configured for `monitor`, in order.
#[instrument(skip(registry, channels, monitor, heartbeat), fields(monitor_id = %monitor.id))]
pub async fn dispatch(registry: &ChannelRegistry, channels: &[NotificationChannel], monitor: &Monitor, heartbeat: &Heartbeat) -> Vec<ChannelOutcome> {
    let vars = placeholders(monitor, heartbeat);
    let mut outcomes = Vec::with_capacity(monitor.notification_channel_ids.len());

    for channel_id in &monitor.notification_channel_ids {
        let Some(channel) = channels.iter().find(|c| &c.id == channel_id && c.active) else {
            continue;
        };

        let Some(driver) = registry.get(channel.kind) else {
            warn!(channel = %channel.id, "no driver registered for channel kind");
            continue;
        };

        let subject_template = channel
            .config
            .get("subject_template")
            .and_then(|v| v.as_str())
            .unwrap_or("{{monitor.name}} is {{status}}");
        let body_template = channel
            .config
            .get("body_template")
            .and_then(|v| v.as_str())
            .unwrap_or("{{msg}}");

        let payload = NotificationPayload {
            subject: render(subject_template, &vars),
            body: render(body_template, &vars),
        };

        let mut attempts = 0u32;
        let mut last_error = None;
        let mut ok = false;

        loop {
            attempts += 1;
            match driver.send(&channel.config, &payload, DEFAULT_CHANNEL_BUDGET).await {
                Ok(()) => {
                    ok = true;
                    break;
                }
                Err(e) => {
                    last_error = Some(e.message.clone());
                    if e.kind == DispatchErrorKind::Permanent {
                        break;
                    }
                    let retry_index = attempts as usize - 1;
                    if retry_index >= RETRY_BACKOFFS.len() {
                        break;
                    }
                    tokio::time::sleep(RETRY_BACKOFFS[retry_index]).await;
                }
            }
        }

        if !ok {
            warn!(channel = %channel.id, attempts, error = ?last_error, "channel dispatch failed");
        }

        outcomes.push(ChannelOutcome {
            channel_id: channel.id.clone(),
            attempts,
            ok,
            last_error,
        });
    }

    outcomes
}

/// Updates the resend cursor after a dispatch decision, per §4.9/§9
/// (the cursor must survive restarts — callers persist it via the store
/// alongside the monitor).
pub fn advance_cursor(cursor: &mut Option<ResendCursor>, heartbeat: &Heartbeat, dispatched: bool, now: DateTime<Utc>) {
    if dispatched {
        *cursor = Some(ResendCursor {
            last_notified_at: now,
            last_notified_status: heartbeat.status,
        });
    } else if heartbeat.status != Status::Down {
        *cursor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heartbeat(status: Status, important: bool) -> Heartbeat {
        Heartbeat {
            monitor_id: "m1".into(),
            sequence: 1,
            timestamp: Utc::now(),
            status,
            message: "x".into(),
            latency_ms: 0,
            retries: 0,
            important,
        }
    }

    #[test]
    fn important_always_dispatches() {
        assert!(should_dispatch(&heartbeat(Status::Down, true), MaintenanceVerdict::None, 0, None, Utc::now()));
    }

    #[test]
    fn suppress_alerts_blocks_even_important() {
        assert!(!should_dispatch(&heartbeat(Status::Down, true), MaintenanceVerdict::SuppressAlerts, 0, None, Utc::now()));
    }

    #[test]
    fn resend_fires_after_interval_elapsed() {
        let now = Utc::now();
        let cursor = ResendCursor {
            last_notified_at: now - chrono::Duration::seconds(700),
            last_notified_status: Status::Down,
        };
        assert!(should_dispatch(&heartbeat(Status::Down, false), MaintenanceVerdict::None, 600, Some(cursor), now));
    }

    #[test]
    fn resend_does_not_fire_before_interval_elapsed() {
        let now = Utc::now();
        let cursor = ResendCursor {
            last_notified_at: now - chrono::Duration::seconds(100),
            last_notified_status: Status::Down,
        };
        assert!(!should_dispatch(&heartbeat(Status::Down, false), MaintenanceVerdict::None, 600, Some(cursor), now));
    }

    #[test]
    fn non_important_non_down_never_dispatches() {
        assert!(!should_dispatch(&heartbeat(Status::Up, false), MaintenanceVerdict::None, 600, None, Utc::now()));
    }
}
