//! Common data model shared by every component (§3).
//!
//! Kept deliberately plain-data: the engine's components pass these types
//! around by value/reference rather than mutating shared state, the same
//! way the teacher passes `ServerConfig`/`ServerMetrics` between actors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A monitor's lifecycle status, also the status recorded on a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Up,
    Down,
    Pending,
    Maint,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Up => "up",
            Status::Down => "down",
            Status::Pending => "pending",
            Status::Maint => "maint",
        };
        write!(f, "{s}")
    }
}

/// The raw outcome of a single probe execution (C1's `Result`, renamed to
/// avoid clashing with `std::result::Result`).
///
/// Executors must not mutate the `Monitor`/`Proxy` they're given and must
/// honour the caller's deadline; see `executor::Executor`.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub status: Status,
    pub message: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Set by the Push executor when a fresh push already covers this tick
    /// (§4.3, §4.5): the scheduler does nothing further with this outcome —
    /// no heartbeat append, no publish, no dispatch — rather than treating
    /// `status` as a real result.
    pub no_op: bool,
}

impl ProbeOutcome {
    pub fn new(status: Status, message: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            status,
            message: message.into(),
            start_time,
            end_time: Utc::now(),
            no_op: false,
        }
    }

    /// "Do nothing further for this tick" (§4.5): a fresh push was already
    /// recorded, so there is nothing new to fold into a heartbeat.
    pub fn no_op(start_time: DateTime<Utc>) -> Self {
        Self {
            status: Status::Up,
            message: "push received within interval".to_string(),
            start_time,
            end_time: Utc::now(),
            no_op: true,
        }
    }

    pub fn latency_ms(&self) -> i64 {
        (self.end_time - self.start_time).num_milliseconds().max(0)
    }
}

/// Proxy reference a monitor may route its probe through (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    pub host: String,
    pub port: u16,
    pub protocol: ProxyProtocol,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    Http,
    Https,
    Socks4,
    Socks5,
    Socks5h,
}

/// A user-defined periodic probe (§3).
///
/// Invariant: `status` is produced only by the retry layer (`retry::apply`);
/// external callers may only toggle `active` or replace `config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    pub id: String,
    pub name: String,
    /// Executor type tag, e.g. "http", "tcp", "push".
    pub kind: String,
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_interval_secs: u64,
    /// 0 disables resend.
    pub resend_interval_secs: u64,
    pub active: bool,
    pub status: Status,
    /// Opaque JSON blob interpreted by the matching executor (C4).
    pub config: serde_json::Value,
    pub proxy: Option<Proxy>,
    pub notification_channel_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every save; the scheduler uses this to detect a
    /// reconfiguration and restart the monitor's ticker (§4.5).
    pub revision: u64,
}

/// One record of one probe's outcome (§3).
///
/// Invariant: for a monitor the sequence is totally ordered by timestamp;
/// two consecutive heartbeats with identical status have `important = false`;
/// the first heartbeat of a monitor is `important = true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub monitor_id: String,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub status: Status,
    pub message: String,
    pub latency_ms: i64,
    pub retries: u32,
    pub important: bool,
}

/// An outbound notification destination (§3). Immutable during a dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub id: String,
    pub name: String,
    pub kind: ChannelKind,
    pub config: serde_json::Value,
    pub default: bool,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelKind {
    Smtp,
    Slack,
    Telegram,
    Discord,
    Webhook,
    Matrix,
    PagerDuty,
    Pushover,
    Opsgenie,
    Mattermost,
    Gotify,
    Ntfy,
    GoogleChat,
    GrafanaOnCall,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelKind::Smtp => "smtp",
            ChannelKind::Slack => "slack",
            ChannelKind::Telegram => "telegram",
            ChannelKind::Discord => "discord",
            ChannelKind::Webhook => "webhook",
            ChannelKind::Matrix => "matrix",
            ChannelKind::PagerDuty => "pagerduty",
            ChannelKind::Pushover => "pushover",
            ChannelKind::Opsgenie => "opsgenie",
            ChannelKind::Mattermost => "mattermost",
            ChannelKind::Gotify => "gotify",
            ChannelKind::Ntfy => "ntfy",
            ChannelKind::GoogleChat => "google-chat",
            ChannelKind::GrafanaOnCall => "grafana-oncall",
        };
        write!(f, "{s}")
    }
}

/// Maintenance-window strategy (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStrategy {
    SuppressAlerts,
    PauseProbes,
}

/// How a maintenance window decides whether it is currently active.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MaintenanceSchedule {
    /// Always active while the window itself is active.
    AlwaysOn,
    /// A single start/end interval.
    OneShot {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// A cron-like recurring rule with its own timezone and a duration per
    /// occurrence.
    Recurring {
        cron_expr: String,
        timezone: String,
        duration_secs: u64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    pub id: String,
    pub monitor_ids: Vec<String>,
    pub schedule: MaintenanceSchedule,
    pub strategy: MaintenanceStrategy,
    pub active: bool,
}

/// Per-monitor cursor the dispatcher uses to decide whether a repeat DOWN
/// notification should fire (§3, §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResendCursor {
    pub last_notified_at: DateTime<Utc>,
    pub last_notified_status: Status,
}
