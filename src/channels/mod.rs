//! Channel drivers (C10, §4.10).
//!
//! Each driver validates its own config at save time (C4) and exposes a
//! single `send`; drivers never retry internally, matching the teacher's
//! `DiscordManager`/`send_webhook_alert` shape (one outbound call, errors
//! logged by the caller) generalized into a uniform trait the dispatcher
//! can call through.

pub mod discord;
pub mod google_chat;
pub mod gotify;
pub mod grafana_oncall;
pub mod matrix;
pub mod mattermost;
pub mod ntfy;
pub mod opsgenie;
pub mod pagerduty;
pub mod pushover;
pub mod slack;
pub mod smtp;
pub mod telegram;
pub mod webhook;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ConfigError, DispatchError};
use crate::model::ChannelKind;

/// What to send: already-rendered text, independent of channel-specific framing.
pub struct NotificationPayload {
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait ChannelDriver: Send + Sync {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError>;

    async fn send(&self, config: &serde_json::Value, payload: &NotificationPayload, timeout: std::time::Duration) -> Result<(), DispatchError>;
}

pub struct ChannelRegistry {
    drivers: HashMap<ChannelKind, Arc<dyn ChannelDriver>>,
}

impl ChannelRegistry {
    pub fn get(&self, kind: ChannelKind) -> Option<&Arc<dyn ChannelDriver>> {
        self.drivers.get(&kind)
    }
}

pub fn default_registry() -> ChannelRegistry {
    let mut drivers: HashMap<ChannelKind, Arc<dyn ChannelDriver>> = HashMap::new();
    drivers.insert(ChannelKind::Smtp, Arc::new(smtp::SmtpDriver));
    drivers.insert(ChannelKind::Slack, Arc::new(slack::SlackDriver));
    drivers.insert(ChannelKind::Telegram, Arc::new(telegram::TelegramDriver));
    drivers.insert(ChannelKind::Discord, Arc::new(discord::DiscordDriver));
    drivers.insert(ChannelKind::Webhook, Arc::new(webhook::WebhookDriver));
    drivers.insert(ChannelKind::Matrix, Arc::new(matrix::MatrixDriver));
    drivers.insert(ChannelKind::PagerDuty, Arc::new(pagerduty::PagerDutyDriver));
    drivers.insert(ChannelKind::Pushover, Arc::new(pushover::PushoverDriver));
    drivers.insert(ChannelKind::Opsgenie, Arc::new(opsgenie::OpsgenieDriver));
    drivers.insert(ChannelKind::Mattermost, Arc::new(mattermost::MattermostDriver));
    drivers.insert(ChannelKind::Gotify, Arc::new(gotify::GotifyDriver));
    drivers.insert(ChannelKind::Ntfy, Arc::new(ntfy::NtfyDriver));
    drivers.insert(ChannelKind::GoogleChat, Arc::new(google_chat::GoogleChatDriver));
    drivers.insert(ChannelKind::GrafanaOnCall, Arc::new(grafana_oncall::GrafanaOnCallDriver));
    ChannelRegistry { drivers }
}

/// Shared helper: classify a `reqwest` response into ok/transient/permanent
/// the way §7 defines it (5xx/network/timeout = transient, 4xx = permanent).
pub(crate) async fn classify_http_response(response: reqwest::Result<reqwest::Response>) -> Result<(), DispatchError> {
    match response {
        Ok(resp) if resp.status().is_success() => Ok(()),
        Ok(resp) if resp.status().is_server_error() => {
            Err(DispatchError::transient(format!("server error: {}", resp.status())))
        }
        Ok(resp) => {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(DispatchError::permanent(format!("rejected with {status}: {body}")))
        }
        Err(e) if e.is_timeout() || e.is_connect() => Err(DispatchError::transient(e.to_string())),
        Err(e) => Err(DispatchError::transient(e.to_string())),
    }
}
