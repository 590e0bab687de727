//! Slack driver: incoming-webhook POST with a `text` payload, the same
//! shape as the generic webhook driver but with Slack's required field
//! name and no custom headers.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config_codec::{decode, Validator};
use crate::error::{ConfigError, DispatchError};

use super::{classify_http_response, ChannelDriver, NotificationPayload};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlackConfig {
    pub webhook_url: String,
    #[serde(default)]
    pub channel: Option<String>,
}

pub struct SlackDriver;

#[async_trait]
impl ChannelDriver for SlackDriver {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: SlackConfig = decode(config)?;
        let mut v = Validator::new();
        v.url("webhook_url", &parsed.webhook_url);
        v.into_result()
    }

    async fn send(&self, config: &serde_json::Value, payload: &NotificationPayload, timeout: std::time::Duration) -> Result<(), DispatchError> {
        let config: SlackConfig = decode(config).map_err(|e| DispatchError::permanent(e.to_string()))?;
        let text = format!("*{}*\n{}", payload.subject, payload.body);

        let mut body = json!({"text": text});
        if let Some(channel) = &config.channel {
            body["channel"] = json!(channel);
        }

        let client = reqwest::Client::new();
        let response = client.post(&config.webhook_url).timeout(timeout).json(&body).send().await;
        classify_http_response(response).await
    }
}
