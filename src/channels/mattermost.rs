//! Mattermost driver: incoming-webhook POST, same payload shape Slack
//! compatibility mode expects.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config_codec::{decode, Validator};
use crate::error::{ConfigError, DispatchError};

use super::{classify_http_response, ChannelDriver, NotificationPayload};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MattermostConfig {
    pub webhook_url: String,
    #[serde(default)]
    pub channel: Option<String>,
}

pub struct MattermostDriver;

#[async_trait]
impl ChannelDriver for MattermostDriver {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: MattermostConfig = decode(config)?;
        let mut v = Validator::new();
        v.url("webhook_url", &parsed.webhook_url);
        v.into_result()
    }

    async fn send(&self, config: &serde_json::Value, payload: &NotificationPayload, timeout: std::time::Duration) -> Result<(), DispatchError> {
        let config: MattermostConfig = decode(config).map_err(|e| DispatchError::permanent(e.to_string()))?;
        let text = format!("**{}**\n{}", payload.subject, payload.body);

        let mut body = json!({"text": text});
        if let Some(channel) = &config.channel {
            body["channel"] = json!(channel);
        }

        let client = reqwest::Client::new();
        let response = client.post(&config.webhook_url).timeout(timeout).json(&body).send().await;
        classify_http_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_webhook_url() {
        let blob = serde_json::json!({"webhook_url": ""});
        assert!(MattermostDriver.validate(&blob).is_err());
    }
}
