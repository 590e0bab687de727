//! Discord driver: posts to a webhook URL using the same
//! content/embed shape as the teacher's `discord::Message` (`discord.rs`),
//! trimmed to one embed built from the rendered payload.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config_codec::{decode, Validator};
use crate::error::{ConfigError, DispatchError};

use super::{classify_http_response, ChannelDriver, NotificationPayload};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscordConfig {
    pub webhook_url: String,
    #[serde(default)]
    pub mention_user_id: Option<String>,
}

#[derive(Serialize)]
struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    embeds: Vec<Embed>,
}

#[derive(Serialize)]
struct Embed {
    title: String,
    description: String,
    color: u32,
    timestamp: String,
}

pub struct DiscordDriver;

#[async_trait]
impl ChannelDriver for DiscordDriver {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: DiscordConfig = decode(config)?;
        let mut v = Validator::new();
        v.url("webhook_url", &parsed.webhook_url);
        v.into_result()
    }

    async fn send(&self, config: &serde_json::Value, payload: &NotificationPayload, timeout: std::time::Duration) -> Result<(), DispatchError> {
        let config: DiscordConfig = decode(config).map_err(|e| DispatchError::permanent(e.to_string()))?;

        let message = Message {
            content: config.mention_user_id.map(|id| format!("<@{id}>")),
            embeds: vec![Embed {
                title: payload.subject.clone(),
                description: payload.body.clone(),
                color: 0xE74C3C,
                timestamp: Utc::now().to_rfc3339(),
            }],
        };

        let client = reqwest::Client::new();
        let response = client.post(&config.webhook_url).timeout(timeout).json(&message).send().await;
        classify_http_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_webhook_url() {
        let blob = serde_json::json!({"webhook_url": ""});
        assert!(DiscordDriver.validate(&blob).is_err());
    }
}
