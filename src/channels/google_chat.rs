//! Google Chat driver: `POST` a `{text}` card to an incoming webhook URL.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config_codec::{decode, Validator};
use crate::error::{ConfigError, DispatchError};

use super::{classify_http_response, ChannelDriver, NotificationPayload};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GoogleChatConfig {
    pub webhook_url: String,
}

pub struct GoogleChatDriver;

#[async_trait]
impl ChannelDriver for GoogleChatDriver {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: GoogleChatConfig = decode(config)?;
        let mut v = Validator::new();
        v.url("webhook_url", &parsed.webhook_url);
        v.into_result()
    }

    async fn send(&self, config: &serde_json::Value, payload: &NotificationPayload, timeout: std::time::Duration) -> Result<(), DispatchError> {
        let config: GoogleChatConfig = decode(config).map_err(|e| DispatchError::permanent(e.to_string()))?;
        let text = format!("*{}*\n{}", payload.subject, payload.body);

        let client = reqwest::Client::new();
        let response = client.post(&config.webhook_url).timeout(timeout).json(&json!({"text": text})).send().await;
        classify_http_response(response).await
    }
}
