//! Telegram driver: `POST` to the Bot API's `sendMessage` method.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config_codec::{decode, Validator};
use crate::error::{ConfigError, DispatchError};

use super::{classify_http_response, ChannelDriver, NotificationPayload};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

pub struct TelegramDriver;

#[async_trait]
impl ChannelDriver for TelegramDriver {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: TelegramConfig = decode(config)?;
        let mut v = Validator::new();
        v.require_non_empty("bot_token", &parsed.bot_token);
        v.require_non_empty("chat_id", &parsed.chat_id);
        v.into_result()
    }

    async fn send(&self, config: &serde_json::Value, payload: &NotificationPayload, timeout: std::time::Duration) -> Result<(), DispatchError> {
        let config: TelegramConfig = decode(config).map_err(|e| DispatchError::permanent(e.to_string()))?;
        let url = format!("https://api.telegram.org/bot{}/sendMessage", config.bot_token);
        let text = format!("{}\n{}", payload.subject, payload.body);

        let client = reqwest::Client::new();
        let response = client
            .post(&url)
            .timeout(timeout)
            .json(&json!({"chat_id": config.chat_id, "text": text}))
            .send()
            .await;
        classify_http_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_chat_id() {
        let blob = serde_json::json!({"bot_token": "abc", "chat_id": ""});
        assert!(TelegramDriver.validate(&blob).is_err());
    }
}
