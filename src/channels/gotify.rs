//! Gotify driver: `POST {server}/message?token=...`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config_codec::{decode, Validator};
use crate::error::{ConfigError, DispatchError};

use super::{classify_http_response, ChannelDriver, NotificationPayload};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GotifyConfig {
    pub server_url: String,
    pub app_token: String,
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    5
}

pub struct GotifyDriver;

#[async_trait]
impl ChannelDriver for GotifyDriver {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: GotifyConfig = decode(config)?;
        let mut v = Validator::new();
        v.url("server_url", &parsed.server_url);
        v.require_non_empty("app_token", &parsed.app_token);
        v.into_result()
    }

    async fn send(&self, config: &serde_json::Value, payload: &NotificationPayload, timeout: std::time::Duration) -> Result<(), DispatchError> {
        let config: GotifyConfig = decode(config).map_err(|e| DispatchError::permanent(e.to_string()))?;
        let url = format!("{}/message", config.server_url.trim_end_matches('/'));

        let client = reqwest::Client::new();
        let response = client
            .post(&url)
            .timeout(timeout)
            .query(&[("token", config.app_token.as_str())])
            .json(&json!({"title": payload.subject, "message": payload.body, "priority": config.priority}))
            .send()
            .await;
        classify_http_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_app_token() {
        let blob = serde_json::json!({"server_url": "https://gotify.example.com", "app_token": ""});
        assert!(GotifyDriver.validate(&blob).is_err());
    }
}
