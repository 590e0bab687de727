//! Pushover driver: form-encoded POST to the Messages API.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config_codec::{decode, Validator};
use crate::error::{ConfigError, DispatchError};

use super::{classify_http_response, ChannelDriver, NotificationPayload};

const MESSAGES_API_URL: &str = "https://api.pushover.net/1/messages.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PushoverConfig {
    pub app_token: String,
    pub user_key: String,
}

pub struct PushoverDriver;

#[async_trait]
impl ChannelDriver for PushoverDriver {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: PushoverConfig = decode(config)?;
        let mut v = Validator::new();
        v.require_non_empty("app_token", &parsed.app_token);
        v.require_non_empty("user_key", &parsed.user_key);
        v.into_result()
    }

    async fn send(&self, config: &serde_json::Value, payload: &NotificationPayload, timeout: std::time::Duration) -> Result<(), DispatchError> {
        let config: PushoverConfig = decode(config).map_err(|e| DispatchError::permanent(e.to_string()))?;

        let client = reqwest::Client::new();
        let response = client
            .post(MESSAGES_API_URL)
            .timeout(timeout)
            .form(&[
                ("token", config.app_token.as_str()),
                ("user", config.user_key.as_str()),
                ("title", payload.subject.as_str()),
                ("message", payload.body.as_str()),
            ])
            .send()
            .await;
        classify_http_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_user_key() {
        let blob = serde_json::json!({"app_token": "tok", "user_key": ""});
        assert!(PushoverDriver.validate(&blob).is_err());
    }
}
