//! Generic webhook driver: POST a JSON payload to an arbitrary URL.
//! Grounded on the teacher's `AlertManager::send_webhook_alert`
//! (`alerts.rs`), generalized from a server-alert-shaped body to the
//! dispatcher's rendered subject/body.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config_codec::{decode, Validator};
use crate::error::{ConfigError, DispatchError};

use super::{classify_http_response, ChannelDriver, NotificationPayload};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub headers: std::collections::HashMap<String, String>,
}

pub struct WebhookDriver;

#[async_trait]
impl ChannelDriver for WebhookDriver {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: WebhookConfig = decode(config)?;
        let mut v = Validator::new();
        v.url("url", &parsed.url);
        v.into_result()
    }

    async fn send(&self, config: &serde_json::Value, payload: &NotificationPayload, timeout: std::time::Duration) -> Result<(), DispatchError> {
        let config: WebhookConfig = decode(config).map_err(|e| DispatchError::permanent(e.to_string()))?;
        let client = reqwest::Client::new();

        let mut request = client
            .post(&config.url)
            .timeout(timeout)
            .json(&json!({"subject": payload.subject, "body": payload.body}));

        for (name, value) in &config.headers {
            request = request.header(name, value);
        }

        classify_http_response(request.send().await).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_malformed_url() {
        let blob = serde_json::json!({"url": "not a url"});
        assert!(WebhookDriver.validate(&blob).is_err());
    }
}
