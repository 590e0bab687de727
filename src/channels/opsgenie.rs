//! Opsgenie driver: Alert API `POST /v2/alerts`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config_codec::{decode, Validator};
use crate::error::{ConfigError, DispatchError};

use super::{classify_http_response, ChannelDriver, NotificationPayload};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpsgenieConfig {
    pub api_key: String,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    "us".to_string()
}

pub struct OpsgenieDriver;

#[async_trait]
impl ChannelDriver for OpsgenieDriver {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: OpsgenieConfig = decode(config)?;
        let mut v = Validator::new();
        v.require_non_empty("api_key", &parsed.api_key);
        v.into_result()
    }

    async fn send(&self, config: &serde_json::Value, payload: &NotificationPayload, timeout: std::time::Duration) -> Result<(), DispatchError> {
        let config: OpsgenieConfig = decode(config).map_err(|e| DispatchError::permanent(e.to_string()))?;
        let host = if config.region == "eu" { "api.eu.opsgenie.com" } else { "api.opsgenie.com" };
        let url = format!("https://{host}/v2/alerts");

        let client = reqwest::Client::new();
        let response = client
            .post(&url)
            .timeout(timeout)
            .header("Authorization", format!("GenieKey {}", config.api_key))
            .json(&json!({"message": payload.subject, "description": payload.body}))
            .send()
            .await;
        classify_http_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_api_key() {
        let blob = serde_json::json!({"api_key": ""});
        assert!(OpsgenieDriver.validate(&blob).is_err());
    }
}
