//! Grafana OnCall driver: POST to the integration's webhook URL using its
//! generic alert-payload shape.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config_codec::{decode, Validator};
use crate::error::{ConfigError, DispatchError};

use super::{classify_http_response, ChannelDriver, NotificationPayload};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrafanaOnCallConfig {
    pub integration_url: String,
}

pub struct GrafanaOnCallDriver;

#[async_trait]
impl ChannelDriver for GrafanaOnCallDriver {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: GrafanaOnCallConfig = decode(config)?;
        let mut v = Validator::new();
        v.url("integration_url", &parsed.integration_url);
        v.into_result()
    }

    async fn send(&self, config: &serde_json::Value, payload: &NotificationPayload, timeout: std::time::Duration) -> Result<(), DispatchError> {
        let config: GrafanaOnCallConfig = decode(config).map_err(|e| DispatchError::permanent(e.to_string()))?;

        let client = reqwest::Client::new();
        let response = client
            .post(&config.integration_url)
            .timeout(timeout)
            .json(&json!({"title": payload.subject, "message": payload.body, "state": "alerting"}))
            .send()
            .await;
        classify_http_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_integration_url() {
        let blob = serde_json::json!({"integration_url": ""});
        assert!(GrafanaOnCallDriver.validate(&blob).is_err());
    }
}
