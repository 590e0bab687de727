//! PagerDuty driver: Events API v2 `trigger` action.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config_codec::{decode, Validator};
use crate::error::{ConfigError, DispatchError};

use super::{classify_http_response, ChannelDriver, NotificationPayload};

const EVENTS_API_URL: &str = "https://events.pagerduty.com/v2/enqueue";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PagerDutyConfig {
    pub integration_key: String,
}

pub struct PagerDutyDriver;

#[async_trait]
impl ChannelDriver for PagerDutyDriver {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: PagerDutyConfig = decode(config)?;
        let mut v = Validator::new();
        v.require_non_empty("integration_key", &parsed.integration_key);
        v.into_result()
    }

    async fn send(&self, config: &serde_json::Value, payload: &NotificationPayload, timeout: std::time::Duration) -> Result<(), DispatchError> {
        let config: PagerDutyConfig = decode(config).map_err(|e| DispatchError::permanent(e.to_string()))?;

        let client = reqwest::Client::new();
        let response = client
            .post(EVENTS_API_URL)
            .timeout(timeout)
            .json(&json!({
                "routing_key": config.integration_key,
                "event_action": "trigger",
                "payload": {
                    "summary": payload.subject,
                    "source": "peekaping-engine",
                    "severity": "critical",
                    "custom_details": {"body": payload.body},
                }
            }))
            .send()
            .await;
        classify_http_response(response).await
    }
}
