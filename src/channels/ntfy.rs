//! ntfy driver: `POST {server}/{topic}` with the message as the raw body
//! and the subject carried in the `Title` header, per ntfy's publish API.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config_codec::{decode, Validator};
use crate::error::{ConfigError, DispatchError};

use super::{classify_http_response, ChannelDriver, NotificationPayload};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NtfyConfig {
    #[serde(default = "default_server")]
    pub server_url: String,
    pub topic: String,
    #[serde(default)]
    pub access_token: Option<String>,
}

fn default_server() -> String {
    "https://ntfy.sh".to_string()
}

pub struct NtfyDriver;

#[async_trait]
impl ChannelDriver for NtfyDriver {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: NtfyConfig = decode(config)?;
        let mut v = Validator::new();
        v.url("server_url", &parsed.server_url);
        v.require_non_empty("topic", &parsed.topic);
        v.into_result()
    }

    async fn send(&self, config: &serde_json::Value, payload: &NotificationPayload, timeout: std::time::Duration) -> Result<(), DispatchError> {
        let config: NtfyConfig = decode(config).map_err(|e| DispatchError::permanent(e.to_string()))?;
        let url = format!("{}/{}", config.server_url.trim_end_matches('/'), config.topic);

        let client = reqwest::Client::new();
        let mut request = client.post(&url).timeout(timeout).header("Title", payload.subject.clone()).body(payload.body.clone());

        if let Some(token) = &config.access_token {
            request = request.bearer_auth(token);
        }

        classify_http_response(request.send().await).await
    }
}
