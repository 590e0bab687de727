//! Matrix driver: `PUT` an `m.room.message` event via the client-server API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::config_codec::{decode, Validator};
use crate::error::{ConfigError, DispatchError};

use super::{classify_http_response, ChannelDriver, NotificationPayload};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatrixConfig {
    pub homeserver_url: String,
    pub access_token: String,
    pub room_id: String,
}

pub struct MatrixDriver;

#[async_trait]
impl ChannelDriver for MatrixDriver {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: MatrixConfig = decode(config)?;
        let mut v = Validator::new();
        v.url("homeserver_url", &parsed.homeserver_url);
        v.require_non_empty("access_token", &parsed.access_token);
        v.require_non_empty("room_id", &parsed.room_id);
        v.into_result()
    }

    async fn send(&self, config: &serde_json::Value, payload: &NotificationPayload, timeout: std::time::Duration) -> Result<(), DispatchError> {
        let config: MatrixConfig = decode(config).map_err(|e| DispatchError::permanent(e.to_string()))?;
        let txn_id = Uuid::new_v4();
        let url = format!(
            "{}/_matrix/client/v3/rooms/{}/send/m.room.message/{}",
            config.homeserver_url.trim_end_matches('/'),
            config.room_id,
            txn_id
        );
        let body = format!("{}\n{}", payload.subject, payload.body);

        let client = reqwest::Client::new();
        let response = client
            .put(&url)
            .timeout(timeout)
            .bearer_auth(&config.access_token)
            .json(&json!({"msgtype": "m.text", "body": body}))
            .send()
            .await;
        classify_http_response(response).await
    }
}
