//! MQTT executor (§4.3): connect, subscribe to a topic, publish (if
//! configured) and wait for a message matching `keyword`/`invertKeyword`
//! within the probe's timeout budget.

use async_trait::async_trait;
use chrono::Utc;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::Deserialize;
use std::time::Duration;

use crate::config_codec::{decode, Validator};
use crate::error::ConfigError;
use crate::model::{Monitor, ProbeOutcome, Proxy, Status};

use super::{ExecutionContext, Executor};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub topic: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub invert_keyword: bool,
}

pub struct MqttExecutor;

#[async_trait]
impl Executor for MqttExecutor {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: MqttConfig = decode(config)?;
        let mut v = Validator::new();
        v.require_non_empty("host", &parsed.host);
        v.port("port", parsed.port);
        v.require_non_empty("topic", &parsed.topic);
        v.into_result()
    }

    async fn execute(&self, ctx: ExecutionContext, monitor: &Monitor, _proxy: Option<&Proxy>) -> ProbeOutcome {
        let start = Utc::now();
        let config: MqttConfig = match decode(&monitor.config) {
            Ok(c) => c,
            Err(e) => return ProbeOutcome::new(Status::Down, format!("connection string validation failed: {e}"), start),
        };

        match ctx.race(wait_for_message(&config, ctx.remaining())).await {
            Ok(Ok(payload)) => {
                if let Some(keyword) = &config.keyword {
                    let matched = payload.contains(keyword.as_str());
                    let expected = !config.invert_keyword;
                    if matched != expected {
                        return ProbeOutcome::new(
                            Status::Down,
                            format!("expected keyword '{keyword}' {}found in message", if expected { "" } else { "not " }),
                            start,
                        );
                    }
                }
                ProbeOutcome::new(Status::Up, format!("received: {payload}"), start)
            }
            Ok(Err(e)) => ProbeOutcome::new(Status::Down, e, start),
            Err(e) => ProbeOutcome::new(Status::Down, e.to_string(), start),
        }
    }
}

async fn wait_for_message(config: &MqttConfig, timeout: Duration) -> Result<String, String> {
    let mut options = MqttOptions::new(format!("peekaping-{}", uuid::Uuid::new_v4()), &config.host, config.port);
    options.set_keep_alive(Duration::from_secs(timeout.as_secs().max(5)));
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        options.set_credentials(username, password);
    }

    let (client, mut event_loop) = AsyncClient::new(options, 10);
    client
        .subscribe(&config.topic, QoS::AtMostOnce)
        .await
        .map_err(|e| format!("MQTT subscribe failed: {e}"))?;

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                return Ok(String::from_utf8_lossy(&publish.payload).to_string());
            }
            Ok(_) => continue,
            Err(e) => return Err(format!("MQTT connection failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_topic() {
        let blob = serde_json::json!({"host": "localhost", "port": 1883, "topic": ""});
        assert!(MqttExecutor.validate(&blob).is_err());
    }
}
