//! Kafka executor (§4.3): fetch broker metadata for the configured topic
//! within the probe's timeout; UP iff the topic is present and has at
//! least one partition with a known leader.

use async_trait::async_trait;
use chrono::Utc;
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use serde::Deserialize;

use crate::config_codec::{decode, Validator};
use crate::error::ConfigError;
use crate::model::{Monitor, ProbeOutcome, Proxy, Status};

use super::{ExecutionContext, Executor};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KafkaConfig {
    pub brokers: String,
    pub topic: String,
}

pub struct KafkaExecutor;

#[async_trait]
impl Executor for KafkaExecutor {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: KafkaConfig = decode(config)?;
        let mut v = Validator::new();
        v.require_non_empty("brokers", &parsed.brokers);
        v.require_non_empty("topic", &parsed.topic);
        v.into_result()
    }

    async fn execute(&self, ctx: ExecutionContext, monitor: &Monitor, _proxy: Option<&Proxy>) -> ProbeOutcome {
        let start = Utc::now();
        let config: KafkaConfig = match decode(&monitor.config) {
            Ok(c) => c,
            Err(e) => return ProbeOutcome::new(Status::Down, format!("connection string validation failed: {e}"), start),
        };

        let timeout_ms = ctx.remaining().as_millis().max(1) as u64;
        let result = ctx
            .race(tokio::task::spawn_blocking(move || fetch_topic_metadata(&config, timeout_ms)))
            .await;

        match result {
            Ok(Ok(Ok(partitions))) => ProbeOutcome::new(Status::Up, format!("topic has {partitions} partition(s) with a known leader"), start),
            Ok(Ok(Err(e))) => ProbeOutcome::new(Status::Down, e, start),
            Ok(Err(e)) => ProbeOutcome::new(Status::Down, format!("metadata fetch task failed: {e}"), start),
            Err(e) => ProbeOutcome::new(Status::Down, e.to_string(), start),
        }
    }
}

fn fetch_topic_metadata(config: &KafkaConfig, timeout_ms: u64) -> Result<usize, String> {
    let consumer: BaseConsumer<DefaultClientContext> = ClientConfig::new()
        .set("bootstrap.servers", &config.brokers)
        .create()
        .map_err(|e| format!("Kafka client creation failed: {e}"))?;

    let metadata = consumer
        .fetch_metadata(Some(&config.topic), std::time::Duration::from_millis(timeout_ms))
        .map_err(|e| format!("Kafka metadata fetch failed: {e}"))?;

    let topic = metadata
        .topics()
        .iter()
        .find(|t| t.name() == config.topic)
        .ok_or_else(|| format!("topic '{}' not found", config.topic))?;

    let leader_count = topic.partitions().iter().filter(|p| p.leader() >= 0).count();
    if leader_count == 0 {
        return Err(format!("topic '{}' has no partition with a known leader", config.topic));
    }
    Ok(leader_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_brokers_and_topic() {
        let blob = serde_json::json!({"brokers": "", "topic": "events"});
        assert!(KafkaExecutor.validate(&blob).is_err());
    }
}
