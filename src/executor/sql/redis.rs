//! Redis executor: connect and PING.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::config_codec::{decode, Validator};
use crate::error::ConfigError;
use crate::model::{Monitor, ProbeOutcome, Proxy, Status};

use super::super::{ExecutionContext, Executor};
use super::{redact_connection_string, validate_connection_string, ConnectionStringRules};

const CONNECTION_STRING_RULES: ConnectionStringRules = ConnectionStringRules {
    schemes: &["redis", "rediss"],
    require_database: false,
    require_username: false,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisConfig {
    pub connection_string: String,
}

pub struct RedisExecutor;

#[async_trait]
impl Executor for RedisExecutor {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: RedisConfig = decode(config)?;
        let mut v = Validator::new();
        validate_connection_string(&mut v, "connection_string", &parsed.connection_string, &CONNECTION_STRING_RULES);
        v.into_result()
    }

    async fn execute(&self, ctx: ExecutionContext, monitor: &Monitor, _proxy: Option<&Proxy>) -> ProbeOutcome {
        let start = Utc::now();
        let config: RedisConfig = match decode(&monitor.config) {
            Ok(c) => c,
            Err(e) => return ProbeOutcome::new(Status::Down, format!("connection string validation failed: {e}"), start),
        };

        let result = ctx.race(ping(&config.connection_string)).await;
        match result {
            Ok(Ok(())) => ProbeOutcome::new(Status::Up, "PONG".to_string(), start),
            Ok(Err(e)) => ProbeOutcome::new(Status::Down, redact_connection_string(&e), start),
            Err(e) => ProbeOutcome::new(Status::Down, e.to_string(), start),
        }
    }
}

async fn ping(connection_string: &str) -> Result<(), String> {
    let client = redis::Client::open(connection_string).map_err(|e| e.to_string())?;
    let mut conn = client.get_multiplexed_async_connection().await.map_err(|e| e.to_string())?;
    let _: String = redis::cmd("PING").query_async(&mut conn).await.map_err(|e| e.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_connection_string() {
        let blob = serde_json::json!({"connection_string": ""});
        assert!(RedisExecutor.validate(&blob).is_err());
    }

    #[test]
    fn validate_accepts_well_formed_connection_string() {
        let blob = serde_json::json!({"connection_string": "redis://localhost:6379"});
        assert!(RedisExecutor.validate(&blob).is_ok());
    }

    #[test]
    fn validate_rejects_wrong_scheme() {
        let blob = serde_json::json!({"connection_string": "postgres://localhost:5432/db"});
        assert!(RedisExecutor.validate(&blob).is_err());
    }
}
