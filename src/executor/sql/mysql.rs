//! MySQL executor: connect and run `SELECT 1`.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::Row;

use crate::config_codec::{decode, Validator};
use crate::error::ConfigError;
use crate::model::{Monitor, ProbeOutcome, Proxy, Status};

use super::super::{ExecutionContext, Executor};
use super::{redact_connection_string, validate_connection_string, validate_query, ConnectionStringRules};

const CONNECTION_STRING_RULES: ConnectionStringRules = ConnectionStringRules {
    schemes: &["mysql"],
    require_database: true,
    require_username: true,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MysqlConfig {
    pub connection_string: String,
    #[serde(default)]
    pub query: Option<String>,
}

pub struct MysqlExecutor;

#[async_trait]
impl Executor for MysqlExecutor {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: MysqlConfig = decode(config)?;
        let mut v = Validator::new();
        validate_connection_string(&mut v, "connection_string", &parsed.connection_string, &CONNECTION_STRING_RULES);
        v.into_result()?;
        if let Some(query) = &parsed.query {
            validate_query(query)?;
        }
        Ok(())
    }

    async fn execute(&self, ctx: ExecutionContext, monitor: &Monitor, _proxy: Option<&Proxy>) -> ProbeOutcome {
        let start = Utc::now();
        let config: MysqlConfig = match decode(&monitor.config) {
            Ok(c) => c,
            Err(e) => return ProbeOutcome::new(Status::Down, format!("connection string validation failed: {e}"), start),
        };

        let query = config.query.clone().unwrap_or_else(|| "SELECT 1".to_string());
        if let Err(e) = validate_query(&query) {
            return ProbeOutcome::new(Status::Down, e.to_string(), start);
        }
        let result = ctx.race(probe(&config.connection_string, &query, ctx.remaining())).await;
        match result {
            Ok(Ok(())) => ProbeOutcome::new(Status::Up, "query succeeded".to_string(), start),
            Ok(Err(e)) => ProbeOutcome::new(Status::Down, redact_connection_string(&e), start),
            Err(e) => ProbeOutcome::new(Status::Down, e.to_string(), start),
        }
    }
}

async fn probe(connection_string: &str, query: &str, timeout: std::time::Duration) -> Result<(), String> {
    let pool = MySqlPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(timeout)
        .connect(connection_string)
        .await
        .map_err(|e| e.to_string())?;

    let row = sqlx::query(query).fetch_one(&pool).await.map_err(|e| e.to_string())?;
    let _ = row.try_get::<i64, _>(0);
    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_connection_string() {
        let blob = serde_json::json!({"connection_string": ""});
        assert!(MysqlExecutor.validate(&blob).is_err());
    }

    #[test]
    fn validate_accepts_well_formed_connection_string() {
        let blob = serde_json::json!({"connection_string": "mysql://user@localhost:3306/db"});
        assert!(MysqlExecutor.validate(&blob).is_ok());
    }

    #[test]
    fn validate_rejects_non_read_only_query() {
        let blob = serde_json::json!({"connection_string": "mysql://user@localhost/db", "query": "DROP TABLE t"});
        assert!(MysqlExecutor.validate(&blob).is_err());
    }
}
