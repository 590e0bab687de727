//! SQL Server executor: connect and run `SELECT 1` over `tiberius`, the
//! only well-established pure-Rust TDS driver (sqlx has no mssql backend).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tiberius::{Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::TokioAsyncWriteCompatExt;

use crate::config_codec::{decode, Validator};
use crate::error::ConfigError;
use crate::model::{Monitor, ProbeOutcome, Proxy, Status};

use super::super::{ExecutionContext, Executor};
use super::redact_connection_string;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MssqlConfig {
    pub connection_string: String,
}

/// Parses an ADO-style `key=value;key=value` connection string into a
/// lowercase-keyed map (§4.3 strict validation: ADO strings aren't URLs, so
/// `sql::validate_connection_string`'s scheme/host/port parsing doesn't
/// apply — this does the equivalent check for the ADO shape instead).
fn parse_ado_fields(value: &str) -> HashMap<String, String> {
    value
        .split(';')
        .filter_map(|kv| {
            let mut parts = kv.splitn(2, '=');
            let key = parts.next()?.trim();
            let val = parts.next()?.trim();
            if key.is_empty() {
                None
            } else {
                Some((key.to_lowercase(), val.to_string()))
            }
        })
        .collect()
}

fn validate_ado_string(v: &mut Validator, field: &str, value: &str) {
    if value.trim().is_empty() {
        v.fail(field, "required");
        return;
    }

    let fields = parse_ado_fields(value);

    match fields.get("server").map(String::as_str) {
        Some(server) if !server.trim().is_empty() => {
            if let Some((_, port_part)) = server.split_once(',') {
                match port_part.trim().parse::<u32>() {
                    Ok(port) if (1..=65535).contains(&port) => {}
                    _ => v.fail(field, "Server port must be between 1 and 65535"),
                }
            }
        }
        _ => v.fail(field, "Server required"),
    }

    match fields.get("database").map(String::as_str) {
        Some(db) if !db.trim().is_empty() => {}
        _ => v.fail(field, "Database required"),
    }

    let integrated_security = fields
        .get("integrated security")
        .map(|s| s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("sspi"))
        .unwrap_or(false);

    if !integrated_security {
        match fields.get("user id").map(String::as_str) {
            Some(user) if !user.trim().is_empty() => {}
            _ => v.fail(field, "User Id required unless Integrated Security is enabled"),
        }
    }
}

pub struct MssqlExecutor;

#[async_trait]
impl Executor for MssqlExecutor {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: MssqlConfig = decode(config)?;
        let mut v = Validator::new();
        validate_ado_string(&mut v, "connection_string", &parsed.connection_string);
        v.into_result()
    }

    async fn execute(&self, ctx: ExecutionContext, monitor: &Monitor, _proxy: Option<&Proxy>) -> ProbeOutcome {
        let start = Utc::now();
        let config: MssqlConfig = match decode(&monitor.config) {
            Ok(c) => c,
            Err(e) => return ProbeOutcome::new(Status::Down, format!("connection string validation failed: {e}"), start),
        };

        let result = ctx.race(probe(&config.connection_string)).await;
        match result {
            Ok(Ok(())) => ProbeOutcome::new(Status::Up, "query succeeded".to_string(), start),
            Ok(Err(e)) => ProbeOutcome::new(Status::Down, redact_connection_string(&e), start),
            Err(e) => ProbeOutcome::new(Status::Down, e.to_string(), start),
        }
    }
}

async fn probe(connection_string: &str) -> Result<(), String> {
    let config = Config::from_ado_string(connection_string).map_err(|e| e.to_string())?;
    let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| e.to_string())?;
    tcp.set_nodelay(true).map_err(|e| e.to_string())?;

    let mut client = Client::connect(config, tcp.compat_write()).await.map_err(|e| e.to_string())?;
    let stream = client.query("SELECT 1", &[]).await.map_err(|e| e.to_string())?;
    let _ = stream.into_row().await.map_err(|e| e.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_connection_string() {
        let blob = serde_json::json!({"connection_string": ""});
        assert!(MssqlExecutor.validate(&blob).is_err());
    }

    #[test]
    fn validate_accepts_well_formed_ado_string() {
        let blob = serde_json::json!({
            "connection_string": "Server=tcp:localhost,1433;Database=db;User Id=sa;Password=hunter2;"
        });
        assert!(MssqlExecutor.validate(&blob).is_ok());
    }

    #[test]
    fn validate_rejects_missing_database() {
        let blob = serde_json::json!({"connection_string": "Server=tcp:localhost,1433;User Id=sa;Password=hunter2;"});
        assert!(MssqlExecutor.validate(&blob).is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_port() {
        let blob = serde_json::json!({"connection_string": "Server=tcp:localhost,70000;Database=db;User Id=sa;Password=hunter2;"});
        assert!(MssqlExecutor.validate(&blob).is_err());
    }

    #[test]
    fn validate_accepts_integrated_security_without_user_id() {
        let blob = serde_json::json!({"connection_string": "Server=tcp:localhost,1433;Database=db;Integrated Security=true;"});
        assert!(MssqlExecutor.validate(&blob).is_ok());
    }

    #[test]
    fn validate_rejects_missing_user_id_without_integrated_security() {
        let blob = serde_json::json!({"connection_string": "Server=tcp:localhost,1433;Database=db;"});
        assert!(MssqlExecutor.validate(&blob).is_err());
    }
}
