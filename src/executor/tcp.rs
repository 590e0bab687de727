//! TCP executor (§4.3): dial host:port, UP iff the connection establishes.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tokio::net::TcpStream;

use crate::config_codec::{decode, Validator};
use crate::error::ConfigError;
use crate::model::{Monitor, ProbeOutcome, Proxy, Status};

use super::{ExecutionContext, Executor};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TcpConfig {
    pub host: String,
    pub port: u16,
}

pub struct TcpExecutor;

#[async_trait]
impl Executor for TcpExecutor {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: TcpConfig = decode(config)?;
        let mut v = Validator::new();
        v.require_non_empty("host", &parsed.host);
        v.port("port", parsed.port);
        v.into_result()
    }

    async fn execute(&self, ctx: ExecutionContext, monitor: &Monitor, _proxy: Option<&Proxy>) -> ProbeOutcome {
        let start = Utc::now();
        let config: TcpConfig = match decode(&monitor.config) {
            Ok(c) => c,
            Err(e) => return ProbeOutcome::new(Status::Down, format!("connection string validation failed: {e}"), start),
        };

        let addr = format!("{}:{}", config.host, config.port);
        match ctx.race(TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                ProbeOutcome::new(Status::Up, format!("connected to {addr}"), start)
            }
            Ok(Err(e)) => ProbeOutcome::new(Status::Down, format!("TCP connect failed: {e}"), start),
            Err(e) => ProbeOutcome::new(Status::Down, e.to_string(), start),
        }
    }
}
