//! SNMP executor (§4.3): GET a single OID over SNMPv2c and compare it
//! against an optional expected value.

use async_trait::async_trait;
use chrono::Utc;
use csnmp::{ObjectIdentifier, Snmp2cClient};
use serde::Deserialize;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::config_codec::{decode, Validator};
use crate::error::ConfigError;
use crate::model::{Monitor, ProbeOutcome, Proxy, Status};

use super::{ExecutionContext, Executor};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnmpConfig {
    pub host: String,
    pub port: u16,
    pub community: String,
    pub oid: String,
    #[serde(default)]
    pub expected_value: Option<String>,
}

pub struct SnmpExecutor;

#[async_trait]
impl Executor for SnmpExecutor {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: SnmpConfig = decode(config)?;
        let mut v = Validator::new();
        v.require_non_empty("host", &parsed.host);
        v.port("port", parsed.port);
        v.require_non_empty("community", &parsed.community);
        if ObjectIdentifier::from_str(&parsed.oid).is_err() {
            v.fail("oid", "must be a well-formed OID, e.g. 1.3.6.1.2.1.1.1.0");
        }
        v.into_result()
    }

    async fn execute(&self, ctx: ExecutionContext, monitor: &Monitor, _proxy: Option<&Proxy>) -> ProbeOutcome {
        let start = Utc::now();
        let config: SnmpConfig = match decode(&monitor.config) {
            Ok(c) => c,
            Err(e) => return ProbeOutcome::new(Status::Down, format!("connection string validation failed: {e}"), start),
        };

        let addr = match SocketAddr::from_str(&format!("{}:{}", config.host, config.port)) {
            Ok(a) => a,
            Err(e) => return ProbeOutcome::new(Status::Down, format!("invalid host/port: {e}"), start),
        };

        let result = ctx.race(get(addr, &config)).await;
        match result {
            Ok(Ok(value)) => {
                if let Some(expected) = &config.expected_value {
                    if &value != expected {
                        return ProbeOutcome::new(Status::Down, format!("expected '{expected}', got '{value}'"), start);
                    }
                }
                ProbeOutcome::new(Status::Up, value, start)
            }
            Ok(Err(e)) => ProbeOutcome::new(Status::Down, e, start),
            Err(e) => ProbeOutcome::new(Status::Down, e.to_string(), start),
        }
    }
}

async fn get(addr: SocketAddr, config: &SnmpConfig) -> Result<String, String> {
    let oid = ObjectIdentifier::from_str(&config.oid).map_err(|e| format!("invalid OID: {e}"))?;
    let client = Snmp2cClient::new(addr, config.community.clone().into_bytes(), None, 0)
        .await
        .map_err(|e| format!("SNMP client setup failed: {e}"))?;

    let value = client.get(oid).await.map_err(|e| format!("SNMP GET failed: {e}"))?;
    Ok(format!("{value:?}"))
}
