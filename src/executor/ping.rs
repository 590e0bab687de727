//! ICMP ping executor (§4.3, §9 design note).
//!
//! Tries a raw ICMP echo first (`surge-ping`); raw sockets need elevated
//! privileges on most platforms, so a `EPERM`/`EACCES` falls back to
//! shelling out to the platform `ping` binary, bounded by the same
//! deadline as the raw attempt would have been.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;
use surge_ping::{Client, Config as PingClientConfig, PingIdentifier, PingSequence};
use tokio::process::Command;

use crate::config_codec::{decode, Validator};
use crate::error::ConfigError;
use crate::model::{Monitor, ProbeOutcome, Proxy, Status};

use super::{ExecutionContext, Executor};

const DEFAULT_PAYLOAD_SIZE: usize = 32;
const ICMP_HEADER_SIZE: usize = 8;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PingConfig {
    pub host: String,
    #[serde(default = "default_payload_size")]
    pub packet_size: usize,
}

fn default_payload_size() -> usize {
    DEFAULT_PAYLOAD_SIZE
}

pub struct PingExecutor;

#[async_trait]
impl Executor for PingExecutor {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: PingConfig = decode(config)?;
        let mut v = Validator::new();
        v.require_non_empty("host", &parsed.host);
        v.into_result()
    }

    async fn execute(&self, ctx: ExecutionContext, monitor: &Monitor, _proxy: Option<&Proxy>) -> ProbeOutcome {
        let start = Utc::now();
        let config: PingConfig = match decode(&monitor.config) {
            Ok(c) => c,
            Err(e) => return ProbeOutcome::new(Status::Down, format!("connection string validation failed: {e}"), start),
        };

        let total_packet = config.packet_size + ICMP_HEADER_SIZE;

        match resolve_host(&config.host) {
            Ok(ip) => match ctx.race(raw_icmp_echo(ip, config.packet_size)).await {
                Ok(Ok(rtt)) => ProbeOutcome::new(Status::Up, format!("reply from {ip}, {total_packet} bytes, {}ms", rtt.as_millis()), start),
                Ok(Err(PingFailure::PermissionDenied)) => {
                    match ctx.race(system_ping_fallback(&config.host, ctx.remaining())).await {
                        Ok(Ok(())) => ProbeOutcome::new(Status::Up, format!("reply from {}, {total_packet} bytes (via system ping)", config.host), start),
                        Ok(Err(e)) => ProbeOutcome::new(Status::Down, e, start),
                        Err(e) => ProbeOutcome::new(Status::Down, e.to_string(), start),
                    }
                }
                Ok(Err(PingFailure::Other(e))) => ProbeOutcome::new(Status::Down, e, start),
                Err(e) => ProbeOutcome::new(Status::Down, e.to_string(), start),
            },
            Err(e) => ProbeOutcome::new(Status::Down, e, start),
        }
    }
}

fn resolve_host(host: &str) -> Result<IpAddr, String> {
    host.parse::<IpAddr>().map_err(|_| format!("could not resolve host: {host}"))
}

enum PingFailure {
    PermissionDenied,
    Other(String),
}

async fn raw_icmp_echo(addr: IpAddr, payload_size: usize) -> Result<Duration, PingFailure> {
    let client_config = PingClientConfig::default();
    let client = Client::new(&client_config).map_err(|e| classify_icmp_error(&e))?;
    let payload = vec![0u8; payload_size];
    let mut pinger = client.pinger(addr, PingIdentifier(rand_identifier())).await;
    let start = std::time::Instant::now();
    pinger
        .ping(PingSequence(0), &payload)
        .await
        .map_err(|e| classify_icmp_error(&e))?;
    Ok(start.elapsed())
}

fn classify_icmp_error(e: &dyn std::fmt::Display) -> PingFailure {
    let text = e.to_string();
    if text.contains("Permission denied") || text.contains("EPERM") || text.contains("EACCES") {
        PingFailure::PermissionDenied
    } else {
        PingFailure::Other(format!("ICMP echo failed: {text}"))
    }
}

fn rand_identifier() -> u16 {
    (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() & 0xffff) as u16
}

/// Fall back to the platform `ping` utility when raw sockets aren't available.
/// The subprocess's own timeout never exceeds the probe's remaining budget
/// (§9 design note).
async fn system_ping_fallback(host: &str, remaining: Duration) -> Result<(), String> {
    let timeout_secs = remaining.as_secs().max(1);

    #[cfg(target_os = "windows")]
    let mut command = {
        let mut c = Command::new("ping");
        c.args(["-n", "1", "-w", &(remaining.as_millis().to_string()), host]);
        c
    };
    #[cfg(not(target_os = "windows"))]
    let mut command = {
        let mut c = Command::new("ping");
        c.args(["-c", "1", "-W", &timeout_secs.to_string(), host]);
        c
    };

    let output = tokio::time::timeout(remaining, command.output())
        .await
        .map_err(|_| "system ping timed out".to_string())?
        .map_err(|e| format!("failed to spawn system ping: {e}"))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(format!("system ping failed: {}", String::from_utf8_lossy(&output.stderr)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_host() {
        let blob = serde_json::json!({"host": ""});
        assert!(PingExecutor.validate(&blob).is_err());
    }
}
