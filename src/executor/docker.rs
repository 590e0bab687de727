//! Docker container health executor (§4.3).
//!
//! Connects over a UNIX socket or TCP (optionally TLS) and inspects one
//! container, mapping its reported state/health into a `ProbeOutcome` the
//! way the teacher's `evaluate_response` maps an HTTP response — a small
//! pure classification step kept separate from the I/O.

use async_trait::async_trait;
use bollard::container::InspectContainerOptions;
use bollard::Docker;
use chrono::Utc;
use serde::Deserialize;

use crate::config_codec::{decode, Validator};
use crate::error::ConfigError;
use crate::model::{Monitor, ProbeOutcome, Proxy, Status};

use super::{ExecutionContext, Executor};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum DockerTransport {
    Unix { socket_path: String },
    Tcp {
        host: String,
        port: u16,
        #[serde(default)]
        tls: Option<DockerTls>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DockerTls {
    pub cert_pem: String,
    pub key_pem: String,
    pub ca_pem: String,
    #[serde(default = "default_true")]
    pub tls_verify: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DockerConfig {
    #[serde(flatten)]
    pub transport: DockerTransport,
    pub container: String,
}

pub struct DockerExecutor;

#[async_trait]
impl Executor for DockerExecutor {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: DockerConfig = decode(config)?;
        let mut v = Validator::new();
        v.require_non_empty("container", &parsed.container);
        match &parsed.transport {
            DockerTransport::Unix { socket_path } => v.require_non_empty("socket_path", socket_path),
            DockerTransport::Tcp { host, port, tls } => {
                v.require_non_empty("host", host);
                v.port("port", *port);
                if let Some(tls) = tls {
                    v.require_when(
                        true,
                        &[
                            ("cert_pem", !tls.cert_pem.is_empty()),
                            ("key_pem", !tls.key_pem.is_empty()),
                            ("ca_pem", !tls.ca_pem.is_empty()),
                        ],
                    );
                }
            }
        }
        v.into_result()
    }

    async fn execute(&self, ctx: ExecutionContext, monitor: &Monitor, _proxy: Option<&Proxy>) -> ProbeOutcome {
        let start = Utc::now();
        let config: DockerConfig = match decode(&monitor.config) {
            Ok(c) => c,
            Err(e) => return ProbeOutcome::new(Status::Down, format!("connection string validation failed: {e}"), start),
        };

        let docker = match connect(&config.transport) {
            Ok(d) => d,
            Err(e) => return ProbeOutcome::new(Status::Down, e, start),
        };

        let inspect = ctx
            .race(docker.inspect_container(&config.container, None::<InspectContainerOptions>))
            .await;

        match inspect {
            Ok(Ok(details)) => classify(&details, start),
            Ok(Err(e)) => ProbeOutcome::new(Status::Down, remediation_hint(&e.to_string()), start),
            Err(e) => ProbeOutcome::new(Status::Down, e.to_string(), start),
        }
    }
}

fn connect(transport: &DockerTransport) -> Result<Docker, String> {
    match transport {
        DockerTransport::Unix { socket_path } => {
            Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| format!("failed to connect to docker socket: {e}"))
        }
        DockerTransport::Tcp { host, port, tls } => {
            let addr = format!("tcp://{host}:{port}");
            match tls {
                None => Docker::connect_with_http(&addr, 120, bollard::API_DEFAULT_VERSION)
                    .map_err(|e| format!("failed to connect to docker daemon: {e}")),
                Some(tls) => Docker::connect_with_ssl(
                    &addr,
                    std::path::Path::new(&tls.key_pem),
                    std::path::Path::new(&tls.cert_pem),
                    std::path::Path::new(&tls.ca_pem),
                    120,
                    bollard::API_DEFAULT_VERSION,
                )
                .map_err(|e| format!("failed to connect to docker daemon over TLS: {e}")),
            }
        }
    }
}

fn remediation_hint(raw: &str) -> String {
    if raw.contains("certificate") || raw.contains("unknown authority") || raw.contains("legacy") {
        format!("{raw} (check that the daemon's certificate is signed by the configured CA and uses a supported signature algorithm)")
    } else {
        raw.to_string()
    }
}

fn classify(details: &bollard::models::ContainerInspectResponse, start: chrono::DateTime<Utc>) -> ProbeOutcome {
    let Some(state) = &details.state else {
        return ProbeOutcome::new(Status::Down, "container has no reported state".to_string(), start);
    };

    let running = state.running.unwrap_or(false);
    let state_string = state
        .status
        .map(|s| format!("{s:?}").to_lowercase())
        .unwrap_or_else(|| "unknown".to_string());

    if !running {
        return ProbeOutcome::new(Status::Down, state_string, start);
    }

    match state.health.as_ref().and_then(|h| h.status) {
        Some(bollard::models::HealthStatusEnum::HEALTHY) => ProbeOutcome::new(Status::Up, "healthy".to_string(), start),
        Some(bollard::models::HealthStatusEnum::STARTING) => ProbeOutcome::new(Status::Pending, "starting".to_string(), start),
        Some(bollard::models::HealthStatusEnum::UNHEALTHY) => ProbeOutcome::new(Status::Down, "unhealthy".to_string(), start),
        _ => ProbeOutcome::new(Status::Up, state_string, start),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_container_name() {
        let blob = serde_json::json!({"transport": "unix", "socket_path": "/var/run/docker.sock", "container": ""});
        assert!(DockerExecutor.validate(&blob).is_err());
    }

    #[test]
    fn validate_accepts_unix_transport() {
        let blob = serde_json::json!({"transport": "unix", "socket_path": "/var/run/docker.sock", "container": "web"});
        assert!(DockerExecutor.validate(&blob).is_ok());
    }
}
