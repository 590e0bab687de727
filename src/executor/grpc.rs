//! gRPC executor (§4.3).
//!
//! Dials a channel (TLS or insecure) and runs the standard gRPC health
//! check protocol via `tonic-health`'s client stub when the service
//! implements it; otherwise falls back to a keyword check against the
//! status message returned. `contains`/`invertKeyword` mirrors the HTTP
//! executor's body-pattern checks but over the health response's message.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

use crate::config_codec::{decode, Validator};
use crate::error::ConfigError;
use crate::model::{Monitor, ProbeOutcome, Proxy, Status};

use super::{ExecutionContext, Executor};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrpcConfig {
    pub endpoint: String,
    #[serde(default)]
    pub tls: bool,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub invert_keyword: bool,
}

pub struct GrpcExecutor;

#[async_trait]
impl Executor for GrpcExecutor {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: GrpcConfig = decode(config)?;
        let mut v = Validator::new();
        v.require_non_empty("endpoint", &parsed.endpoint);
        v.into_result()
    }

    async fn execute(&self, ctx: ExecutionContext, monitor: &Monitor, _proxy: Option<&Proxy>) -> ProbeOutcome {
        let start = Utc::now();
        let config: GrpcConfig = match decode(&monitor.config) {
            Ok(c) => c,
            Err(e) => return ProbeOutcome::new(Status::Down, format!("connection string validation failed: {e}"), start),
        };

        let channel = match ctx.race(dial(&config, ctx.remaining())).await {
            Ok(Ok(c)) => c,
            Ok(Err(e)) => return ProbeOutcome::new(Status::Down, e, start),
            Err(e) => return ProbeOutcome::new(Status::Down, e.to_string(), start),
        };

        let mut client = HealthClient::new(channel);
        let request = tonic::Request::new(HealthCheckRequest {
            service: config.service.clone().unwrap_or_default(),
        });

        let response = ctx.race(client.check(request)).await;
        let (message, serving) = match response {
            Ok(Ok(resp)) => {
                let status = resp.into_inner().status;
                (format!("{:?}", ServingStatus::try_from(status).unwrap_or(ServingStatus::Unknown)), status == ServingStatus::Serving as i32)
            }
            Ok(Err(status)) => return ProbeOutcome::new(Status::Down, format!("gRPC health check failed: {status}"), start),
            Err(e) => return ProbeOutcome::new(Status::Down, e.to_string(), start),
        };

        if let Some(keyword) = &config.keyword {
            let matched = message.contains(keyword.as_str());
            let expected = !config.invert_keyword;
            if matched != expected {
                return ProbeOutcome::new(Status::Down, format!("expected keyword '{keyword}' {}found in response", if expected { "" } else { "not " }), start);
            }
        }

        if serving {
            ProbeOutcome::new(Status::Up, message, start)
        } else {
            ProbeOutcome::new(Status::Down, message, start)
        }
    }
}

async fn dial(config: &GrpcConfig, timeout: std::time::Duration) -> Result<Channel, String> {
    let mut endpoint = Endpoint::from_shared(config.endpoint.clone())
        .map_err(|e| format!("invalid gRPC endpoint: {e}"))?
        .timeout(timeout)
        .connect_timeout(timeout);

    if config.tls {
        endpoint = endpoint
            .tls_config(ClientTlsConfig::new().with_native_roots())
            .map_err(|e| format!("invalid TLS configuration: {e}"))?;
    }

    endpoint.connect().await.map_err(|e| format!("gRPC dial failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_endpoint() {
        let blob = serde_json::json!({"endpoint": ""});
        assert!(GrpcExecutor.validate(&blob).is_err());
    }
}
