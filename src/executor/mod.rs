//! Executor registry (C2) and the executor contract (C1).
//!
//! Generalizes the teacher's `StorageBackend` trait-object pattern
//! (`storage/backend.rs`) from "one active backend chosen at startup" to
//! "one executor per monitor type, selected per probe" — a name-keyed
//! registry of trait objects built once and never mutated again, exactly
//! the shape spec §9's design note calls for: "a registry of values that
//! all satisfy {validate, execute, unmarshalConfig}".

pub mod docker;
pub mod dns;
pub mod grpc;
pub mod http;
pub mod kafka;
pub mod mqtt;
pub mod ping;
pub mod push;
pub mod snmp;
pub mod sql;
pub mod tcp;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ConfigError;
use crate::model::{Monitor, ProbeOutcome, Proxy};

/// Status-code-class matching shared by the HTTP executor and its tests
/// (§4.3, §8 round-trip law): "2XX" matches 200..300, etc.
pub fn status_in_classes(status: u16, classes: &[String]) -> bool {
    classes.iter().any(|class| {
        let class = class.to_uppercase();
        let Some(digit) = class.chars().next().and_then(|c| c.to_digit(10)) else {
            return false;
        };
        if !class.ends_with("XX") || class.len() != 3 {
            return false;
        }
        let low = digit * 100;
        (low..low + 100).contains(&(status as u32))
    })
}

/// A probe implementation for one monitor type (C1 + C2's contract).
///
/// Implementations must not mutate `monitor`/`proxy`, must respect the
/// caller's `CancellationToken`/deadline, and must never panic or return
/// an `Err` that escapes to the scheduler — probe failures are represented
/// as a `Down`/`Pending` `ProbeOutcome`, not a propagated error (§4.3 rule 1,
/// §7 propagation policy).
#[async_trait]
pub trait Executor: Send + Sync {
    /// Validate a config blob for this monitor type without running any I/O.
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError>;

    /// Run a single probe. `deadline` is `now + monitor.timeout_secs`; the
    /// executor must ensure every I/O call it performs is bounded by it.
    async fn execute(
        &self,
        ctx: ExecutionContext,
        monitor: &Monitor,
        proxy: Option<&Proxy>,
    ) -> ProbeOutcome;
}

/// Per-call execution context: deadline and cancellation.
///
/// Cloned from the scheduler's per-tick `tokio_util::sync::CancellationToken`
/// (§4.5, §5): when the monitor is reconfigured, deactivated or deleted the
/// scheduler cancels the token, and the executor observes this at its next
/// suspension point (an I/O call) rather than being preempted mid-step.
#[derive(Clone)]
pub struct ExecutionContext {
    pub deadline: std::time::Instant,
    pub cancelled: tokio_util::sync::CancellationToken,
}

impl ExecutionContext {
    pub fn new(timeout: std::time::Duration, cancelled: tokio_util::sync::CancellationToken) -> Self {
        Self {
            deadline: std::time::Instant::now() + timeout,
            cancelled,
        }
    }

    pub fn remaining(&self) -> std::time::Duration {
        self.deadline.saturating_duration_since(std::time::Instant::now())
    }

    /// Race an I/O future against both the deadline and cancellation,
    /// returning `Err(ProbeError)` classified the way §7 expects.
    pub async fn race<F, T>(&self, fut: F) -> Result<T, crate::error::ProbeError>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::select! {
            _ = self.cancelled.cancelled() => {
                Err(crate::error::ProbeError::transient("cancelled"))
            }
            _ = tokio::time::sleep(self.remaining()) => {
                Err(crate::error::ProbeError::transient("timed out"))
            }
            value = fut => Ok(value),
        }
    }
}

/// Immutable, name-keyed map of executors, built once at startup (C2).
///
/// "Unknown type" and "missing required field" map to the `ConfigError`
/// variants named in §4.2; the registry itself never grows after
/// construction — adding a type means building a new registry.
pub struct Registry {
    executors: HashMap<String, Arc<dyn Executor>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn get(&self, kind: &str) -> Result<&Arc<dyn Executor>, ConfigError> {
        self.executors
            .get(kind)
            .ok_or_else(|| ConfigError::UnknownMonitorType(kind.to_string()))
    }

    pub fn validate(&self, kind: &str, config: &serde_json::Value) -> Result<(), ConfigError> {
        self.get(kind)?.validate(config)
    }

    pub async fn execute(
        &self,
        ctx: ExecutionContext,
        monitor: &Monitor,
        proxy: Option<&Proxy>,
    ) -> ProbeOutcome {
        match self.get(&monitor.kind) {
            Ok(executor) => executor.execute(ctx, monitor, proxy).await,
            Err(e) => ProbeOutcome::new(
                crate::model::Status::Down,
                format!("internal executor failure: {e}"),
                chrono::Utc::now(),
            ),
        }
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    executors: HashMap<String, Arc<dyn Executor>>,
}

impl RegistryBuilder {
    pub fn with(mut self, kind: impl Into<String>, executor: Arc<dyn Executor>) -> Self {
        self.executors.insert(kind.into(), executor);
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            executors: self.executors,
        }
    }
}

/// Builds the production registry with every executor named in §4.3.
///
/// `push_tracker` backs the Push executor's freshness check (§4.3: "reads
/// the latest heartbeat for the monitor") — it's populated by the API's
/// `/push/<token>` handler, not by this registry itself.
pub fn default_registry(push_tracker: Arc<dyn push::LastHeartbeat>) -> Registry {
    Registry::builder()
        .with("http", Arc::new(http::HttpExecutor::default()))
        .with("tcp", Arc::new(tcp::TcpExecutor))
        .with("ping", Arc::new(ping::PingExecutor))
        .with("dns", Arc::new(dns::DnsExecutor))
        .with("docker", Arc::new(docker::DockerExecutor))
        .with("grpc", Arc::new(grpc::GrpcExecutor))
        .with("redis", Arc::new(sql::redis::RedisExecutor))
        .with("postgres", Arc::new(sql::postgres::PostgresExecutor))
        .with("mysql", Arc::new(sql::mysql::MysqlExecutor))
        .with("mongodb", Arc::new(sql::mongo::MongoExecutor))
        .with("sqlserver", Arc::new(sql::mssql::MssqlExecutor))
        .with("mqtt", Arc::new(mqtt::MqttExecutor))
        .with("kafka", Arc::new(kafka::KafkaExecutor))
        .with("snmp", Arc::new(snmp::SnmpExecutor))
        .with("push", Arc::new(push::PushExecutor::with_store(push_tracker)))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_class_matching_is_inclusive_exclusive() {
        assert!(status_in_classes(200, &["2XX".to_string()]));
        assert!(status_in_classes(299, &["2XX".to_string()]));
        assert!(!status_in_classes(300, &["2XX".to_string()]));
        assert!(!status_in_classes(199, &["2XX".to_string()]));
    }

    #[test]
    fn status_class_matching_rejects_non_matching_classes() {
        assert!(!status_in_classes(200, &["3XX".to_string(), "4XX".to_string()]));
    }

    #[test]
    fn unknown_monitor_type_is_reported() {
        let registry = default_registry(Arc::new(push::PushTracker::new()));
        let err = registry.validate("carrier-pigeon", &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMonitorType(_)));
    }
}
