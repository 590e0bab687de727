//! Error taxonomy for the probe/alert pipeline.
//!
//! Mirrors the shape of the teacher's `storage/error.rs`: a flat enum per
//! component boundary with a `Display` impl, rather than a single
//! catch-all error type. Probes and dispatch never let these escape past
//! their own boundary (see module docs on `executor` and `dispatch`) —
//! they are converted into outcome values instead.

use std::fmt;

/// Errors raised while validating or decoding a monitor's config blob (C4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The monitor's `type` tag has no registered executor.
    UnknownMonitorType(String),
    /// A required field was missing or failed a validation rule.
    InvalidConfig {
        field: String,
        rule: String,
    },
    /// The blob itself did not parse as JSON, or carried unknown fields.
    Malformed(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownMonitorType(t) => write!(f, "unknown monitor type: {t}"),
            ConfigError::InvalidConfig { field, rule } => {
                write!(f, "invalid config field '{field}': {rule}")
            }
            ConfigError::Malformed(msg) => write!(f, "malformed config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// The classification an executor-level failure carries (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeErrorKind {
    /// Timeouts, transient DNS/TLS failures, 5xx — treated as DOWN, may recover.
    Transient,
    /// Hard misconfiguration discovered only at probe time (bad cert, etc).
    Permanent,
    /// A contract violation inside the executor itself (should not happen).
    Internal,
}

/// Errors used internally by executors before they are folded into a
/// `Result` (renamed `ProbeOutcome` in this crate to avoid clashing with
/// `std::result::Result`); never returned to the scheduler directly.
#[derive(Debug, Clone)]
pub struct ProbeError {
    pub kind: ProbeErrorKind,
    pub message: String,
}

impl ProbeError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ProbeErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ProbeErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: ProbeErrorKind::Internal,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ProbeError {}

/// Outcome of a single channel-driver send attempt (§4.10, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchErrorKind {
    /// Network error, 5xx, timeout — worth retrying with backoff.
    Transient,
    /// 4xx, bad credentials, rejected payload — retrying would not help.
    Permanent,
}

#[derive(Debug, Clone)]
pub struct DispatchError {
    pub kind: DispatchErrorKind,
    pub message: String,
}

impl DispatchError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: DispatchErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: DispatchErrorKind::Permanent,
            message: message.into(),
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DispatchError {}

/// Errors from the heartbeat store (C7), mirroring the teacher's
/// `storage/error.rs` taxonomy.
#[derive(Debug)]
pub enum StoreError {
    ConnectionFailed(String),
    QueryFailed(String),
    MigrationFailed(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::ConnectionFailed(msg) => write!(f, "failed to connect to heartbeat store: {msg}"),
            StoreError::QueryFailed(msg) => write!(f, "heartbeat store query failed: {msg}"),
            StoreError::MigrationFailed(msg) => write!(f, "heartbeat store migration failed: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

#[cfg(feature = "storage-sqlite")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::QueryFailed("no rows found".to_string()),
            other => StoreError::QueryFailed(other.to_string()),
        }
    }
}

#[cfg(feature = "storage-sqlite")]
impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::MigrationFailed(err.to_string())
    }
}

/// Errors that abort startup (§6, §7: "only startup-time errors are fatal").
#[derive(Debug)]
pub enum StartupError {
    MissingEnvVar(&'static str),
    InvalidEnvVar { name: &'static str, reason: String },
    StoreConnect(String),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::MissingEnvVar(name) => {
                write!(f, "required environment variable {name} is not set")
            }
            StartupError::InvalidEnvVar { name, reason } => {
                write!(f, "environment variable {name} is invalid: {reason}")
            }
            StartupError::StoreConnect(msg) => write!(f, "failed to connect to store: {msg}"),
        }
    }
}

impl std::error::Error for StartupError {}
