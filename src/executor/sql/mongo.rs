//! MongoDB executor: connect, run the `ping` admin command, and optionally
//! evaluate a simple dotted-path JSON selector against its result (§4.3).

use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::{doc, Bson};
use mongodb::options::ClientOptions;
use mongodb::Client;
use serde::Deserialize;

use crate::config_codec::{decode, Validator};
use crate::error::ConfigError;
use crate::model::{Monitor, ProbeOutcome, Proxy, Status};

use super::super::{ExecutionContext, Executor};
use super::{redact_connection_string, validate_connection_string, ConnectionStringRules};

const CONNECTION_STRING_RULES: ConnectionStringRules = ConnectionStringRules {
    schemes: &["mongodb", "mongodb+srv"],
    require_database: false,
    require_username: false,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MongoConfig {
    pub connection_string: String,
    /// Dotted path into the `ping` command's reply document, e.g. "ok" or
    /// "repl.ismaster" (§4.3: "optionally evaluate a simple dotted-path JSON
    /// selector and compare to expected value").
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub expected_value: Option<String>,
}

pub struct MongoExecutor;

#[async_trait]
impl Executor for MongoExecutor {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: MongoConfig = decode(config)?;
        let mut v = Validator::new();
        validate_connection_string(&mut v, "connection_string", &parsed.connection_string, &CONNECTION_STRING_RULES);
        v.require_when(
            parsed.selector.is_some(),
            &[("expected_value", parsed.expected_value.is_some())],
        );
        v.into_result()
    }

    async fn execute(&self, ctx: ExecutionContext, monitor: &Monitor, _proxy: Option<&Proxy>) -> ProbeOutcome {
        let start = Utc::now();
        let config: MongoConfig = match decode(&monitor.config) {
            Ok(c) => c,
            Err(e) => return ProbeOutcome::new(Status::Down, format!("connection string validation failed: {e}"), start),
        };

        let result = ctx.race(ping(&config.connection_string, ctx.remaining())).await;
        let reply = match result {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => return ProbeOutcome::new(Status::Down, redact_connection_string(&e), start),
            Err(e) => return ProbeOutcome::new(Status::Down, e.to_string(), start),
        };

        match &config.selector {
            None => ProbeOutcome::new(Status::Up, "ping ok".to_string(), start),
            Some(path) => {
                let expected = config.expected_value.as_deref().unwrap_or_default();
                match selector_matches(&reply, path, expected) {
                    true => ProbeOutcome::new(Status::Up, format!("ping ok, {path} == {expected}"), start),
                    false => ProbeOutcome::new(Status::Down, format!("ping ok, but {path} did not match {expected}"), start),
                }
            }
        }
    }
}

async fn ping(connection_string: &str, timeout: std::time::Duration) -> Result<mongodb::bson::Document, String> {
    let mut options = ClientOptions::parse(connection_string).await.map_err(|e| e.to_string())?;
    options.connect_timeout = Some(timeout);
    options.server_selection_timeout = Some(timeout);

    let client = Client::with_options(options).map_err(|e| e.to_string())?;
    client
        .database("admin")
        .run_command(doc! {"ping": 1})
        .await
        .map_err(|e| e.to_string())
}

/// Walks a dotted path ("a.b.c") through a BSON document and compares the
/// leaf to `expected`: numeric equality if both sides parse as numbers,
/// otherwise string equality.
fn selector_matches(document: &mongodb::bson::Document, path: &str, expected: &str) -> bool {
    let Some(value) = resolve_path(document, path) else {
        return false;
    };

    let actual = match &value {
        Bson::Double(n) => n.to_string(),
        Bson::Int32(n) => n.to_string(),
        Bson::Int64(n) => n.to_string(),
        Bson::Boolean(b) => b.to_string(),
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    };

    match (actual.parse::<f64>(), expected.parse::<f64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => actual == expected,
    }
}

fn resolve_path(document: &mongodb::bson::Document, path: &str) -> Option<Bson> {
    let mut current = Bson::Document(document.clone());
    for segment in path.split('.') {
        current = match current {
            Bson::Document(doc) => doc.get(segment)?.clone(),
            _ => return None,
        };
    }
    Some(current)
}
