//! SMTP driver: renders subject/body into an email and sends it over
//! `lettre`'s async Tokio+rustls transport, authenticating with the
//! configured credentials when present.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;

use crate::config_codec::{decode, Validator};
use crate::error::{ConfigError, DispatchError};

use super::{ChannelDriver, NotificationPayload};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_port() -> u16 {
    587
}

pub struct SmtpDriver;

#[async_trait]
impl ChannelDriver for SmtpDriver {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: SmtpConfig = decode(config)?;
        let mut v = Validator::new();
        v.require_non_empty("host", &parsed.host);
        v.port("port", parsed.port);
        if parsed.from.parse::<Mailbox>().is_err() {
            v.fail("from", "must be a well-formed email address");
        }
        if parsed.to.parse::<Mailbox>().is_err() {
            v.fail("to", "must be a well-formed email address");
        }
        v.require_when(parsed.username.is_some(), &[("password", parsed.password.is_some())]);
        v.into_result()
    }

    async fn send(&self, config: &serde_json::Value, payload: &NotificationPayload, timeout: std::time::Duration) -> Result<(), DispatchError> {
        let config: SmtpConfig = decode(config).map_err(|e| DispatchError::permanent(e.to_string()))?;

        let from: Mailbox = config.from.parse().map_err(|e| DispatchError::permanent(format!("invalid from address: {e}")))?;
        let to: Mailbox = config.to.parse().map_err(|e| DispatchError::permanent(format!("invalid to address: {e}")))?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(&payload.subject)
            .body(payload.body.clone())
            .map_err(|e| DispatchError::permanent(format!("failed to build email: {e}")))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| DispatchError::permanent(format!("invalid SMTP host: {e}")))?
            .port(config.port)
            .timeout(Some(timeout));

        if let (Some(username), Some(password)) = (config.username.clone(), config.password.clone()) {
            builder = builder.credentials(Credentials::new(username, password));
        }

        let transport = builder.build();

        match transport.send(email).await {
            Ok(_) => Ok(()),
            Err(e) => Err(classify_smtp_failure(e)),
        }
    }
}

/// Rejected recipients and auth failures don't improve on retry;
/// connection/transient protocol errors might.
fn classify_smtp_failure(e: lettre::transport::smtp::Error) -> DispatchError {
    let text = e.to_string();
    if text.contains("authentication") || text.contains("mailbox") || text.contains("rejected") {
        DispatchError::permanent(text)
    } else {
        DispatchError::transient(text)
    }
}
