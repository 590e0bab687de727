//! Startup environment configuration (§6).
//!
//! Loaded once at process start via `dotenv`, the same way the teacher's
//! `bin/agent.rs` calls `dotenv::dotenv().ok()` before reading env vars.
//! Unlike per-monitor config (decoded per-executor, never fatal), a bad or
//! missing startup var is fatal (§7: "only startup-time errors are fatal").

use crate::error::StartupError;

#[derive(Debug, Clone)]
pub struct EngineEnv {
    pub db_type: String,
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub db_user: String,
    pub db_pass: String,
    pub port: u16,
    pub client_url: String,
    pub access_token_secret_key: String,
    pub refresh_token_secret_key: String,
    pub access_token_expired_in: String,
    pub refresh_token_expired_in: String,
    pub mode: String,
    pub tz: String,
}

fn require(name: &'static str) -> Result<String, StartupError> {
    std::env::var(name).map_err(|_| StartupError::MissingEnvVar(name))
}

fn require_secret(name: &'static str) -> Result<String, StartupError> {
    let value = require(name)?;
    if value.len() < 16 {
        return Err(StartupError::InvalidEnvVar {
            name,
            reason: "must be at least 16 characters".to_string(),
        });
    }
    Ok(value)
}

impl EngineEnv {
    /// Load and validate every variable named in §6. Call once at boot,
    /// after `dotenv::dotenv().ok()` has populated `std::env`.
    pub fn load() -> Result<Self, StartupError> {
        let db_port = require("DB_PORT")?
            .parse::<u16>()
            .map_err(|_| StartupError::InvalidEnvVar {
                name: "DB_PORT",
                reason: "must be a valid port number".to_string(),
            })?;
        let port = require("PORT")?
            .parse::<u16>()
            .map_err(|_| StartupError::InvalidEnvVar {
                name: "PORT",
                reason: "must be a valid port number".to_string(),
            })?;

        Ok(Self {
            db_type: require("DB_TYPE")?,
            db_host: require("DB_HOST")?,
            db_port,
            db_name: require("DB_NAME")?,
            db_user: require("DB_USER")?,
            db_pass: require("DB_PASS")?,
            port,
            client_url: require("CLIENT_URL")?,
            access_token_secret_key: require_secret("ACCESS_TOKEN_SECRET_KEY")?,
            refresh_token_secret_key: require_secret("REFRESH_TOKEN_SECRET_KEY")?,
            access_token_expired_in: require("ACCESS_TOKEN_EXPIRED_IN")?,
            refresh_token_expired_in: require("REFRESH_TOKEN_EXPIRED_IN")?,
            mode: require("MODE")?,
            tz: require("TZ")?,
        })
    }
}
