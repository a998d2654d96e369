//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which mail adapter the server is wired with at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MailBackend {
    /// Logs outgoing mail instead of delivering it. The development default.
    Console,
    /// Delivers through the configured SMTP relay.
    Smtp,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// Signs confirmation codes and access tokens. Never logged.
    pub secret_key: String,
    pub admin_email: String,
    pub mail_backend: MailBackend,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub mail_timeout: Duration,
    pub token_timeout: Duration,
    pub access_token_ttl_hours: i64,
    pub confirmation_ttl_secs: u64,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Signing and Mail Settings ---
        let secret_key = std::env::var("SECRET_KEY")
            .map_err(|_| ConfigError::MissingVar("SECRET_KEY".to_string()))?;

        let admin_email = std::env::var("ADMIN_EMAIL")
            .unwrap_or_else(|_| "webmaster@localhost".to_string());

        let mail_backend_str =
            std::env::var("MAIL_BACKEND").unwrap_or_else(|_| "console".to_string());
        let mail_backend = match mail_backend_str.to_lowercase().as_str() {
            "console" => MailBackend::Console,
            "smtp" => MailBackend::Smtp,
            other => {
                return Err(ConfigError::InvalidValue(
                    "MAIL_BACKEND".to_string(),
                    format!("'{}' is not a supported mail backend", other),
                ))
            }
        };

        let smtp_host = std::env::var("SMTP_HOST").ok();
        let smtp_port = std::env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidValue("SMTP_PORT".to_string(), e.to_string()))?;
        let smtp_username = std::env::var("SMTP_USERNAME").ok();
        let smtp_password = std::env::var("SMTP_PASSWORD").ok();

        // --- Load Timeouts and Token Lifetimes ---
        let mail_timeout_secs = std::env::var("MAIL_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidValue("MAIL_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        let token_timeout_secs = std::env::var("TOKEN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidValue("TOKEN_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        let access_token_ttl_hours = std::env::var("ACCESS_TOKEN_TTL_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse::<i64>()
            .map_err(|e| {
                ConfigError::InvalidValue("ACCESS_TOKEN_TTL_HOURS".to_string(), e.to_string())
            })?;

        let confirmation_ttl_secs = std::env::var("CONFIRMATION_TTL_SECS")
            .unwrap_or_else(|_| "259200".to_string())
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidValue("CONFIRMATION_TTL_SECS".to_string(), e.to_string())
            })?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            secret_key,
            admin_email,
            mail_backend,
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            mail_timeout: Duration::from_secs(mail_timeout_secs),
            token_timeout: Duration::from_secs(token_timeout_secs),
            access_token_ttl_hours,
            confirmation_ttl_secs,
        })
    }
}
