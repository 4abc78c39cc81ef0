//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `SHOPFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `SHOPFRONT_PORT` - Listen port (default: 8080)
//! - `SHOPFRONT_SESSION_TTL_DAYS` - Session token lifetime in days (default: 7)
//! - `SHOPFRONT_STORAGE_TIMEOUT_MS` - Upper bound for every storage call (default: 5000)
//! - `SHOPFRONT_SWEEP_INTERVAL_HOURS` - Expired-token sweep interval (default: 24)
//! - `SHOPFRONT_CORS_ORIGIN` - Allowed CORS origin (default: any)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 1.0)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use crate::services::{DEFAULT_SESSION_TTL_DAYS, ServiceSettings};

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Server configuration.
///
/// Implements `Debug` manually to redact the database URL.
#[derive(Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Lifetime of issued and refreshed session tokens
    pub session_ttl: chrono::Duration,
    /// Upper bound for every storage call
    pub storage_timeout: Duration,
    /// Interval between expired-token sweeps
    pub sweep_interval: Duration,
    /// Allowed CORS origin; any origin when `None`
    pub cors_origin: Option<String>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Error event sample rate
    pub sentry_sample_rate: f32,
    /// Transaction sample rate
    pub sentry_traces_sample_rate: f32,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("database_url", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("session_ttl", &self.session_ttl)
            .field("storage_timeout", &self.storage_timeout)
            .field("sweep_interval", &self.sweep_interval)
            .field("cors_origin", &self.cors_origin)
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"))
            .field("sentry_environment", &self.sentry_environment)
            .field("sentry_sample_rate", &self.sentry_sample_rate)
            .field("sentry_traces_sample_rate", &self.sentry_traces_sample_rate)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let database_url = env.database_url("SHOPFRONT_DATABASE_URL")?;
        let host: IpAddr = env.parse_or("SHOPFRONT_HOST", "127.0.0.1".parse().ok())?;
        let port: u16 = env.parse_or("SHOPFRONT_PORT", Some(8080))?;

        let ttl_days: u16 =
            env.parse_or("SHOPFRONT_SESSION_TTL_DAYS", u16::try_from(DEFAULT_SESSION_TTL_DAYS).ok())?;
        let timeout_ms: u64 = env.parse_or("SHOPFRONT_STORAGE_TIMEOUT_MS", Some(5_000))?;
        let sweep_hours: u64 = env.parse_or("SHOPFRONT_SWEEP_INTERVAL_HOURS", Some(24))?;

        if ttl_days == 0 {
            return Err(invalid("SHOPFRONT_SESSION_TTL_DAYS", "must be at least 1"));
        }
        if timeout_ms == 0 {
            return Err(invalid("SHOPFRONT_STORAGE_TIMEOUT_MS", "must be at least 1"));
        }
        if sweep_hours == 0 {
            return Err(invalid("SHOPFRONT_SWEEP_INTERVAL_HOURS", "must be at least 1"));
        }

        let sentry_sample_rate = env
            .optional("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = env
            .optional("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            host,
            port,
            session_ttl: chrono::Duration::days(i64::from(ttl_days)),
            storage_timeout: Duration::from_millis(timeout_ms),
            sweep_interval: Duration::from_secs(sweep_hours * 3600),
            cors_origin: env.optional("SHOPFRONT_CORS_ORIGIN"),
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Tunables handed to the services.
    #[must_use]
    pub const fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            session_ttl: self.session_ttl,
            storage_timeout: self.storage_timeout,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// A variable source. Empty values count as unset.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get an optional environment variable.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Get database URL with fallback to generic `DATABASE_URL`.
    fn database_url(&self, primary_key: &str) -> Result<SecretString, ConfigError> {
        self.optional(primary_key)
            .or_else(|| self.optional("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parse_or<T>(&self, key: &str, default: Option<T>) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map_err(|e| invalid(key, &e.to_string())),
            None => default.ok_or_else(|| ConfigError::MissingEnvVar(key.to_string())),
        }
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidEnvVar(key.to_string(), reason.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("SHOPFRONT_DATABASE_URL", "postgres://localhost/shop")]).unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.session_ttl, chrono::Duration::days(7));
        assert_eq!(config.storage_timeout, Duration::from_secs(5));
        assert_eq!(config.sweep_interval, Duration::from_secs(24 * 3600));
        assert!(config.cors_origin.is_none());
        assert!((config.sentry_sample_rate - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_database_url_fallback() {
        let config = load(&[("DATABASE_URL", "postgres://fallback/db")]).unwrap();
        assert_eq!(config.database_url.expose_secret(), "postgres://fallback/db");

        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "SHOPFRONT_DATABASE_URL"));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("SHOPFRONT_DATABASE_URL", "postgres://localhost/shop"),
            ("SHOPFRONT_HOST", "0.0.0.0"),
            ("SHOPFRONT_PORT", "9000"),
            ("SHOPFRONT_SESSION_TTL_DAYS", "1"),
            ("SHOPFRONT_STORAGE_TIMEOUT_MS", "250"),
            ("SHOPFRONT_SWEEP_INTERVAL_HOURS", "6"),
            ("SHOPFRONT_CORS_ORIGIN", "https://shop.example.com"),
        ])
        .unwrap();

        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:9000");
        let settings = config.service_settings();
        assert_eq!(settings.session_ttl, chrono::Duration::days(1));
        assert_eq!(settings.storage_timeout, Duration::from_millis(250));
        assert_eq!(config.sweep_interval, Duration::from_secs(6 * 3600));
        assert_eq!(
            config.cors_origin.as_deref(),
            Some("https://shop.example.com")
        );
    }

    #[test]
    fn test_invalid_values() {
        let err = load(&[
            ("SHOPFRONT_DATABASE_URL", "postgres://localhost/shop"),
            ("SHOPFRONT_PORT", "eighty"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "SHOPFRONT_PORT"));

        let err = load(&[
            ("SHOPFRONT_DATABASE_URL", "postgres://localhost/shop"),
            ("SHOPFRONT_STORAGE_TIMEOUT_MS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = load(&[
            ("SHOPFRONT_DATABASE_URL", "postgres://user:hunter2@db/shop"),
            ("SENTRY_DSN", "https://key@sentry.example.com/1"),
        ])
        .unwrap();

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2"));
        assert!(!debug_output.contains("key@sentry"));
    }
}
