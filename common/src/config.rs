//! Application configuration.
//!
//! Configuration is read once at startup from the process environment
//! (optionally seeded from a `.env` file) and then passed around as an
//! immutable value.

use std::fmt;

use serde::Serialize;
use validator::Validate;

use crate::errors::{AppError, AppResult};

/// PostgreSQL port. Not configurable.
pub const DB_PORT: u16 = 5432;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Service-level configuration.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    /// Name reported in metadata and logs.
    pub service_name: String,
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Upper bound on pooled database connections.
    pub max_connections: u32,
    /// Seconds to wait when acquiring a database connection.
    pub connect_timeout_secs: u64,
    /// Database connection parameters.
    pub database: DatabaseConfig,
}

/// Database connection parameters.
#[derive(Clone, Serialize, Validate)]
pub struct DatabaseConfig {
    #[validate(length(min = 1, message = "DB_HOST is required"))]
    pub host: String,

    #[validate(length(min = 1, message = "DB_NAME is required"))]
    pub name: String,

    #[validate(length(min = 1, message = "DB_USER is required"))]
    pub user: String,

    #[serde(skip_serializing)]
    pub password: String,

    pub port: u16,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"***")
            .field("port", &self.port)
            .finish()
    }
}

impl AppConfig {
    /// Loads configuration for the named service from the environment.
    ///
    /// A `.env` file in the working directory is applied first; variables
    /// already present in the environment win.
    ///
    /// # Errors
    /// Returns `AppError::Config` when a required variable is missing or a
    /// numeric variable does not parse.
    pub fn load_with_service(service_name: &str) -> AppResult<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "failed to read .env file");
            }
        }
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(service_name: &str, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database = DatabaseConfig {
            host: lookup("DB_HOST").unwrap_or_default(),
            name: lookup("DB_NAME").unwrap_or_default(),
            user: lookup("DB_USER").unwrap_or_default(),
            password: lookup("DB_PASSWORD").unwrap_or_default(),
            port: DB_PORT,
        };
        database
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        Ok(Self {
            service_name: service_name.to_string(),
            host: lookup("SERVER_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_var(&lookup, "SERVER_PORT", DEFAULT_PORT)?,
            max_connections: parse_var(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            connect_timeout_secs: parse_var(
                &lookup,
                "DB_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )?,
            database,
        })
    }

    /// `host:port` string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> AppResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{key} must be a number, got {raw:?}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_loads_database_params_with_fixed_port() {
        let config = AppConfig::from_lookup(
            "table-gateway",
            lookup_from(&[
                ("DB_HOST", "db.internal"),
                ("DB_NAME", "medical"),
                ("DB_USER", "gateway"),
                ("DB_PASSWORD", "s3cret"),
            ]),
        )
        .unwrap();

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.max_connections, 10);
    }

    #[test]
    fn test_missing_host_is_rejected() {
        let err = AppConfig::from_lookup(
            "table-gateway",
            lookup_from(&[("DB_NAME", "medical"), ("DB_USER", "gateway")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("DB_HOST is required"));
    }

    #[test]
    fn test_bad_port_is_rejected() {
        let err = AppConfig::from_lookup(
            "table-gateway",
            lookup_from(&[
                ("DB_HOST", "localhost"),
                ("DB_NAME", "medical"),
                ("DB_USER", "gateway"),
                ("SERVER_PORT", "eighty"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_password_is_redacted_in_debug() {
        let config = AppConfig::from_lookup(
            "table-gateway",
            lookup_from(&[
                ("DB_HOST", "localhost"),
                ("DB_NAME", "medical"),
                ("DB_USER", "gateway"),
                ("DB_PASSWORD", "hunter2"),
            ]),
        )
        .unwrap();
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
