//! PostgreSQL pool settings.

use std::{env, str::FromStr, time::Duration};
use thiserror::Error;

/// Errors raised while reading database settings from the environment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DatabaseConfigError {
    #[error("DATABASE_URL must be set")]
    MissingUrl,

    #[error("{name} has invalid value '{value}'")]
    InvalidValue { name: &'static str, value: String },
}

/// Pool settings for the session store and question bank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,

    /// How long to wait for a free connection
    pub acquire_timeout: Duration,

    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

fn parse_setting<T: FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, DatabaseConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| DatabaseConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}

fn seconds_setting(name: &'static str, default: Duration) -> Result<Duration, DatabaseConfigError> {
    parse_setting(name, env::var(name).ok(), default.as_secs()).map(Duration::from_secs)
}

impl DatabaseConfig {
    /// Read settings from the environment.
    ///
    /// `DATABASE_URL` is required. Optional: `DB_MAX_CONNECTIONS`,
    /// `DB_MIN_CONNECTIONS`, and `DB_ACQUIRE_TIMEOUT_SECS`,
    /// `DB_IDLE_TIMEOUT_SECS`, `DB_MAX_LIFETIME_SECS` in seconds. Unset values
    /// fall back to [`DatabaseConfig::development`]; malformed ones are errors.
    pub fn from_env() -> Result<Self, DatabaseConfigError> {
        let defaults = Self::development();
        let url = env::var("DATABASE_URL").map_err(|_| DatabaseConfigError::MissingUrl)?;

        let config = Self {
            url,
            max_connections: parse_setting(
                "DB_MAX_CONNECTIONS",
                env::var("DB_MAX_CONNECTIONS").ok(),
                defaults.max_connections,
            )?,
            min_connections: parse_setting(
                "DB_MIN_CONNECTIONS",
                env::var("DB_MIN_CONNECTIONS").ok(),
                defaults.min_connections,
            )?,
            acquire_timeout: seconds_setting("DB_ACQUIRE_TIMEOUT_SECS", defaults.acquire_timeout)?,
            idle_timeout: seconds_setting("DB_IDLE_TIMEOUT_SECS", defaults.idle_timeout)?,
            max_lifetime: seconds_setting("DB_MAX_LIFETIME_SECS", defaults.max_lifetime)?,
        };

        if config.min_connections > config.max_connections {
            return Err(DatabaseConfigError::InvalidValue {
                name: "DB_MIN_CONNECTIONS",
                value: config.min_connections.to_string(),
            });
        }

        Ok(config)
    }

    /// Local database `fermi_poker`, small pool.
    pub fn development() -> Self {
        Self {
            url: "postgres://postgres@localhost/fermi_poker".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::development()
    }
}
