//! Simulator configuration management.
//!
//! Environment variables provide defaults; command-line flags override them.

use fermi_poker::{
    constants::{MAX_STARTING_CHIPS, MIN_STARTING_CHIPS},
    db::DatabaseConfig,
};

/// Complete simulator configuration
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Bots seated, the first one creates the session
    pub players: usize,
    /// Questions in the game
    pub questions: usize,
    /// Guessing phase length
    pub guess_secs: u64,
    /// Whether bots predict winners
    pub meta_game: bool,
    /// Starting stack per bot
    pub starting_chips: i64,
    /// PostgreSQL settings, when running against a database
    pub database: Option<DatabaseConfig>,
}

/// Flag values that take precedence over the environment
#[derive(Debug, Default, Clone)]
pub struct SimOverrides {
    pub players: Option<usize>,
    pub questions: Option<usize>,
    pub guess_secs: Option<u64>,
    pub meta_game: bool,
    pub use_postgres: bool,
}

impl SimConfig {
    /// Load configuration from environment variables and apply overrides
    ///
    /// # Errors
    ///
    /// Returns error if a value is out of range, or if PostgreSQL is
    /// requested without `DATABASE_URL`.
    pub fn from_env(overrides: SimOverrides) -> Result<Self, ConfigError> {
        let database = if overrides.use_postgres {
            Some(DatabaseConfig::from_env().map_err(|e| ConfigError::MissingRequired {
                var: "DATABASE_URL".to_string(),
                hint: e.to_string(),
            })?)
        } else {
            None
        };

        let config = Self {
            players: overrides
                .players
                .unwrap_or_else(|| parse_env_or("SIM_PLAYERS", 4)),
            questions: overrides
                .questions
                .unwrap_or_else(|| parse_env_or("SIM_QUESTIONS", 3)),
            guess_secs: overrides
                .guess_secs
                .unwrap_or_else(|| parse_env_or("SIM_GUESS_SECS", 2)),
            meta_game: overrides.meta_game || parse_env_or("SIM_META_GAME", false),
            starting_chips: parse_env_or("SIM_STARTING_CHIPS", 1000),
            database,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=10).contains(&self.players) {
            return Err(ConfigError::Invalid {
                var: "SIM_PLAYERS".to_string(),
                reason: "Must be between 2 and 10".to_string(),
            });
        }

        if self.questions == 0 {
            return Err(ConfigError::Invalid {
                var: "SIM_QUESTIONS".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        if self.guess_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "SIM_GUESS_SECS".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        if !(MIN_STARTING_CHIPS..=MAX_STARTING_CHIPS).contains(&self.starting_chips) {
            return Err(ConfigError::Invalid {
                var: "SIM_STARTING_CHIPS".to_string(),
                reason: format!("Must be between {MIN_STARTING_CHIPS} and {MAX_STARTING_CHIPS}"),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SimConfig {
        SimConfig {
            players: 4,
            questions: 3,
            guess_secs: 2,
            meta_game: false,
            starting_chips: 1000,
            database: None,
        }
    }

    #[test]
    fn test_overrides_take_precedence() {
        let config = SimConfig::from_env(SimOverrides {
            players: Some(6),
            questions: Some(2),
            guess_secs: Some(3),
            meta_game: true,
            use_postgres: false,
        })
        .unwrap();
        assert_eq!(config.players, 6);
        assert_eq!(config.questions, 2);
        assert_eq!(config.guess_secs, 3);
        assert!(config.meta_game);
        assert!(config.database.is_none());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_single_player() {
        let err = SimConfig {
            players: 1,
            ..config()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "SIM_PLAYERS"));
    }

    #[test]
    fn test_validation_rejects_zero_questions() {
        let err = SimConfig {
            questions: 0,
            ..config()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid {
            var: "SIM_GUESS_SECS".to_string(),
            reason: "Must be at least 1".to_string(),
        };
        assert!(err.to_string().contains("SIM_GUESS_SECS"));
    }
}
