//! Per-session game configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::constants::{
    DEFAULT_GUESS_SECONDS, DEFAULT_MAX_PLAYERS, DEFAULT_MIN_PLAYERS,
    DEFAULT_MIN_REJOIN_CHIPS, DEFAULT_MIN_REJOIN_PREDICTIONS, DEFAULT_NUM_QUESTIONS,
    DEFAULT_STARTING_CHIPS, MAX_GUESS_SECONDS, MAX_STARTING_CHIPS, MIN_GUESS_SECONDS,
    MIN_STARTING_CHIPS,
};
use super::errors::{GameError, GameResult};

/// What happens to the pot when a question ends without a winner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PotPolicy {
    /// The chips leave circulation.
    #[default]
    Forfeit,
    /// The chips are paid out to the next question's winner.
    RollOver,
}

impl fmt::Display for PotPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PotPolicy::Forfeit => write!(f, "forfeit"),
            PotPolicy::RollOver => write!(f, "roll_over"),
        }
    }
}

/// Session configuration chosen by the creator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Chips every player starts (and restarts) with
    pub starting_chips: i64,

    /// Players required before the creator can start
    pub min_players: usize,

    /// Seats available
    pub max_players: usize,

    /// Length of the guessing phase in seconds
    pub guess_seconds: u64,

    /// Questions played before the game is over
    pub num_questions: usize,

    /// Whether players can predict each question's winner
    pub meta_game_enabled: bool,

    /// Correct predictions a bankrupt player needs to rejoin
    pub min_rejoin_predictions: u32,

    /// Chips granted on rejoin
    pub min_rejoin_chips: i64,

    /// Fate of an unclaimed pot
    #[serde(default)]
    pub pot_policy: PotPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            starting_chips: DEFAULT_STARTING_CHIPS,
            min_players: DEFAULT_MIN_PLAYERS,
            max_players: DEFAULT_MAX_PLAYERS,
            guess_seconds: DEFAULT_GUESS_SECONDS,
            num_questions: DEFAULT_NUM_QUESTIONS,
            meta_game_enabled: false,
            min_rejoin_predictions: DEFAULT_MIN_REJOIN_PREDICTIONS,
            min_rejoin_chips: DEFAULT_MIN_REJOIN_CHIPS,
            pot_policy: PotPolicy::Forfeit,
        }
    }
}

impl SessionConfig {
    /// Validate configuration with the standard guess-time floor
    pub fn validate(&self) -> GameResult<()> {
        self.validate_with_min_guess(MIN_GUESS_SECONDS)
    }

    /// Validate configuration with a custom guess-time floor.
    ///
    /// Simulations and tests run with short guessing phases; every other rule
    /// still applies.
    pub fn validate_with_min_guess(&self, min_guess_seconds: u64) -> GameResult<()> {
        if self.starting_chips < MIN_STARTING_CHIPS {
            return Err(GameError::InvalidInput(format!(
                "Starting chips must be at least {}",
                MIN_STARTING_CHIPS
            )));
        }

        if self.starting_chips > MAX_STARTING_CHIPS {
            return Err(GameError::InvalidInput(format!(
                "Starting chips cannot exceed {}",
                MAX_STARTING_CHIPS
            )));
        }

        if self.min_players < 2 {
            return Err(GameError::InvalidInput(
                "Minimum players must be at least 2".to_string(),
            ));
        }

        if self.max_players < self.min_players {
            return Err(GameError::InvalidInput(
                "Maximum players must be at least equal to minimum players".to_string(),
            ));
        }

        if self.guess_seconds < min_guess_seconds {
            return Err(GameError::InvalidInput(format!(
                "Guess time must be at least {} seconds",
                min_guess_seconds
            )));
        }

        if self.guess_seconds > MAX_GUESS_SECONDS {
            return Err(GameError::InvalidInput(format!(
                "Guess time cannot exceed {} seconds",
                MAX_GUESS_SECONDS
            )));
        }

        if self.num_questions == 0 {
            return Err(GameError::InvalidInput(
                "Number of questions must be at least 1".to_string(),
            ));
        }

        if self.min_rejoin_predictions == 0 {
            return Err(GameError::InvalidInput(
                "Rejoin predictions must be at least 1".to_string(),
            ));
        }

        if self.min_rejoin_chips <= 0 || self.min_rejoin_chips > MAX_STARTING_CHIPS {
            return Err(GameError::InvalidInput(format!(
                "Rejoin chips must be between 1 and {}",
                MAX_STARTING_CHIPS
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_low_starting_chips() {
        let config = SessionConfig {
            starting_chips: 99,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(GameError::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_oversized_starting_chips() {
        let config = SessionConfig {
            starting_chips: i64::MAX,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(GameError::InvalidInput(_))));

        let at_cap = SessionConfig {
            starting_chips: MAX_STARTING_CHIPS,
            ..SessionConfig::default()
        };
        assert!(at_cap.validate().is_ok());
    }

    #[test]
    fn test_rejects_max_below_min_players() {
        let config = SessionConfig {
            min_players: 4,
            max_players: 3,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(GameError::InvalidInput(_))));
    }

    #[test]
    fn test_guess_floor_is_configurable() {
        let config = SessionConfig {
            guess_seconds: 2,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(config.validate_with_min_guess(1).is_ok());
    }

    #[test]
    fn test_rejects_guess_time_past_cap() {
        let config = SessionConfig {
            guess_seconds: 10_000_000_000_000,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(GameError::InvalidInput(_))));
        assert!(config.validate_with_min_guess(1).is_err());

        let day = SessionConfig {
            guess_seconds: MAX_GUESS_SECONDS,
            ..SessionConfig::default()
        };
        assert!(day.validate().is_ok());
    }

    #[test]
    fn test_pot_policy_defaults_when_missing() {
        let json = r#"{
            "starting_chips": 1000, "min_players": 2, "max_players": 6,
            "guess_seconds": 60, "num_questions": 5, "meta_game_enabled": true,
            "min_rejoin_predictions": 3, "min_rejoin_chips": 50
        }"#;
        let config: SessionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.pot_policy, PotPolicy::Forfeit);
        assert!(config.meta_game_enabled);
    }
}
