//! Game error types.

use thiserror::Error;

use super::entities::{PhaseKind, PlayerId, SessionId};
use crate::store::StoreError;

/// Errors reported to the player who attempted an action.
///
/// Every variant except [`GameError::Store`] and [`GameError::StoreConflict`]
/// is raised before anything is written, so a rejected action never changes
/// the session.
#[derive(Debug, Error)]
pub enum GameError {
    /// Creator-only action attempted by someone else
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// Betting action from a player who is not the current bettor
    #[error("Not your turn")]
    NotYourTurn,

    /// Malformed bounds, unknown selection, bad configuration
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Call or raise larger than the player's stack
    #[error("Insufficient chips: need {required}, have {available}")]
    InsufficientChips { required: i64, available: i64 },

    /// No free seat
    #[error("Session is full")]
    SessionFull,

    /// Session is no longer waiting for players
    #[error("Session is not accepting players")]
    SessionNotJoinable,

    /// Second guess or prediction for the same question
    #[error("Already submitted a {0} for this question")]
    AlreadySubmitted(&'static str),

    /// Action not allowed in the current phase
    #[error("Invalid phase: expected {expected}, got {actual}")]
    InvalidPhase {
        expected: &'static str,
        actual: PhaseKind,
    },

    /// Start attempted with too few players
    #[error("Not enough players: need {needed}, have {current}")]
    NotEnoughPlayers { needed: usize, current: usize },

    /// Player is not seated in the session
    #[error("Player not in session: {0}")]
    PlayerNotFound(PlayerId),

    /// Session does not exist
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    /// Another writer replaced the session first
    #[error("Session was modified concurrently, please retry")]
    StoreConflict,

    /// Timer armed for a phase the session already left
    #[error("Stale timer for phase epoch {epoch}")]
    StaleTimer { epoch: u64 },

    /// Session actor has shut down
    #[error("Session is closed")]
    SessionClosed,

    /// Store failure other than a version conflict
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => GameError::StoreConflict,
            StoreError::NotFound(id) => GameError::NotFound(id),
            other => GameError::Store(other),
        }
    }
}

impl GameError {
    /// Get a client-safe error message that doesn't leak store internals
    pub fn client_message(&self) -> String {
        match self {
            GameError::Store(_) => "Internal server error".to_string(),
            GameError::NotFound(_) => "Session not found".to_string(),
            _ => self.to_string(),
        }
    }

    /// Whether the action may succeed if recomputed against fresh state
    pub fn is_retryable(&self) -> bool {
        matches!(self, GameError::StoreConflict)
    }
}

/// Result type for game operations
pub type GameResult<T> = Result<T, GameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_conflict_maps_to_retryable() {
        let err: GameError = StoreError::Conflict { id: 7, expected: 3 }.into();
        assert!(matches!(err, GameError::StoreConflict));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_store_errors_are_sanitized() {
        let err: GameError =
            StoreError::Unavailable("connection refused on 10.0.0.4".into()).into();
        assert_eq!(err.client_message(), "Internal server error");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_insufficient_chips_message() {
        let err = GameError::InsufficientChips {
            required: 120,
            available: 40,
        };
        assert_eq!(err.client_message(), "Insufficient chips: need 120, have 40");
    }
}
