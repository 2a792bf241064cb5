//! Session store error types.

use thiserror::Error;

use crate::game::entities::SessionId;

/// Session store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No session with this id
    #[error("Session {0} not found")]
    NotFound(SessionId),

    /// Compare-and-swap failed: the stored version moved on
    #[error("Session {id} is no longer at version {expected}")]
    Conflict { id: SessionId, expected: u64 },

    /// Another session already uses this invite code
    #[error("Invite code {0} is already taken")]
    DuplicateInviteCode(String),

    /// Backend cannot serve requests
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
