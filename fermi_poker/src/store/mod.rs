//! Session persistence.
//!
//! The store is the source of truth for every [`SessionRecord`]. Writers go
//! through [`SessionStore::replace_if_version`], so a write based on a stale
//! read fails with [`StoreError::Conflict`] instead of clobbering a newer
//! record.

use async_trait::async_trait;

use crate::game::entities::{SessionId, SessionRecord};

pub mod errors;
pub mod memory;
pub mod postgres;

pub use errors::{StoreError, StoreResult};
pub use memory::MemorySessionStore;
pub use postgres::PgSessionStore;

/// Trait for session store operations
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session
    async fn get(&self, id: SessionId) -> StoreResult<SessionRecord>;

    /// Store a new session under a fresh id. The returned record carries the
    /// assigned id and version 1.
    async fn insert(&self, record: SessionRecord) -> StoreResult<SessionRecord>;

    /// Overwrite a session unconditionally, bumping its version. Returns the
    /// stored record.
    async fn put(&self, id: SessionId, record: SessionRecord) -> StoreResult<SessionRecord>;

    /// Overwrite a session only if its stored version is `expected_version`.
    /// The stored record gets `expected_version + 1` and is returned.
    async fn replace_if_version(
        &self,
        id: SessionId,
        expected_version: u64,
        record: SessionRecord,
    ) -> StoreResult<SessionRecord>;

    /// Remove a session
    async fn delete(&self, id: SessionId) -> StoreResult<()>;

    /// Find a session by its invite code (case-insensitive)
    async fn find_by_invite_code(&self, code: &str) -> StoreResult<Option<SessionRecord>>;

    /// Sessions still waiting for players, oldest first
    async fn list_joinable(&self) -> StoreResult<Vec<SessionRecord>>;
}
