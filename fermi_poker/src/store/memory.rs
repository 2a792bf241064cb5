//! In-process session store.

use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicI64, Ordering},
};
use tokio::sync::RwLock;

use super::{SessionStore, StoreError, StoreResult};
use crate::game::entities::{SessionId, SessionRecord, SessionStatus};

/// Session store backed by a map in memory. Used by tests and by the
/// simulator when no database is configured.
#[derive(Debug)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, SessionRecord>>,
    next_id: AtomicI64,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of stored sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: SessionId) -> StoreResult<SessionRecord> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn insert(&self, mut record: SessionRecord) -> StoreResult<SessionRecord> {
        let mut sessions = self.sessions.write().await;
        if sessions
            .values()
            .any(|s| s.invite_code.eq_ignore_ascii_case(&record.invite_code))
        {
            return Err(StoreError::DuplicateInviteCode(record.invite_code));
        }

        record.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        record.version = 1;
        sessions.insert(record.id, record.clone());
        Ok(record)
    }

    async fn put(&self, id: SessionId, mut record: SessionRecord) -> StoreResult<SessionRecord> {
        let mut sessions = self.sessions.write().await;
        let current = sessions.get(&id).ok_or(StoreError::NotFound(id))?;
        record.id = id;
        record.version = current.version + 1;
        sessions.insert(id, record.clone());
        Ok(record)
    }

    async fn replace_if_version(
        &self,
        id: SessionId,
        expected_version: u64,
        mut record: SessionRecord,
    ) -> StoreResult<SessionRecord> {
        let mut sessions = self.sessions.write().await;
        let current = sessions.get(&id).ok_or(StoreError::NotFound(id))?;
        if current.version != expected_version {
            return Err(StoreError::Conflict {
                id,
                expected: expected_version,
            });
        }

        record.id = id;
        record.version = expected_version + 1;
        sessions.insert(id, record.clone());
        Ok(record)
    }

    async fn delete(&self, id: SessionId) -> StoreResult<()> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn find_by_invite_code(&self, code: &str) -> StoreResult<Option<SessionRecord>> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .find(|s| s.invite_code.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn list_joinable(&self) -> StoreResult<Vec<SessionRecord>> {
        let mut joinable: Vec<SessionRecord> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.status == SessionStatus::Waiting)
            .cloned()
            .collect();
        joinable.sort_by_key(|s| s.id);
        Ok(joinable)
    }
}
