//! Session writes against a store that never accepts a compare-and-swap.

use async_trait::async_trait;
use fermi_poker::{
    game::{GameError, SessionConfig, SessionId, SessionRecord},
    questions::BuiltinQuestions,
    session::{ChangeKind, SessionManager, SessionTiming},
    store::{MemorySessionStore, SessionStore, StoreError, StoreResult},
};
use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};
use tokio::sync::broadcast::error::TryRecvError;

/// Memory store where every versioned write loses the race.
#[derive(Default)]
struct ContendedStore {
    inner: MemorySessionStore,
    replace_calls: AtomicU32,
}

#[async_trait]
impl SessionStore for ContendedStore {
    async fn get(&self, id: SessionId) -> StoreResult<SessionRecord> {
        self.inner.get(id).await
    }

    async fn insert(&self, record: SessionRecord) -> StoreResult<SessionRecord> {
        self.inner.insert(record).await
    }

    async fn put(&self, id: SessionId, record: SessionRecord) -> StoreResult<SessionRecord> {
        self.inner.put(id, record).await
    }

    async fn replace_if_version(
        &self,
        id: SessionId,
        expected_version: u64,
        _record: SessionRecord,
    ) -> StoreResult<SessionRecord> {
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Conflict {
            id,
            expected: expected_version,
        })
    }

    async fn delete(&self, id: SessionId) -> StoreResult<()> {
        self.inner.delete(id).await
    }

    async fn find_by_invite_code(&self, code: &str) -> StoreResult<Option<SessionRecord>> {
        self.inner.find_by_invite_code(code).await
    }

    async fn list_joinable(&self) -> StoreResult<Vec<SessionRecord>> {
        self.inner.list_joinable().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_write_gives_up_after_max_attempts() {
    let store = Arc::new(ContendedStore::default());
    let timing = SessionTiming::fast();
    let max_attempts = timing.max_write_attempts;
    let manager = SessionManager::new(store.clone(), Arc::new(BuiltinQuestions), timing);
    let mut feed = manager.subscribe();

    let session = manager
        .create_session("Busy table", 1, "ada", SessionConfig::default())
        .await
        .unwrap();
    assert_eq!(feed.recv().await.unwrap().kind, ChangeKind::Inserted);

    let err = manager
        .join_session(session.id, 2, "grace")
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::StoreConflict));
    assert!(err.is_retryable());
    assert_eq!(store.replace_calls.load(Ordering::SeqCst), max_attempts);

    let stored = store.get(session.id).await.unwrap();
    assert_eq!(stored, session);
    assert!(!stored.players.contains_key(&2));
    assert!(matches!(feed.try_recv(), Err(TryRecvError::Empty)));

    // The actor survives the failed write and still serves the stored state.
    let current = manager.get_session(session.id).await.unwrap();
    assert_eq!(current, session);
}
