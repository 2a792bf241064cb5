//! PostgreSQL session store.
//!
//! Each session is one row of `fermi_sessions`: the full record as JSON plus
//! the columns queries need (`invite_code`, `status`, `version`). The version
//! column is what compare-and-swap checks.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::{SessionStore, StoreError, StoreResult};
use crate::game::entities::{SessionId, SessionRecord, SessionStatus};

/// Default PostgreSQL implementation of [`SessionStore`]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode(row: &sqlx::postgres::PgRow) -> StoreResult<SessionRecord> {
    let json: String = row.try_get("record")?;
    Ok(serde_json::from_str(&json)?)
}

fn map_insert_error(err: sqlx::Error, invite_code: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::DuplicateInviteCode(invite_code.to_string())
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get(&self, id: SessionId) -> StoreResult<SessionRecord> {
        let row = sqlx::query("SELECT record FROM fermi_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;

        decode(&row)
    }

    async fn insert(&self, mut record: SessionRecord) -> StoreResult<SessionRecord> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "INSERT INTO fermi_sessions (invite_code, status, version, record)
             VALUES ($1, $2, 1, '{}') RETURNING id",
        )
        .bind(&record.invite_code)
        .bind(record.status.to_string())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_insert_error(e, &record.invite_code))?;

        record.id = row.try_get("id")?;
        record.version = 1;

        sqlx::query("UPDATE fermi_sessions SET record = $1 WHERE id = $2")
            .bind(serde_json::to_string(&record)?)
            .bind(record.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn put(&self, id: SessionId, mut record: SessionRecord) -> StoreResult<SessionRecord> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT version FROM fermi_sessions WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        let current: i64 = row.try_get("version")?;

        record.id = id;
        record.version = current as u64 + 1;

        sqlx::query(
            "UPDATE fermi_sessions
             SET record = $1, status = $2, version = $3, updated_at = NOW()
             WHERE id = $4",
        )
        .bind(serde_json::to_string(&record)?)
        .bind(record.status.to_string())
        .bind(record.version as i64)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn replace_if_version(
        &self,
        id: SessionId,
        expected_version: u64,
        mut record: SessionRecord,
    ) -> StoreResult<SessionRecord> {
        record.id = id;
        record.version = expected_version + 1;

        let result = sqlx::query(
            "UPDATE fermi_sessions
             SET record = $1, status = $2, version = $3, updated_at = NOW()
             WHERE id = $4 AND version = $5",
        )
        .bind(serde_json::to_string(&record)?)
        .bind(record.status.to_string())
        .bind(record.version as i64)
        .bind(id)
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM fermi_sessions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .is_some();

            return Err(if exists {
                StoreError::Conflict {
                    id,
                    expected: expected_version,
                }
            } else {
                StoreError::NotFound(id)
            });
        }

        Ok(record)
    }

    async fn delete(&self, id: SessionId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM fermi_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn find_by_invite_code(&self, code: &str) -> StoreResult<Option<SessionRecord>> {
        let row = sqlx::query("SELECT record FROM fermi_sessions WHERE invite_code = UPPER($1)")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(decode).transpose()
    }

    async fn list_joinable(&self) -> StoreResult<Vec<SessionRecord>> {
        let rows = sqlx::query("SELECT record FROM fermi_sessions WHERE status = $1 ORDER BY id")
            .bind(SessionStatus::Waiting.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(decode).collect()
    }
}
