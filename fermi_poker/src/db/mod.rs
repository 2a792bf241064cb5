//! PostgreSQL pool and schema.
//!
//! The pool backs [`crate::store::PgSessionStore`] and
//! [`crate::questions::PgQuestionSource`].

use sqlx::postgres::{PgPool, PgPoolOptions};

pub mod config;

pub use config::{DatabaseConfig, DatabaseConfigError};

/// Tables used by the session store and the question bank.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS fermi_sessions (
        id BIGSERIAL PRIMARY KEY,
        invite_code TEXT NOT NULL UNIQUE,
        status TEXT NOT NULL,
        version BIGINT NOT NULL,
        record TEXT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE INDEX IF NOT EXISTS fermi_sessions_status_idx ON fermi_sessions (status)",
    "CREATE TABLE IF NOT EXISTS fermi_questions (
        id BIGSERIAL PRIMARY KEY,
        question_text TEXT NOT NULL,
        answer DOUBLE PRECISION NOT NULL,
        hint1 TEXT NOT NULL,
        hint2 TEXT NOT NULL,
        category TEXT NOT NULL,
        difficulty TEXT NOT NULL
    )",
];

/// Shared PostgreSQL pool
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect a pool sized and timed by `config`
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fermi_poker::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), sqlx::Error> {
    ///     let db = Database::new(&DatabaseConfig::development()).await?;
    ///     db.migrate().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Underlying pool, for the stores
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the tables if they do not exist yet
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        log::info!("Database schema ready");
        Ok(())
    }

    /// Round-trip a trivial query
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Wait for checked-out connections and close the pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}
