use std::{future::Future, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

use crate::config::DatabaseConfig;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated")]
    UniqueViolation,
    #[error("referenced row does not exist")]
    ForeignKeyViolation,
    #[error("check constraint violated")]
    CheckViolation,
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        let code = e
            .as_database_error()
            .and_then(|db| db.code())
            .map(|c| c.into_owned());
        match code.as_deref() {
            Some("23505") => StoreError::UniqueViolation,
            Some("23503") => StoreError::ForeignKeyViolation,
            Some("23514") => StoreError::CheckViolation,
            _ => StoreError::Database(e),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Runs one store call under the per-call deadline.
pub async fn bounded<T, F>(limit: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}

/// Postgres-backed implementation of every repository trait.
#[derive(Clone)]
pub struct PgStore {
    pub(crate) db: PgPool,
    pub(crate) timeout: Duration,
}

impl PgStore {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(cfg.call_timeout)
        .connect(&cfg.url)
        .await
        .context("connect to database")
}

pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_times_out_slow_calls() {
        let limit = Duration::from_millis(10);
        let res: StoreResult<()> = bounded(limit, async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        assert!(matches!(res, Err(StoreError::Timeout(d)) if d == limit));
    }

    #[tokio::test]
    async fn bounded_passes_results_through() {
        let ok = bounded(Duration::from_secs(1), async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: StoreResult<()> =
            bounded(Duration::from_secs(1), async { Err(StoreError::UniqueViolation) }).await;
        assert!(matches!(err, Err(StoreError::UniqueViolation)));
    }
}
