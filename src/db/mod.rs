use crate::auth::CredentialStore;
use crate::error::Error;
use async_trait::async_trait;
use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};
use std::path::Path;
use tracing::warn;

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn initialize_pool(path: &Path) -> Result<SqlitePool, Error> {
    let connect_options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePool::connect_with(connect_options).await?;
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Persists the session token in a single-row table so a restarted process
/// re-attaches to the same backend session.
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn token(&self) -> Option<String> {
        let row = sqlx::query("SELECT token FROM session WHERE id = 1")
            .fetch_optional(&self.pool)
            .await;

        match row {
            Ok(Some(row)) => row.try_get("token").ok(),
            Ok(None) => None,
            Err(error) => {
                warn!(%error, "failed to read session token");
                None
            }
        }
    }

    async fn store(&self, token: &str) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO session (id, token, updated_at_ms) VALUES (1, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET token=excluded.token, updated_at_ms=excluded.updated_at_ms",
        )
        .bind(token)
        .bind(crate::market::now_unix_ms())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        sqlx::query("DELETE FROM session WHERE id = 1")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
