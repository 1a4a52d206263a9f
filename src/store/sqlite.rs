//! SQLite-backed [`KvStore`].
//!
//! Values are stored as JSON text in the `kv_store` table created by
//! [`run_migrations`](crate::migrate::run_migrations). Each `set` is a
//! single upsert statement.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use super::KvStore;
use crate::config::Config;
use crate::db;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and make sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        crate::migrate::migrate_pool(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let raw: String = row.get("value");
                let value = serde_json::from_str(&raw)
                    .with_context(|| format!("Stored value for '{}' is not valid JSON", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(raw)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
