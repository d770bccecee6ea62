use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::Row;

use deskbot_core::errors::StoreError;
use deskbot_core::ports::StateStore;

use super::RepositoryError;
use crate::DbPool;

/// Key/value state persisted in the `state_entry` table as JSON text.
pub struct SqlStateStore {
    pool: DbPool,
}

impl SqlStateStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn load(&self, key: &str) -> Result<Option<Value>, RepositoryError> {
        let row = sqlx::query("SELECT value_json FROM state_entry WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            let raw = row.try_get::<String, _>("value_json")?;
            serde_json::from_str::<Value>(&raw).map_err(|error| RepositoryError::Decode {
                key: key.to_string(),
                detail: error.to_string(),
            })
        })
        .transpose()
    }

    pub async fn store(&self, key: &str, value: &Value) -> Result<(), RepositoryError> {
        let raw = serde_json::to_string(value).map_err(|error| RepositoryError::Encode {
            key: key.to_string(),
            detail: error.to_string(),
        })?;

        sqlx::query(
            "INSERT INTO state_entry (key, value_json, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                value_json = excluded.value_json,
                updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(raw)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Keys starting with `prefix`, sorted.
    pub async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT key FROM state_entry WHERE substr(key, 1, length(?)) = ? ORDER BY key ASC",
        )
        .bind(prefix)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| row.try_get::<String, _>("key").map_err(RepositoryError::from))
            .collect()
    }
}

#[async_trait]
impl StateStore for SqlStateStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.load(key).await?)
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        Ok(self.store(key, &value).await?)
    }
}
