//! SQLite key-value store implementation.
//!
//! Implements `KvStore` from `switchboard-core` using sqlx with split read/write pools.
//! Values are stored as JSON text and deserialized on read.

use chrono::Utc;
use sqlx::Row;

use switchboard_core::storage::KvStore;
use switchboard_types::error::RepositoryError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `KvStore`.
pub struct SqliteKvStore {
    pool: DatabasePool,
}

impl SqliteKvStore {
    /// Create a new KV store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

fn to_json_text(value: &serde_json::Value) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

fn from_json_text(text: &str) -> Result<serde_json::Value, RepositoryError> {
    serde_json::from_str(text)
        .map_err(|e| RepositoryError::Serialization(format!("invalid JSON value: {e}")))
}

impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, RepositoryError> {
        let row = sqlx::query("SELECT value FROM kv_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let value: String = row.try_get("value").map_err(query_err)?;
                Ok(Some(from_json_text(&value)?))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let value = to_json_text(value)?;

        sqlx::query(
            r#"INSERT INTO kv_entries (key, value, created_at, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
        )
        .bind(key)
        .bind(&value)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        sqlx::query("DELETE FROM kv_entries WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        sqlx::query("DELETE FROM kv_list_items WHERE list_key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        tx.commit().await.map_err(query_err)?;

        Ok(())
    }

    async fn push_front(
        &self,
        key: &str,
        value: &serde_json::Value,
        max_len: usize,
    ) -> Result<(), RepositoryError> {
        let value = to_json_text(value)?;
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        sqlx::query("INSERT INTO kv_list_items (list_key, value, created_at) VALUES (?, ?, ?)")
            .bind(key)
            .bind(&value)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        sqlx::query(
            r#"DELETE FROM kv_list_items
               WHERE list_key = ?
                 AND id NOT IN (
                     SELECT id FROM kv_list_items WHERE list_key = ? ORDER BY id DESC LIMIT ?
                 )"#,
        )
        .bind(key)
        .bind(key)
        .bind(max_len as i64)
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        tx.commit().await.map_err(query_err)?;
        Ok(())
    }

    async fn list(&self, key: &str, limit: usize) -> Result<Vec<serde_json::Value>, RepositoryError> {
        let rows = sqlx::query("SELECT value FROM kv_list_items WHERE list_key = ? ORDER BY id DESC LIMIT ?")
            .bind(key)
            .bind(limit as i64)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut values = Vec::with_capacity(rows.len());
        for row in &rows {
            let value: String = row.try_get("value").map_err(query_err)?;
            values.push(from_json_text(&value)?);
        }
        Ok(values)
    }
}
