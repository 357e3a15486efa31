//! SQLite-backed key/value store.
//!
//! Implements the `KeyValueStore` port over the `kv` table. Values are stored
//! as JSON text. All database operations run in `spawn_blocking` to avoid
//! blocking the async runtime.

use std::sync::Arc;

use async_trait::async_trait;
use fluffer_core::KeyValueStore;
use fluffer_domain::{FlufferError, Result as DomainResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tokio::task;
use tracing::instrument;

use super::manager::{map_sql_error, DbManager};
use crate::errors::InfraError;

pub struct SqliteKeyValueStore {
    db: Arc<DbManager>,
}

impl SqliteKeyValueStore {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn blocking<T, F>(&self, op: F) -> DomainResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> DomainResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = db.get_connection()?;
            op(&conn)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> DomainResult<Option<Value>> {
        let key = key.to_string();
        self.blocking(move |conn| query_value(conn, &key)).await
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: Value) -> DomainResult<()> {
        let key = key.to_string();
        self.blocking(move |conn| upsert_value(conn, &key, &value)).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> DomainResult<()> {
        let key = key.to_string();
        self.blocking(move |conn| {
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key]).map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    async fn scan(&self, prefix: &str) -> DomainResult<Vec<(String, Value)>> {
        let prefix = prefix.to_string();
        self.blocking(move |conn| query_prefix(conn, &prefix)).await
    }
}

// ============================================================================
// Synchronous SQL Operations (called inside spawn_blocking)
// ============================================================================

fn query_value(conn: &Connection, key: &str) -> DomainResult<Option<Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
        .optional()
        .map_err(map_sql_error)?;
    raw.map(|text| decode(key, &text)).transpose()
}

fn upsert_value(conn: &Connection, key: &str, value: &Value) -> DomainResult<()> {
    let text = serde_json::to_string(value).map_err(|e| FlufferError::from(InfraError::from(e)))?;
    let now = chrono::Utc::now().timestamp();
    conn.execute(
        "INSERT INTO kv (key, value, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at",
        params![key, text, now],
    )
    .map_err(map_sql_error)?;
    Ok(())
}

fn query_prefix(conn: &Connection, prefix: &str) -> DomainResult<Vec<(String, Value)>> {
    let mut stmt = conn
        .prepare(
            "SELECT key, value FROM kv
             WHERE substr(key, 1, length(?1)) = ?1
             ORDER BY key",
        )
        .map_err(map_sql_error)?;
    let rows = stmt
        .query_map(params![prefix], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(map_sql_error)?;

    let mut entries = Vec::new();
    for row in rows {
        let (key, text) = row.map_err(map_sql_error)?;
        let value = decode(&key, &text)?;
        entries.push((key, value));
    }
    Ok(entries)
}

fn decode(key: &str, text: &str) -> DomainResult<Value> {
    serde_json::from_str(text)
        .map_err(|e| FlufferError::Database(format!("Corrupt value at {key}: {e}")))
}

fn map_join_error(err: task::JoinError) -> FlufferError {
    if err.is_cancelled() {
        FlufferError::Internal("database task cancelled".into())
    } else {
        FlufferError::Internal(format!("database task panicked: {err}"))
    }
}
