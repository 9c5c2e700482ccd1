//! SQLite entity store.
//!
//! Persists entity snapshots as JSON rows in a single `entities` table, one
//! row per (family, key), with the version column enforcing the optimistic
//! compare-and-set. Uses `sqlx` with WAL mode for concurrent read
//! performance.
//!
//! # Usage
//! ```rust,ignore
//! use chainreduce_storage::sqlite::SqliteEntityStore;
//!
//! // File-backed (persistent)
//! let store: SqliteEntityStore<TokenBalance> =
//!     SqliteEntityStore::open("./entities.db", "balance").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store: SqliteEntityStore<TokenBalance> =
//!     SqliteEntityStore::in_memory("balance").await?;
//! ```

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use chainreduce_core::{Entity, EntityEvent, EntityStore, ReduceError};

/// SQLite-backed entity store for one entity family.
pub struct SqliteEntityStore<T> {
    pool: SqlitePool,
    family: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SqliteEntityStore<T> {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./entities.db"`) or a full
    /// SQLite URL (`"sqlite:./entities.db?mode=rwc"`).
    pub async fn open(path: &str, family: impl Into<String>) -> Result<Self, ReduceError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };
        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|e| ReduceError::Storage(e.to_string()))?;
        let store = Self {
            pool,
            family: family.into(),
            _marker: PhantomData,
        };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database. All data is lost when the pool is
    /// dropped. Ideal for tests.
    pub async fn in_memory(family: impl Into<String>) -> Result<Self, ReduceError> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .map_err(|e| ReduceError::Storage(e.to_string()))?;
        let store = Self {
            pool,
            family: family.into(),
            _marker: PhantomData,
        };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create the entities table and enable WAL mode.
    async fn init_schema(&self) -> Result<(), ReduceError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(|e| ReduceError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS entities (
                family     TEXT    NOT NULL,
                id         TEXT    NOT NULL,
                version    INTEGER NOT NULL,
                body       TEXT    NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (family, id)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ReduceError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn stored_version(&self, id: &str) -> Result<Option<u64>, ReduceError> {
        let row = sqlx::query("SELECT version FROM entities WHERE family = ? AND id = ?")
            .bind(&self.family)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ReduceError::Storage(e.to_string()))?;
        Ok(row.map(|r| r.get::<i64, _>("version") as u64))
    }
}

#[async_trait]
impl<T> EntityStore<T> for SqliteEntityStore<T>
where
    T: Entity + Serialize + DeserializeOwned,
{
    async fn get(
        &self,
        id: &<T::Event as EntityEvent>::EntityId,
    ) -> Result<Option<T>, ReduceError> {
        let row = sqlx::query("SELECT body FROM entities WHERE family = ? AND id = ?")
            .bind(&self.family)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ReduceError::Storage(e.to_string()))?;
        match row {
            Some(row) => {
                let body: String = row.get("body");
                let entity = serde_json::from_str(&body)
                    .map_err(|e| ReduceError::Storage(format!("corrupt entity body: {e}")))?;
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, entity: T) -> Result<T, ReduceError> {
        let key = entity.id().to_string();
        let version = entity.version();
        let body = serde_json::to_string(&entity)
            .map_err(|e| ReduceError::Storage(e.to_string()))?;
        let updated_at = chrono::Utc::now().timestamp();

        let result = if version == 1 {
            sqlx::query(
                "INSERT INTO entities (family, id, version, body, updated_at)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT (family, id) DO NOTHING",
            )
            .bind(&self.family)
            .bind(&key)
            .bind(version as i64)
            .bind(&body)
            .bind(updated_at)
            .execute(&self.pool)
            .await
        } else {
            sqlx::query(
                "UPDATE entities SET version = ?, body = ?, updated_at = ?
                 WHERE family = ? AND id = ? AND version = ?",
            )
            .bind(version as i64)
            .bind(&body)
            .bind(updated_at)
            .bind(&self.family)
            .bind(&key)
            .bind((version - 1) as i64)
            .execute(&self.pool)
            .await
        };

        let result = result.map_err(|e| ReduceError::Storage(e.to_string()))?;
        if result.rows_affected() == 0 {
            let expected = self.stored_version(&key).await?.map(|v| v + 1).unwrap_or(1);
            tracing::debug!(entity = %key, expected, found = version, "Optimistic write lost");
            return Err(ReduceError::VersionConflict {
                entity_id: key,
                expected,
                found: version,
            });
        }
        Ok(entity)
    }
}
