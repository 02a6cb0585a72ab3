//! Durable entity store backed by SQLite.
//!
//! Entities are stored as JSON bodies keyed by `(kind, id)`; the ledger
//! cursor lives in a single-row table. A block commit is one transaction, so
//! a crash leaves either the previous block's state or the new one.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;

use super::{EntityStore, StoreError, StoreResult};
use crate::entities::{Entity, EntityKey, EntityKind, StoredEntity};
use crate::events::LedgerCursor;

/// SQLite-backed entity store.
///
/// Uses a single pooled connection: processing is strictly sequential, and
/// an in-memory database only lives as long as its connection.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

fn encode_body(entity: &Entity) -> serde_json::Result<String> {
    match entity {
        Entity::Event(e) => serde_json::to_string(e),
        Entity::Account(a) => serde_json::to_string(a),
        Entity::Rsvp(r) => serde_json::to_string(r),
        Entity::Confirmation(c) => serde_json::to_string(c),
    }
}

fn decode_body(kind: EntityKind, body: &str) -> serde_json::Result<Entity> {
    Ok(match kind {
        EntityKind::Event => Entity::Event(serde_json::from_str(body)?),
        EntityKind::Account => Entity::Account(serde_json::from_str(body)?),
        EntityKind::Rsvp => Entity::Rsvp(serde_json::from_str(body)?),
        EntityKind::Confirmation => Entity::Confirmation(serde_json::from_str(body)?),
    })
}

fn to_i64(value: u64, column: &'static str) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| StoreError::OutOfRange(column))
}

fn to_u64(value: i64, column: &'static str) -> StoreResult<u64> {
    u64::try_from(value).map_err(|_| StoreError::OutOfRange(column))
}

impl SqliteStore {
    /// Opens (creating if missing) the database at `url` and runs migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the database cannot be
    /// opened, or migrations fail.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!(url, "entity store ready");

        Ok(Self { pool })
    }

    /// Opens a fresh in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect("sqlite::memory:").await
    }

    /// Returns every committed entity of one family, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure or a corrupt body.
    pub async fn list<T: StoredEntity + DeserializeOwned>(&self) -> StoreResult<Vec<T>> {
        let rows = sqlx::query("SELECT body FROM entities WHERE kind = ?1 ORDER BY id")
            .bind(T::KIND.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> StoreResult<T> {
                let body: String = row.try_get("body")?;
                Ok(serde_json::from_str(&body)?)
            })
            .collect()
    }

    /// Returns the number of committed entities of one family.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn count(&self, kind: EntityKind) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entities WHERE kind = ?1")
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await?;
        to_u64(count, "count")
    }

    /// Returns the number of committed entities per family, ordered by kind.
    ///
    /// Families without entities are omitted.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure or an unknown stored kind.
    pub async fn counts(&self) -> StoreResult<Vec<(EntityKind, u64)>> {
        let rows =
            sqlx::query("SELECT kind, COUNT(*) AS n FROM entities GROUP BY kind ORDER BY kind")
                .fetch_all(&self.pool)
                .await?;

        rows.iter()
            .map(|row| -> StoreResult<(EntityKind, u64)> {
                let name: String = row.try_get("kind")?;
                let n: i64 = row.try_get("n")?;
                let kind = EntityKind::from_name(&name).ok_or_else(|| StoreError::Corrupt {
                    key: name.clone(),
                    reason: "unknown entity kind".to_string(),
                })?;
                Ok((kind, to_u64(n, "count")?))
            })
            .collect()
    }

    /// Closes the underlying connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn cursor_from_row(row: &SqliteRow) -> StoreResult<LedgerCursor> {
        let last_block: Option<i64> = row.try_get("last_block")?;
        let blocks_processed: i64 = row.try_get("blocks_processed")?;
        let events_processed: i64 = row.try_get("events_processed")?;
        let updated_at: Option<DateTime<Utc>> = row.try_get("updated_at")?;

        Ok(LedgerCursor {
            last_block: last_block.map(|b| to_u64(b, "last_block")).transpose()?,
            blocks_processed: to_u64(blocks_processed, "blocks_processed")?,
            events_processed: to_u64(events_processed, "events_processed")?,
            updated_at,
        })
    }
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn load(&self, key: &EntityKey) -> StoreResult<Option<Entity>> {
        let row = sqlx::query("SELECT body FROM entities WHERE kind = ?1 AND id = ?2")
            .bind(key.kind.as_str())
            .bind(key.id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let body: String = row.try_get("body")?;
        decode_body(key.kind, &body)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn cursor(&self) -> StoreResult<LedgerCursor> {
        let row = sqlx::query(
            "SELECT last_block, blocks_processed, events_processed, updated_at \
             FROM ledger_cursor WHERE id = 0",
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::cursor_from_row(&row),
            None => Ok(LedgerCursor::new()),
        }
    }

    async fn commit(&self, writes: Vec<Entity>, cursor: &LedgerCursor) -> StoreResult<()> {
        let last_block = cursor
            .last_block
            .map(|b| to_i64(b, "last_block"))
            .transpose()?;
        let blocks_processed = to_i64(cursor.blocks_processed, "blocks_processed")?;
        let events_processed = to_i64(cursor.events_processed, "events_processed")?;

        let mut tx = self.pool.begin().await?;

        for entity in &writes {
            let body = encode_body(entity)?;
            sqlx::query(
                "INSERT INTO entities (kind, id, body) VALUES (?1, ?2, ?3) \
                 ON CONFLICT (kind, id) DO UPDATE SET body = excluded.body",
            )
            .bind(entity.kind().as_str())
            .bind(entity.key().id)
            .bind(body)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO ledger_cursor \
             (id, last_block, blocks_processed, events_processed, updated_at) \
             VALUES (0, ?1, ?2, ?3, ?4) \
             ON CONFLICT (id) DO UPDATE SET \
             last_block = excluded.last_block, \
             blocks_processed = excluded.blocks_processed, \
             events_processed = excluded.events_processed, \
             updated_at = excluded.updated_at",
        )
        .bind(last_block)
        .bind(blocks_processed)
        .bind(events_processed)
        .bind(cursor.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(writes = writes.len(), last_block = ?cursor.last_block, "block committed");
        Ok(())
    }
}
