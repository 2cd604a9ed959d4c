//! SQLite implementation of the GrantStore trait.
//!
//! The primary persistence backend. Uses rusqlite with bundled SQLite,
//! wrapped in async via `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use payveil_core::{Address, ChainId};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::record::{GrantKey, StoredGrant};
use crate::traits::GrantStore;

/// SQLite-based grant store.
///
/// Thread-safe via an internal Mutex. Every operation runs on the blocking
/// pool.
pub struct SqliteGrantStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteGrantStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn decode_record(bytes: Vec<u8>) -> Result<StoredGrant> {
    StoredGrant::from_bytes(&bytes)
}

#[async_trait]
impl GrantStore for SqliteGrantStore {
    async fn get(&self, key: &GrantKey) -> Result<Option<StoredGrant>> {
        let storage_key = key.storage_key();
        let key = key.clone();

        self.with_conn(move |conn| {
            let bytes: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT record FROM grants WHERE storage_key = ?1",
                    params![storage_key],
                    |row| row.get(0),
                )
                .optional()?;

            match bytes {
                Some(bytes) => {
                    let record = decode_record(bytes)?;
                    if record.key != key {
                        return Err(StoreError::InvalidData(format!(
                            "record under {storage_key} carries a different key"
                        )));
                    }
                    Ok(Some(record))
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn put(&self, grant: &StoredGrant) -> Result<()> {
        let record = grant.to_bytes()?;
        let storage_key = grant.key.storage_key();
        let chain_id = grant.key.chain_id.get() as i64;
        let holder = grant.key.holder.as_bytes().to_vec();
        let issued_at = grant.issued_at;
        let expires_at = grant.expires_at();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO grants (storage_key, chain_id, holder, record, issued_at, expires_at, stored_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(storage_key) DO UPDATE SET
                    record = excluded.record,
                    issued_at = excluded.issued_at,
                    expires_at = excluded.expires_at,
                    stored_at = excluded.stored_at",
                params![storage_key, chain_id, holder, record, issued_at, expires_at, now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &GrantKey) -> Result<bool> {
        let storage_key = key.storage_key();

        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM grants WHERE storage_key = ?1",
                params![storage_key],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn list_for_holder(&self, chain_id: ChainId, holder: &Address) -> Result<Vec<StoredGrant>> {
        let chain_id = chain_id.get() as i64;
        let holder = holder.as_bytes().to_vec();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT record FROM grants
                 WHERE chain_id = ?1 AND holder = ?2
                 ORDER BY issued_at DESC",
            )?;

            let rows = stmt
                .query_map(params![chain_id, holder], |row| row.get::<_, Vec<u8>>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter().map(decode_record).collect()
        })
        .await
    }

    async fn purge_expired(&self, now: i64) -> Result<usize> {
        let removed = self
            .with_conn(move |conn| {
                let removed = conn.execute("DELETE FROM grants WHERE expires_at <= ?1", params![now])?;
                Ok(removed)
            })
            .await?;

        if removed > 0 {
            tracing::debug!(removed, "purged expired grants");
        }
        Ok(removed)
    }
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
