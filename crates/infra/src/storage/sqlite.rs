//! SQLite-backed key/value store.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use relayq_core::KeyValueStore;
use relayq_domain::Result;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::task;
use tracing::{info, warn};

use crate::errors::{map_join_error, InfraError};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY NOT NULL,
    value BLOB NOT NULL,
    updated_at INTEGER NOT NULL
);";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Single-connection SQLite store. Each `save` is one upsert statement, which
/// SQLite applies atomically.
#[derive(Clone)]
pub struct SqliteKeyValueStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteKeyValueStore {
    /// Open (or create) the database file at `path` and ensure the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path).map_err(InfraError::from)?;
        let store = Self::with_connection(conn, Some(path))?;
        info!(db_path = ?store.path, "sqlite key/value store opened");
        Ok(store)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(InfraError::from)?;
        Self::with_connection(conn, None)
    }

    fn with_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT).map_err(InfraError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(InfraError::from)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)), path })
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
        warn!("sqlite connection mutex poisoned, recovering");
        poisoned.into_inner()
    })
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = Arc::clone(&self.conn);
        let key = key.to_string();

        task::spawn_blocking(move || -> Result<Option<Vec<u8>>> {
            let conn = lock(&conn);
            let value = conn
                .query_row("SELECT value FROM kv WHERE key = ?1", params![&key], |row| row.get(0))
                .optional()
                .map_err(InfraError::from)?;
            Ok(value)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn save(&self, key: &str, value: &[u8]) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let key = key.to_string();
        let value = value.to_vec();

        task::spawn_blocking(move || -> Result<()> {
            let conn = lock(&conn);
            conn.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                params![&key, &value, Utc::now().timestamp_millis()],
            )
            .map_err(InfraError::from)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

impl std::fmt::Debug for SqliteKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteKeyValueStore").field("path", &self.path).finish_non_exhaustive()
    }
}
