//! Key/value store adapters for queue persistence.
//!
//! Every adapter replaces a key's blob atomically, so a crash mid-write leaves
//! either the previous or the new queue on disk, never a torn one.

mod file;
mod memory;
mod sqlite;

use std::sync::Arc;

pub use file::FileKeyValueStore;
pub use memory::MemoryKeyValueStore;
use relayq_core::KeyValueStore;
use relayq_domain::{Result, StorageBackend, StorageConfig};
pub use sqlite::SqliteKeyValueStore;
use tracing::info;

/// Build the adapter selected by `config`.
///
/// # Errors
/// Returns `QueueError::Config` for an invalid configuration and
/// `QueueError::Storage` when the SQLite database cannot be opened.
pub fn build_store(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>> {
    config.validate()?;

    let store: Arc<dyn KeyValueStore> = match config.backend {
        StorageBackend::File => Arc::new(FileKeyValueStore::new(&config.path)),
        StorageBackend::Sqlite => Arc::new(SqliteKeyValueStore::open(&config.path)?),
        StorageBackend::Memory => Arc::new(MemoryKeyValueStore::new()),
    };

    info!(backend = %config.backend, path = %config.path.display(), "Queue storage ready");
    Ok(store)
}
