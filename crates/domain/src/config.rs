//! Configuration management

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_MAX_MS, DEFAULT_EXECUTOR_TIMEOUT_MS,
    DEFAULT_JOIN_TIMEOUT_MS, DEFAULT_MAX_RETRY_COUNT, DEFAULT_STORAGE_KEY,
};
use crate::errors::{QueueError, Result};
use crate::impl_domain_status_conversions;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.queue.validate()?;
        self.storage.validate()
    }
}

/// Queue and processor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Failed attempts after which an action is dropped.
    pub max_retry_count: u32,
    /// Key under which the queue blob is stored.
    pub storage_key: String,
    /// Upper bound on a single executor invocation; `None` waits forever.
    pub executor_timeout_ms: Option<u64>,
    /// Timed re-trigger after a pass that left failed actions behind.
    pub retry_backoff: Option<BackoffConfig>,
    /// How long `stop()` waits for the processor task.
    pub join_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            executor_timeout_ms: Some(DEFAULT_EXECUTOR_TIMEOUT_MS),
            retry_backoff: None,
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
        }
    }
}

impl QueueConfig {
    pub fn executor_timeout(&self) -> Option<Duration> {
        self.executor_timeout_ms.map(Duration::from_millis)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_retry_count == 0 {
            return Err(QueueError::Config("max_retry_count must be at least 1".to_string()));
        }

        if self.storage_key.trim().is_empty() {
            return Err(QueueError::Config("storage_key must not be empty".to_string()));
        }

        if self.executor_timeout_ms == Some(0) {
            return Err(QueueError::Config(
                "executor_timeout_ms must be greater than 0 (omit it to disable)".to_string(),
            ));
        }

        if self.join_timeout_ms == 0 {
            return Err(QueueError::Config("join_timeout_ms must be greater than 0".to_string()));
        }

        if let Some(ref backoff) = self.retry_backoff {
            backoff.validate()?;
        }

        Ok(())
    }
}

/// Exponential backoff for timed retry passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self { base_delay_ms: DEFAULT_BACKOFF_BASE_MS, max_delay_ms: DEFAULT_BACKOFF_MAX_MS }
    }
}

impl BackoffConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_delay_ms == 0 {
            return Err(QueueError::Config("backoff base delay must be greater than 0".to_string()));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(QueueError::Config(
                "backoff max delay cannot be smaller than the base delay".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which key/value adapter backs the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Sqlite,
    Memory,
}

impl_domain_status_conversions!(StorageBackend {
    File => "file",
    Sqlite => "sqlite",
    Memory => "memory",
});

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for the file backend, database file for sqlite.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { backend: StorageBackend::File, path: PathBuf::from("relayq-data") }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backend != StorageBackend::Memory && self.path.as_os_str().is_empty() {
            return Err(QueueError::Config(format!(
                "storage path required for the {} backend",
                self.backend
            )));
        }
        Ok(())
    }
}
