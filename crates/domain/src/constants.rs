//! Domain constants
//!
//! Defaults shared by the queue configuration and the persistence layer.

// Retry policy
pub const DEFAULT_MAX_RETRY_COUNT: u32 = 3;

// Persistence
pub const DEFAULT_STORAGE_KEY: &str = "offline_action_queue";
pub const PERSISTENCE_VERSION: u32 = 1;

// Processor timing
pub const DEFAULT_EXECUTOR_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 300_000;

// Executor failure reasons are truncated before logging
pub const MAX_FAILURE_REASON_LEN: usize = 256;
