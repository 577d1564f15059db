//! Port interfaces for the offline action queue
//!
//! The queue consumes three host-supplied capabilities: a durable key/value
//! blob store, a reachability signal, and one executor per action type.

use async_trait::async_trait;
use relayq_domain::{ExecutionError, Result};
use serde_json::Value;
use tokio::sync::watch;

/// Durable key/value persistence for opaque blobs.
///
/// `save` must replace the previous value atomically: a reader never observes
/// a partially written blob.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the blob stored under `key`, `None` when nothing was written yet.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the blob stored under `key`.
    async fn save(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// Network reachability source.
pub trait ConnectivityMonitor: Send + Sync {
    /// Current reachability.
    fn is_online(&self) -> bool;

    /// Change stream of reachability. Receivers are notified on transitions;
    /// repeated values are tolerated by consumers.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Performs the real effect of one action type against the backend.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Execute one action with its opaque payload.
    async fn execute(&self, payload: &Value) -> std::result::Result<(), ExecutionError>;
}
