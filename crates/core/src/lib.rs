//! # relayq Core
//!
//! Queue logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for storage, connectivity and executors
//! - The action registry
//! - The queue processor state machine and its facade
//!
//! ## Architecture Principles
//! - Only depends on `relayq-domain`
//! - No filesystem, database or platform code
//! - All external dependencies via traits

pub mod sync;

pub use sync::{
    ActionExecutor, ActionQueue, ActionRegistry, ConnectivityMonitor, KeyValueStore, PassReport,
    PersistentStore, QueueHandle, QueueMetrics, QueueMetricsSnapshot,
};
