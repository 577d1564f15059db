//! Offline action queue and synchronization engine
//!
//! ## Submodules
//!
//! - **`ports`**: host-supplied capabilities (key/value store, connectivity,
//!   executors)
//! - **`registry`**: action type → executor dispatch
//! - **`store`**: queue persistence on top of the key/value port
//! - **`processor`**: the Idle/Processing state machine draining the queue
//! - **`service`**: the public facade and processor lifecycle
//! - **`metrics`**: counters for monitoring
//! - **`backoff`**: delays for optional timed retry passes

pub mod backoff;
pub mod metrics;
pub mod ports;
mod processor;
pub mod registry;
mod service;
pub mod store;

pub use metrics::{QueueMetrics, QueueMetricsSnapshot};
pub use ports::{ActionExecutor, ConnectivityMonitor, KeyValueStore};
pub use processor::PassReport;
pub use registry::ActionRegistry;
pub use service::{ActionQueue, QueueHandle};
pub use store::PersistentStore;
