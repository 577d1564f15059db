//! # relayq Infrastructure
//!
//! Concrete adapters for the ports declared in `relayq-core`.
//!
//! This crate contains:
//! - Key/value stores (atomic files, SQLite, in-memory)
//! - A manually driven connectivity monitor
//! - Configuration loading from environment and files
//! - Tracing subscriber setup
//!
//! ## Architecture
//! - Implements traits defined in `relayq-core`
//! - Contains all "impure" code (filesystem, SQLite, process environment)

pub mod config;
pub mod connectivity;
pub mod errors;
pub mod observability;
pub mod storage;

// Re-export commonly used items
pub use connectivity::ManualConnectivity;
pub use storage::{build_store, FileKeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};
