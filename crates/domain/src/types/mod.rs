//! Domain types and models

pub mod action;
pub mod persisted;

use serde::{Deserialize, Serialize};

pub use action::{ActionType, QueuedAction};
pub use persisted::PersistedQueue;

use crate::impl_domain_status_conversions;

/// Processor state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorState {
    /// No pass is running; waiting for a connectivity or enqueue event.
    #[default]
    Idle,
    /// A pass is draining the queue.
    Processing,
}

impl_domain_status_conversions!(ProcessorState {
    Idle => "idle",
    Processing => "processing",
});
