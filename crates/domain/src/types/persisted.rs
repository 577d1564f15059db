//! Persisted representation of the queue.

use serde::{Deserialize, Serialize};

use crate::constants::PERSISTENCE_VERSION;
use crate::errors::Result;
use crate::types::action::QueuedAction;

/// Versioned envelope written under the queue's storage key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedQueue {
    pub version: u32,
    /// Write time in milliseconds since the Unix epoch.
    pub saved_at: i64,
    pub actions: Vec<QueuedAction>,
}

/// Accepted on-disk layouts. Older clients stored a bare JSON array.
#[derive(Deserialize)]
#[serde(untagged)]
enum PersistedLayout {
    Envelope(PersistedQueue),
    Legacy(Vec<QueuedAction>),
}

impl PersistedQueue {
    pub fn new(actions: Vec<QueuedAction>, saved_at: i64) -> Self {
        Self { version: PERSISTENCE_VERSION, saved_at, actions }
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode either the envelope or the legacy array layout.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        match serde_json::from_slice::<PersistedLayout>(bytes)? {
            PersistedLayout::Envelope(queue) => Ok(queue),
            PersistedLayout::Legacy(actions) => Ok(Self::new(actions, 0)),
        }
    }
}
