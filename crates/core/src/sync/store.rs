//! Persistent store for the action queue
//!
//! Serializes the whole queue into a single versioned blob and writes it under
//! one well-known key of the host's [`KeyValueStore`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use relayq_domain::constants::PERSISTENCE_VERSION;
use relayq_domain::{PersistedQueue, QueuedAction, Result};
use tracing::{debug, info, instrument, warn};

use super::ports::KeyValueStore;

/// Queue persistence on top of a key/value blob store.
#[derive(Clone)]
pub struct PersistentStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
}

impl PersistentStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self { backend, key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the previously persisted queue.
    ///
    /// Never fails: a missing blob, an unreadable backend or an undecodable
    /// blob all yield an empty queue. Duplicate ids keep their first
    /// occurrence.
    #[instrument(skip(self), fields(key = %self.key))]
    pub async fn load(&self) -> Vec<QueuedAction> {
        let start = Instant::now();

        let bytes = match self.backend.load(&self.key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("No persisted queue found");
                return Vec::new();
            }
            Err(err) => {
                warn!(error = %err, "Failed to read persisted queue; starting empty");
                return Vec::new();
            }
        };

        let persisted = match PersistedQueue::from_slice(&bytes) {
            Ok(persisted) => persisted,
            Err(err) => {
                warn!(error = %err, bytes = bytes.len(), "Persisted queue is corrupt; starting empty");
                return Vec::new();
            }
        };

        if persisted.version != PERSISTENCE_VERSION {
            warn!(
                "Persistence version mismatch: expected {}, got {}",
                PERSISTENCE_VERSION, persisted.version
            );
        }

        let total = persisted.actions.len();
        let mut seen = HashSet::with_capacity(total);
        let actions: Vec<QueuedAction> =
            persisted.actions.into_iter().filter(|action| seen.insert(action.id.clone())).collect();

        if actions.len() != total {
            warn!(duplicates = total - actions.len(), "Dropped duplicate action ids on load");
        }

        info!("Loaded {} actions in {:?}", actions.len(), start.elapsed());
        actions
    }

    /// Serialize and atomically write the full queue.
    #[instrument(skip(self, actions), fields(key = %self.key, action_count = actions.len()))]
    pub async fn save(&self, actions: &[QueuedAction]) -> Result<()> {
        let persisted = PersistedQueue::new(actions.to_vec(), Utc::now().timestamp_millis());
        let bytes = persisted.to_vec()?;
        self.backend.save(&self.key, &bytes).await?;
        debug!(bytes = bytes.len(), "Persisted action queue");
        Ok(())
    }
}
