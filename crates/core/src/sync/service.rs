//! Queue facade and processor lifecycle.
//!
//! [`ActionQueue`] owns the processor task; [`QueueHandle`] is the cheap,
//! cloneable entry point application code uses to enqueue and observe work.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use relayq_core::{ActionQueue, ActionRegistry, ConnectivityMonitor, KeyValueStore};
//! use relayq_domain::QueueConfig;
//! use serde_json::json;
//!
//! # async fn example(
//! #     store: Arc<dyn KeyValueStore>,
//! #     connectivity: Arc<dyn ConnectivityMonitor>,
//! #     registry: ActionRegistry,
//! # ) -> relayq_domain::Result<()> {
//! let mut queue =
//!     ActionQueue::new(QueueConfig::default(), store, connectivity, Arc::new(registry)).await?;
//! queue.start()?;
//!
//! let handle = queue.handle();
//! handle.enqueue("LIKE", json!({ "postId": "p1" })).await?;
//!
//! // ... application runs ...
//! queue.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::Utc;
use relayq_domain::{ActionType, ProcessorState, QueueConfig, QueueError, QueuedAction, Result};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::metrics::QueueMetricsSnapshot;
use super::ports::{ConnectivityMonitor, KeyValueStore};
use super::processor::{self, PassReport, Shared};
use super::registry::ActionRegistry;
use super::store::PersistentStore;

/// Offline action queue with explicit processor lifecycle management.
pub struct ActionQueue {
    handle: QueueHandle,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

/// Cloneable facade over a queue instance.
#[derive(Clone)]
pub struct QueueHandle {
    shared: Arc<Shared>,
}

impl ActionQueue {
    /// Build a queue and load its persisted state.
    ///
    /// # Errors
    /// Returns `QueueError::Config` when `config` is invalid. A missing or
    /// unreadable persisted queue is not an error; the queue starts empty.
    #[instrument(skip_all, fields(storage_key = %config.storage_key))]
    pub async fn new(
        config: QueueConfig,
        store: Arc<dyn KeyValueStore>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        registry: Arc<ActionRegistry>,
    ) -> Result<Self> {
        config.validate()?;

        let store = PersistentStore::new(store, config.storage_key.clone());
        let mut actions = store.load().await;

        // A blob written under a larger budget can hold exhausted actions.
        let loaded = actions.len();
        actions.retain(|action| {
            let keep = action.retry_count < config.max_retry_count;
            if !keep {
                warn!(
                    action_id = %action.id,
                    action_type = %action.action_type,
                    retry_count = action.retry_count,
                    max_retry_count = config.max_retry_count,
                    "Dropping persisted action that exhausted its retry budget"
                );
            }
            keep
        });
        let exhausted = loaded - actions.len();

        if let Some(unknown) =
            actions.iter().find(|action| !registry.contains(&action.action_type))
        {
            warn!(
                action_type = %unknown.action_type,
                "Persisted queue contains an action type with no registered executor"
            );
        }

        info!(pending = actions.len(), max_retry_count = config.max_retry_count, "Action queue ready");

        let shared = Arc::new(Shared::new(config, actions, store, connectivity, registry));
        if exhausted > 0 {
            for _ in 0..exhausted {
                shared.metrics.record_drop();
            }
            let actions = shared.actions.lock().await;
            shared.persist(&actions).await;
        }

        Ok(Self {
            handle: QueueHandle { shared },
            cancellation: CancellationToken::new(),
            task_handle: None,
        })
    }

    /// Facade for callers that outlive a borrow of the queue.
    pub fn handle(&self) -> QueueHandle {
        self.handle.clone()
    }

    /// Spawn the background processor task.
    ///
    /// The task runs an initial pass when the queue is non-empty and the
    /// device is online, then waits for enqueue and connectivity events.
    ///
    /// # Errors
    /// `QueueError::InvalidState` if the processor is already running or no
    /// Tokio runtime is active.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(QueueError::InvalidState("Processor already running".to_string()));
        }

        let runtime = Handle::try_current().map_err(|_| {
            QueueError::InvalidState("No active Tokio runtime to run the processor".to_string())
        })?;

        // Create fresh cancellation token
        self.cancellation = CancellationToken::new();

        let shared = Arc::clone(&self.handle.shared);
        let cancel = self.cancellation.clone();
        self.task_handle = Some(runtime.spawn(processor::run(shared, cancel)));

        info!("Queue processor started");
        Ok(())
    }

    /// Stop the processor and wait for its task to finish.
    ///
    /// An in-flight action is allowed to resolve; no further action starts.
    /// A task that misses the join timeout is aborted, leaving its in-flight
    /// action queued.
    ///
    /// # Errors
    /// `QueueError::InvalidState` if the processor is not running, or
    /// `QueueError::Internal` if the task panicked or missed the join timeout.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut handle) = self.task_handle.take() else {
            return Err(QueueError::InvalidState("Processor not running".to_string()));
        };

        info!("Stopping queue processor");
        self.cancellation.cancel();

        let join_timeout = self.handle.shared.config.join_timeout();
        match tokio::time::timeout(join_timeout, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Processor task panicked: {}", e);
                return Err(QueueError::Internal("Processor task panicked".to_string()));
            }
            Err(_) => {
                warn!("Processor task did not complete within timeout, aborting it");
                handle.abort();
                // Wait for the abort to land so a restart never runs two loops.
                let _ = handle.await;
                return Err(QueueError::Internal("Processor task timeout".to_string()));
            }
        }

        self.cancellation = CancellationToken::new();
        info!("Queue processor stopped");
        Ok(())
    }

    /// Returns true while the processor task is active.
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    /// See [`QueueHandle::enqueue`].
    pub async fn enqueue(&self, action_type: &str, payload: Value) -> Result<QueuedAction> {
        self.handle.enqueue(action_type, payload).await
    }

    /// See [`QueueHandle::dequeue`].
    pub async fn dequeue(&self, id: &str) -> bool {
        self.handle.dequeue(id).await
    }

    /// See [`QueueHandle::current_queue`].
    pub async fn current_queue(&self) -> Vec<QueuedAction> {
        self.handle.current_queue().await
    }

    /// See [`QueueHandle::process_pending`].
    pub async fn process_pending(&self) -> PassReport {
        self.handle.process_pending().await
    }

    pub fn state(&self) -> ProcessorState {
        self.handle.state()
    }

    pub fn metrics(&self) -> QueueMetricsSnapshot {
        self.handle.metrics()
    }
}

impl Drop for ActionQueue {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("ActionQueue dropped while running; cancelling processor");
            self.cancellation.cancel();
        }
    }
}

impl QueueHandle {
    /// Append a new action and persist the queue.
    ///
    /// Never performs network I/O and succeeds while offline. A failed
    /// persistence write is logged and the action stays queued in memory.
    /// When online, the processor is woken.
    ///
    /// # Errors
    /// `QueueError::InvalidInput` for an empty action type.
    #[instrument(skip(self, payload))]
    pub async fn enqueue(&self, action_type: &str, payload: Value) -> Result<QueuedAction> {
        let action_type = ActionType::new(action_type)?;

        let action = {
            let mut actions = self.shared.actions.lock().await;
            let now = Utc::now().timestamp_millis();
            let timestamp = actions.last().map_or(now, |tail| now.max(tail.timestamp));

            let action = QueuedAction::new(action_type, payload, timestamp);
            actions.push(action.clone());
            self.shared.metrics.record_enqueue();
            self.shared.metrics.update_size(actions.len());
            self.shared.persist(&actions).await;
            action
        };

        debug!(action_id = %action.id, "Action enqueued");

        if self.shared.connectivity.is_online() {
            self.shared.wake.notify_one();
        }

        Ok(action)
    }

    /// Remove a specific action, whatever the processor is doing.
    ///
    /// If the action is currently executing, the execution completes but its
    /// outcome is discarded. Returns false when no action has `id`.
    #[instrument(skip(self))]
    pub async fn dequeue(&self, id: &str) -> bool {
        let mut actions = self.shared.actions.lock().await;

        let Some(index) = actions.iter().position(|action| action.id == id) else {
            debug!("Dequeue requested for unknown action");
            return false;
        };

        let removed = actions.remove(index);
        self.shared.metrics.record_cancellation();
        self.shared.metrics.update_size(actions.len());
        self.shared.persist(&actions).await;

        info!(action_type = %removed.action_type, "Action dequeued");
        true
    }

    /// Snapshot of the queue in execution order.
    pub async fn current_queue(&self) -> Vec<QueuedAction> {
        self.shared.actions.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.shared.actions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.shared.actions.lock().await.is_empty()
    }

    /// Run a pass now and wait for it to finish.
    ///
    /// Serialized with the background processor; does nothing while offline.
    pub async fn process_pending(&self) -> PassReport {
        self.shared.run_pass(&CancellationToken::new()).await
    }

    pub fn state(&self) -> ProcessorState {
        self.shared.state()
    }

    pub fn is_online(&self) -> bool {
        self.shared.connectivity.is_online()
    }

    pub fn metrics(&self) -> QueueMetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}
