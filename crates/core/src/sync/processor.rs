//! Queue processor
//!
//! Drains the queue one action at a time while the device is online. The
//! processor is a cooperative loop: it executes the earliest action not yet
//! attempted in the current pass, awaits its outcome, records it, and only then
//! looks at the next one. Wakeups are event driven (enqueue notifications,
//! connectivity transitions and, when configured, a backoff timer); nothing
//! polls.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use relayq_domain::constants::MAX_FAILURE_REASON_LEN;
use relayq_domain::{ExecutionError, ProcessorState, QueueConfig, QueuedAction};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::backoff::retry_delay;
use super::metrics::QueueMetrics;
use super::ports::ConnectivityMonitor;
use super::registry::ActionRegistry;
use super::store::PersistentStore;

/// Outcome counters for one processing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    /// Executor invocations started during the pass.
    pub attempted: usize,
    /// Actions whose executor succeeded and that were removed from the queue.
    pub completed: usize,
    /// Failed actions kept for a later pass with an incremented retry count.
    pub retried: usize,
    /// Failed actions removed after exhausting their retry budget.
    pub dropped: usize,
    /// In-flight actions dequeued by the caller before they resolved.
    pub skipped: usize,
    /// The pass stopped early because connectivity dropped or the processor
    /// was stopped.
    pub interrupted: bool,
}

/// State shared between the facade and the processor task.
pub(crate) struct Shared {
    pub(crate) config: QueueConfig,
    pub(crate) actions: Mutex<Vec<QueuedAction>>,
    pub(crate) store: PersistentStore,
    pub(crate) connectivity: Arc<dyn ConnectivityMonitor>,
    pub(crate) registry: Arc<ActionRegistry>,
    pub(crate) metrics: Arc<QueueMetrics>,
    pub(crate) wake: Notify,
    pass_lock: Mutex<()>,
    processing: AtomicBool,
}

/// Marks the processor as `Processing` for the lifetime of the guard.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl<'a> ProcessingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Shared {
    pub(crate) fn new(
        config: QueueConfig,
        actions: Vec<QueuedAction>,
        store: PersistentStore,
        connectivity: Arc<dyn ConnectivityMonitor>,
        registry: Arc<ActionRegistry>,
    ) -> Self {
        let metrics = Arc::new(QueueMetrics::new());
        metrics.update_size(actions.len());

        Self {
            config,
            actions: Mutex::new(actions),
            store,
            connectivity,
            registry,
            metrics,
            wake: Notify::new(),
            pass_lock: Mutex::new(()),
            processing: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> ProcessorState {
        if self.processing.load(Ordering::SeqCst) {
            ProcessorState::Processing
        } else {
            ProcessorState::Idle
        }
    }

    /// Write the queue, logging instead of propagating failures. The
    /// in-memory queue stays authoritative; the next successful write
    /// reconciles.
    pub(crate) async fn persist(&self, actions: &[QueuedAction]) -> bool {
        match self.store.save(actions).await {
            Ok(()) => {
                self.metrics.record_persistence(true);
                true
            }
            Err(err) => {
                error!(error = %err, action_count = actions.len(), "Failed to persist action queue");
                self.metrics.record_persistence(false);
                false
            }
        }
    }

    /// Run one pass over the queue.
    ///
    /// Passes are serialized, so at most one executor invocation is
    /// outstanding at any time. Each action is attempted at most once per
    /// pass; actions enqueued while the pass runs are picked up by it.
    pub(crate) async fn run_pass(&self, cancel: &CancellationToken) -> PassReport {
        let _pass = self.pass_lock.lock().await;
        let mut report = PassReport::default();

        if !self.connectivity.is_online() {
            debug!("Offline; skipping queue pass");
            return report;
        }
        if self.actions.lock().await.is_empty() {
            return report;
        }

        let _processing = ProcessingGuard::enter(&self.processing);
        self.metrics.record_pass();
        let mut attempted: HashSet<String> = HashSet::new();

        loop {
            if cancel.is_cancelled() {
                report.interrupted = true;
                break;
            }
            if !self.connectivity.is_online() {
                info!("Connectivity lost; pausing queue until the next online transition");
                report.interrupted = true;
                break;
            }

            let next = {
                let actions = self.actions.lock().await;
                actions.iter().find(|action| !attempted.contains(&action.id)).cloned()
            };
            let Some(action) = next else {
                break;
            };

            attempted.insert(action.id.clone());
            report.attempted += 1;

            let outcome = self.execute(&action).await;
            self.resolve(&action, outcome, &mut report).await;
        }

        info!(
            attempted = report.attempted,
            completed = report.completed,
            retried = report.retried,
            dropped = report.dropped,
            skipped = report.skipped,
            interrupted = report.interrupted,
            "Queue pass finished"
        );
        report
    }

    /// Invoke the registered executor on its own task so that a panicking
    /// executor is reported as a failure, bounded by the configured timeout.
    #[instrument(
        skip(self, action),
        fields(action_id = %action.id, action_type = %action.action_type, retry_count = action.retry_count)
    )]
    async fn execute(&self, action: &QueuedAction) -> Result<(), ExecutionError> {
        let registry = Arc::clone(&self.registry);
        let action_type = action.action_type.clone();
        let payload = action.payload.clone();
        let mut handle =
            tokio::spawn(async move { registry.execute(&action_type, &payload).await });

        let joined = match self.config.executor_timeout() {
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(timeout_ms = limit.as_millis() as u64, "Executor timed out");
                    handle.abort();
                    // Wait for the abort to land so no invocation outlives its slot.
                    let _ = handle.await;
                    return Err(ExecutionError::TimedOut(limit));
                }
            },
            None => handle.await,
        };

        joined.unwrap_or_else(|join_err| {
            Err(ExecutionError::Failed(format!("executor panicked: {join_err}")))
        })
    }

    /// Apply the outcome of an executed action and persist.
    async fn resolve(
        &self,
        action: &QueuedAction,
        outcome: Result<(), ExecutionError>,
        report: &mut PassReport,
    ) {
        let mut actions = self.actions.lock().await;

        let Some(index) = actions.iter().position(|queued| queued.id == action.id) else {
            debug!(action_id = %action.id, "Action dequeued while in flight; skipping bookkeeping");
            report.skipped += 1;
            self.metrics.record_skip();
            return;
        };

        match outcome {
            Ok(()) => {
                actions.remove(index);
                report.completed += 1;
                self.metrics.record_completion();
                debug!(action_id = %action.id, action_type = %action.action_type, "Action executed");
            }
            Err(err) if actions[index].is_last_attempt(self.config.max_retry_count) => {
                let dropped = actions.remove(index);
                report.dropped += 1;
                self.metrics.record_drop();
                warn!(
                    action_id = %dropped.id,
                    action_type = %dropped.action_type,
                    attempts = dropped.retry_count.saturating_add(1),
                    error_kind = err.label(),
                    error = %truncate_reason(&err.to_string()),
                    "Dropping action after exhausting its retry budget"
                );
            }
            Err(err) => {
                let queued = &mut actions[index];
                queued.retry_count += 1;
                report.retried += 1;
                self.metrics.record_retry();
                info!(
                    action_id = %queued.id,
                    action_type = %queued.action_type,
                    retry_count = queued.retry_count,
                    error_kind = err.label(),
                    error = %truncate_reason(&err.to_string()),
                    "Action failed; will retry on a later pass"
                );
            }
        }

        self.metrics.update_size(actions.len());
        self.persist(&actions).await;
    }

    /// Deadline for a timed retry pass, if backoff is configured and the last
    /// pass left failed actions behind while still online.
    async fn next_retry_deadline(&self, report: &PassReport) -> Option<Instant> {
        let backoff = self.config.retry_backoff.as_ref()?;
        if report.retried == 0 || !self.connectivity.is_online() {
            return None;
        }

        let highest = self.actions.lock().await.iter().map(|action| action.retry_count).max()?;
        let delay = retry_delay(backoff, highest);
        debug!(delay_ms = delay.as_millis() as u64, "Scheduling timed retry pass");
        Some(Instant::now() + delay)
    }
}

/// Background processing loop. Runs until `cancel` fires.
pub(crate) async fn run(shared: Arc<Shared>, cancel: CancellationToken) {
    let mut connectivity = shared.connectivity.subscribe();
    let mut connectivity_open = true;
    connectivity.borrow_and_update();

    let report = shared.run_pass(&cancel).await;
    let mut retry_at = shared.next_retry_deadline(&report).await;

    loop {
        let retry_timer = async move {
            match retry_at {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            () = cancel.cancelled() => {
                debug!("Queue processor loop cancelled");
                break;
            }
            () = shared.wake.notified() => {
                debug!("Queue processor woken by enqueue");
            }
            changed = connectivity.changed(), if connectivity_open => {
                if changed.is_err() {
                    warn!("Connectivity source closed; relying on enqueue wakeups");
                    connectivity_open = false;
                    continue;
                }
                if !*connectivity.borrow_and_update() {
                    info!("Connectivity lost");
                    continue;
                }
                info!("Connectivity restored; resuming queue");
            }
            () = retry_timer => {
                debug!("Backoff elapsed; retrying failed actions");
            }
        }

        let report = shared.run_pass(&cancel).await;
        retry_at = shared.next_retry_deadline(&report).await;
    }
}

fn truncate_reason(reason: &str) -> String {
    if reason.len() <= MAX_FAILURE_REASON_LEN {
        return reason.to_string();
    }

    let mut truncated =
        reason.chars().take(MAX_FAILURE_REASON_LEN.saturating_sub(3)).collect::<String>();
    truncated.push_str("...");
    truncated
}
