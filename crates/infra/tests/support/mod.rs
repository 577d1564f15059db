//! Helpers shared by the infra integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relayq_core::ActionExecutor;
use relayq_domain::ExecutionError;
use serde_json::Value;
use tokio::sync::Mutex;

/// Executor that records payloads and can be switched into failing mode.
#[derive(Default)]
pub struct RecordingExecutor {
    seen: Mutex<Vec<Value>>,
    failing: AtomicBool,
}

impl RecordingExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn seen(&self) -> Vec<Value> {
        self.seen.lock().await.clone()
    }
}

#[async_trait]
impl ActionExecutor for RecordingExecutor {
    async fn execute(&self, payload: &Value) -> Result<(), ExecutionError> {
        self.seen.lock().await.push(payload.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(ExecutionError::failed("backend unavailable"));
        }
        Ok(())
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn poll_until<F, Fut>(timeout: Duration, interval: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = std::time::Instant::now();

    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }

    false
}
