//! Shared test helpers for `relayq-core` integration tests.
//!
//! In-memory fakes for every port so queue tests can script connectivity and
//! executor behaviour deterministically.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use relayq_core::{
    ActionExecutor, ActionQueue, ActionRegistry, ConnectivityMonitor, KeyValueStore, QueueHandle,
};
use relayq_domain::{ExecutionError, QueueConfig, QueueError, QueuedAction, Result};
use serde_json::Value;
use tokio::sync::{watch, Mutex as TokioMutex, Semaphore};

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// In-memory key/value store with a write-failure switch.
#[derive(Default)]
pub struct MemoryStore {
    blobs: TokioMutex<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.lock().await.get(key).cloned()
    }

    pub async fn put_raw(&self, key: &str, value: &[u8]) {
        self.blobs.lock().await.insert(key.to_string(), value.to_vec());
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.lock().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(QueueError::Storage("simulated write failure".into()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.blobs.lock().await.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// Manually driven reachability source.
pub struct FakeConnectivity {
    sender: watch::Sender<bool>,
}

impl FakeConnectivity {
    pub fn new(online: bool) -> Arc<Self> {
        let (sender, _) = watch::channel(online);
        Arc::new(Self { sender })
    }

    /// Publish a new status; no event when the value is unchanged.
    pub fn set_online(&self, online: bool) {
        self.sender.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });
    }

    /// Publish `online` even when it is unchanged, so every subscriber sees a
    /// duplicate event.
    pub fn resend(&self, online: bool) {
        self.sender.send_replace(online);
    }
}

impl ConnectivityMonitor for FakeConnectivity {
    fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

/// Scripted result of one executor invocation.
#[derive(Debug, Clone)]
pub enum Outcome {
    Succeed,
    Fail,
    /// Never resolves.
    Hang,
    Panic,
    /// Block until [`ScriptedExecutor::release`], then resolve with the inner
    /// outcome.
    Gated(Box<Outcome>),
    /// Sleep, then resolve with the inner outcome.
    Delayed(Duration, Box<Outcome>),
}

/// Observations shared by every executor of a test.
#[derive(Default)]
pub struct ExecutionLog {
    events: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ExecutionLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Executor start events only, e.g. `["start:A", "start:B"]`.
    pub fn starts(&self) -> Vec<String> {
        self.events().into_iter().filter(|event| event.starts_with("start:")).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

struct InFlight<'a>(&'a ExecutionLog);

impl<'a> InFlight<'a> {
    fn enter(log: &'a ExecutionLog) -> Self {
        let now = log.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        log.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(log)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Executor whose results follow a script; the last entry repeats.
pub struct ScriptedExecutor {
    log: Arc<ExecutionLog>,
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
    payloads: Mutex<Vec<Value>>,
    gate: Semaphore,
}

impl ScriptedExecutor {
    pub fn new(log: &Arc<ExecutionLog>, script: Vec<Outcome>) -> Arc<Self> {
        let fallback = script.last().cloned().unwrap_or(Outcome::Succeed);
        Arc::new(Self {
            log: Arc::clone(log),
            script: Mutex::new(script.into()),
            fallback,
            payloads: Mutex::new(Vec::new()),
            gate: Semaphore::new(0),
        })
    }

    pub fn always(log: &Arc<ExecutionLog>, outcome: Outcome) -> Arc<Self> {
        Self::new(log, vec![outcome])
    }

    pub fn calls(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.payloads.lock().unwrap().clone()
    }

    /// Let one gated invocation proceed.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    fn next_outcome(&self) -> Outcome {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap_or_else(|| self.fallback.clone())
        } else {
            self.fallback.clone()
        }
    }

    async fn resolve(&self, outcome: Outcome) -> std::result::Result<(), ExecutionError> {
        let mut outcome = outcome;
        loop {
            match outcome {
                Outcome::Succeed => return Ok(()),
                Outcome::Fail => return Err(ExecutionError::failed("scripted failure")),
                Outcome::Hang => std::future::pending::<()>().await,
                Outcome::Panic => panic!("scripted executor panic"),
                Outcome::Gated(inner) => {
                    self.gate.acquire().await.unwrap().forget();
                    outcome = *inner;
                }
                Outcome::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    outcome = *inner;
                }
            }
        }
    }
}

#[async_trait]
impl ActionExecutor for ScriptedExecutor {
    async fn execute(&self, payload: &Value) -> std::result::Result<(), ExecutionError> {
        let label = payload.get("label").and_then(Value::as_str).unwrap_or("?").to_string();
        self.payloads.lock().unwrap().push(payload.clone());

        let _in_flight = InFlight::enter(&self.log);
        self.log.push(format!("start:{label}"));
        let outcome = self.next_outcome();
        let result = self.resolve(outcome).await;
        self.log.push(format!("end:{label}"));
        result
    }
}

/// Everything a queue test needs, wired together.
pub struct Harness {
    pub queue: ActionQueue,
    pub store: Arc<MemoryStore>,
    pub connectivity: Arc<FakeConnectivity>,
}

impl Harness {
    pub async fn new(config: QueueConfig, online: bool, registry: ActionRegistry) -> Self {
        Self::with_store(config, online, registry, MemoryStore::new()).await
    }

    pub async fn with_store(
        config: QueueConfig,
        online: bool,
        registry: ActionRegistry,
        store: Arc<MemoryStore>,
    ) -> Self {
        let connectivity = FakeConnectivity::new(online);
        let queue = ActionQueue::new(config, store.clone(), connectivity.clone(), Arc::new(registry))
            .await
            .unwrap();
        Self { queue, store, connectivity }
    }

    pub fn handle(&self) -> QueueHandle {
        self.queue.handle()
    }
}

/// Registry with one executor per `(tag, executor)` pair.
pub fn registry(entries: &[(&str, Arc<ScriptedExecutor>)]) -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    for (tag, executor) in entries {
        registry = registry.with_executor(tag, executor.clone()).unwrap();
    }
    registry
}

/// Payload carrying a label the scripted executor records.
pub fn labelled(label: &str) -> Value {
    serde_json::json!({ "label": label })
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

/// Wait until the queue snapshot satisfies `predicate`.
pub async fn wait_for_queue<F>(handle: &QueueHandle, mut predicate: F) -> bool
where
    F: FnMut(&[QueuedAction]) -> bool,
{
    let start = std::time::Instant::now();

    while start.elapsed() < WAIT_TIMEOUT {
        if predicate(&handle.current_queue().await) {
            return true;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    false
}
