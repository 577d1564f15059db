//! The durable action record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::{QueueError, Result};

/// Tag naming the executor that handles an action (e.g. `"LIKE"`).
///
/// Tags are compared exactly; the registry decides which tags exist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionType(String);

impl ActionType {
    /// Create a tag, rejecting empty or whitespace-only input.
    pub fn new(tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            return Err(QueueError::InvalidInput("action type must not be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ActionType {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<&str> for ActionType {
    type Error = QueueError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<String> for ActionType {
    type Error = QueueError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl AsRef<str> for ActionType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A durable record of one deferred operation.
///
/// Field names on the wire follow the persisted layout: `id`, `type`,
/// `payload`, `timestamp`, `retryCount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedAction {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub payload: Value,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub retry_count: u32,
}

impl QueuedAction {
    /// Create a fresh action with a time-ordered id and no failed attempts.
    pub fn new(action_type: ActionType, payload: Value, timestamp: i64) -> Self {
        Self::with_id(Uuid::now_v7().to_string(), action_type, payload, timestamp)
    }

    /// Create with a specific id
    pub fn with_id(id: String, action_type: ActionType, payload: Value, timestamp: i64) -> Self {
        Self { id, action_type, payload, timestamp, retry_count: 0 }
    }

    /// Whether one more failure would exhaust a budget of `max_retry_count`
    /// attempts.
    pub fn is_last_attempt(&self, max_retry_count: u32) -> bool {
        self.retry_count.saturating_add(1) >= max_retry_count
    }
}
