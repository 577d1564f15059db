//! Action type → executor dispatch table.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use relayq_domain::{ActionType, ExecutionError, Result};
use serde_json::Value;
use tracing::debug;

use super::ports::ActionExecutor;

/// Registry populated by the host application at startup.
///
/// Lookups for unregistered tags resolve to
/// [`ExecutionError::UnknownActionType`], which the processor treats like any
/// other failed attempt.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    executors: HashMap<ActionType, Arc<dyn ActionExecutor>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `executor` for `action_type`, returning the executor it
    /// replaced, if any.
    pub fn register(
        &mut self,
        action_type: ActionType,
        executor: Arc<dyn ActionExecutor>,
    ) -> Option<Arc<dyn ActionExecutor>> {
        debug!(action_type = %action_type, "Registering action executor");
        self.executors.insert(action_type, executor)
    }

    /// Builder-style registration from a raw tag.
    pub fn with_executor(mut self, tag: &str, executor: Arc<dyn ActionExecutor>) -> Result<Self> {
        self.register(ActionType::new(tag)?, executor);
        Ok(self)
    }

    pub fn contains(&self, action_type: &ActionType) -> bool {
        self.executors.contains_key(action_type)
    }

    /// Registered tags in sorted order.
    pub fn action_types(&self) -> Vec<ActionType> {
        let mut types: Vec<_> = self.executors.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }

    /// Dispatch `payload` to the executor registered for `action_type`.
    pub async fn execute(
        &self,
        action_type: &ActionType,
        payload: &Value,
    ) -> std::result::Result<(), ExecutionError> {
        let executor = self
            .executors
            .get(action_type)
            .ok_or_else(|| ExecutionError::UnknownActionType(action_type.to_string()))?;
        executor.execute(payload).await
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry").field("action_types", &self.action_types()).finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex as TokioMutex;

    use super::*;

    #[derive(Default)]
    struct RecordingExecutor {
        calls: TokioMutex<Vec<Value>>,
    }

    #[async_trait]
    impl ActionExecutor for RecordingExecutor {
        async fn execute(&self, payload: &Value) -> std::result::Result<(), ExecutionError> {
            self.calls.lock().await.push(payload.clone());
            Ok(())
        }
    }

    struct FailingExecutor;

    #[async_trait]
    impl ActionExecutor for FailingExecutor {
        async fn execute(&self, _payload: &Value) -> std::result::Result<(), ExecutionError> {
            Err(ExecutionError::failed("backend rejected"))
        }
    }

    #[tokio::test]
    async fn dispatches_to_registered_executor() {
        let like = Arc::new(RecordingExecutor::default());
        let registry = ActionRegistry::new().with_executor("LIKE", like.clone()).unwrap();

        let tag = ActionType::new("LIKE").unwrap();
        registry.execute(&tag, &json!({ "postId": "p1" })).await.unwrap();

        assert_eq!(like.calls.lock().await.as_slice(), &[json!({ "postId": "p1" })]);
    }

    #[tokio::test]
    async fn unknown_type_is_an_execution_error() {
        let registry = ActionRegistry::new();
        let tag = ActionType::new("FOLLOW_USER").unwrap();

        let err = registry.execute(&tag, &Value::Null).await.unwrap_err();
        assert_eq!(err, ExecutionError::UnknownActionType("FOLLOW_USER".to_string()));
    }

    #[tokio::test]
    async fn executor_failures_pass_through() {
        let registry =
            ActionRegistry::new().with_executor("ADD_COMMENT", Arc::new(FailingExecutor)).unwrap();
        let tag = ActionType::new("ADD_COMMENT").unwrap();

        let err = registry.execute(&tag, &json!({})).await.unwrap_err();
        assert_eq!(err, ExecutionError::failed("backend rejected"));
    }

    #[test]
    fn register_replaces_previous_executor() {
        let mut registry = ActionRegistry::new();
        let tag = ActionType::new("LIKE").unwrap();

        assert!(registry.register(tag.clone(), Arc::new(FailingExecutor)).is_none());
        assert!(registry.register(tag.clone(), Arc::new(RecordingExecutor::default())).is_some());
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&tag));
    }

    #[test]
    fn action_types_are_sorted() {
        let registry = ActionRegistry::new()
            .with_executor("LIKE", Arc::new(FailingExecutor))
            .unwrap()
            .with_executor("ADD_COMMENT", Arc::new(FailingExecutor))
            .unwrap();

        let names: Vec<_> =
            registry.action_types().iter().map(|tag| tag.as_str().to_string()).collect();
        assert_eq!(names, vec!["ADD_COMMENT", "LIKE"]);
        assert!(format!("{registry:?}").contains("ADD_COMMENT"));
    }

    #[test]
    fn blank_tags_cannot_be_registered() {
        assert!(ActionRegistry::new().with_executor(" ", Arc::new(FailingExecutor)).is_err());
    }
}
