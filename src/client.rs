//! Workflow runtime adapter.
//!
//! One long-lived client over the engine, held as process-wide state by the
//! gateway (initialized at startup, dropped at shutdown). Callers get opaque
//! JSON-encoded values back and decode them into domain records themselves;
//! no engine-internal types cross this boundary.

use serde_json::Value;
use std::sync::Arc;

use crate::errors::RuntimeError;
use crate::runtime::Engine;
use crate::workflow::ActivityOutcome;

/// Name of the case workflow type.
pub const BACKGROUND_CHECK_WORKFLOW: &str = "background_check";

#[derive(Clone)]
pub struct WorkflowClient {
    engine: Arc<Engine>,
}

impl WorkflowClient {
    /// Connect to the runtime. The handle is cheap to clone and safe to share
    /// across request handlers for the life of the process.
    pub fn connect(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// Start a workflow under the given ID on the runtime's task queue.
    pub fn start_workflow(
        &self,
        workflow_id: &str,
        workflow: &str,
        args: Value,
    ) -> Result<(), RuntimeError> {
        if workflow != BACKGROUND_CHECK_WORKFLOW {
            return Err(RuntimeError::InvalidPayload(format!(
                "unknown workflow type {workflow}"
            )));
        }
        let input = serde_json::from_value(args)
            .map_err(|e| RuntimeError::InvalidPayload(e.to_string()))?;
        self.engine.start_workflow(workflow_id, input)
    }

    pub fn cancel_workflow(&self, workflow_id: &str) -> Result<(), RuntimeError> {
        self.engine.cancel_workflow(workflow_id)
    }

    /// Run a read-only query; the result is an opaque encoded value.
    pub fn query_workflow(&self, workflow_id: &str, query: &str) -> Result<Value, RuntimeError> {
        self.engine.query_workflow(workflow_id, query)
    }

    /// Complete a suspended activity by its opaque token.
    pub fn complete_activity(
        &self,
        token: &[u8],
        outcome: ActivityOutcome,
    ) -> Result<(), RuntimeError> {
        self.engine.complete_activity(token, outcome)
    }

    /// Encoded inputs of every open workflow whose ID starts with the prefix.
    pub fn list_workflows(&self, prefix: &str) -> Result<Vec<Value>, RuntimeError> {
        self.engine.list_workflows(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ManualClock, SystemClock};
    use crate::workflow::CaseTimeouts;
    use chrono::{TimeZone, Utc};

    fn client() -> WorkflowClient {
        let clock = Arc::new(SystemClock);
        WorkflowClient::connect(Arc::new(Engine::new(clock, CaseTimeouts::default())))
    }

    #[test]
    fn start_rejects_unknown_workflow_type() {
        let err = client()
            .start_workflow("BackgroundCheck-a@x", "mystery", serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidPayload(_)));
    }

    #[test]
    fn start_rejects_malformed_args() {
        let err = client()
            .start_workflow(
                "BackgroundCheck-a@x",
                BACKGROUND_CHECK_WORKFLOW,
                serde_json::json!({"email": "a@x"}),
            )
            .unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidPayload(_)));
    }

    #[test]
    fn start_and_query_round_trip() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap(),
        ));
        let client =
            WorkflowClient::connect(Arc::new(Engine::new(clock, CaseTimeouts::default())));
        client
            .start_workflow(
                "BackgroundCheck-a@x",
                BACKGROUND_CHECK_WORKFLOW,
                serde_json::json!({"email": "a@x", "tier": "standard", "package": "base"}),
            )
            .unwrap();
        let value = client
            .query_workflow("BackgroundCheck-a@x", crate::runtime::engine::QUERY_STATUS)
            .unwrap();
        assert_eq!(value["state"], "pending_consent");
        assert_eq!(value["email"], "a@x");
    }
}
