//! Typed errors for the workflow runtime surface.
//!
//! `RuntimeError` is everything the adapter can report to a caller. The HTTP
//! status mapping lives with the gateway (`gateway::api::ApiError`), which
//! converts from this type; nothing here knows about HTTP.

use thiserror::Error;

/// Errors surfaced by the workflow runtime adapter.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Workflow {0} is already running")]
    Conflict(String),

    #[error("No workflow found for {0}")]
    NotFound(String),

    #[error("Completion token is unknown, consumed, or cancelled")]
    UnknownToken,

    #[error("Completion payload rejected: {0}")]
    InvalidPayload(String),

    #[error("Runtime unavailable: {0}")]
    Transient(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_carries_workflow_id() {
        let err = RuntimeError::Conflict("BackgroundCheck-a@x".to_string());
        assert!(err.to_string().contains("BackgroundCheck-a@x"));
        assert!(matches!(err, RuntimeError::Conflict(_)));
    }

    #[test]
    fn unknown_token_is_matchable() {
        let err = RuntimeError::UnknownToken;
        assert!(matches!(err, RuntimeError::UnknownToken));
    }

    #[test]
    fn runtime_error_implements_std_error() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&RuntimeError::NotFound("x".into()));
        assert_std_error(&RuntimeError::Transient("engine lock poisoned".into()));
    }
}
