//! The durable case orchestrator.

pub mod case;

pub use case::{
    ActivityKind, ActivityOutcome, CaseError, CaseTimeouts, CaseWorkflow, Effect, Phase,
};
