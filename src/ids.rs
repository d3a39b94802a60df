//! Deterministic workflow identifiers derived from the candidate email.
//!
//! Three IDs exist per candidate: the case itself, the candidate's
//! pending-task view, and the researcher's queue view. The two views resolve
//! to the same underlying case; they only select a different query surface.

use std::fmt;

const CASE_PREFIX: &str = "BackgroundCheck-";
const CANDIDATE_PREFIX: &str = "Candidate-";
const RESEARCHER_PREFIX: &str = "Researcher-";

/// A parsed workflow identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowId {
    /// The case workflow: `BackgroundCheck-<email>`.
    BackgroundCheck(String),
    /// The candidate's pending-task view: `Candidate-<email>`.
    Candidate(String),
    /// The researcher's queue view: `Researcher-<email>`.
    Researcher(String),
}

impl WorkflowId {
    /// Parse an ID string into its kind and email.
    pub fn parse(id: &str) -> Option<Self> {
        if let Some(email) = id.strip_prefix(CASE_PREFIX) {
            Some(Self::BackgroundCheck(email.to_string()))
        } else if let Some(email) = id.strip_prefix(CANDIDATE_PREFIX) {
            Some(Self::Candidate(email.to_string()))
        } else if let Some(email) = id.strip_prefix(RESEARCHER_PREFIX) {
            Some(Self::Researcher(email.to_string()))
        } else {
            None
        }
    }

    /// The candidate email embedded in the identifier.
    pub fn email(&self) -> &str {
        match self {
            Self::BackgroundCheck(e) | Self::Candidate(e) | Self::Researcher(e) => e,
        }
    }

    /// The case workflow ID this identifier resolves to.
    pub fn case_id(&self) -> String {
        background_check_workflow_id(self.email())
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BackgroundCheck(e) => write!(f, "{CASE_PREFIX}{e}"),
            Self::Candidate(e) => write!(f, "{CANDIDATE_PREFIX}{e}"),
            Self::Researcher(e) => write!(f, "{RESEARCHER_PREFIX}{e}"),
        }
    }
}

/// Case workflow ID for a candidate email.
pub fn background_check_workflow_id(email: &str) -> String {
    format!("{CASE_PREFIX}{email}")
}

/// Candidate task-view workflow ID for a candidate email.
pub fn candidate_workflow_id(email: &str) -> String {
    format!("{CANDIDATE_PREFIX}{email}")
}

/// Researcher queue-view workflow ID for a candidate email.
pub fn researcher_workflow_id(email: &str) -> String {
    format!("{RESEARCHER_PREFIX}{email}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_deterministic_per_email() {
        assert_eq!(
            background_check_workflow_id("a@x"),
            "BackgroundCheck-a@x"
        );
        assert_eq!(candidate_workflow_id("a@x"), "Candidate-a@x");
        assert_eq!(researcher_workflow_id("a@x"), "Researcher-a@x");
    }

    #[test]
    fn parse_round_trips_display() {
        for id in [
            "BackgroundCheck-a@x",
            "Candidate-b@y",
            "Researcher-c@z",
        ] {
            let parsed = WorkflowId::parse(id).unwrap();
            assert_eq!(parsed.to_string(), id);
        }
    }

    #[test]
    fn views_resolve_to_the_case_id() {
        let candidate = WorkflowId::parse("Candidate-a@x").unwrap();
        let researcher = WorkflowId::parse("Researcher-a@x").unwrap();
        assert_eq!(candidate.case_id(), "BackgroundCheck-a@x");
        assert_eq!(researcher.case_id(), "BackgroundCheck-a@x");
        assert_eq!(candidate.email(), "a@x");
    }

    #[test]
    fn parse_rejects_unknown_prefixes() {
        assert!(WorkflowId::parse("Report-a@x").is_none());
        assert!(WorkflowId::parse("a@x").is_none());
    }
}
