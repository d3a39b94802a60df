//! Side-effecting activity handlers.
//!
//! Delivery of consent and researcher requests is a tracing log in this
//! in-process runtime; a production deployment would hand these to an email
//! subsystem. `persist_report` is idempotent on the case ID.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::collections::HashMap;

use crate::check::types::{Report, SearchKind};

/// Send the candidate a consent link carrying the completion token.
pub fn send_consent_request(email: &str, token: &[u8]) {
    tracing::info!(
        email,
        token = %STANDARD.encode(token),
        "consent request sent to candidate"
    );
}

/// Send a researcher the task carrying the completion token.
pub fn send_researcher_request(email: &str, kind: SearchKind, token: &[u8]) {
    tracing::info!(
        email,
        kind = kind.as_str(),
        token = %STANDARD.encode(token),
        "search request sent to researcher"
    );
}

/// Persist the final report. A second call for the same case is a no-op.
pub fn persist_report(store: &mut HashMap<String, Report>, case_id: &str, report: &Report) {
    if store.contains_key(case_id) {
        tracing::debug!(case_id, "report already persisted");
        return;
    }
    tracing::info!(case_id, verdict = ?report.verdict, "report persisted");
    store.insert(case_id.to_string(), report.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::types::Verdict;
    use std::collections::BTreeMap;

    #[test]
    fn persist_report_is_idempotent() {
        let mut store = HashMap::new();
        let report = Report {
            verdict: Verdict::Pass,
            findings: vec![],
            results: BTreeMap::new(),
        };
        persist_report(&mut store, "BackgroundCheck-a@x", &report);
        let second = Report {
            verdict: Verdict::Fail,
            findings: vec![],
            results: BTreeMap::new(),
        };
        persist_report(&mut store, "BackgroundCheck-a@x", &second);
        assert_eq!(store.len(), 1);
        assert_eq!(store["BackgroundCheck-a@x"].verdict, Verdict::Pass);
    }
}
