//! Deterministic verdict policy over aggregated search results.
//!
//! Fail-severity findings: any criminal record, unverified employment,
//! unverified education. Advisory findings: MVR violations or an invalid
//! license, an empty SSN-trace address history. Any fail-severity finding
//! makes the overall verdict a fail.

use std::collections::BTreeMap;

use super::types::{Finding, SearchKind, SearchResult, Severity, Verdict};

/// Evaluate the settled results of a case.
pub fn assess(results: &BTreeMap<SearchKind, SearchResult>) -> (Verdict, Vec<Finding>) {
    let mut findings = Vec::new();

    for (kind, result) in results {
        match result {
            SearchResult::SsnTrace { known_addresses } => {
                if known_addresses.is_empty() {
                    findings.push(Finding {
                        kind: *kind,
                        severity: Severity::Advisory,
                        note: "no address history found".to_string(),
                    });
                }
            }
            SearchResult::Criminal { records } => {
                for record in records {
                    findings.push(Finding {
                        kind: *kind,
                        severity: Severity::Fail,
                        note: format!("{} ({})", record.charge, record.jurisdiction),
                    });
                }
            }
            SearchResult::Employment { employer, verified } => {
                if !verified {
                    findings.push(Finding {
                        kind: *kind,
                        severity: Severity::Fail,
                        note: format!("employment at {employer} could not be verified"),
                    });
                }
            }
            SearchResult::Education { institution, verified } => {
                if !verified {
                    findings.push(Finding {
                        kind: *kind,
                        severity: Severity::Fail,
                        note: format!("education at {institution} could not be verified"),
                    });
                }
            }
            SearchResult::MotorVehicle { license_valid, violations } => {
                if !license_valid {
                    findings.push(Finding {
                        kind: *kind,
                        severity: Severity::Advisory,
                        note: "license invalid".to_string(),
                    });
                }
                for violation in violations {
                    findings.push(Finding {
                        kind: *kind,
                        severity: Severity::Advisory,
                        note: violation.clone(),
                    });
                }
            }
        }
    }

    let verdict = if findings.iter().any(|f| f.severity == Severity::Fail) {
        Verdict::Fail
    } else {
        Verdict::Pass
    };
    (verdict, findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::types::CriminalRecord;

    fn results(entries: Vec<SearchResult>) -> BTreeMap<SearchKind, SearchResult> {
        entries.into_iter().map(|r| (r.kind(), r)).collect()
    }

    #[test]
    fn clean_results_pass() {
        let (verdict, findings) = assess(&results(vec![
            SearchResult::SsnTrace { known_addresses: vec!["1 Main St".into()] },
            SearchResult::Criminal { records: vec![] },
        ]));
        assert_eq!(verdict, Verdict::Pass);
        assert!(findings.is_empty());
    }

    #[test]
    fn criminal_record_fails_the_case() {
        let (verdict, findings) = assess(&results(vec![SearchResult::Criminal {
            records: vec![CriminalRecord {
                charge: "fraud".into(),
                jurisdiction: "NY".into(),
            }],
        }]));
        assert_eq!(verdict, Verdict::Fail);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Fail);
    }

    #[test]
    fn unverified_employment_fails_the_case() {
        let (verdict, _) = assess(&results(vec![SearchResult::Employment {
            employer: "Initech".into(),
            verified: false,
        }]));
        assert_eq!(verdict, Verdict::Fail);
    }

    #[test]
    fn mvr_violations_are_advisory_only() {
        let (verdict, findings) = assess(&results(vec![SearchResult::MotorVehicle {
            license_valid: true,
            violations: vec!["speeding 2024".into()],
        }]));
        assert_eq!(verdict, Verdict::Pass);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Advisory);
    }

    #[test]
    fn empty_address_history_is_advisory() {
        let (verdict, findings) = assess(&results(vec![SearchResult::SsnTrace {
            known_addresses: vec![],
        }]));
        assert_eq!(verdict, Verdict::Pass);
        assert_eq!(findings.len(), 1);
    }
}
