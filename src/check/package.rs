//! Package catalog: which searches a case runs.
//!
//! The tier and package name select an ordered set of search kinds. The
//! shipped catalog keys off the tier; unknown package names fall back to the
//! tier's base bundle rather than failing intake.

use super::types::{SearchKind, Tier};

/// One search a case must or may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSpec {
    pub kind: SearchKind,
    /// A failed mandatory search fails the whole case; a failed optional
    /// search is recorded and the report proceeds without it.
    pub mandatory: bool,
}

/// Ordered set of searches for a tier+package combination.
pub fn searches_for(tier: Tier, _package: &str) -> Vec<SearchSpec> {
    let mut specs = vec![
        SearchSpec { kind: SearchKind::SsnTrace, mandatory: true },
        SearchSpec { kind: SearchKind::Criminal, mandatory: true },
    ];
    if tier == Tier::Full {
        specs.push(SearchSpec { kind: SearchKind::Employment, mandatory: false });
        specs.push(SearchSpec { kind: SearchKind::Education, mandatory: false });
        specs.push(SearchSpec { kind: SearchKind::MotorVehicle, mandatory: false });
    }
    specs
}
