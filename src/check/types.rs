//! Wire and domain records for a background-check case.
//!
//! Everything here serializes to lower_snake_case JSON. Completion tokens are
//! opaque runtime-issued bytes; on the wire they appear as standard padded
//! base64 (see the `token_b64` serde helper).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Check tier selected by the hiring client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Standard,
    Full,
}

/// Intake record for a new case. Immutable once the case starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundCheckInput {
    pub email: String,
    pub tier: Tier,
    pub package: String,
}

/// The candidate's consent decision, delivered exactly once per case.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConsentResult {
    pub consent: bool,
}

/// The individual searches a case can run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
    SsnTrace,
    Criminal,
    Employment,
    Education,
    MotorVehicle,
}

impl SearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SsnTrace => "ssn_trace",
            Self::Criminal => "criminal",
            Self::Employment => "employment",
            Self::Education => "education",
            Self::MotorVehicle => "motor_vehicle",
        }
    }
}

/// One entry in a criminal-records search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriminalRecord {
    pub charge: String,
    pub jurisdiction: String,
}

/// A completed search, tagged by kind.
///
/// Researchers POST this to the gateway; the workflow stores the projected
/// payload under the matching search slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchResult {
    SsnTrace { known_addresses: Vec<String> },
    Criminal { records: Vec<CriminalRecord> },
    Employment { employer: String, verified: bool },
    Education { institution: String, verified: bool },
    MotorVehicle { license_valid: bool, violations: Vec<String> },
}

impl SearchResult {
    pub fn kind(&self) -> SearchKind {
        match self {
            Self::SsnTrace { .. } => SearchKind::SsnTrace,
            Self::Criminal { .. } => SearchKind::Criminal,
            Self::Employment { .. } => SearchKind::Employment,
            Self::Education { .. } => SearchKind::Education,
            Self::MotorVehicle { .. } => SearchKind::MotorVehicle,
        }
    }

    /// Project the variant onto its concrete payload (the fields without the
    /// `kind` tag). This is what gets delivered as the activity completion
    /// value.
    pub fn payload(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(map) = value.as_object_mut() {
            map.remove("kind");
        }
        value
    }

    /// Reconstruct a typed result from a projected payload and the kind the
    /// suspended activity was issued for.
    pub fn from_payload(
        kind: SearchKind,
        payload: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        let mut tagged = match payload {
            serde_json::Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("payload".to_string(), other);
                map
            }
        };
        tagged.insert(
            "kind".to_string(),
            serde_json::Value::String(kind.as_str().to_string()),
        );
        serde_json::from_value(serde_json::Value::Object(tagged))
    }
}

/// Externally visible case state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseState {
    PendingConsent,
    Running,
    Completed,
    Declined,
    Cancelled,
    Failed,
}

impl CaseState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Declined | Self::Cancelled | Self::Failed
        )
    }
}

/// Status of one search within a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

/// Per-search progress within the status snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchProgress {
    pub status: SearchStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Snapshot answered by the `status` query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundCheckStatus {
    pub tier: Tier,
    pub email: String,
    pub state: CaseState,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub searches: BTreeMap<SearchKind, SearchProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,
}

/// Severity of a report finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Advisory,
    Fail,
}

/// A single noteworthy outcome extracted from a search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub kind: SearchKind,
    pub severity: Severity,
    pub note: String,
}

/// Overall pass/fail conclusion of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
}

/// Final report, produced once, only on successful completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub verdict: Verdict,
    pub findings: Vec<Finding>,
    /// Projected payloads of every search that completed.
    pub results: BTreeMap<SearchKind, serde_json::Value>,
}

/// Outstanding consent task awaiting the candidate.
///
/// Todos are computed from workflow state on query, never stored separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateTodo {
    #[serde(with = "token_b64")]
    pub token: Vec<u8>,
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

/// Outstanding search task awaiting a researcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearcherTodo {
    #[serde(with = "token_b64")]
    pub token: Vec<u8>,
    pub kind: SearchKind,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

/// Serde helpers for opaque token bytes as standard padded base64.
pub mod token_b64 {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(token: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(token))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
