//! The background-check case state machine.
//!
//! One `CaseWorkflow` drives a single case from intake through consent,
//! parallel searches, report assembly, and a terminal state. The machine is
//! pure and event-driven: the runtime feeds it activity completions, timer
//! fires, and cancellation, and applies the [`Effect`]s it emits (token
//! issuance and revocation, report persistence). It never touches the clock,
//! the token registry, or any I/O, which keeps every transition unit-testable
//! and the runtime free to replay deterministically.
//!
//! State flow: `AwaitingConsent → Researching → Reporting → Completed`, with
//! terminal branches `Declined`, `Cancelled`, `Failed`.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::check::types::{
    BackgroundCheckInput, BackgroundCheckStatus, CaseState, ConsentResult, Report,
    SearchKind, SearchProgress, SearchResult, SearchStatus,
};
use crate::check::{assess, searches_for};

/// An activity that suspends on a completion token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActivityKind {
    RequestConsent,
    Research(SearchKind),
}

/// How a suspended activity resolved.
#[derive(Debug, Clone)]
pub enum ActivityOutcome {
    /// Completed with a value delivered out-of-band.
    Completed(Value),
    /// Failed after the runtime exhausted retries, or its deadline fired.
    Failed(String),
}

/// Side effects the runtime applies after a transition.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Issue a fresh token for the activity and deliver the human-facing
    /// request. The deadline doubles as the activity's timer.
    Schedule {
        activity: ActivityKind,
        deadline: DateTime<Utc>,
    },
    /// Revoke the outstanding token for an activity.
    Revoke(ActivityKind),
    /// Persist the final report (idempotent on the case ID). The runtime
    /// reports back via [`CaseWorkflow::on_report_persisted`].
    Persist(Report),
}

/// Rejected events. `InvalidPayload` must not consume the caller's token.
#[derive(Debug, Error)]
pub enum CaseError {
    #[error("No such activity is awaiting completion")]
    NotPending,

    #[error("Case is already in a terminal state")]
    Terminal,

    #[error("Payload does not match the awaited activity: {0}")]
    InvalidPayload(String),
}

/// Consent and per-search deadlines.
#[derive(Debug, Clone, Copy)]
pub struct CaseTimeouts {
    pub consent: Duration,
    pub search: Duration,
}

impl Default for CaseTimeouts {
    fn default() -> Self {
        Self {
            consent: Duration::days(7),
            search: Duration::days(30),
        }
    }
}

/// Internal lifecycle phase. `Reporting` is an internal stop between the last
/// search settling and the persist step; externally it reads as `running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingConsent,
    Researching,
    Reporting,
    Completed,
    Declined,
    Cancelled,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Declined | Self::Cancelled | Self::Failed
        )
    }

    fn case_state(&self) -> CaseState {
        match self {
            Self::AwaitingConsent => CaseState::PendingConsent,
            Self::Researching | Self::Reporting => CaseState::Running,
            Self::Completed => CaseState::Completed,
            Self::Declined => CaseState::Declined,
            Self::Cancelled => CaseState::Cancelled,
            Self::Failed => CaseState::Failed,
        }
    }
}

#[derive(Debug, Clone)]
struct SearchSlot {
    mandatory: bool,
    status: SearchStatus,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    result: Option<SearchResult>,
}

#[derive(Debug, Clone, Copy)]
struct PendingActivity {
    created_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
}

/// One case, from intake to terminal state.
#[derive(Debug, Clone)]
pub struct CaseWorkflow {
    input: BackgroundCheckInput,
    timeouts: CaseTimeouts,
    phase: Phase,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    searches: BTreeMap<SearchKind, SearchSlot>,
    pending: BTreeMap<ActivityKind, PendingActivity>,
    report: Option<Report>,
}

impl CaseWorkflow {
    /// Start a new case: schedule the consent request with its deadline.
    pub fn start(
        input: BackgroundCheckInput,
        timeouts: CaseTimeouts,
        now: DateTime<Utc>,
    ) -> (Self, Vec<Effect>) {
        let deadline = now + timeouts.consent;
        let mut workflow = Self {
            input,
            timeouts,
            phase: Phase::AwaitingConsent,
            started_at: now,
            completed_at: None,
            searches: BTreeMap::new(),
            pending: BTreeMap::new(),
            report: None,
        };
        workflow.pending.insert(
            ActivityKind::RequestConsent,
            PendingActivity { created_at: now, deadline },
        );
        let effects = vec![Effect::Schedule {
            activity: ActivityKind::RequestConsent,
            deadline,
        }];
        (workflow, effects)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn input(&self) -> &BackgroundCheckInput {
        &self.input
    }

    /// Activities currently awaiting a human, with their issue time and
    /// deadline. Todos are derived from this on query.
    pub fn outstanding(&self) -> Vec<(ActivityKind, DateTime<Utc>, DateTime<Utc>)> {
        self.pending
            .iter()
            .map(|(activity, p)| (*activity, p.created_at, p.deadline))
            .collect()
    }

    /// Pending activities whose deadline has passed.
    pub fn expired(&self, now: DateTime<Utc>) -> Vec<ActivityKind> {
        self.pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(activity, _)| *activity)
            .collect()
    }

    /// Deliver an activity completion.
    pub fn on_activity_completed(
        &mut self,
        activity: ActivityKind,
        outcome: ActivityOutcome,
        now: DateTime<Utc>,
    ) -> Result<Vec<Effect>, CaseError> {
        if self.phase.is_terminal() {
            return Err(CaseError::Terminal);
        }
        if !self.pending.contains_key(&activity) {
            return Err(CaseError::NotPending);
        }
        match activity {
            ActivityKind::RequestConsent => self.on_consent(outcome, now),
            ActivityKind::Research(kind) => self.on_search(kind, outcome, now),
        }
    }

    /// A deadline timer fired. Equivalent to the activity failing with a
    /// deadline-exceeded cause; also revokes the stale token.
    pub fn on_deadline(&mut self, activity: ActivityKind, now: DateTime<Utc>) -> Vec<Effect> {
        let outcome = ActivityOutcome::Failed("deadline exceeded".to_string());
        match self.on_activity_completed(activity, outcome, now) {
            Ok(mut effects) => {
                effects.push(Effect::Revoke(activity));
                effects
            }
            Err(_) => Vec::new(),
        }
    }

    /// External cancellation. Terminal and idempotent; no report is produced.
    pub fn on_cancel(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        if self.phase.is_terminal() {
            return Vec::new();
        }
        let effects: Vec<Effect> = self
            .pending
            .keys()
            .map(|activity| Effect::Revoke(*activity))
            .collect();
        for activity in self.pending.keys() {
            if let ActivityKind::Research(kind) = activity
                && let Some(slot) = self.searches.get_mut(kind)
            {
                slot.status = SearchStatus::Cancelled;
                slot.completed_at = Some(now);
            }
        }
        self.pending.clear();
        self.phase = Phase::Cancelled;
        self.completed_at = Some(now);
        self.report = None;
        effects
    }

    /// The persist step finished; the case is complete.
    pub fn on_report_persisted(&mut self, now: DateTime<Utc>) {
        if self.phase == Phase::Reporting {
            self.phase = Phase::Completed;
            self.completed_at = Some(now);
        }
    }

    /// Read-only `status` query snapshot.
    pub fn status(&self) -> BackgroundCheckStatus {
        let searches = self
            .searches
            .iter()
            .map(|(kind, slot)| {
                (
                    *kind,
                    SearchProgress {
                        status: slot.status,
                        started_at: slot.started_at,
                        completed_at: slot.completed_at,
                    },
                )
            })
            .collect();
        BackgroundCheckStatus {
            tier: self.input.tier,
            email: self.input.email.clone(),
            state: self.phase.case_state(),
            started_at: self.started_at,
            completed_at: self.completed_at,
            searches,
            // A report is observable iff the case completed.
            report: (self.phase == Phase::Completed)
                .then(|| self.report.clone())
                .flatten(),
        }
    }

    fn on_consent(
        &mut self,
        outcome: ActivityOutcome,
        now: DateTime<Utc>,
    ) -> Result<Vec<Effect>, CaseError> {
        let consent = match outcome {
            ActivityOutcome::Completed(value) => {
                let result: ConsentResult = serde_json::from_value(value)
                    .map_err(|e| CaseError::InvalidPayload(e.to_string()))?;
                result.consent
            }
            // Retry exhaustion or a fired consent timer both read as no
            // consent before the deadline.
            ActivityOutcome::Failed(_) => false,
        };
        self.pending.remove(&ActivityKind::RequestConsent);

        if !consent {
            self.phase = Phase::Declined;
            self.completed_at = Some(now);
            return Ok(Vec::new());
        }

        self.phase = Phase::Researching;
        let deadline = now + self.timeouts.search;
        let mut effects = Vec::new();
        for spec in searches_for(self.input.tier, &self.input.package) {
            self.searches.insert(
                spec.kind,
                SearchSlot {
                    mandatory: spec.mandatory,
                    status: SearchStatus::Pending,
                    started_at: now,
                    completed_at: None,
                    result: None,
                },
            );
            self.pending.insert(
                ActivityKind::Research(spec.kind),
                PendingActivity { created_at: now, deadline },
            );
            effects.push(Effect::Schedule {
                activity: ActivityKind::Research(spec.kind),
                deadline,
            });
        }
        Ok(effects)
    }

    fn on_search(
        &mut self,
        kind: SearchKind,
        outcome: ActivityOutcome,
        now: DateTime<Utc>,
    ) -> Result<Vec<Effect>, CaseError> {
        match outcome {
            ActivityOutcome::Completed(value) => {
                // Decode before consuming anything so a mismatched payload
                // leaves the token live.
                let result = SearchResult::from_payload(kind, value)
                    .map_err(|e| CaseError::InvalidPayload(e.to_string()))?;
                self.pending.remove(&ActivityKind::Research(kind));
                if let Some(slot) = self.searches.get_mut(&kind) {
                    slot.status = SearchStatus::Completed;
                    slot.completed_at = Some(now);
                    slot.result = Some(result);
                }
                Ok(self.maybe_settle(now))
            }
            ActivityOutcome::Failed(cause) => {
                self.pending.remove(&ActivityKind::Research(kind));
                let mandatory = match self.searches.get_mut(&kind) {
                    Some(slot) => {
                        slot.status = SearchStatus::Failed;
                        slot.completed_at = Some(now);
                        slot.mandatory
                    }
                    None => false,
                };
                tracing::warn!(kind = kind.as_str(), %cause, "search failed");
                if mandatory {
                    return Ok(self.fail_case(now));
                }
                Ok(self.maybe_settle(now))
            }
        }
    }

    /// All searches settled: assemble the report and hand it to the runtime
    /// for persistence.
    fn maybe_settle(&mut self, _now: DateTime<Utc>) -> Vec<Effect> {
        let research_pending = self
            .pending
            .keys()
            .any(|a| matches!(a, ActivityKind::Research(_)));
        if research_pending || self.phase != Phase::Researching {
            return Vec::new();
        }

        self.phase = Phase::Reporting;
        let completed: BTreeMap<SearchKind, SearchResult> = self
            .searches
            .iter()
            .filter_map(|(kind, slot)| slot.result.clone().map(|r| (*kind, r)))
            .collect();
        let (verdict, findings) = assess(&completed);
        let report = Report {
            verdict,
            findings,
            results: completed
                .iter()
                .map(|(kind, result)| (*kind, result.payload()))
                .collect(),
        };
        self.report = Some(report.clone());
        vec![Effect::Persist(report)]
    }

    /// A mandatory search failed: the whole case fails and every other
    /// outstanding token dies with it.
    fn fail_case(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        let effects: Vec<Effect> = self
            .pending
            .keys()
            .map(|activity| Effect::Revoke(*activity))
            .collect();
        for activity in self.pending.keys() {
            if let ActivityKind::Research(kind) = activity
                && let Some(slot) = self.searches.get_mut(kind)
            {
                slot.status = SearchStatus::Cancelled;
                slot.completed_at = Some(now);
            }
        }
        self.pending.clear();
        self.phase = Phase::Failed;
        self.completed_at = Some(now);
        self.report = None;
        effects
    }
}
