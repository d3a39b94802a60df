//! The in-process durable engine.
//!
//! Owns every live case workflow, the single-use completion-token registry,
//! and the deadline timers. All state sits behind one mutex; case execution
//! is single-threaded per operation, which gives the orchestrator the
//! cooperative, replay-style execution model it expects. Due timers are
//! applied at the top of every operation (and by the gateway's background
//! sweeper) so a consent deadline observed through any query or completion
//! has already fired.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::check::types::{BackgroundCheckInput, CandidateTodo, Report, ResearcherTodo};
use crate::errors::RuntimeError;
use crate::ids::WorkflowId;
use crate::runtime::activities;
use crate::runtime::clock::Clock;
use crate::workflow::{ActivityKind, ActivityOutcome, CaseError, CaseTimeouts, CaseWorkflow, Effect};

/// The single logical task queue the case workflow type binds to.
pub const TASK_QUEUE: &str = "background-checks-main";

/// Query names understood by the case workflow.
pub const QUERY_STATUS: &str = "status";
pub const QUERY_CANDIDATE_TODOS: &str = "candidate_todos";
pub const QUERY_RESEARCHER_TODOS: &str = "researcher_todos";

struct TokenRef {
    case_id: String,
    activity: ActivityKind,
}

struct CaseEntry {
    workflow: CaseWorkflow,
    /// Outstanding token per suspended activity.
    tokens: HashMap<ActivityKind, Vec<u8>>,
}

#[derive(Default)]
struct EngineInner {
    cases: HashMap<String, CaseEntry>,
    tokens: HashMap<Vec<u8>, TokenRef>,
    reports: HashMap<String, Report>,
}

/// Engine handle. Cheap to clone via `Arc`; shared by the gateway and the
/// deadline sweeper.
pub struct Engine {
    inner: Mutex<EngineInner>,
    clock: Arc<dyn Clock>,
    timeouts: CaseTimeouts,
}

impl Engine {
    pub fn new(clock: Arc<dyn Clock>, timeouts: CaseTimeouts) -> Self {
        Self {
            inner: Mutex::new(EngineInner::default()),
            clock,
            timeouts,
        }
    }

    pub fn task_queue(&self) -> &'static str {
        TASK_QUEUE
    }

    /// Start a case workflow under the given ID. Fails with a conflict while
    /// a live (non-terminal) case holds the same ID; a closed case may be
    /// replaced.
    pub fn start_workflow(
        &self,
        workflow_id: &str,
        input: BackgroundCheckInput,
    ) -> Result<(), RuntimeError> {
        let now = self.clock.now();
        let mut inner = self.lock()?;
        apply_due_timers(&mut inner, now);

        if let Some(entry) = inner.cases.get(workflow_id)
            && !entry.workflow.phase().is_terminal()
        {
            return Err(RuntimeError::Conflict(workflow_id.to_string()));
        }

        tracing::info!(workflow_id, email = %input.email, "starting case workflow");
        let (workflow, effects) = CaseWorkflow::start(input, self.timeouts, now);
        inner.reports.remove(workflow_id);
        inner.cases.insert(
            workflow_id.to_string(),
            CaseEntry { workflow, tokens: HashMap::new() },
        );
        apply_effects(&mut inner, workflow_id, effects, now);
        Ok(())
    }

    /// Cancel a case. Cancelling an already-closed case is a no-op.
    pub fn cancel_workflow(&self, workflow_id: &str) -> Result<(), RuntimeError> {
        let now = self.clock.now();
        let mut inner = self.lock()?;
        apply_due_timers(&mut inner, now);

        let entry = inner
            .cases
            .get_mut(workflow_id)
            .ok_or_else(|| RuntimeError::NotFound(workflow_id.to_string()))?;
        let effects = entry.workflow.on_cancel(now);
        tracing::info!(workflow_id, "case workflow cancelled");
        apply_effects(&mut inner, workflow_id, effects, now);
        Ok(())
    }

    /// Run a read-only query. The candidate and researcher view IDs resolve
    /// to the underlying case. Returns the result as an opaque encoded value.
    pub fn query_workflow(&self, workflow_id: &str, query: &str) -> Result<Value, RuntimeError> {
        let now = self.clock.now();
        let mut inner = self.lock()?;
        apply_due_timers(&mut inner, now);

        let parsed = WorkflowId::parse(workflow_id)
            .ok_or_else(|| RuntimeError::NotFound(workflow_id.to_string()))?;
        let case_id = parsed.case_id();
        let entry = inner
            .cases
            .get(&case_id)
            .ok_or_else(|| RuntimeError::NotFound(workflow_id.to_string()))?;

        let encoded = match query {
            QUERY_STATUS => serde_json::to_value(entry.workflow.status()),
            QUERY_CANDIDATE_TODOS => serde_json::to_value(candidate_todos(entry)),
            QUERY_RESEARCHER_TODOS => serde_json::to_value(researcher_todos(entry)),
            other => {
                return Err(RuntimeError::InvalidPayload(format!(
                    "unknown query {other}"
                )));
            }
        };
        encoded.map_err(|e| RuntimeError::Transient(e.to_string()))
    }

    /// Deliver an asynchronous activity completion by token. Tokens are
    /// single-use: a consumed, revoked, or never-issued token is unknown. A
    /// payload that does not decode for the awaited activity is rejected
    /// without consuming the token.
    pub fn complete_activity(
        &self,
        token: &[u8],
        outcome: ActivityOutcome,
    ) -> Result<(), RuntimeError> {
        let now = self.clock.now();
        let mut inner = self.lock()?;
        apply_due_timers(&mut inner, now);

        let (case_id, activity) = match inner.tokens.get(token) {
            Some(token_ref) => (token_ref.case_id.clone(), token_ref.activity),
            None => return Err(RuntimeError::UnknownToken),
        };
        let entry = inner
            .cases
            .get_mut(&case_id)
            .ok_or(RuntimeError::UnknownToken)?;

        let effects = entry
            .workflow
            .on_activity_completed(activity, outcome, now)
            .map_err(|e| match e {
                CaseError::InvalidPayload(msg) => RuntimeError::InvalidPayload(msg),
                CaseError::NotPending | CaseError::Terminal => RuntimeError::UnknownToken,
            })?;

        entry.tokens.remove(&activity);
        inner.tokens.remove(token);
        tracing::debug!(%case_id, ?activity, "activity completed");
        apply_effects(&mut inner, &case_id, effects, now);
        Ok(())
    }

    /// Inputs of every open (non-terminal) case whose ID starts with the
    /// prefix, as opaque encoded values.
    pub fn list_workflows(&self, prefix: &str) -> Result<Vec<Value>, RuntimeError> {
        let now = self.clock.now();
        let mut inner = self.lock()?;
        apply_due_timers(&mut inner, now);

        let mut open: Vec<(&String, &CaseEntry)> = inner
            .cases
            .iter()
            .filter(|(id, entry)| {
                id.starts_with(prefix) && !entry.workflow.phase().is_terminal()
            })
            .collect();
        open.sort_by(|a, b| a.0.cmp(b.0));
        open.into_iter()
            .map(|(_, entry)| {
                serde_json::to_value(entry.workflow.input())
                    .map_err(|e| RuntimeError::Transient(e.to_string()))
            })
            .collect()
    }

    /// Fire any due deadline timers. Called periodically by the gateway's
    /// sweeper so timeouts fire even when no request touches the engine.
    pub fn sweep(&self) -> Result<(), RuntimeError> {
        let now = self.clock.now();
        let mut inner = self.lock()?;
        apply_due_timers(&mut inner, now);
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, EngineInner>, RuntimeError> {
        self.inner
            .lock()
            .map_err(|_| RuntimeError::Transient("engine lock poisoned".to_string()))
    }
}

fn candidate_todos(entry: &CaseEntry) -> Vec<CandidateTodo> {
    entry
        .workflow
        .outstanding()
        .into_iter()
        .filter(|(activity, _, _)| *activity == ActivityKind::RequestConsent)
        .filter_map(|(activity, created_at, deadline)| {
            entry.tokens.get(&activity).map(|token| CandidateTodo {
                token: token.clone(),
                kind: "consent".to_string(),
                created_at,
                deadline,
            })
        })
        .collect()
}

fn researcher_todos(entry: &CaseEntry) -> Vec<ResearcherTodo> {
    entry
        .workflow
        .outstanding()
        .into_iter()
        .filter_map(|(activity, created_at, deadline)| match activity {
            ActivityKind::Research(kind) => {
                entry.tokens.get(&activity).map(|token| ResearcherTodo {
                    token: token.clone(),
                    kind,
                    created_at,
                    deadline,
                })
            }
            _ => None,
        })
        .collect()
}

fn apply_due_timers(inner: &mut EngineInner, now: DateTime<Utc>) {
    let case_ids: Vec<String> = inner.cases.keys().cloned().collect();
    for case_id in case_ids {
        loop {
            let expired = match inner.cases.get(&case_id) {
                Some(entry) => entry.workflow.expired(now),
                None => break,
            };
            let Some(activity) = expired.first().copied() else {
                break;
            };
            tracing::info!(%case_id, ?activity, "deadline fired");
            let effects = match inner.cases.get_mut(&case_id) {
                Some(entry) => entry.workflow.on_deadline(activity, now),
                None => break,
            };
            apply_effects(inner, &case_id, effects, now);
        }
    }
}

fn apply_effects(inner: &mut EngineInner, case_id: &str, effects: Vec<Effect>, now: DateTime<Utc>) {
    for effect in effects {
        match effect {
            Effect::Schedule { activity, deadline: _ } => {
                let token = Uuid::new_v4().as_bytes().to_vec();
                let Some(entry) = inner.cases.get_mut(case_id) else {
                    continue;
                };
                let email = entry.workflow.input().email.clone();
                entry.tokens.insert(activity, token.clone());
                inner.tokens.insert(
                    token.clone(),
                    TokenRef { case_id: case_id.to_string(), activity },
                );
                match activity {
                    ActivityKind::RequestConsent => {
                        activities::send_consent_request(&email, &token);
                    }
                    ActivityKind::Research(kind) => {
                        activities::send_researcher_request(&email, kind, &token);
                    }
                }
            }
            Effect::Revoke(activity) => {
                if let Some(entry) = inner.cases.get_mut(case_id)
                    && let Some(token) = entry.tokens.remove(&activity)
                {
                    inner.tokens.remove(&token);
                }
            }
            Effect::Persist(report) => {
                activities::persist_report(&mut inner.reports, case_id, &report);
                if let Some(entry) = inner.cases.get_mut(case_id) {
                    entry.workflow.on_report_persisted(now);
                }
            }
        }
    }
}
