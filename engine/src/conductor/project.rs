//! Project records
//!
//! A [`Project`] is one planning request and everything the workflow learns
//! about it. Snapshots are plain clones so callers can poll without holding
//! the conductor's locks.

use super::evaluator::QualityScore;
use super::workflow::WorkflowState;
use crate::workers::{
    BudgetAnalysis, Itinerary, RefinementInstruction, ResearchReport, TripParameters, WorkerRole,
};
use chrono::{DateTime, Utc};
use sdk::errors::SquadError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub state: WorkflowState,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Idle,
    Working,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskLog {
    pub status: TaskStatus,
    pub tasks: Vec<String>,
}

impl Default for TaskLog {
    fn default() -> Self {
        Self {
            status: TaskStatus::Idle,
            tasks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    /// State the project was in when it failed, e.g. `VALIDATION`
    pub phase: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub request: TripParameters,
    pub state: WorkflowState,
    pub history: Vec<StateChange>,
    pub workers: BTreeMap<WorkerRole, TaskLog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub itinerary_v1: Option<Itinerary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub itinerary_v2: Option<Itinerary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_analysis: Option<BudgetAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_report: Option<ResearchReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refinement: Option<RefinementInstruction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Point-in-time copy of a project handed to callers.
pub type ProjectSnapshot = Project;

impl Project {
    pub fn new(id: impl Into<String>, request: TripParameters, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            request,
            state: WorkflowState::Idle,
            history: vec![StateChange {
                state: WorkflowState::Idle,
                at: now,
            }],
            workers: WorkerRole::ALL
                .iter()
                .map(|role| (*role, TaskLog::default()))
                .collect(),
            itinerary_v1: None,
            itinerary_v2: None,
            budget_analysis: None,
            research_report: None,
            refinement: None,
            quality: None,
            failure: None,
            created_at: now,
            finished_at: None,
        }
    }

    /// Builds a project id of the form `squad_<destination-slug>_<uuid>`.
    pub fn generate_id(destination: &str) -> String {
        let mut slug = String::with_capacity(destination.len());
        for c in destination.trim().chars() {
            if c.is_alphanumeric() {
                slug.extend(c.to_lowercase());
            } else if !slug.ends_with('-') {
                slug.push('-');
            }
        }
        let slug = slug.trim_matches('-');
        let slug = if slug.is_empty() { "trip" } else { slug };
        format!("squad_{}_{}", slug, uuid::Uuid::new_v4().simple())
    }

    pub fn transition(&mut self, next: WorkflowState, at: DateTime<Utc>) -> Result<(), SquadError> {
        if !self.state.can_transition_to(next) {
            return Err(SquadError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        self.history.push(StateChange { state: next, at });
        if next.is_terminal() {
            self.finished_at = Some(at);
        }
        Ok(())
    }

    /// Moves to `Error`, recording which phase failed.
    pub fn fail(
        &mut self,
        phase: impl Into<String>,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<(), SquadError> {
        self.transition(WorkflowState::Error, at)?;
        self.failure = Some(Failure {
            phase: phase.into(),
            message: message.into(),
        });
        Ok(())
    }

    pub fn start_task(&mut self, role: WorkerRole, task: impl Into<String>) {
        let log = self.workers.entry(role).or_default();
        log.status = TaskStatus::Working;
        log.tasks.push(task.into());
    }

    pub fn finish_task(&mut self, role: WorkerRole, succeeded: bool) {
        let log = self.workers.entry(role).or_default();
        log.status = if succeeded {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
    }

    /// The most refined itinerary produced so far.
    pub fn last_artifact(&self) -> Option<&Itinerary> {
        self.itinerary_v2.as_ref().or(self.itinerary_v1.as_ref())
    }

    /// States visited after leaving `Idle`.
    pub fn phases(&self) -> Vec<WorkflowState> {
        self.history
            .iter()
            .map(|c| c.state)
            .filter(|s| *s != WorkflowState::Idle)
            .collect()
    }

    pub fn planning_ms(&self) -> Option<f64> {
        let finished = self.finished_at?;
        Some(((finished - self.created_at).num_microseconds()? as f64 / 1000.0).max(0.0))
    }
}
