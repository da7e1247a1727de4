//! Composite result of a completed project

use super::evaluator::QualityScore;
use super::workflow::WorkflowState;
use crate::workers::{BudgetAnalysis, DesignOutcome, Itinerary, ResearchReport, WorkerRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationSummary {
    pub workers: Vec<WorkerRole>,
    pub phases: Vec<WorkflowState>,
    pub cycles: u64,
    pub messages_exchanged: usize,
}

/// Raw output of each worker's final contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAgentResults {
    pub designer: DesignOutcome,
    pub cost_analyst: BudgetAnalysis,
    pub fact_checker: ResearchReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripPlan {
    pub project_id: String,
    pub destination: String,
    pub itinerary: Itinerary,
    pub quality: QualityScore,
    pub recommendations: Vec<String>,
    pub collaboration: CollaborationSummary,
    pub sub_agent_results: SubAgentResults,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub planning_ms: f64,
}

/// Picks the leading recommendations from both validators, without repeats.
pub(crate) fn merge_recommendations(
    budget: &BudgetAnalysis,
    research: &ResearchReport,
    quality: &QualityScore,
) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let candidates = budget
        .recommendations
        .iter()
        .take(3)
        .chain(research.recommendations.iter().take(3))
        .cloned();
    for item in candidates {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    if !quality.budget_compliant {
        out.push("Review the budget alternatives before booking".to_string());
    }
    if !quality.logistics_verified {
        out.push("Confirm flagged locations before finalising the schedule".to_string());
    }
    out
}
