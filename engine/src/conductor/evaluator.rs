//! Finalization scoring
//!
//! Three independent checks each produce a 0-100 score; the overall quality
//! is their arithmetic mean.

use crate::workers::{BudgetAnalysis, ResearchReport};
use serde::{Deserialize, Serialize};

/// Budget variance above this percentage costs 20 points.
const MINOR_VARIANCE_PCT: f64 = 10.0;
/// Budget variance above this percentage costs 40 points.
const MAJOR_VARIANCE_PCT: f64 = 20.0;
/// Variance below this percentage counts as budget compliant.
const COMPLIANT_VARIANCE_PCT: f64 = 15.0;
/// Confidence above this counts as factually accurate.
const ACCURATE_CONFIDENCE: f64 = 85.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub budget: f64,
    pub logistics: f64,
    pub facts: f64,
    pub overall: f64,
    pub variance_pct: f64,
    pub budget_compliant: bool,
    pub logistics_verified: bool,
    pub facts_accurate: bool,
}

/// Scores a finished plan from the validators' outputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn budget_score(&self, variance_pct: f64) -> f64 {
        let variance = variance_pct.abs();
        if variance > MAJOR_VARIANCE_PCT {
            60.0
        } else if variance > MINOR_VARIANCE_PCT {
            80.0
        } else {
            100.0
        }
    }

    pub fn logistics_score(&self, high_issues: usize) -> f64 {
        match high_issues {
            0 => 100.0,
            1..=2 => 80.0,
            _ => 60.0,
        }
    }

    pub fn fact_score(&self, confidence: f64) -> f64 {
        confidence.clamp(0.0, 100.0)
    }

    pub fn score(&self, budget: &BudgetAnalysis, research: &ResearchReport) -> QualityScore {
        let variance_pct = budget.variance_pct.abs();
        let high_issues = research.high_severity_issues();

        let budget_score = self.budget_score(variance_pct);
        let logistics = self.logistics_score(high_issues);
        let facts = self.fact_score(research.confidence);

        QualityScore {
            budget: budget_score,
            logistics,
            facts,
            overall: (budget_score + logistics + facts) / 3.0,
            variance_pct,
            budget_compliant: variance_pct < COMPLIANT_VARIANCE_PCT,
            logistics_verified: high_issues == 0,
            facts_accurate: research.confidence > ACCURATE_CONFIDENCE,
        }
    }
}
