//! Requests and artifacts exchanged between the conductor and the workers

use chrono::NaiveDate;
use sdk::errors::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetLevel {
    Budget,
    #[default]
    Midrange,
    Luxury,
}

impl BudgetLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Budget => "budget",
            Self::Midrange => "midrange",
            Self::Luxury => "luxury",
        }
    }
}

impl fmt::Display for BudgetLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BudgetLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "budget" | "low" => Ok(Self::Budget),
            "midrange" | "mid-range" | "medium" => Ok(Self::Midrange),
            "luxury" | "high" => Ok(Self::Luxury),
            other => Err(ValidationError::invalid(
                "budget_level",
                format!("unknown budget level '{}'", other),
            )),
        }
    }
}

/// A planning request as received from a caller. Optional fields fall back
/// to the orchestrator's configured defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TripRequest {
    pub destination: String,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub travelers: Option<u32>,
    #[serde(default)]
    pub budget_level: BudgetLevel,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

impl TripRequest {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            ..Default::default()
        }
    }

    pub fn duration(mut self, days: u32) -> Self {
        self.duration = Some(days);
        self
    }

    pub fn budget(mut self, amount: f64) -> Self {
        self.budget = Some(amount);
        self
    }

    pub fn travelers(mut self, count: u32) -> Self {
        self.travelers = Some(count);
        self
    }

    pub fn level(mut self, level: BudgetLevel) -> Self {
        self.budget_level = level;
        self
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn interest(mut self, interest: impl Into<String>) -> Self {
        self.interests.push(interest.into());
        self
    }
}

/// A request with every default resolved and validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripParameters {
    pub destination: String,
    pub duration: u32,
    pub budget: f64,
    pub travelers: u32,
    pub budget_level: BudgetLevel,
    pub interests: Vec<String>,
    pub user_id: Option<String>,
    pub start_date: Option<NaiveDate>,
}

impl TripParameters {
    pub fn resolve(
        request: TripRequest,
        default_duration: u32,
        default_budget: f64,
        default_travelers: u32,
    ) -> Result<Self, ValidationError> {
        let destination = request.destination.trim().to_string();
        let duration = request.duration.unwrap_or(default_duration);
        let budget = request.budget.unwrap_or(default_budget);
        let travelers = request.travelers.unwrap_or(default_travelers);

        let mut invalid = Vec::new();
        if destination.is_empty() {
            invalid.push("destination");
        }
        if duration == 0 {
            invalid.push("duration");
        }
        if !(budget.is_finite() && budget > 0.0) {
            invalid.push("budget");
        }
        if travelers == 0 {
            invalid.push("travelers");
        }
        if !invalid.is_empty() {
            return Err(ValidationError {
                fields: invalid.into_iter().map(String::from).collect(),
                reason: "missing or non-positive trip fields".to_string(),
            });
        }

        Ok(Self {
            destination,
            duration,
            budget,
            travelers,
            budget_level: request.budget_level,
            interests: request.interests,
            user_id: request.user_id,
            start_date: request.start_date,
        })
    }

    /// Lowercase key used for knowledge-table lookups.
    pub fn destination_key(&self) -> String {
        self.destination.to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Sightseeing,
    Cultural,
    Historical,
    Food,
    Leisure,
    Shopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSlot {
    Morning,
    Afternoon,
    Evening,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    pub kind: ActivityKind,
    pub slot: TimeSlot,
    pub duration_minutes: u32,
    /// Per-person cost; `None` when the price is unknown
    pub cost: Option<f64>,
    pub location: Option<String>,
    pub requires_booking: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meals {
    pub breakfast: String,
    pub lunch: String,
    pub dinner: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    pub day: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub theme: String,
    pub activities: Vec<Activity>,
    pub meals: Meals,
    /// Spend for the whole group on this day
    pub budget: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cultural_tip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub total: f64,
    pub per_day: f64,
    pub accommodation: f64,
    pub food: f64,
    pub activities: f64,
    pub transport: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    pub id: String,
    pub version: u32,
    pub destination: String,
    pub country: String,
    pub duration: u32,
    pub travelers: u32,
    pub budget: f64,
    pub budget_level: BudgetLevel,
    pub days: Vec<DayPlan>,
    pub estimated_cost: CostEstimate,
    pub summary: String,
    pub packing_list: Vec<String>,
    pub travel_tips: Vec<String>,
    pub cultural_tips: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_constraints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    pub memory_enhanced: bool,
}

impl Itinerary {
    pub fn activities(&self) -> impl Iterator<Item = (u32, &Activity)> {
        self.days
            .iter()
            .flat_map(|d| d.activities.iter().map(move |a| (d.day, a)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl From<Severity> for Priority {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::High => Priority::High,
            Severity::Medium | Severity::Low => Priority::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    BudgetOptimization,
    FactVerification,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub priority: Priority,
    pub description: String,
    /// Budget category or activity name the constraint applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Modification {
    BookingLink {
        activity: String,
        url: String,
        platform: String,
    },
}

/// Validator findings fed back into the designer for a second pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementInstruction {
    pub budget: f64,
    pub budget_level: BudgetLevel,
    pub constraints: Vec<Constraint>,
    pub modifications: Vec<Modification>,
}

impl RefinementInstruction {
    pub fn has_high_priority_budget_constraint(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| c.kind == ConstraintKind::BudgetOptimization && c.priority == Priority::High)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_applies_defaults() {
        let params = TripParameters::resolve(TripRequest::new(" Tokyo "), 7, 2000.0, 1).unwrap();
        assert_eq!(params.destination, "Tokyo");
        assert_eq!(params.duration, 7);
        assert_eq!(params.budget, 2000.0);
        assert_eq!(params.travelers, 1);
        assert_eq!(params.budget_level, BudgetLevel::Midrange);
    }

    #[test]
    fn resolve_reports_every_bad_field() {
        let err = TripParameters::resolve(
            TripRequest::new("").duration(0).budget(-5.0),
            7,
            2000.0,
            1,
        )
        .unwrap_err();
        assert_eq!(err.fields, vec!["destination", "duration", "budget"]);
    }

    #[test]
    fn budget_level_parses_aliases() {
        assert_eq!("medium".parse::<BudgetLevel>().unwrap(), BudgetLevel::Midrange);
        assert_eq!("Luxury".parse::<BudgetLevel>().unwrap(), BudgetLevel::Luxury);
        assert!("platinum".parse::<BudgetLevel>().is_err());
    }

    #[test]
    fn severity_maps_to_priority() {
        assert_eq!(Priority::from(Severity::High), Priority::High);
        assert_eq!(Priority::from(Severity::Medium), Priority::Medium);
        assert_eq!(Priority::from(Severity::Low), Priority::Medium);
    }
}
