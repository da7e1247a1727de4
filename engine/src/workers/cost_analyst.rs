//! Budget analysis
//!
//! Splits the budget across spending categories by level template, checks
//! each category against per-destination daily benchmarks, compares prices
//! through the [`PriceComparisonProvider`] and estimates what the trip will
//! really cost.

use super::context::{belongs_to, contains_any, has_memory_type, mentions_destination, ContextSummary};
use super::providers::{PriceCategory, PriceComparisonProvider, PriceOption, PriceTier};
use super::signals;
use super::types::{BudgetLevel, Itinerary, TripParameters};
use super::{MemoryContext, WorkerEnv, WorkerRole};
use crate::memory::{KindSelector, MemoryKind, MemoryQuery, MemoryRecord, Metadata};
use crate::message_bus::Notice;
use sdk::errors::SquadError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

const ROLE: WorkerRole = WorkerRole::CostAnalyst;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetCategory {
    Accommodation,
    Food,
    Activities,
    Transportation,
    Shopping,
    Emergency,
}

impl BudgetCategory {
    pub const ALL: [BudgetCategory; 6] = [
        BudgetCategory::Accommodation,
        BudgetCategory::Food,
        BudgetCategory::Activities,
        BudgetCategory::Transportation,
        BudgetCategory::Shopping,
        BudgetCategory::Emergency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accommodation => "accommodation",
            Self::Food => "food",
            Self::Activities => "activities",
            Self::Transportation => "transportation",
            Self::Shopping => "shopping",
            Self::Emergency => "emergency",
        }
    }

    /// Fraction of the total budget the level template assigns.
    pub fn share(&self, level: BudgetLevel) -> f64 {
        let template: [f64; 6] = match level {
            BudgetLevel::Budget => [0.30, 0.25, 0.20, 0.15, 0.05, 0.05],
            BudgetLevel::Midrange => [0.35, 0.25, 0.20, 0.12, 0.05, 0.03],
            BudgetLevel::Luxury => [0.45, 0.25, 0.15, 0.10, 0.03, 0.02],
        };
        template[*self as usize]
    }

    /// Whether the benchmark is per room rather than per traveler.
    fn per_room(&self) -> bool {
        matches!(self, Self::Accommodation)
    }
}

impl fmt::Display for BudgetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typical daily spend per traveler (per room for accommodation), indexed
/// budget/midrange/luxury. Only the first four categories are benchmarked.
fn benchmark(destination: &str, category: BudgetCategory, level: BudgetLevel) -> Option<f64> {
    let table: [[f64; 3]; 4] = match destination.to_lowercase().as_str() {
        "tokyo" => [[50.0, 120.0, 300.0], [30.0, 60.0, 150.0], [20.0, 50.0, 100.0], [15.0, 30.0, 80.0]],
        "paris" => [[60.0, 150.0, 400.0], [40.0, 80.0, 200.0], [25.0, 60.0, 120.0], [20.0, 40.0, 100.0]],
        "bangkok" => [[20.0, 50.0, 150.0], [15.0, 30.0, 80.0], [10.0, 25.0, 60.0], [8.0, 15.0, 40.0]],
        _ => [[40.0, 100.0, 250.0], [25.0, 50.0, 120.0], [15.0, 35.0, 80.0], [12.0, 25.0, 60.0]],
    };
    let row = table.get(category as usize)?;
    let column = match level {
        BudgetLevel::Budget => 0,
        BudgetLevel::Midrange => 1,
        BudgetLevel::Luxury => 2,
    };
    Some(row[column])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetRequest {
    pub project_id: String,
    pub params: TripParameters,
    pub itinerary: Itinerary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAllocation {
    pub category: BudgetCategory,
    pub share: f64,
    pub allocated: f64,
    pub daily: f64,
    /// Group-wide daily benchmark; `None` for unbenchmarked categories
    pub benchmark_daily: Option<f64>,
    pub sufficient: bool,
    /// Trip-wide gap between benchmark and allocation
    pub shortfall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceComparison {
    pub category: PriceCategory,
    pub options: Vec<PriceOption>,
    pub cheapest: Option<PriceOption>,
    pub recommended: Option<PriceOption>,
}

impl PriceComparison {
    fn new(category: PriceCategory, options: Vec<PriceOption>) -> Self {
        let cheapest = options
            .iter()
            .min_by(|a, b| a.price.total_cmp(&b.price))
            .cloned();
        let recommended = options
            .iter()
            .find(|o| o.tier == PriceTier::Standard)
            .or_else(|| options.get(options.len() / 2))
            .cloned();
        Self {
            category,
            options,
            cheapest,
            recommended,
        }
    }

    /// Recommended minus cheapest, never negative.
    pub fn spread(&self) -> f64 {
        match (&self.recommended, &self.cheapest) {
            (Some(r), Some(c)) => (r.price - c.price).max(0.0),
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Savings {
    pub flights: f64,
    pub hotels: f64,
    pub transport: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAlternative {
    pub label: String,
    pub budget: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAnalysis {
    pub destination: String,
    pub total_budget: f64,
    pub budget_level: BudgetLevel,
    pub travelers: u32,
    pub duration: u32,
    pub rooms: u32,
    pub allocation: Vec<CategoryAllocation>,
    pub shortfalls: Vec<BudgetCategory>,
    pub price_comparisons: Vec<PriceComparison>,
    pub savings: Savings,
    pub estimated_total: f64,
    /// Signed gap between estimate and budget, as a percentage of the budget
    pub variance_pct: f64,
    /// Itinerary estimate being analysed
    pub itinerary_total: f64,
    pub alternatives: Vec<BudgetAlternative>,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub historical_estimate: Option<f64>,
    pub memory: ContextSummary,
    pub persisted: bool,
}

impl BudgetAnalysis {
    pub fn savings_identified(&self) -> f64 {
        self.savings.total
    }

    pub fn allocation_for(&self, category: BudgetCategory) -> Option<&CategoryAllocation> {
        self.allocation.iter().find(|a| a.category == category)
    }
}

pub struct CostAnalyst {
    env: WorkerEnv,
    prices: Arc<dyn PriceComparisonProvider>,
}

impl CostAnalyst {
    pub fn new(env: WorkerEnv, prices: Arc<dyn PriceComparisonProvider>) -> Self {
        Self { env, prices }
    }

    pub async fn query_context_for(&self, params: &TripParameters) -> MemoryContext {
        let dest = params.destination_key();
        let user = params.user_id.clone().unwrap_or_else(|| "anonymous".to_string());
        let queries = [
            format!("budget analysis {}", dest),
            format!("price data {}", dest),
            format!("cost breakdown {}", dest),
            format!("{} budget {}", params.budget_level, dest),
            format!("user budget preferences {}", user),
        ]
        .into_iter()
        .map(|text| {
            MemoryQuery::new(text)
                .kind(KindSelector::Kind(MemoryKind::Budget))
                .limit(3)
        })
        .collect();

        let user_id = params.user_id.clone();
        MemoryContext::gather(self.env.gateway.as_deref(), ROLE, queries)
            .await
            .with_subset("budget", |f| has_memory_type(f, "budget_analysis"))
            .with_subset("price", |f| contains_any(f, &["price", "cost"]))
            .with_subset("user", |f| belongs_to(f, user_id.as_deref()))
    }

    pub async fn analyze_budget(&self, request: BudgetRequest) -> Result<BudgetAnalysis, SquadError> {
        let params = &request.params;
        let context = self.query_context_for(params).await;

        let historical_estimate = context
            .subset("budget")
            .iter()
            .filter(|f| mentions_destination(f, &params.destination))
            .find_map(|f| signals::total_estimated_cost(&f.content));

        let rooms = params.travelers.div_ceil(2);
        let allocation = allocate(params, rooms);
        let shortfalls: Vec<BudgetCategory> = allocation
            .iter()
            .filter(|a| !a.sufficient)
            .map(|a| a.category)
            .collect();

        let mut price_comparisons = Vec::with_capacity(PriceCategory::ALL.len());
        for category in PriceCategory::ALL {
            let options = self
                .prices
                .quote(category, &params.destination)
                .await
                .map_err(|e| SquadError::worker(ROLE.as_str(), "price_comparison", e))?;
            price_comparisons.push(PriceComparison::new(category, options));
        }
        let savings = savings(&price_comparisons, params, rooms);

        let estimated_total = estimate_total(params, rooms);
        let variance_pct = (estimated_total - params.budget) / params.budget * 100.0;
        debug!(
            destination = %params.destination,
            estimated_total,
            variance_pct,
            shortfalls = shortfalls.len(),
            "Budget estimated"
        );

        let mut analysis = BudgetAnalysis {
            destination: params.destination.clone(),
            total_budget: params.budget,
            budget_level: params.budget_level,
            travelers: params.travelers,
            duration: params.duration,
            rooms,
            recommendations: recommendations(
                params,
                estimated_total,
                &shortfalls,
                &savings,
                historical_estimate,
            ),
            allocation,
            shortfalls,
            price_comparisons,
            savings,
            estimated_total,
            variance_pct,
            itinerary_total: request.itinerary.estimated_cost.total,
            alternatives: alternatives(params.budget),
            historical_estimate,
            memory: context.summary(),
            persisted: false,
        };

        analysis.persisted = self.remember(params, &analysis).await;

        self.env
            .notify(
                ROLE,
                WorkerRole::Designer,
                Notice::BudgetAnalyzed {
                    project_id: request.project_id.clone(),
                    estimated_total: analysis.estimated_total,
                    savings_identified: analysis.savings_identified(),
                    shortfalls: analysis.shortfalls.iter().map(|c| c.to_string()).collect(),
                },
            )
            .await;

        info!(
            project_id = %request.project_id,
            estimated_total = analysis.estimated_total,
            savings = analysis.savings_identified(),
            "Budget analysed"
        );
        Ok(analysis)
    }

    async fn remember(&self, params: &TripParameters, analysis: &BudgetAnalysis) -> bool {
        let shortfalls = if analysis.shortfalls.is_empty() {
            "none".to_string()
        } else {
            analysis
                .shortfalls
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let content = format!(
            "Budget analysis {dest}: {days} day trip for {travelers} travelers at {level} level. \
             Total budget: {budget:.0}. Total estimated cost: {estimate:.0}. \
             Savings identified: {savings:.0}. Shortfalls: {shortfalls}.",
            dest = params.destination,
            days = params.duration,
            travelers = params.travelers,
            level = params.budget_level,
            budget = params.budget,
            estimate = analysis.estimated_total,
            savings = analysis.savings_identified(),
        );
        let metadata = Metadata::new(ROLE.as_str(), self.env.clock.now())
            .with_destination(params.destination.clone())
            .with_user(params.user_id.clone())
            .with_memory_type("budget_analysis");
        let record = MemoryRecord::new(
            MemoryRecord::generate_id(MemoryKind::Budget),
            MemoryKind::Budget,
            content,
            metadata,
        );
        self.env.persist(ROLE, record).await
    }
}

fn allocate(params: &TripParameters, rooms: u32) -> Vec<CategoryAllocation> {
    let days = f64::from(params.duration);
    BudgetCategory::ALL
        .iter()
        .map(|&category| {
            let share = category.share(params.budget_level);
            let allocated = params.budget * share;
            let daily = allocated / days;
            let units = if category.per_room() {
                rooms
            } else {
                params.travelers
            };
            let benchmark_daily = benchmark(&params.destination, category, params.budget_level)
                .map(|per_unit| per_unit * f64::from(units));
            let shortfall = benchmark_daily
                .map(|b| ((b - daily) * days).max(0.0))
                .unwrap_or(0.0);
            CategoryAllocation {
                category,
                share,
                allocated,
                daily,
                benchmark_daily,
                sufficient: shortfall <= 0.0,
                shortfall,
            }
        })
        .collect()
}

fn estimate_total(params: &TripParameters, rooms: u32) -> f64 {
    let days = f64::from(params.duration);
    BudgetCategory::ALL
        .iter()
        .filter_map(|&category| {
            let per_unit = benchmark(&params.destination, category, params.budget_level)?;
            let units = if category.per_room() {
                rooms
            } else {
                params.travelers
            };
            Some(per_unit * f64::from(units) * days)
        })
        .sum()
}

fn savings(comparisons: &[PriceComparison], params: &TripParameters, rooms: u32) -> Savings {
    let spread = |category: PriceCategory| {
        comparisons
            .iter()
            .find(|c| c.category == category)
            .map(PriceComparison::spread)
            .unwrap_or(0.0)
    };
    let flights = spread(PriceCategory::Flights) * f64::from(params.travelers);
    let hotels = spread(PriceCategory::Hotels) * f64::from(params.duration) * f64::from(rooms);
    let transport = spread(PriceCategory::Transport);
    Savings {
        flights,
        hotels,
        transport,
        total: flights + hotels + transport,
    }
}

fn alternatives(budget: f64) -> Vec<BudgetAlternative> {
    vec![
        BudgetAlternative {
            label: "budget traveler".to_string(),
            budget: budget * 0.7,
            description: "Hostels, street food, free walking tours and public transport".to_string(),
        },
        BudgetAlternative {
            label: "luxury".to_string(),
            budget: budget * 1.5,
            description: "Premium hotels, fine dining, private tours and taxis".to_string(),
        },
    ]
}

fn recommendations(
    params: &TripParameters,
    estimated_total: f64,
    shortfalls: &[BudgetCategory],
    savings: &Savings,
    historical_estimate: Option<f64>,
) -> Vec<String> {
    let mut out = Vec::new();
    if estimated_total > params.budget {
        out.push(format!(
            "Estimated costs exceed the budget by {:.0}; consider the budget traveler alternative",
            estimated_total - params.budget
        ));
    }
    for category in shortfalls {
        out.push(format!(
            "Increase the {} allocation or choose cheaper options",
            category
        ));
    }
    if savings.flights > 0.0 {
        out.push(format!("Book flights early to save up to {:.0}", savings.flights));
    }
    if savings.hotels > 0.0 {
        out.push(format!("Compare hotel options to save up to {:.0}", savings.hotels));
    }
    if savings.transport > 0.0 {
        out.push(format!(
            "Use public transport passes instead of taxis to save {:.0}",
            savings.transport
        ));
    }
    if let Some(previous) = historical_estimate {
        out.push(format!(
            "A previous analysis for {} estimated {:.0}",
            params.destination, previous
        ));
    }
    out.push("Track expenses daily and keep the emergency fund untouched".to_string());
    out
}
