//! Itinerary designer
//!
//! Drafts a day-by-day itinerary from the destination catalog plus whatever
//! memory knows about the destination and the traveler. Given a refinement
//! instruction it revises the previous draft instead of starting over.

use super::context::{belongs_to, has_memory_type, mentions_destination, ContextSummary};
use super::knowledge::{
    cultural_insights, day_theme, destination_profile, CulturalInsights, DailyBudgetRange,
    DestinationProfile, Site, GENERIC_DAILY_BUDGET,
};
use super::signals;
use super::types::{
    Activity, ActivityKind, ConstraintKind, CostEstimate, DayPlan, Itinerary, Meals, Modification,
    RefinementInstruction, TimeSlot, TripParameters,
};
use super::{MemoryContext, WorkerEnv, WorkerRole};
use crate::llm::{GenerationOptions, TextGenerator};
use crate::memory::{Fragment, KindSelector, MemoryKind, MemoryQuery, MemoryRecord, Metadata};
use crate::message_bus::Notice;
use sdk::errors::SquadError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

const ROLE: WorkerRole = WorkerRole::Designer;

/// Share of the daily spend one activity may take before a high-priority
/// budget constraint replaces it.
const ACTIVITY_SHARE: f64 = 0.2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignRequest {
    pub project_id: String,
    pub params: TripParameters,
    /// Validator findings; present on the second pass only
    #[serde(default)]
    pub refinement: Option<RefinementInstruction>,
    /// Draft being refined
    #[serde(default)]
    pub previous: Option<Itinerary>,
}

impl DesignRequest {
    pub fn draft(project_id: impl Into<String>, params: TripParameters) -> Self {
        Self {
            project_id: project_id.into(),
            params,
            refinement: None,
            previous: None,
        }
    }

    pub fn refine(
        project_id: impl Into<String>,
        params: TripParameters,
        previous: Itinerary,
        refinement: RefinementInstruction,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            params,
            refinement: Some(refinement),
            previous: Some(previous),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignOutcome {
    pub itinerary: Itinerary,
    pub profile: DestinationProfile,
    pub memory: ContextSummary,
    pub persisted: bool,
}

pub struct Designer {
    env: WorkerEnv,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl Designer {
    pub fn new(env: WorkerEnv) -> Self {
        Self {
            env,
            generator: None,
        }
    }

    /// Asks `generator` for a one-paragraph overview of every itinerary.
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub async fn query_context_for(&self, params: &TripParameters) -> MemoryContext {
        let dest = params.destination_key();
        let user = params.user_id.clone().unwrap_or_else(|| "anonymous".to_string());
        let queries = [
            format!("destination research {}", dest),
            format!("cultural insights {}", dest),
            format!("itinerary planning {}", dest),
            format!("user preferences {}", user),
            format!("{} day trip {} budget", params.duration, params.budget_level),
        ]
        .into_iter()
        .map(|text| MemoryQuery::new(text).kind(KindSelector::All).limit(3))
        .collect();

        let destination = params.destination.clone();
        let user_id = params.user_id.clone();
        MemoryContext::gather(self.env.gateway.as_deref(), ROLE, queries)
            .await
            .with_subset("destination", |f| mentions_destination(f, &destination))
            .with_subset("user", |f| belongs_to(f, user_id.as_deref()))
            .with_subset("cultural", |f| has_memory_type(f, "cultural_insights"))
            .with_subset("itinerary", |f| has_memory_type(f, "daily_itinerary"))
    }

    pub async fn design(&self, request: DesignRequest) -> Result<DesignOutcome, SquadError> {
        let params = &request.params;
        let context = self.query_context_for(params).await;

        let mut profile = destination_profile(&params.destination);
        let insights = cultural_insights(&profile.country);
        let merged = merge_memory(&mut profile, &context, params);
        debug!(
            destination = %profile.name,
            has_context = context.has_context,
            merged,
            "Destination profile ready"
        );

        let mut itinerary = match (request.refinement.as_ref(), request.previous) {
            (Some(instruction), Some(previous)) => {
                if previous.duration != params.duration {
                    return Err(SquadError::worker(
                        ROLE.as_str(),
                        "refinement",
                        "previous itinerary does not match the requested duration",
                    ));
                }
                refine(previous, instruction, &profile)
            }
            (Some(_), None) => {
                return Err(SquadError::worker(
                    ROLE.as_str(),
                    "refinement",
                    "refinement requested without a previous itinerary",
                ))
            }
            (None, _) => draft(&request.project_id, params, &profile, &insights),
        };
        itinerary.memory_enhanced = merged > 0;

        if let Some(generator) = &self.generator {
            itinerary.overview = Some(self.overview(generator.as_ref(), &itinerary).await?);
        }

        let persisted = if request.refinement.is_none() {
            self.remember(params, &profile, &insights, &itinerary).await
        } else {
            false
        };

        for to in [WorkerRole::CostAnalyst, WorkerRole::FactChecker] {
            self.env
                .notify(
                    ROLE,
                    to,
                    Notice::ItineraryDrafted {
                        project_id: request.project_id.clone(),
                        version: itinerary.version,
                        days: itinerary.days.len(),
                    },
                )
                .await;
        }

        info!(
            project_id = %request.project_id,
            version = itinerary.version,
            days = itinerary.days.len(),
            total = itinerary.estimated_cost.total,
            "Itinerary designed"
        );

        Ok(DesignOutcome {
            itinerary,
            profile,
            memory: context.summary(),
            persisted,
        })
    }

    async fn overview(
        &self,
        generator: &dyn TextGenerator,
        itinerary: &Itinerary,
    ) -> Result<String, SquadError> {
        let system = "You are a travel designer. Reply with one short paragraph, no lists.";
        let themes: Vec<&str> = itinerary.days.iter().map(|d| d.theme.as_str()).collect();
        let user = format!(
            "Write an overview for a {}-day {} trip to {}, {} for {} traveler(s). Day themes: {}.",
            itinerary.duration,
            itinerary.budget_level,
            itinerary.destination,
            itinerary.country,
            itinerary.travelers,
            themes.join(", ")
        );
        let generation = generator
            .generate(system, &user, &GenerationOptions::default())
            .await?;
        Ok(generation.into_text().trim().to_string())
    }

    async fn remember(
        &self,
        params: &TripParameters,
        profile: &DestinationProfile,
        insights: &CulturalInsights,
        itinerary: &Itinerary,
    ) -> bool {
        let now = self.env.clock.now();
        let sites: Vec<&str> = profile.must_visit.iter().map(|s| s.name.as_str()).collect();
        let content = [
            Some(format!(
                "Destination research {name}. Itinerary planning {name}: {days} day trip for \
                 {travelers} travelers, {level} budget.",
                name = profile.name,
                days = params.duration,
                travelers = params.travelers,
                level = params.budget_level,
            )),
            signals::labelled_list("Must visit", &sites),
            signals::labelled_list("Etiquette", &profile.local_customs),
            Some(format!(
                "Total estimated cost: {:.0}.",
                itinerary.estimated_cost.total
            )),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
        let metadata = Metadata::new(ROLE.as_str(), now)
            .with_destination(profile.name.clone())
            .with_user(params.user_id.clone())
            .with_memory_type("destination_research")
            .with_extra("duration", serde_json::json!(params.duration))
            .with_extra("travelers", serde_json::json!(params.travelers));
        let destination = MemoryRecord::new(
            MemoryRecord::generate_id(MemoryKind::Destination),
            MemoryKind::Destination,
            content,
            metadata,
        );

        let cultural = MemoryRecord::new(
            MemoryRecord::generate_id(MemoryKind::Cultural),
            MemoryKind::Cultural,
            [
                Some(format!("Cultural insights {}.", profile.name)),
                signals::labelled_list("Etiquette", &insights.etiquette),
            ]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" "),
            Metadata::new(ROLE.as_str(), now)
                .with_destination(profile.name.clone())
                .with_user(params.user_id.clone())
                .with_memory_type("cultural_insights"),
        );

        let stored = self.env.persist(ROLE, destination).await;
        self.env.persist(ROLE, cultural).await && stored
    }
}

/// Folds remembered signals for this destination into the catalog profile.
/// Returns how many values were added.
fn merge_memory(
    profile: &mut DestinationProfile,
    context: &MemoryContext,
    params: &TripParameters,
) -> usize {
    let mut added = 0;
    for fragment in &context.records {
        if !mentions_destination(fragment, &profile.name)
            && !mentions_destination(fragment, &params.destination)
        {
            continue;
        }
        added += signals::merge_unique(&mut profile.local_customs, signals::etiquette(&fragment.content));

        for name in signals::must_visit(&fragment.content) {
            let known = profile
                .must_visit
                .iter()
                .any(|s| s.name.eq_ignore_ascii_case(&name));
            if !known {
                profile.must_visit.push(Site::named(name));
                added += 1;
            }
        }

        if profile.daily_budget.is_none() {
            if let Some(total) = signals::total_estimated_cost(&fragment.content) {
                let (days, travelers) = remembered_shape(fragment, params);
                profile.daily_budget =
                    Some(DailyBudgetRange::from_trip_total(total, days, travelers));
                added += 1;
            }
        }
    }
    added
}

/// Duration and party size of the trip a remembered total was quoted for.
/// Metadata wins over the text; the current request fills whatever is
/// missing.
fn remembered_shape(fragment: &Fragment, params: &TripParameters) -> (u32, u32) {
    let from_extra = |key: &str| {
        fragment
            .metadata
            .extra
            .get(key)
            .and_then(serde_json::Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0)
    };
    let days = from_extra("duration")
        .or_else(|| signals::trip_days(&fragment.content))
        .unwrap_or(params.duration);
    let travelers = from_extra("travelers")
        .or_else(|| signals::trip_travelers(&fragment.content))
        .unwrap_or(params.travelers);
    (days, travelers)
}

fn activity(
    name: &str,
    kind: ActivityKind,
    slot: TimeSlot,
    duration_minutes: u32,
    cost: Option<f64>,
    location: Option<String>,
    requires_booking: bool,
) -> Activity {
    Activity {
        name: name.to_string(),
        kind,
        slot,
        duration_minutes,
        cost,
        location,
        requires_booking,
        booking_url: None,
        notes: Vec::new(),
    }
}

fn site_activity(site: &Site) -> Activity {
    activity(
        &site.name,
        site.kind,
        TimeSlot::Morning,
        site.duration_minutes,
        site.cost,
        site.location.clone(),
        site.requires_booking,
    )
}

fn morning(day: u32, profile: &DestinationProfile) -> Vec<Activity> {
    let city = &profile.name;
    let mut slot = vec![activity(
        "Breakfast at Local Café",
        ActivityKind::Food,
        TimeSlot::Morning,
        60,
        Some(15.0),
        Some("Near accommodation".to_string()),
        false,
    )];
    let highlight = if day == 1 {
        activity(
            "Morning Walk",
            ActivityKind::Sightseeing,
            TimeSlot::Morning,
            90,
            Some(0.0),
            Some(format!("{} city center", city)),
            false,
        )
    } else {
        match profile.must_visit.get(day as usize - 2) {
            Some(site) => site_activity(site),
            None => activity(
                "Visit Local Market",
                ActivityKind::Cultural,
                TimeSlot::Morning,
                120,
                Some(10.0),
                None,
                false,
            ),
        }
    };
    slot.push(highlight);
    slot
}

fn afternoon_pool(city: &str) -> [Activity; 6] {
    let slot = TimeSlot::Afternoon;
    [
        activity("Museum Visit", ActivityKind::Cultural, slot, 180, Some(20.0), Some(format!("{} National Museum", city)), false),
        activity("Historical Site Tour", ActivityKind::Historical, slot, 150, None, Some(format!("{} old quarter", city)), false),
        activity("Neighborhood Exploration", ActivityKind::Leisure, slot, 120, Some(5.0), Some(format!("{} old town", city)), false),
        activity("Museum Pass", ActivityKind::Cultural, slot, 240, Some(35.0), Some(format!("{} museum district", city)), true),
        activity("Cultural Experience", ActivityKind::Cultural, slot, 150, Some(65.0), Some(format!("{} cultural center", city)), true),
        activity("Private Guided Tour", ActivityKind::Sightseeing, slot, 240, Some(120.0), Some(format!("Meeting point in {} center", city)), true),
    ]
}

fn evening_pool(city: &str) -> [Activity; 3] {
    let slot = TimeSlot::Evening;
    [
        activity("Sunset Viewpoint", ActivityKind::Sightseeing, slot, 60, Some(0.0), None, false),
        activity("Local Restaurant Experience", ActivityKind::Food, slot, 120, Some(30.0), Some(format!("{} dining district", city)), false),
        activity("Evening Stroll", ActivityKind::Leisure, slot, 90, Some(0.0), Some(format!("{} riverside", city)), false),
    ]
}

fn estimate(days: &[DayPlan]) -> CostEstimate {
    let total: f64 = days.iter().map(|d| d.budget).sum();
    let per_day = if days.is_empty() { 0.0 } else { total / days.len() as f64 };
    CostEstimate {
        total,
        per_day,
        accommodation: total * 0.4,
        food: total * 0.3,
        activities: total * 0.2,
        transport: total * 0.1,
    }
}

fn draft(
    project_id: &str,
    params: &TripParameters,
    profile: &DestinationProfile,
    insights: &CulturalInsights,
) -> Itinerary {
    let range = profile.daily_budget.unwrap_or(GENERIC_DAILY_BUDGET);
    let day_budget = range.for_level(params.budget_level) * f64::from(params.travelers);
    let afternoon = afternoon_pool(&profile.name);
    let evening = evening_pool(&profile.name);
    let etiquette = &insights.etiquette;

    let days: Vec<DayPlan> = (1..=params.duration)
        .map(|day| {
            let i = (day - 1) as usize;
            let mut activities = morning(day, profile);
            activities.push(afternoon[(2 * i) % afternoon.len()].clone());
            activities.push(afternoon[(2 * i + 1) % afternoon.len()].clone());
            activities.push(evening[i % evening.len()].clone());
            activities.push(evening[(i + 1) % evening.len()].clone());

            let dinner = if day == params.duration {
                "Farewell dinner".to_string()
            } else {
                format!("Dinner in {}", profile.name)
            };
            DayPlan {
                day,
                date: params
                    .start_date
                    .map(|start| start + chrono::Duration::days(i64::from(day - 1))),
                theme: day_theme(day, params.duration).to_string(),
                meals: Meals {
                    breakfast: "Breakfast at a local café".to_string(),
                    lunch: format!("Lunch near {}", activities[2].name),
                    dinner,
                },
                activities,
                budget: day_budget,
                cultural_tip: (!etiquette.is_empty()).then(|| etiquette[i % etiquette.len()].clone()),
            }
        })
        .collect();

    let mut cultural_tips = profile.local_customs.clone();
    signals::merge_unique(&mut cultural_tips, insights.etiquette.iter().cloned());

    Itinerary {
        id: format!("{}_itinerary", project_id),
        version: 1,
        destination: profile.name.clone(),
        country: profile.country.clone(),
        duration: params.duration,
        travelers: params.travelers,
        budget: params.budget,
        budget_level: params.budget_level,
        estimated_cost: estimate(&days),
        summary: format!(
            "{}-day {} trip to {}, {} for {} traveler(s), covering {} must-visit sites.",
            params.duration,
            params.budget_level,
            profile.name,
            profile.country,
            params.travelers,
            profile.must_visit.len()
        ),
        packing_list: packing_list(params, profile),
        travel_tips: travel_tips(params, profile, insights),
        cultural_tips,
        days,
        applied_constraints: Vec::new(),
        overview: None,
        memory_enhanced: false,
    }
}

fn packing_list(params: &TripParameters, profile: &DestinationProfile) -> Vec<String> {
    let mut items: Vec<String> = [
        "Passport and travel documents",
        "Comfortable walking shoes",
        "Universal power adapter",
        "Reusable water bottle",
    ]
    .into_iter()
    .map(String::from)
    .collect();

    let mut extra = Vec::new();
    if profile
        .best_seasons
        .iter()
        .any(|s| s.contains("spring") || s.contains("autumn"))
    {
        extra.push("Light layers for changing weather".to_string());
    }
    if profile
        .must_visit
        .iter()
        .any(|s| matches!(s.kind, ActivityKind::Cultural | ActivityKind::Historical))
    {
        extra.push("Modest clothing for temples and religious sites".to_string());
    }
    if params.duration > 7 {
        extra.push("Travel laundry kit".to_string());
    }
    for interest in &params.interests {
        match interest.to_lowercase().as_str() {
            "photography" => extra.push("Camera and spare batteries".to_string()),
            "hiking" | "adventure" => extra.push("Daypack and rain jacket".to_string()),
            "beach" => extra.push("Swimwear and sunscreen".to_string()),
            _ => {}
        }
    }
    signals::merge_unique(&mut items, extra);
    items
}

fn travel_tips(
    params: &TripParameters,
    profile: &DestinationProfile,
    insights: &CulturalInsights,
) -> Vec<String> {
    let mut tips = insights.transportation.clone();
    tips.extend(insights.language_tips.iter().take(1).cloned());
    tips.extend(insights.food_culture.iter().take(1).cloned());
    tips.push(format!(
        "Best time to visit {}: {}",
        profile.name,
        profile.best_seasons.join(", ")
    ));
    if params.duration < profile.duration.min {
        tips.push(format!(
            "{} usually needs at least {} days; prioritise the must-visit sites",
            profile.name, profile.duration.min
        ));
    } else if params.duration > profile.duration.max {
        tips.push(format!(
            "Consider a day trip outside {} to vary a long stay",
            profile.name
        ));
    }
    tips
}

fn cheaper_alternative(original: &Activity, city: &str) -> Activity {
    let (name, kind, cost) = match original.kind {
        ActivityKind::Food => ("Street Food Tasting", ActivityKind::Food, 12.0),
        ActivityKind::Cultural => ("Local Community Event", ActivityKind::Cultural, 0.0),
        ActivityKind::Shopping | ActivityKind::Leisure => {
            ("Public Park Visit", ActivityKind::Leisure, 0.0)
        }
        ActivityKind::Sightseeing | ActivityKind::Historical => {
            ("Free Walking Tour", ActivityKind::Sightseeing, 0.0)
        }
    };
    let mut replacement = activity(
        name,
        kind,
        original.slot,
        original.duration_minutes.min(150),
        Some(cost),
        Some(format!("{} city center", city)),
        false,
    );
    replacement
        .notes
        .push(format!("Replaces {} to stay within budget", original.name));
    replacement
}

/// Applies validator findings to the previous draft. The day count never
/// changes and the version always moves forward by one.
fn refine(
    mut itinerary: Itinerary,
    instruction: &RefinementInstruction,
    profile: &DestinationProfile,
) -> Itinerary {
    let city = itinerary.destination.clone();
    let travelers = f64::from(itinerary.travelers.max(1));

    if instruction.has_high_priority_budget_constraint() {
        let range = profile.daily_budget.unwrap_or(GENERIC_DAILY_BUDGET);
        let ceiling = range.for_level(instruction.budget_level) * ACTIVITY_SHARE;
        for day in &mut itinerary.days {
            let mut saved = 0.0;
            for slot in &mut day.activities {
                if let Some(cost) = slot.cost.filter(|c| *c > ceiling) {
                    let replacement = cheaper_alternative(slot, &city);
                    saved += (cost - replacement.cost.unwrap_or(0.0)) * travelers;
                    *slot = replacement;
                }
            }
            day.budget = (day.budget - saved).max(0.0);
        }
    }

    for constraint in &instruction.constraints {
        match constraint.kind {
            ConstraintKind::BudgetOptimization => {
                if let Some(category) = &constraint.target {
                    let tip = format!("Look for savings on {}", category);
                    signals::merge_unique(&mut itinerary.travel_tips, [tip]);
                }
            }
            ConstraintKind::FactVerification => {
                let Some(target) = &constraint.target else {
                    continue;
                };
                for slot in itinerary
                    .days
                    .iter_mut()
                    .flat_map(|d| d.activities.iter_mut())
                    .filter(|a| a.name.eq_ignore_ascii_case(target))
                {
                    if slot.location.is_none() {
                        slot.location = Some(format!("{}, exact address to confirm", city));
                    }
                    let note = format!("Check before visiting: {}", constraint.description);
                    if !slot.notes.contains(&note) {
                        slot.notes.push(note);
                    }
                }
            }
        }
        itinerary.applied_constraints.push(constraint.description.clone());
    }

    for modification in &instruction.modifications {
        match modification {
            Modification::BookingLink { activity, url, .. } => {
                for slot in itinerary
                    .days
                    .iter_mut()
                    .flat_map(|d| d.activities.iter_mut())
                    .filter(|a| a.name.eq_ignore_ascii_case(activity))
                {
                    slot.booking_url = Some(url.clone());
                    slot.requires_booking = true;
                }
            }
        }
    }

    itinerary.budget = instruction.budget;
    itinerary.estimated_cost = estimate(&itinerary.days);
    itinerary.version += 1;
    itinerary
}
