//! Static destination knowledge used by the designer
//!
//! Lookups never fail: unknown destinations and countries get a generic
//! profile that the memory merge can later enrich.

use super::types::{ActivityKind, BudgetLevel};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    pub location: Option<String>,
    pub cost: Option<f64>,
    pub duration_minutes: u32,
    pub kind: ActivityKind,
    pub requires_booking: bool,
}

impl Site {
    fn known(
        name: &str,
        location: &str,
        cost: f64,
        duration_minutes: u32,
        kind: ActivityKind,
        requires_booking: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            location: Some(location.to_string()),
            cost: Some(cost),
            duration_minutes,
            kind,
            requires_booking,
        }
    }

    /// A site learned from memory; only the name is known.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: None,
            cost: None,
            duration_minutes: 120,
            kind: ActivityKind::Sightseeing,
            requires_booking: false,
        }
    }
}

/// Per-person daily spend by budget level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBudgetRange {
    pub budget: f64,
    pub midrange: f64,
    pub luxury: f64,
}

impl DailyBudgetRange {
    pub fn for_level(&self, level: BudgetLevel) -> f64 {
        match level {
            BudgetLevel::Budget => self.budget,
            BudgetLevel::Midrange => self.midrange,
            BudgetLevel::Luxury => self.luxury,
        }
    }

    /// Derives a range from a remembered trip total.
    pub fn from_trip_total(total: f64, days: u32, travelers: u32) -> Self {
        let per_day = total / f64::from(days.max(1)) / f64::from(travelers.max(1));
        Self {
            budget: (per_day * 0.6).round(),
            midrange: per_day.round(),
            luxury: (per_day * 2.0).round(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationRange {
    pub min: u32,
    pub recommended: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationProfile {
    pub name: String,
    pub country: String,
    pub best_seasons: Vec<String>,
    pub highlights: Vec<String>,
    pub must_visit: Vec<Site>,
    pub local_customs: Vec<String>,
    pub daily_budget: Option<DailyBudgetRange>,
    pub duration: DurationRange,
    /// False when the generic fallback was used
    pub cataloged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CulturalInsights {
    pub etiquette: Vec<String>,
    pub food_culture: Vec<String>,
    pub language_tips: Vec<String>,
    pub transportation: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Looks up a destination by name or country, case-insensitively.
pub fn destination_profile(destination: &str) -> DestinationProfile {
    let key = destination.trim().to_lowercase();
    match key.as_str() {
        "tokyo" | "japan" => DestinationProfile {
            name: "Tokyo".to_string(),
            country: "Japan".to_string(),
            best_seasons: strings(&["spring", "autumn"]),
            highlights: strings(&["temples", "food markets", "modern skyline"]),
            must_visit: vec![
                Site::known(
                    "Senso-ji Temple",
                    "2-3-1 Asakusa, Taito City",
                    0.0,
                    120,
                    ActivityKind::Cultural,
                    false,
                ),
                Site::known(
                    "Tsukiji Outer Market",
                    "4-16-2 Tsukiji, Chuo City",
                    25.0,
                    120,
                    ActivityKind::Food,
                    false,
                ),
                Site::known(
                    "Tokyo Skytree",
                    "1-1-2 Oshiage, Sumida City",
                    25.0,
                    120,
                    ActivityKind::Sightseeing,
                    true,
                ),
            ],
            local_customs: strings(&[
                "bow when greeting",
                "remove shoes indoors",
                "keep quiet on trains",
            ]),
            daily_budget: Some(DailyBudgetRange {
                budget: 100.0,
                midrange: 200.0,
                luxury: 400.0,
            }),
            duration: DurationRange {
                min: 3,
                recommended: 7,
                max: 14,
            },
            cataloged: true,
        },
        "paris" | "france" => DestinationProfile {
            name: "Paris".to_string(),
            country: "France".to_string(),
            best_seasons: strings(&["spring", "early autumn"]),
            highlights: strings(&["museums", "cafés", "architecture"]),
            must_visit: vec![
                Site::known(
                    "Eiffel Tower",
                    "Champ de Mars, 7th arrondissement",
                    30.0,
                    150,
                    ActivityKind::Sightseeing,
                    true,
                ),
                Site::known(
                    "Louvre Museum",
                    "Rue de Rivoli, 1st arrondissement",
                    22.0,
                    180,
                    ActivityKind::Cultural,
                    true,
                ),
                Site::known(
                    "Notre-Dame Cathedral",
                    "Île de la Cité, 4th arrondissement",
                    0.0,
                    90,
                    ActivityKind::Historical,
                    false,
                ),
            ],
            local_customs: strings(&[
                "greet shopkeepers with bonjour",
                "keep voices low in restaurants",
                "tipping is modest",
            ]),
            daily_budget: Some(DailyBudgetRange {
                budget: 120.0,
                midrange: 250.0,
                luxury: 500.0,
            }),
            duration: DurationRange {
                min: 4,
                recommended: 7,
                max: 21,
            },
            cataloged: true,
        },
        "bangkok" | "thailand" => DestinationProfile {
            name: "Bangkok".to_string(),
            country: "Thailand".to_string(),
            best_seasons: strings(&["cool season"]),
            highlights: strings(&["temples", "street food", "night markets"]),
            must_visit: vec![
                Site::known(
                    "Grand Palace",
                    "Na Phra Lan Road, Phra Nakhon",
                    17.0,
                    150,
                    ActivityKind::Historical,
                    false,
                ),
                Site::known(
                    "Wat Pho",
                    "2 Sanam Chai Road, Phra Nakhon",
                    9.0,
                    90,
                    ActivityKind::Cultural,
                    false,
                ),
                Site::known(
                    "Chatuchak Market",
                    "Kamphaeng Phet 2 Road, Chatuchak",
                    0.0,
                    180,
                    ActivityKind::Shopping,
                    false,
                ),
            ],
            local_customs: strings(&[
                "dress modestly at temples",
                "never touch someone's head",
                "respect the royal family",
            ]),
            daily_budget: Some(DailyBudgetRange {
                budget: 50.0,
                midrange: 100.0,
                luxury: 200.0,
            }),
            duration: DurationRange {
                min: 3,
                recommended: 5,
                max: 10,
            },
            cataloged: true,
        },
        _ => DestinationProfile {
            name: destination.trim().to_string(),
            country: "Unknown".to_string(),
            best_seasons: strings(&["spring", "summer", "autumn"]),
            highlights: strings(&["local culture", "historic center"]),
            must_visit: vec![
                Site::named("City Center"),
                Site::named("Local Market"),
                Site::named("Cultural Site"),
            ],
            local_customs: strings(&["learn a few local phrases", "respect local customs"]),
            daily_budget: None,
            duration: DurationRange {
                min: 3,
                recommended: 5,
                max: 14,
            },
            cataloged: false,
        },
    }
}

/// Range applied when neither the catalog nor memory provide one.
pub const GENERIC_DAILY_BUDGET: DailyBudgetRange = DailyBudgetRange {
    budget: 80.0,
    midrange: 150.0,
    luxury: 300.0,
};

pub fn cultural_insights(country: &str) -> CulturalInsights {
    match country.trim().to_lowercase().as_str() {
        "japan" => CulturalInsights {
            etiquette: strings(&[
                "Bow slightly when greeting",
                "Do not tip in restaurants",
                "Remove shoes when entering homes and some temples",
            ]),
            food_culture: strings(&[
                "Say itadakimasu before eating",
                "Slurping noodles is acceptable",
            ]),
            language_tips: strings(&[
                "Arigatou gozaimasu means thank you",
                "Sumimasen works for excuse me and sorry",
            ]),
            transportation: strings(&[
                "Get an IC card such as Suica for trains and buses",
                "Trains stop running around midnight",
            ]),
        },
        "france" => CulturalInsights {
            etiquette: strings(&[
                "Greet with bonjour before asking anything",
                "Dress smart-casual for dinner",
            ]),
            food_culture: strings(&[
                "Lunch is typically served from noon to 2pm",
                "Bread is placed on the table, not the plate",
            ]),
            language_tips: strings(&["Merci beaucoup means thank you very much"]),
            transportation: strings(&[
                "Buy a Navigo pass for unlimited metro travel",
                "Validate tickets before boarding regional trains",
            ]),
        },
        "thailand" => CulturalInsights {
            etiquette: strings(&[
                "Greet with a wai, palms pressed together",
                "Cover shoulders and knees at temples",
            ]),
            food_culture: strings(&[
                "Eat with a spoon, using the fork to push food",
                "Street food is safe where locals queue",
            ]),
            language_tips: strings(&["Khop khun means thank you"]),
            transportation: strings(&[
                "Use the BTS Skytrain to avoid traffic",
                "Agree on tuk-tuk fares before riding",
            ]),
        },
        _ => CulturalInsights {
            etiquette: strings(&["Observe how locals greet each other"]),
            food_culture: strings(&["Try the regional specialities"]),
            language_tips: strings(&["Learn hello and thank you in the local language"]),
            transportation: strings(&["Check local transit passes on arrival"]),
        },
    }
}

pub const DAY_THEMES: [&str; 7] = [
    "Arrival & Orientation",
    "Cultural Exploration",
    "Local Experiences",
    "Adventure & Activities",
    "Relaxation & Leisure",
    "Hidden Gems",
    "Farewell & Memories",
];

/// Theme for a 1-based day of a `total`-day trip.
pub fn day_theme(day: u32, total: u32) -> &'static str {
    if day <= 1 {
        DAY_THEMES[0]
    } else if day == total {
        DAY_THEMES[6]
    } else {
        DAY_THEMES[((day as usize - 2) % 5) + 1]
    }
}
