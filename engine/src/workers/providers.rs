//! Pricing and fact-lookup capabilities
//!
//! The cost analyst and fact checker reach outside data only through these
//! traits. The static implementations are deterministic offline fixtures.

use async_trait::async_trait;
use sdk::errors::SquadError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceCategory {
    Flights,
    Hotels,
    Activities,
    Transport,
}

impl PriceCategory {
    pub const ALL: [PriceCategory; 4] = [
        PriceCategory::Flights,
        PriceCategory::Hotels,
        PriceCategory::Activities,
        PriceCategory::Transport,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceTier {
    Budget,
    Standard,
    Premium,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceOption {
    pub provider: String,
    pub label: String,
    /// Per traveler for flights, per night for hotels, per trip otherwise
    pub price: f64,
    pub tier: PriceTier,
}

#[async_trait]
pub trait PriceComparisonProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn quote(
        &self,
        category: PriceCategory,
        destination: &str,
    ) -> Result<Vec<PriceOption>, SquadError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityFacts {
    pub opening_hours: Option<String>,
    pub admission: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingOption {
    pub platform: String,
    pub url: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationFacts {
    pub currency: String,
    pub timezone: String,
    pub language: String,
    pub emergency_number: String,
    pub visa_note: String,
}

#[async_trait]
pub trait FactSource: Send + Sync {
    fn name(&self) -> &str;

    async fn activity_facts(&self, activity: &str) -> Result<Option<ActivityFacts>, SquadError>;

    async fn booking_options(&self, activity: &str) -> Result<Vec<BookingOption>, SquadError>;

    async fn destination_facts(
        &self,
        destination: &str,
    ) -> Result<Option<DestinationFacts>, SquadError>;
}

fn option(provider: &str, label: &str, price: f64, tier: PriceTier) -> PriceOption {
    PriceOption {
        provider: provider.to_string(),
        label: label.to_string(),
        price,
        tier,
    }
}

/// Fixed price list, identical for every destination.
#[derive(Debug, Clone)]
pub struct StaticPriceTable {
    table: HashMap<PriceCategory, Vec<PriceOption>>,
}

impl StaticPriceTable {
    pub fn new() -> Self {
        let mut table = HashMap::new();
        table.insert(
            PriceCategory::Flights,
            vec![
                option("SkyLow", "Budget Airline", 400.0, PriceTier::Budget),
                option("AirMid", "Standard Carrier", 650.0, PriceTier::Standard),
                option("FlyFirst", "Premium Carrier", 950.0, PriceTier::Premium),
            ],
        );
        table.insert(
            PriceCategory::Hotels,
            vec![
                option("HostelHub", "Hostel", 45.0, PriceTier::Budget),
                option("StayWell", "Mid-range Hotel", 120.0, PriceTier::Standard),
                option("GrandStay", "Luxury Hotel", 280.0, PriceTier::Premium),
            ],
        );
        table.insert(
            PriceCategory::Activities,
            vec![
                option("CityWalks", "Free Walking Tour", 0.0, PriceTier::Budget),
                option("PassPort", "Museum Pass", 35.0, PriceTier::Standard),
                option("LocalLens", "Cultural Experience", 65.0, PriceTier::Standard),
                option("GuideMe", "Private Guided Tour", 120.0, PriceTier::Premium),
            ],
        );
        table.insert(
            PriceCategory::Transport,
            vec![
                option("Metro", "Public Transport Pass", 25.0, PriceTier::Budget),
                option("CycleShare", "Bike Rental", 40.0, PriceTier::Budget),
                option("CityCab", "Taxi Budget", 150.0, PriceTier::Standard),
                option("DriveNow", "Car Rental", 200.0, PriceTier::Premium),
            ],
        );
        Self { table }
    }

    /// Replaces the options for one category.
    pub fn with(mut self, category: PriceCategory, options: Vec<PriceOption>) -> Self {
        self.table.insert(category, options);
        self
    }
}

impl Default for StaticPriceTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceComparisonProvider for StaticPriceTable {
    fn name(&self) -> &str {
        "static-price-table"
    }

    async fn quote(
        &self,
        category: PriceCategory,
        _destination: &str,
    ) -> Result<Vec<PriceOption>, SquadError> {
        Ok(self.table.get(&category).cloned().unwrap_or_default())
    }
}

/// Fixed opening hours, booking links and destination facts.
#[derive(Debug, Clone)]
pub struct StaticFactSource {
    activities: HashMap<String, ActivityFacts>,
    bookings: HashMap<String, Vec<BookingOption>>,
    destinations: HashMap<String, DestinationFacts>,
}

impl StaticFactSource {
    pub fn new() -> Self {
        let hours = [
            ("senso-ji temple", "06:00-17:00", 0.0),
            ("tsukiji outer market", "05:00-14:00", 0.0),
            ("tokyo skytree", "10:00-21:00", 25.0),
            ("eiffel tower", "09:30-23:45", 30.0),
            ("louvre museum", "09:00-18:00", 22.0),
            ("notre-dame cathedral", "07:45-18:45", 0.0),
            ("grand palace", "08:30-15:30", 17.0),
            ("wat pho", "08:00-18:30", 9.0),
            ("chatuchak market", "09:00-18:00", 0.0),
            ("museum visit", "10:00-17:00", 20.0),
            ("museum pass", "10:00-18:00", 35.0),
            ("cultural experience", "10:00-16:00", 65.0),
            ("private guided tour", "09:00-17:00", 120.0),
            ("visit local market", "07:00-13:00", 0.0),
        ];
        let activities = hours
            .into_iter()
            .map(|(name, opening, admission)| {
                (
                    name.to_string(),
                    ActivityFacts {
                        opening_hours: Some(opening.to_string()),
                        admission: Some(admission),
                    },
                )
            })
            .collect();

        let booking = |platform: &str, url: &str, price: f64| BookingOption {
            platform: platform.to_string(),
            url: url.to_string(),
            price,
        };
        let mut bookings = HashMap::new();
        bookings.insert(
            "museum pass".to_string(),
            vec![booking("GetYourGuide", "https://www.getyourguide.com/museum-pass", 35.0)],
        );
        bookings.insert(
            "private guided tour".to_string(),
            vec![
                booking("Viator", "https://www.viator.com/private-tour", 120.0),
                booking("ToursByLocals", "https://www.toursbylocals.com/private-tour", 135.0),
            ],
        );
        bookings.insert(
            "cultural experience".to_string(),
            vec![booking("Airbnb Experiences", "https://www.airbnb.com/experiences/cultural", 65.0)],
        );
        bookings.insert(
            "tokyo skytree".to_string(),
            vec![booking("Skytree Official", "https://www.tokyo-skytree.jp/en/ticket", 25.0)],
        );
        bookings.insert(
            "eiffel tower".to_string(),
            vec![booking("Eiffel Tower Official", "https://www.toureiffel.paris/en/rates-opening-times", 30.0)],
        );
        bookings.insert(
            "louvre museum".to_string(),
            vec![booking("Louvre Official", "https://www.louvre.fr/en/visit", 22.0)],
        );

        let facts = |currency: &str, timezone: &str, language: &str, emergency: &str, visa: &str| {
            DestinationFacts {
                currency: currency.to_string(),
                timezone: timezone.to_string(),
                language: language.to_string(),
                emergency_number: emergency.to_string(),
                visa_note: visa.to_string(),
            }
        };
        let mut destinations = HashMap::new();
        destinations.insert(
            "tokyo".to_string(),
            facts("JPY", "JST", "Japanese", "110", "Visa-free for many passports up to 90 days"),
        );
        destinations.insert(
            "paris".to_string(),
            facts("EUR", "CET", "French", "112", "Schengen rules apply"),
        );
        destinations.insert(
            "bangkok".to_string(),
            facts("THB", "ICT", "Thai", "191", "Visa exemption for many passports up to 30 days"),
        );

        Self {
            activities,
            bookings,
            destinations,
        }
    }
}

impl Default for StaticFactSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FactSource for StaticFactSource {
    fn name(&self) -> &str {
        "static-fact-source"
    }

    async fn activity_facts(&self, activity: &str) -> Result<Option<ActivityFacts>, SquadError> {
        Ok(self.activities.get(&activity.to_lowercase()).cloned())
    }

    async fn booking_options(&self, activity: &str) -> Result<Vec<BookingOption>, SquadError> {
        Ok(self
            .bookings
            .get(&activity.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn destination_facts(
        &self,
        destination: &str,
    ) -> Result<Option<DestinationFacts>, SquadError> {
        Ok(self.destinations.get(&destination.to_lowercase()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn price_table_covers_every_category() {
        let table = StaticPriceTable::new();
        for category in PriceCategory::ALL {
            assert!(!table.quote(category, "Tokyo").await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn price_table_override_replaces_category() {
        let table = StaticPriceTable::new().with(PriceCategory::Flights, vec![]);
        assert!(table.quote(PriceCategory::Flights, "Tokyo").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fact_lookups_ignore_case() {
        let facts = StaticFactSource::new();
        let hours = facts.activity_facts("Senso-ji Temple").await.unwrap().unwrap();
        assert_eq!(hours.opening_hours.as_deref(), Some("06:00-17:00"));
        assert_eq!(facts.booking_options("Private Guided Tour").await.unwrap().len(), 2);
        assert_eq!(facts.destination_facts("TOKYO").await.unwrap().unwrap().currency, "JPY");
        assert!(facts.destination_facts("Atlantis").await.unwrap().is_none());
    }
}
