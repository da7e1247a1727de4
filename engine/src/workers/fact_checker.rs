//! Fact checking
//!
//! Verifies every distinct activity in an itinerary against a
//! [`FactSource`], collects booking links and destination facts, and rates
//! how much the itinerary can be trusted.

use super::context::{contains_any, has_memory_type, mentions_destination, ContextSummary};
use super::providers::{BookingOption, DestinationFacts, FactSource};
use super::signals;
use super::types::{Activity, ActivityKind, Itinerary, Severity, TripParameters};
use super::{MemoryContext, WorkerEnv, WorkerRole};
use crate::memory::{KindSelector, MemoryKind, MemoryQuery, MemoryRecord, Metadata};
use crate::message_bus::Notice;
use sdk::errors::SquadError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

const ROLE: WorkerRole = WorkerRole::FactChecker;

/// Accuracy below this percentage adds a warning.
const ACCURACY_FLOOR: f64 = 80.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactCheckRequest {
    pub project_id: String,
    pub params: TripParameters,
    pub itinerary: Itinerary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub activity: String,
    pub day: u32,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingLink {
    pub activity: String,
    pub platform: String,
    pub url: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityCheck {
    pub activity: String,
    pub day: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_hours: Option<String>,
    pub location_verified: bool,
    pub booking_available: bool,
    pub cost_known: bool,
    pub verified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueAnalysis {
    pub critical: usize,
    pub warnings: usize,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchReport {
    pub destination: String,
    pub checks: Vec<ActivityCheck>,
    pub issues: Vec<Issue>,
    pub booking_links: Vec<BookingLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_facts: Option<DestinationFacts>,
    pub accuracy_rate: f64,
    pub analysis: IssueAnalysis,
    pub risk: RiskLevel,
    pub confidence: f64,
    pub recommendations: Vec<String>,
    pub memory: ContextSummary,
    pub persisted: bool,
}

impl ResearchReport {
    pub fn high_severity_issues(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::High)
            .count()
    }
}

pub struct FactChecker {
    env: WorkerEnv,
    facts: Arc<dyn FactSource>,
}

impl FactChecker {
    pub fn new(env: WorkerEnv, facts: Arc<dyn FactSource>) -> Self {
        Self { env, facts }
    }

    pub async fn query_context_for(&self, params: &TripParameters) -> MemoryContext {
        let dest = params.destination_key();
        let user = params.user_id.clone().unwrap_or_else(|| "anonymous".to_string());
        let queries = [
            format!("research data {}", dest),
            format!("verified facts {}", dest),
            format!("booking information {}", dest),
            format!("logistics data {}", dest),
            format!("activity verification {}", dest),
            format!("user research history {}", user),
        ]
        .into_iter()
        .map(|text| {
            MemoryQuery::new(text)
                .kind(KindSelector::Kind(MemoryKind::Research))
                .limit(3)
        })
        .collect();

        MemoryContext::gather(self.env.gateway.as_deref(), ROLE, queries)
            .await
            .with_subset("research", |f| has_memory_type(f, "research"))
            .with_subset("verified", |f| contains_any(f, &["verified", "fact"]))
            .with_subset("booking", |f| contains_any(f, &["booking", "reservation"]))
            .with_subset("logistics", |f| contains_any(f, &["logistics", "transport"]))
    }

    pub async fn fact_check(&self, request: FactCheckRequest) -> Result<ResearchReport, SquadError> {
        let params = &request.params;
        let context = self.query_context_for(params).await;

        let mut remembered: Vec<String> = Vec::new();
        for fragment in context.subset("verified") {
            if mentions_destination(fragment, &params.destination) {
                signals::merge_unique(&mut remembered, signals::verified_activities(&fragment.content));
            }
        }

        let mut seen = HashSet::new();
        let mut checks = Vec::new();
        let mut issues = Vec::new();
        let mut booking_links = Vec::new();
        for (day, activity) in request.itinerary.activities() {
            if !seen.insert(activity.name.to_lowercase()) {
                continue;
            }
            let (check, found, booking) = self.verify(day, activity, &remembered).await?;
            if let Some(option) = booking {
                booking_links.push(BookingLink {
                    activity: activity.name.clone(),
                    platform: option.platform,
                    url: option.url,
                    price: option.price,
                });
            }
            checks.push(check);
            issues.extend(found);
        }

        let destination_facts = self
            .facts
            .destination_facts(&params.destination)
            .await
            .map_err(|e| SquadError::worker(ROLE.as_str(), "destination_facts", e))?;

        let verified = checks.iter().filter(|c| c.verified).count();
        let accuracy_rate = if checks.is_empty() {
            100.0
        } else {
            verified as f64 / checks.len() as f64 * 100.0
        };
        let analysis = analyze(&issues, accuracy_rate, checks.len(), verified);
        let risk = if analysis.critical > 0 {
            RiskLevel::High
        } else if analysis.warnings > 3 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };
        let confidence =
            (100.0 - 20.0 * analysis.critical as f64 - 5.0 * analysis.warnings as f64).max(0.0);
        debug!(
            checked = checks.len(),
            verified,
            critical = analysis.critical,
            warnings = analysis.warnings,
            "Activities verified"
        );

        let mut report = ResearchReport {
            destination: params.destination.clone(),
            recommendations: recommendations(&issues, &booking_links, destination_facts.as_ref()),
            checks,
            issues,
            booking_links,
            destination_facts,
            accuracy_rate,
            analysis,
            risk,
            confidence,
            memory: context.summary(),
            persisted: false,
        };
        report.persisted = self.remember(params, &report).await;

        self.env
            .notify(
                ROLE,
                WorkerRole::Designer,
                Notice::FactsChecked {
                    project_id: request.project_id.clone(),
                    issues: report.issues.len(),
                    confidence: report.confidence,
                },
            )
            .await;

        info!(
            project_id = %request.project_id,
            confidence = report.confidence,
            risk = %report.risk,
            "Fact check complete"
        );
        Ok(report)
    }

    async fn verify(
        &self,
        day: u32,
        activity: &Activity,
        remembered: &[String],
    ) -> Result<(ActivityCheck, Vec<Issue>, Option<BookingOption>), SquadError> {
        let mut issues = Vec::new();
        let mut issue = |severity, description: &str| {
            issues.push(Issue {
                activity: activity.name.clone(),
                day,
                severity,
                description: description.to_string(),
            })
        };

        let location_verified = activity.location.is_some();
        if !location_verified {
            issue(Severity::High, "Location not specified");
        }

        let facts = self
            .facts
            .activity_facts(&activity.name)
            .await
            .map_err(|e| SquadError::worker(ROLE.as_str(), "verification", e))?;
        let opening_hours = facts.and_then(|f| f.opening_hours);
        let needs_hours = activity.requires_booking
            || matches!(activity.kind, ActivityKind::Cultural | ActivityKind::Historical);
        let known = remembered
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&activity.name));
        if needs_hours && opening_hours.is_none() && !known {
            issue(Severity::Medium, "Opening hours not verified");
        }

        let booking = self
            .facts
            .booking_options(&activity.name)
            .await
            .map_err(|e| SquadError::worker(ROLE.as_str(), "booking_lookup", e))?
            .into_iter()
            .next();
        let booking_available = booking.is_some();
        if activity.requires_booking && !booking_available {
            issue(Severity::Medium, "No booking option found");
        }

        let cost_known = activity.cost.is_some();
        if !cost_known {
            issue(Severity::Medium, "Cost not specified");
        }

        let check = ActivityCheck {
            activity: activity.name.clone(),
            day,
            opening_hours,
            location_verified,
            booking_available,
            cost_known,
            verified: issues.is_empty(),
        };
        Ok((check, issues, booking))
    }

    async fn remember(&self, params: &TripParameters, report: &ResearchReport) -> bool {
        let verified: Vec<&str> = report
            .checks
            .iter()
            .filter(|c| c.verified)
            .map(|c| c.activity.as_str())
            .collect();
        let content = [
            Some(format!(
                "Research data {}: verified facts for {} activities.",
                params.destination,
                report.checks.len()
            )),
            signals::labelled_list("Verified activities", &verified),
            Some(format!(
                "Booking information: {} links. Overall risk: {}. Confidence: {:.0}.",
                report.booking_links.len(),
                report.risk,
                report.confidence
            )),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
        let metadata = Metadata::new(ROLE.as_str(), self.env.clock.now())
            .with_destination(params.destination.clone())
            .with_user(params.user_id.clone())
            .with_memory_type("research");
        let record = MemoryRecord::new(
            MemoryRecord::generate_id(MemoryKind::Research),
            MemoryKind::Research,
            content,
            metadata,
        );
        self.env.persist(ROLE, record).await
    }
}

fn analyze(issues: &[Issue], accuracy_rate: f64, checked: usize, verified: usize) -> IssueAnalysis {
    let critical = issues.iter().filter(|i| i.severity == Severity::High).count();
    let mut warnings = issues
        .iter()
        .filter(|i| i.severity == Severity::Medium)
        .count();
    if accuracy_rate < ACCURACY_FLOOR {
        warnings += 1;
    }
    IssueAnalysis {
        critical,
        warnings,
        summary: format!(
            "{} activities checked, {} verified; {} critical issue(s), {} warning(s)",
            checked, verified, critical, warnings
        ),
    }
}

fn recommendations(
    issues: &[Issue],
    links: &[BookingLink],
    facts: Option<&DestinationFacts>,
) -> Vec<String> {
    let mut out = Vec::new();
    for issue in issues.iter().filter(|i| i.severity == Severity::High) {
        out.push(format!("Confirm the location of {}", issue.activity));
    }
    if issues.iter().any(|i| i.severity == Severity::Medium) {
        out.push("Verify opening hours and prices for flagged activities".to_string());
    }
    if !links.is_empty() {
        out.push(format!(
            "Book {} activities in advance using the provided links",
            links.len()
        ));
    }
    match facts {
        Some(facts) => {
            out.push(format!(
                "Carry some {} and note the local time zone ({})",
                facts.currency, facts.timezone
            ));
            out.push(facts.visa_note.clone());
        }
        None => out.push("Check entry requirements and currency before departure".to_string()),
    }
    out
}
