//! Command handlers for CLI operations
//!
//! Each handler opens an [`Engine`] from the loaded configuration, performs
//! one command and shuts the engine down so memory partitions, statistics
//! and metrics are flushed to the configured snapshot backend. Opening an
//! engine restores what the previous run flushed and starts the retention
//! cleanup schedule.

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::cli::{MemoryAction, PlanArgs};
use crate::conductor::{Conductor, TripPlan};
use crate::config::Config;
use crate::db::Database;
use crate::llm::ollama::OllamaGenerator;
use crate::memory::{KindSelector, MemoryDraft, MemoryGateway, MemoryKind, MemoryQuery, MemoryRecord};
use crate::workers::TripRequest;
use sdk::{Clock, InMemorySnapshotStore, SnapshotStore, SquadErrorExt, SystemClock};

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Gateway and conductor wired from configuration.
pub struct Engine {
    pub gateway: Arc<MemoryGateway>,
    pub conductor: Arc<Conductor>,
    database: Option<Database>,
    cleanup: JoinHandle<()>,
}

impl Engine {
    pub async fn open(config: &Config) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let (snapshots, database): (Arc<dyn SnapshotStore>, Option<Database>) =
            match config.persistence.backend.as_str() {
                "sqlite" => {
                    let database = Database::new(&config.db_path())
                        .await
                        .context("Failed to open snapshot database")?;
                    (Arc::new(database.snapshots()), Some(database))
                }
                _ => (Arc::new(InMemorySnapshotStore::new()), None),
            };

        let gateway = Arc::new(MemoryGateway::new(
            &config.memory,
            Arc::clone(&clock),
            Arc::clone(&snapshots),
        ));
        if let Err(e) = gateway.restore_stats().await {
            tracing::warn!(error = %e, "Could not restore memory statistics");
        }
        if let Err(e) = gateway.restore_fragments().await {
            tracing::warn!(error = %e, "Could not restore memory partitions");
        }
        // The first tick runs immediately, so restored fragments past
        // retention are dropped before any command sees them.
        let cleanup = gateway.spawn_cleanup(
            config.memory.retention_days,
            config.memory.cleanup_interval(),
        );

        let mut builder = Conductor::builder(config.orchestrator.clone())
            .clock(clock)
            .gateway(Arc::clone(&gateway))
            .snapshots(snapshots);
        if config.llm.enabled {
            let generator = OllamaGenerator::new(&config.llm.base_url, &config.llm.model)
                .context("Failed to create Ollama client")?;
            builder = builder.generator(Arc::new(generator));
        }

        Ok(Self {
            gateway,
            conductor: Arc::new(builder.build()),
            database,
            cleanup,
        })
    }

    pub async fn close(self) -> Result<()> {
        self.cleanup.abort();
        self.conductor
            .shutdown()
            .await
            .context("Failed to shut down conductor")?;
        if let Some(database) = self.database {
            database.close().await?;
        }
        Ok(())
    }
}

/// Run the full planning workflow for one destination.
pub async fn handle_plan(args: PlanArgs, config: &Config, format: OutputFormat) -> Result<()> {
    let engine = Engine::open(config).await?;

    let mut request = TripRequest::new(args.destination).level(args.level);
    request.duration = args.duration;
    request.budget = args.budget;
    request.travelers = args.travelers;
    request.user_id = args.user;
    request.interests = args.interests;

    let result = engine.conductor.plan_trip(request).await;
    engine.close().await?;
    let plan = result.map_err(|e| anyhow::anyhow!("{} ({})", e, e.user_hint()))?;

    match format {
        OutputFormat::Text => print_plan(&plan),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
    }
    Ok(())
}

fn print_plan(plan: &TripPlan) {
    let itinerary = &plan.itinerary;
    println!(
        "{}, {} ({} days, {} travelers, {})",
        itinerary.destination,
        itinerary.country,
        itinerary.duration,
        itinerary.travelers,
        itinerary.budget_level
    );
    println!("Project: {}", plan.project_id);
    if let Some(overview) = &itinerary.overview {
        println!();
        println!("{}", overview);
    }
    println!();

    for day in &itinerary.days {
        println!("Day {}: {} (budget {:.0})", day.day, day.theme, day.budget);
        for activity in &day.activities {
            let cost = activity
                .cost
                .map(|c| format!("{:.0}", c))
                .unwrap_or_else(|| "?".to_string());
            print!("  [{:?}] {} ({})", activity.slot, activity.name, cost);
            if let Some(url) = &activity.booking_url {
                print!(" book: {}", url);
            }
            println!();
        }
    }

    println!();
    println!(
        "Estimated cost: {:.0} of {:.0}",
        itinerary.estimated_cost.total, itinerary.budget
    );
    println!(
        "Quality: {:.1} (budget {:.0}, logistics {:.0}, facts {:.0})",
        plan.quality.overall, plan.quality.budget, plan.quality.logistics, plan.quality.facts
    );

    if !plan.recommendations.is_empty() {
        println!();
        println!("Recommendations:");
        for item in &plan.recommendations {
            println!("  - {}", item);
        }
    }
    println!();
    println!(
        "Planned in {:.0}ms over {} phases, {} messages exchanged",
        plan.planning_ms,
        plan.collaboration.phases.len(),
        plan.collaboration.messages_exchanged
    );
}

pub async fn handle_memory(action: MemoryAction, config: &Config, format: OutputFormat) -> Result<()> {
    let engine = Engine::open(config).await?;
    let result = run_memory_action(&engine.gateway, action, format).await;
    engine.close().await?;
    result
}

async fn run_memory_action(
    gateway: &MemoryGateway,
    action: MemoryAction,
    format: OutputFormat,
) -> Result<()> {
    match action {
        MemoryAction::Add {
            kind,
            content,
            source,
            destination,
            user,
            id,
        } => {
            let mut metadata = Map::new();
            metadata.insert("source".into(), Value::String(source));
            metadata.insert(
                "created_at".into(),
                Value::String(gateway.clock().now().to_rfc3339()),
            );
            if let Some(destination) = destination {
                metadata.insert("destination".into(), Value::String(destination));
            }
            if let Some(user) = user {
                metadata.insert("user_id".into(), Value::String(user));
            }
            let id = id.unwrap_or_else(|| MemoryRecord::generate_id(MemoryKind::route(&kind)));

            let outcome = gateway
                .add_memory(MemoryDraft {
                    id: Some(id),
                    kind: Some(kind),
                    content: Some(content),
                    metadata: Some(metadata),
                })
                .await?;

            match format {
                OutputFormat::Text => println!(
                    "Stored {} as {} chunk(s) in {}",
                    outcome.memory_id, outcome.chunks_added, outcome.partition
                ),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
            }
        }

        MemoryAction::Query { text, kind, limit } => {
            let mut query = MemoryQuery::new(text).kind(KindSelector::parse(&kind));
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            let outcome = gateway.query_memory(&query).await?;

            match format {
                OutputFormat::Text => {
                    if outcome.results.is_empty() {
                        println!("No matching memories");
                    }
                    for hit in &outcome.results {
                        println!(
                            "{:.2}  [{}] {}  {}",
                            hit.score,
                            hit.fragment.kind.as_str(),
                            hit.fragment.id,
                            hit.fragment.content
                        );
                    }
                    println!(
                        "{} result(s) from {} candidate(s) in {:.2}ms",
                        outcome.results.len(),
                        outcome.total_candidates,
                        outcome.query_time_ms
                    );
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
            }
        }

        MemoryAction::Partitions { show: Some(name) } => {
            let fragments = gateway.partition_contents(&name).await?;
            match format {
                OutputFormat::Text => {
                    if fragments.is_empty() {
                        println!("{} is empty", name);
                    }
                    for fragment in &fragments {
                        println!(
                            "{}  {}  {}",
                            fragment.id,
                            fragment.metadata.created_at.format("%Y-%m-%d %H:%M:%S"),
                            fragment.content
                        );
                    }
                }
                OutputFormat::Json => {
                    let output = json!({
                        "partition": name,
                        "fragments": fragments,
                        "count": fragments.len(),
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
            }
        }

        MemoryAction::Partitions { show: None } => {
            let partitions = gateway.list_partitions().await?;
            match format {
                OutputFormat::Text => {
                    for p in &partitions {
                        println!(
                            "{:<28} {:>5}  {}",
                            p.descriptor.name, p.fragment_count, p.descriptor.description
                        );
                    }
                }
                OutputFormat::Json => {
                    let output = json!({
                        "partitions": partitions,
                        "count": partitions.len(),
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
            }
        }
    }
    Ok(())
}

/// Print gateway status and orchestrator metrics.
pub async fn handle_status(config: &Config, format: OutputFormat) -> Result<()> {
    let engine = Engine::open(config).await?;
    let status = engine.gateway.status().await?;
    let metrics = engine.conductor.metrics().await;
    let projects = engine.conductor.project_counts().await;
    engine.close().await?;

    match format {
        OutputFormat::Text => {
            println!("Memory:");
            println!("  Fragments:       {}", status.stats.total_fragments);
            println!("  Queries:         {}", status.stats.query_count);
            println!("  Avg query:       {:.2}ms", status.stats.average_query_ms);
            println!("  Max chunk size:  {}", status.max_chunk_size);
            println!("  Partitions:      {}", status.partitions.len());
            if let Some(at) = status.stats.last_cleanup {
                println!("  Last cleanup:    {}", at.format("%Y-%m-%d %H:%M:%S"));
            }
            println!("Orchestrator:");
            println!("  Active projects: {}", projects.active);
            println!("  Trips planned:   {}", metrics.trips_planned);
            println!("  Trips failed:    {}", metrics.trips_failed);
            println!("  Success rate:    {:.1}%", metrics.success_rate);
        }
        OutputFormat::Json => {
            let output = json!({
                "memory": status,
                "metrics": metrics,
                "projects": projects,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

pub fn handle_config_show(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let rendered = toml::to_string_pretty(config).context("Failed to render config")?;
            print!("{}", rendered);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
    }
    Ok(())
}
