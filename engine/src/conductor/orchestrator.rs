//! Workflow orchestration
//!
//! The [`Conductor`] drives each project through PLANNING, VALIDATION,
//! REFINEMENT and FINALIZATION by calling the workers directly. VALIDATION
//! runs the cost analyst and fact checker concurrently and waits for both.
//! Project state lives in one table behind a mutex that is never held across
//! a worker call; results arriving for a project that has left the expected
//! state are discarded. Finished projects stay in the table until
//! `max_finished_projects` newer ones have been snapshotted, after which
//! lookups fall back to the snapshot store.

use super::evaluator::Evaluator;
use super::metrics::SquadMetrics;
use super::plan::{merge_recommendations, CollaborationSummary, SubAgentResults, TripPlan};
use super::project::{Project, ProjectSnapshot};
use super::refinement::build_instruction;
use super::workflow::WorkflowState;
use crate::config::OrchestratorConfig;
use crate::llm::TextGenerator;
use crate::memory::{MemoryGateway, MemoryKind, MemoryRecord, Metadata};
use crate::message_bus::{MessageBus, Notice, ANY_RECIPIENT};
use crate::workers::signals;
use crate::workers::{
    BudgetRequest, CostAnalyst, DesignRequest, Designer, FactCheckRequest, FactChecker,
    FactSource, PriceComparisonProvider, StaticFactSource, StaticPriceTable, TripParameters,
    TripRequest, WorkerEnv, WorkerRole,
};
use sdk::errors::SquadError;
use sdk::{Clock, InMemorySnapshotStore, SnapshotStore, SystemClock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Snapshot namespace for finished projects
pub const PROJECTS_NAMESPACE: &str = "projects";
/// Snapshot namespace and id for flushed metrics
pub const METRICS_NAMESPACE: &str = "metrics";
const METRICS_ID: &str = "conductor";

const SENDER: &str = "conductor";

#[derive(Default)]
struct ProjectTable {
    active: HashMap<String, Project>,
    completed: HashMap<String, Project>,
    failed: HashMap<String, Project>,
    /// Finished ids whose snapshot was saved, oldest first
    evictable: VecDeque<String>,
}

impl ProjectTable {
    fn finished(&self, id: &str) -> Option<&Project> {
        self.completed.get(id).or_else(|| self.failed.get(id))
    }

    /// Drops the oldest snapshotted projects beyond `keep`. Returns how many went.
    fn evict(&mut self, keep: usize) -> usize {
        let mut evicted = 0;
        while self.evictable.len() > keep {
            let Some(id) = self.evictable.pop_front() else {
                break;
            };
            if self.completed.remove(&id).or_else(|| self.failed.remove(&id)).is_some() {
                evicted += 1;
            }
        }
        evicted
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCounts {
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

pub struct ConductorBuilder {
    config: OrchestratorConfig,
    clock: Arc<dyn Clock>,
    gateway: Option<Arc<MemoryGateway>>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    bus: Option<Arc<MessageBus>>,
    prices: Option<Arc<dyn PriceComparisonProvider>>,
    facts: Option<Arc<dyn FactSource>>,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl ConductorBuilder {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            gateway: None,
            snapshots: None,
            bus: None,
            prices: None,
            facts: None,
            generator: None,
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn gateway(mut self, gateway: Arc<MemoryGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn snapshots(mut self, snapshots: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    pub fn bus(mut self, bus: Arc<MessageBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn prices(mut self, prices: Arc<dyn PriceComparisonProvider>) -> Self {
        self.prices = Some(prices);
        self
    }

    pub fn facts(mut self, facts: Arc<dyn FactSource>) -> Self {
        self.facts = Some(facts);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn build(self) -> Conductor {
        let clock = self.clock;
        let bus = self
            .bus
            .unwrap_or_else(|| {
                Arc::new(MessageBus::with_capacity(
                    Arc::clone(&clock),
                    self.config.bus_log_capacity,
                ))
            });
        let env = WorkerEnv::new(self.gateway, bus, Arc::clone(&clock));

        let mut designer = Designer::new(env.clone());
        if let Some(generator) = self.generator {
            designer = designer.with_generator(generator);
        }
        let prices = self
            .prices
            .unwrap_or_else(|| Arc::new(StaticPriceTable::new()));
        let facts = self
            .facts
            .unwrap_or_else(|| Arc::new(StaticFactSource::new()));

        Conductor {
            permits: Arc::new(Semaphore::new(self.config.max_concurrent_projects.max(1))),
            config: self.config,
            designer,
            cost_analyst: CostAnalyst::new(env.clone(), prices),
            fact_checker: FactChecker::new(env.clone(), facts),
            evaluator: Evaluator::new(),
            env,
            snapshots: self
                .snapshots
                .unwrap_or_else(|| Arc::new(InMemorySnapshotStore::new())),
            projects: Mutex::new(ProjectTable::default()),
            metrics: Mutex::new(SquadMetrics::default()),
        }
    }
}

pub struct Conductor {
    config: OrchestratorConfig,
    designer: Designer,
    cost_analyst: CostAnalyst,
    fact_checker: FactChecker,
    evaluator: Evaluator,
    env: WorkerEnv,
    snapshots: Arc<dyn SnapshotStore>,
    projects: Mutex<ProjectTable>,
    metrics: Mutex<SquadMetrics>,
    permits: Arc<Semaphore>,
}

impl Conductor {
    pub fn builder(config: OrchestratorConfig) -> ConductorBuilder {
        ConductorBuilder::new(config)
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.env.bus
    }

    pub fn gateway(&self) -> Option<&Arc<MemoryGateway>> {
        self.env.gateway.as_ref()
    }

    /// Runs the whole workflow for one request and returns the finished plan.
    pub async fn plan_trip(&self, request: TripRequest) -> Result<TripPlan, SquadError> {
        let id = self.register(request).await?;
        self.run(&id).await
    }

    /// Registers a request and runs it in the background. Poll
    /// [`Conductor::project`] with the returned id for progress.
    pub async fn submit(self: &Arc<Self>, request: TripRequest) -> Result<String, SquadError> {
        let id = self.register(request).await?;
        let conductor = Arc::clone(self);
        let project_id = id.clone();
        tokio::spawn(async move {
            if let Err(e) = conductor.run(&project_id).await {
                warn!(project_id = %project_id, error = %e, "Submitted project did not complete");
            }
        });
        Ok(id)
    }

    /// Looks a project up in active, then completed, then failed storage,
    /// then among the snapshots of evicted projects.
    pub async fn project(&self, id: &str) -> Result<ProjectSnapshot, SquadError> {
        {
            let table = self.projects.lock().await;
            if let Some(project) = table.active.get(id).or_else(|| table.finished(id)) {
                return Ok(project.clone());
            }
        }
        self.stored_project(id)
            .await?
            .ok_or_else(|| SquadError::project_not_found(id))
    }

    async fn stored_project(&self, id: &str) -> Result<Option<Project>, SquadError> {
        let Some(blob) = self.snapshots.load(PROJECTS_NAMESPACE, id).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&blob)
            .map(Some)
            .map_err(|e| SquadError::Persistence(format!("corrupt snapshot for {}: {}", id, e)))
    }

    /// Projects currently held in memory.
    pub async fn project_counts(&self) -> ProjectCounts {
        let table = self.projects.lock().await;
        ProjectCounts {
            active: table.active.len(),
            completed: table.completed.len(),
            failed: table.failed.len(),
        }
    }

    /// Moves an active project to ERROR, recording the phase it was in.
    /// Results still in flight for it will be discarded.
    pub async fn abandon(&self, id: &str) -> Result<ProjectSnapshot, SquadError> {
        let now = self.env.clock.now();
        let taken = {
            let mut table = self.projects.lock().await;
            match table.active.remove(id) {
                Some(mut project) => {
                    let phase = project.state.to_string();
                    if let Err(e) = project.fail(phase, "abandoned by caller", now) {
                        table.active.insert(id.to_string(), project);
                        return Err(e);
                    }
                    table.failed.insert(id.to_string(), project.clone());
                    Some(project)
                }
                None => match table.finished(id) {
                    Some(p) => return Err(terminal(p)),
                    None => None,
                },
            }
        };
        let Some(snapshot) = taken else {
            return Err(match self.stored_project(id).await? {
                Some(p) => terminal(&p),
                None => SquadError::project_not_found(id),
            });
        };

        self.metrics.lock().await.record_failure();
        warn!(
            project_id = %id,
            phase = snapshot.failure.as_ref().map(|f| f.phase.as_str()).unwrap_or("unknown"),
            "Project abandoned"
        );
        self.announce(id, WorkflowState::Error).await;
        self.retire(&snapshot).await;
        Ok(snapshot)
    }

    pub async fn metrics(&self) -> SquadMetrics {
        self.metrics.lock().await.clone()
    }

    /// Stops accepting work and flushes metrics and memory statistics.
    pub async fn shutdown(&self) -> Result<(), SquadError> {
        self.permits.close();
        let metrics = self.metrics().await;
        match serde_json::to_vec(&metrics) {
            Ok(blob) => {
                if let Err(e) = self.snapshots.save(METRICS_NAMESPACE, METRICS_ID, blob).await {
                    warn!(error = %e, "Failed to flush conductor metrics");
                }
            }
            Err(e) => warn!(error = %e, "Failed to encode conductor metrics"),
        }
        if let Some(gateway) = &self.env.gateway {
            gateway.shutdown().await?;
        }
        info!("Conductor shut down");
        Ok(())
    }

    async fn register(&self, request: TripRequest) -> Result<String, SquadError> {
        if self.permits.is_closed() {
            return Err(SquadError::Unavailable("conductor is shutting down".into()));
        }
        let params = TripParameters::resolve(
            request,
            self.config.default_duration,
            self.config.default_budget,
            self.config.default_travelers,
        )?;
        let id = Project::generate_id(&params.destination);
        let project = Project::new(id.clone(), params, self.env.clock.now());
        self.projects
            .lock()
            .await
            .active
            .insert(id.clone(), project);
        debug!(project_id = %id, "Project registered");
        Ok(id)
    }

    async fn run(&self, id: &str) -> Result<TripPlan, SquadError> {
        let result = match self.permits.acquire().await {
            Ok(_permit) => self.drive(id).await,
            Err(_) => Err(SquadError::Unavailable("conductor is shutting down".into())),
        };
        if let Err(e) = &result {
            self.fail(id, e).await;
        }
        result
    }

    async fn drive(&self, id: &str) -> Result<TripPlan, SquadError> {
        self.advance(id, WorkflowState::Idle, WorkflowState::Planning, |_| {})
            .await?;
        let params = self.project(id).await?.request;
        info!(project_id = %id, destination = %params.destination, "Planning started");

        // PLANNING
        let draft = self
            .call(
                id,
                WorkerRole::Designer,
                "design itinerary v1",
                self.designer.design(DesignRequest::draft(id, params.clone())),
            )
            .await?;
        let v1 = draft.itinerary;
        self.advance(id, WorkflowState::Planning, WorkflowState::Validation, |p| {
            p.itinerary_v1 = Some(v1.clone());
        })
        .await?;

        // VALIDATION: both branches run to completion before either result is used.
        let (budget, research) = tokio::join!(
            self.call(
                id,
                WorkerRole::CostAnalyst,
                "analyze budget",
                self.cost_analyst.analyze_budget(BudgetRequest {
                    project_id: id.to_string(),
                    params: params.clone(),
                    itinerary: v1.clone(),
                }),
            ),
            self.call(
                id,
                WorkerRole::FactChecker,
                "fact check itinerary",
                self.fact_checker.fact_check(FactCheckRequest {
                    project_id: id.to_string(),
                    params: params.clone(),
                    itinerary: v1.clone(),
                }),
            ),
        );
        let (budget, research) = match (budget, research) {
            (Ok(budget), Ok(research)) => (budget, research),
            (Err(e), _) | (_, Err(e)) => return Err(e),
        };

        let instruction = build_instruction(&params, &budget, &research);
        debug!(
            project_id = %id,
            constraints = instruction.constraints.len(),
            modifications = instruction.modifications.len(),
            "Refinement instruction built"
        );
        self.advance(id, WorkflowState::Validation, WorkflowState::Refinement, |p| {
            p.budget_analysis = Some(budget.clone());
            p.research_report = Some(research.clone());
            p.refinement = Some(instruction.clone());
        })
        .await?;

        // REFINEMENT
        let refined = self
            .call(
                id,
                WorkerRole::Designer,
                "refine itinerary v2",
                self.designer
                    .design(DesignRequest::refine(id, params.clone(), v1, instruction)),
            )
            .await?;
        self.advance(id, WorkflowState::Refinement, WorkflowState::Finalization, |p| {
            p.itinerary_v2 = Some(refined.itinerary.clone());
        })
        .await?;

        // FINALIZATION
        let quality = self.evaluator.score(&budget, &research);
        let project = self.complete(id, quality.clone()).await?;
        let planning_ms = project.planning_ms().unwrap_or(0.0);
        self.metrics.lock().await.record_success(planning_ms);

        let plan = TripPlan {
            project_id: id.to_string(),
            destination: params.destination.clone(),
            itinerary: refined.itinerary.clone(),
            recommendations: merge_recommendations(&budget, &research, &quality),
            quality,
            collaboration: CollaborationSummary {
                workers: WorkerRole::ALL.to_vec(),
                phases: project.phases(),
                cycles: super::metrics::CYCLES_PER_PROJECT,
                messages_exchanged: self.env.bus.history_for(id).await.len(),
            },
            sub_agent_results: SubAgentResults {
                designer: refined,
                cost_analyst: budget,
                fact_checker: research,
            },
            created_at: project.created_at,
            completed_at: project.finished_at.unwrap_or(project.created_at),
            planning_ms,
        };

        self.remember(&params, &plan).await;
        self.retire(&project).await;
        info!(
            project_id = %id,
            quality = plan.quality.overall,
            planning_ms,
            "Trip planned"
        );
        Ok(plan)
    }

    /// Runs one worker call under the configured timeout and records it in
    /// the project's task log.
    async fn call<T>(
        &self,
        id: &str,
        role: WorkerRole,
        task: &str,
        work: impl Future<Output = Result<T, SquadError>>,
    ) -> Result<T, SquadError> {
        self.with_active(id, |p| p.start_task(role, task)).await;
        let result = match timeout(self.config.call_timeout(), work).await {
            Ok(result) => result,
            Err(_) => Err(SquadError::Timeout {
                operation: format!("{} {}", role, task),
                secs: self.config.call_timeout_secs,
            }),
        };
        self.with_active(id, |p| p.finish_task(role, result.is_ok()))
            .await;
        result
    }

    async fn with_active(&self, id: &str, f: impl FnOnce(&mut Project)) -> bool {
        let mut table = self.projects.lock().await;
        match table.active.get_mut(id) {
            Some(project) => {
                f(project);
                true
            }
            None => false,
        }
    }

    /// Applies a phase result, provided the project is still active and in
    /// the state the result was produced for.
    async fn advance(
        &self,
        id: &str,
        expected: WorkflowState,
        next: WorkflowState,
        apply: impl FnOnce(&mut Project),
    ) -> Result<(), SquadError> {
        let now = self.env.clock.now();
        {
            let mut table = self.projects.lock().await;
            let project = table
                .active
                .get_mut(id)
                .filter(|p| p.state == expected)
                .ok_or_else(|| {
                    SquadError::Discarded(format!("project {} is no longer in {}", id, expected))
                })?;
            project.transition(next, now)?;
            apply(project);
        }
        debug!(project_id = %id, state = %next, "Phase entered");
        self.announce(id, next).await;
        Ok(())
    }

    async fn complete(
        &self,
        id: &str,
        quality: super::evaluator::QualityScore,
    ) -> Result<ProjectSnapshot, SquadError> {
        let now = self.env.clock.now();
        let project = {
            let mut table = self.projects.lock().await;
            let discarded = || {
                SquadError::Discarded(format!(
                    "project {} is no longer in {}",
                    id,
                    WorkflowState::Finalization
                ))
            };
            match table.active.get(id) {
                Some(p) if p.state == WorkflowState::Finalization => {}
                _ => return Err(discarded()),
            }
            let mut project = table.active.remove(id).ok_or_else(discarded)?;
            project.transition(WorkflowState::Completed, now)?;
            project.quality = Some(quality);
            table.completed.insert(id.to_string(), project.clone());
            project
        };
        self.announce(id, WorkflowState::Completed).await;
        Ok(project)
    }

    async fn fail(&self, id: &str, err: &SquadError) {
        let now = self.env.clock.now();
        let project = {
            let mut table = self.projects.lock().await;
            let Some(mut project) = table.active.remove(id) else {
                debug!(project_id = %id, error = %err, "Late result discarded");
                return;
            };
            let phase = project.state.to_string();
            if let Err(e) = project.fail(phase, err.to_string(), now) {
                warn!(project_id = %id, error = %e, "Could not mark project failed");
            }
            table.failed.insert(id.to_string(), project.clone());
            project
        };

        self.metrics.lock().await.record_failure();
        error!(
            project_id = %id,
            phase = project.failure.as_ref().map(|f| f.phase.as_str()).unwrap_or("unknown"),
            error = %err,
            "Project failed"
        );
        self.announce(id, WorkflowState::Error).await;
        self.retire(&project).await;
    }

    async fn announce(&self, id: &str, state: WorkflowState) {
        self.env
            .bus
            .publish(
                SENDER,
                ANY_RECIPIENT,
                Notice::PhaseChanged {
                    project_id: id.to_string(),
                    state,
                },
            )
            .await;
    }

    async fn remember(&self, params: &TripParameters, plan: &TripPlan) {
        let Some(gateway) = &self.env.gateway else {
            return;
        };
        let themes: Vec<&str> = plan
            .itinerary
            .days
            .iter()
            .map(|d| d.theme.as_str())
            .collect();
        let content = format!(
            "Trip plan {dest}: {days} day itinerary for {travelers} travelers, {level} budget of {budget:.0}. \
             Quality score: {quality:.0}. Total estimated cost: {total:.0}. Themes: {themes}.",
            dest = params.destination,
            days = plan.itinerary.duration,
            travelers = params.travelers,
            level = params.budget_level,
            budget = params.budget,
            quality = plan.quality.overall,
            total = plan.itinerary.estimated_cost.total,
            themes = signals::join_list(&themes),
        );
        let metadata = Metadata::new(SENDER, self.env.clock.now())
            .with_destination(params.destination.clone())
            .with_user(params.user_id.clone())
            .with_memory_type("trip_plan")
            .with_extra("project_id", serde_json::json!(plan.project_id))
            .with_extra("duration", serde_json::json!(plan.itinerary.duration))
            .with_extra("travelers", serde_json::json!(params.travelers));
        let record = MemoryRecord::new(
            MemoryRecord::generate_id(MemoryKind::Trip),
            MemoryKind::Trip,
            content,
            metadata,
        );
        if let Err(e) = gateway.add_record(record).await {
            warn!(project_id = %plan.project_id, error = %e, "Failed to remember trip plan");
        }
    }

    async fn save_snapshot(&self, project: &Project) -> bool {
        let blob = match serde_json::to_vec(project) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(project_id = %project.id, error = %e, "Failed to encode project snapshot");
                return false;
            }
        };
        match self
            .snapshots
            .save(PROJECTS_NAMESPACE, &project.id, blob)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(project_id = %project.id, error = %e, "Failed to save project snapshot");
                false
            }
        }
    }

    /// Snapshots a finished project and, once it is safely stored, lets it
    /// age out of the in-memory table. Projects whose snapshot failed stay.
    async fn retire(&self, project: &Project) {
        if !self.save_snapshot(project).await {
            return;
        }
        let mut table = self.projects.lock().await;
        table.evictable.push_back(project.id.clone());
        let evicted = table.evict(self.config.max_finished_projects);
        if evicted > 0 {
            debug!(evicted, "Finished projects evicted to snapshots");
        }
    }
}

fn terminal(project: &Project) -> SquadError {
    SquadError::InvalidTransition {
        from: project.state.to_string(),
        to: WorkflowState::Error.to_string(),
    }
}
