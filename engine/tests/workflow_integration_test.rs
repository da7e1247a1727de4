//! Integration tests for the planning workflow
//!
//! Drives the conductor end to end with the static price table and fact
//! source, plus purpose-built fact sources that fail or stall on demand.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use sdk::errors::SquadError;
use sdk::{Clock, InMemorySnapshotStore, SnapshotStore, SystemClock};
use tripsquad_engine::conductor::{Conductor, Project, TaskStatus, WorkflowState, PROJECTS_NAMESPACE};
use tripsquad_engine::config::{MemoryConfig, OrchestratorConfig};
use tripsquad_engine::memory::{KindSelector, MemoryGateway, MemoryKind, MemoryQuery};
use tripsquad_engine::message_bus::{Notice, ANY_RECIPIENT};
use tripsquad_engine::workers::providers::{ActivityFacts, BookingOption, DestinationFacts};
use tripsquad_engine::workers::{
    Designer, FactSource, StaticFactSource, TripRequest, WorkerEnv, WorkerRole,
};

fn gateway(snapshots: Arc<dyn SnapshotStore>) -> Arc<MemoryGateway> {
    Arc::new(MemoryGateway::new(
        &MemoryConfig::default(),
        Arc::new(SystemClock),
        snapshots,
    ))
}

fn tokyo() -> TripRequest {
    TripRequest::new("Tokyo")
        .duration(7)
        .budget(2000.0)
        .travelers(2)
}

/// Fails every destination lookup.
struct BrokenFacts;

#[async_trait]
impl FactSource for BrokenFacts {
    fn name(&self) -> &str {
        "broken"
    }

    async fn activity_facts(&self, _activity: &str) -> Result<Option<ActivityFacts>, SquadError> {
        Ok(None)
    }

    async fn booking_options(&self, _activity: &str) -> Result<Vec<BookingOption>, SquadError> {
        Ok(Vec::new())
    }

    async fn destination_facts(
        &self,
        _destination: &str,
    ) -> Result<Option<DestinationFacts>, SquadError> {
        Err(SquadError::Provider("facts service offline".to_string()))
    }
}

/// Holds every lookup until the gate receives permits.
struct GatedFacts {
    gate: Arc<Semaphore>,
    inner: StaticFactSource,
}

impl GatedFacts {
    fn new(gate: Arc<Semaphore>) -> Self {
        Self {
            gate,
            inner: StaticFactSource::new(),
        }
    }
}

#[async_trait]
impl FactSource for GatedFacts {
    fn name(&self) -> &str {
        "gated"
    }

    async fn activity_facts(&self, activity: &str) -> Result<Option<ActivityFacts>, SquadError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| SquadError::Provider("gate closed".to_string()))?;
        self.inner.activity_facts(activity).await
    }

    async fn booking_options(&self, activity: &str) -> Result<Vec<BookingOption>, SquadError> {
        self.inner.booking_options(activity).await
    }

    async fn destination_facts(
        &self,
        destination: &str,
    ) -> Result<Option<DestinationFacts>, SquadError> {
        self.inner.destination_facts(destination).await
    }
}

async fn wait_for_state(conductor: &Conductor, id: &str, state: WorkflowState) -> Project {
    for _ in 0..200 {
        let project = conductor.project(id).await.unwrap();
        if project.state == state {
            return project;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("project {} never reached {}", id, state);
}

#[tokio::test]
async fn test_tokyo_trip_completes_end_to_end() {
    let snapshots = Arc::new(InMemorySnapshotStore::new());
    let gw = gateway(Arc::clone(&snapshots) as Arc<dyn SnapshotStore>);
    let conductor = Conductor::builder(OrchestratorConfig::default())
        .gateway(Arc::clone(&gw))
        .snapshots(Arc::clone(&snapshots) as Arc<dyn SnapshotStore>)
        .build();

    let plan = conductor.plan_trip(tokyo()).await.unwrap();

    assert!(plan.project_id.starts_with("squad_tokyo_"));
    assert_eq!(plan.itinerary.days.len(), 7);
    assert_eq!(plan.itinerary.duration, 7);
    assert_eq!(plan.itinerary.version, 2);
    assert!((0.0..=100.0).contains(&plan.quality.overall));
    assert_eq!(plan.collaboration.cycles, 2);
    assert_eq!(plan.collaboration.workers, WorkerRole::ALL.to_vec());
    assert_eq!(
        plan.collaboration.phases,
        vec![
            WorkflowState::Planning,
            WorkflowState::Validation,
            WorkflowState::Refinement,
            WorkflowState::Finalization,
            WorkflowState::Completed,
        ]
    );
    assert!(plan.collaboration.messages_exchanged > 0);

    // Every worker's output is carried in the result.
    assert_eq!(plan.sub_agent_results.designer.itinerary, plan.itinerary);
    assert_eq!(plan.sub_agent_results.cost_analyst.destination, "Tokyo");
    assert!(!plan.sub_agent_results.fact_checker.checks.is_empty());

    let project = conductor.project(&plan.project_id).await.unwrap();
    assert_eq!(project.state, WorkflowState::Completed);
    assert_eq!(project.itinerary_v1.as_ref().map(|i| i.version), Some(1));
    assert!(project.refinement.is_some());
    assert_eq!(project.quality.as_ref(), Some(&plan.quality));
    for role in WorkerRole::ALL {
        assert_eq!(project.workers[&role].status, TaskStatus::Completed);
    }
    assert_eq!(project.workers[&WorkerRole::Designer].tasks.len(), 2);

    let metrics = conductor.metrics().await;
    assert_eq!(metrics.trips_planned, 1);
    assert_eq!(metrics.trips_failed, 0);
    assert_eq!(metrics.collaboration_cycles, 2);
    assert_eq!(metrics.success_rate, 100.0);

    // The finished project and a trip summary are both persisted.
    let saved = snapshots
        .load(PROJECTS_NAMESPACE, &plan.project_id)
        .await
        .unwrap()
        .expect("project snapshot");
    let restored: Project = serde_json::from_slice(&saved).unwrap();
    assert_eq!(restored.state, WorkflowState::Completed);

    let trips = gw
        .query_memory(&MemoryQuery::new("trip plan tokyo").kind(KindSelector::Kind(MemoryKind::Trip)))
        .await
        .unwrap();
    assert_eq!(trips.results.len(), 1);
}

#[tokio::test]
async fn test_second_request_reuses_memory() {
    let gw = gateway(Arc::new(InMemorySnapshotStore::new()));
    let conductor = Conductor::builder(OrchestratorConfig::default())
        .gateway(Arc::clone(&gw))
        .build();

    let first = conductor.plan_trip(tokyo().user("u-42")).await.unwrap();
    assert!(!first.sub_agent_results.designer.memory.has_context);

    let second = conductor.plan_trip(tokyo().user("u-42")).await.unwrap();
    assert!(second.sub_agent_results.designer.memory.has_context);
    assert!(second.sub_agent_results.cost_analyst.memory.has_context);
    assert!(second.sub_agent_results.fact_checker.memory.has_context);

    // The designer sees at least one Tokyo fragment through its own query.
    let env = WorkerEnv::new(
        Some(Arc::clone(&gw)),
        Arc::clone(conductor.bus()),
        Arc::new(SystemClock) as Arc<dyn Clock>,
    );
    let params = conductor.project(&second.project_id).await.unwrap().request;
    let context = Designer::new(env).query_context_for(&params).await;
    assert!(context.has_context);
    assert!(!context.subset("destination").is_empty());
}

#[tokio::test]
async fn test_invalid_request_is_rejected_before_registration() {
    let conductor = Conductor::builder(OrchestratorConfig::default()).build();

    let err = conductor
        .plan_trip(TripRequest::new("  ").duration(0))
        .await
        .unwrap_err();

    match err {
        SquadError::Validation(v) => {
            assert!(v.fields.contains(&"destination".to_string()));
            assert!(v.fields.contains(&"duration".to_string()));
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(conductor.project_counts().await.active, 0);
    assert_eq!(conductor.metrics().await.trips_failed, 0);
}

#[tokio::test]
async fn test_validation_failure_waits_for_both_branches() {
    let conductor = Conductor::builder(OrchestratorConfig::default())
        .facts(Arc::new(BrokenFacts))
        .build();

    let err = conductor.plan_trip(tokyo()).await.unwrap_err();
    assert!(matches!(err, SquadError::Worker { .. }), "got {:?}", err);

    let counts = conductor.project_counts().await;
    assert_eq!(counts.failed, 1);
    assert_eq!(counts.active, 0);

    let history = conductor.bus().history().await;
    let project_id = history[0].body.project_id().to_string();
    let project = conductor.project(&project_id).await.unwrap();

    assert_eq!(project.state, WorkflowState::Error);
    let failure = project.failure.expect("failure recorded");
    assert_eq!(failure.phase, WorkflowState::Validation.to_string());
    assert!(project.itinerary_v1.is_some());
    // The budget branch finished, yet its output is not applied.
    assert_eq!(
        project.workers[&WorkerRole::CostAnalyst].status,
        TaskStatus::Completed
    );
    assert_eq!(
        project.workers[&WorkerRole::FactChecker].status,
        TaskStatus::Failed
    );
    assert!(project.budget_analysis.is_none());
    assert!(project.itinerary_v2.is_none());

    let metrics = conductor.metrics().await;
    assert_eq!(metrics.trips_failed, 1);
    assert_eq!(metrics.success_rate, 0.0);
}

#[tokio::test]
async fn test_stalled_worker_times_out() {
    let config = OrchestratorConfig {
        call_timeout_secs: 1,
        ..OrchestratorConfig::default()
    };
    let gate = Arc::new(Semaphore::new(0));
    let conductor = Conductor::builder(config)
        .facts(Arc::new(GatedFacts::new(gate)))
        .build();

    let err = conductor.plan_trip(tokyo()).await.unwrap_err();

    match err {
        SquadError::Timeout { operation, secs } => {
            assert_eq!(secs, 1);
            assert!(operation.starts_with("fact_checker"));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(conductor.project_counts().await.failed, 1);
}

#[tokio::test]
async fn test_abandoned_project_discards_late_results() {
    let gate = Arc::new(Semaphore::new(0));
    let conductor = Arc::new(
        Conductor::builder(OrchestratorConfig::default())
            .facts(Arc::new(GatedFacts::new(Arc::clone(&gate))))
            .build(),
    );

    let id = conductor.submit(tokyo()).await.unwrap();
    wait_for_state(&conductor, &id, WorkflowState::Validation).await;

    let abandoned = conductor.abandon(&id).await.unwrap();
    assert_eq!(abandoned.state, WorkflowState::Error);
    let failure = abandoned.failure.as_ref().unwrap();
    assert_eq!(failure.phase, "VALIDATION");
    assert_eq!(failure.message, "abandoned by caller");
    assert!(abandoned.itinerary_v1.is_some());

    // Let the stalled branch finish; its result must not be applied.
    gate.add_permits(1_000);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let project = conductor.project(&id).await.unwrap();
    assert_eq!(project.state, WorkflowState::Error);
    assert!(project.budget_analysis.is_none());
    assert!(project.research_report.is_none());
    assert!(project.itinerary_v2.is_none());

    let metrics = conductor.metrics().await;
    assert_eq!(metrics.trips_failed, 1);
    assert_eq!(metrics.trips_planned, 0);

    // Terminal projects cannot be abandoned again.
    assert!(matches!(
        conductor.abandon(&id).await,
        Err(SquadError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_old_finished_projects_are_served_from_snapshots() {
    let snapshots = Arc::new(InMemorySnapshotStore::new());
    let config = OrchestratorConfig {
        max_finished_projects: 1,
        ..OrchestratorConfig::default()
    };
    let conductor = Conductor::builder(config)
        .snapshots(Arc::clone(&snapshots) as Arc<dyn SnapshotStore>)
        .build();

    let first = conductor.plan_trip(tokyo()).await.unwrap();
    let second = conductor
        .plan_trip(TripRequest::new("Paris").duration(3))
        .await
        .unwrap();

    let counts = conductor.project_counts().await;
    assert_eq!(counts.completed, 1);
    assert_eq!(counts.active, 0);

    let evicted = conductor.project(&first.project_id).await.unwrap();
    assert_eq!(evicted.state, WorkflowState::Completed);
    assert_eq!(evicted.itinerary_v2.map(|i| i.days.len()), Some(7));
    assert_eq!(
        conductor.project(&second.project_id).await.unwrap().state,
        WorkflowState::Completed
    );
    assert!(matches!(
        conductor.abandon(&first.project_id).await,
        Err(SquadError::InvalidTransition { .. })
    ));
    assert_eq!(conductor.metrics().await.trips_planned, 2);
}

#[tokio::test]
async fn test_unknown_project_is_not_found() {
    let conductor = Conductor::builder(OrchestratorConfig::default()).build();

    assert!(matches!(
        conductor.project("squad_nowhere_0").await,
        Err(SquadError::NotFound { .. })
    ));
    assert!(matches!(
        conductor.abandon("squad_nowhere_0").await,
        Err(SquadError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_phase_notices_follow_the_happy_path() {
    let conductor = Conductor::builder(OrchestratorConfig::default()).build();
    let mut notices = conductor.bus().subscribe(ANY_RECIPIENT).await;

    let plan = conductor.plan_trip(tokyo()).await.unwrap();

    let mut states = Vec::new();
    while let Ok(message) = notices.try_recv() {
        if let Notice::PhaseChanged { project_id, state } = message.body {
            assert_eq!(project_id, plan.project_id);
            states.push(state);
        }
    }
    assert_eq!(states, plan.collaboration.phases);
    assert!(states.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_submitted_projects_run_concurrently() {
    let conductor = Arc::new(Conductor::builder(OrchestratorConfig::default()).build());

    let mut ids = Vec::new();
    for destination in ["Tokyo", "Paris", "Bangkok"] {
        ids.push(
            conductor
                .submit(TripRequest::new(destination).duration(3))
                .await
                .unwrap(),
        );
    }

    for id in &ids {
        let project = wait_for_state(&conductor, id, WorkflowState::Completed).await;
        assert_eq!(project.itinerary_v2.map(|i| i.days.len()), Some(3));
    }
    assert_eq!(conductor.metrics().await.trips_planned, 3);
}

#[tokio::test]
async fn test_shutdown_flushes_and_closes() {
    let snapshots = Arc::new(InMemorySnapshotStore::new());
    let gw = gateway(Arc::clone(&snapshots) as Arc<dyn SnapshotStore>);
    let conductor = Conductor::builder(OrchestratorConfig::default())
        .gateway(Arc::clone(&gw))
        .snapshots(Arc::clone(&snapshots) as Arc<dyn SnapshotStore>)
        .build();

    conductor.plan_trip(tokyo()).await.unwrap();
    conductor.shutdown().await.unwrap();

    assert!(snapshots.load("metrics", "conductor").await.unwrap().is_some());
    assert!(snapshots.load("memory", "stats").await.unwrap().is_some());
    assert!(matches!(
        gw.query_memory(&MemoryQuery::new("tokyo")).await,
        Err(SquadError::Unavailable(_))
    ));
    assert!(matches!(
        conductor.plan_trip(tokyo()).await,
        Err(SquadError::Unavailable(_))
    ));
}
