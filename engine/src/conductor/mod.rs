//! Conductor
//!
//! Runs the multi-phase planning workflow over the three workers.

pub mod evaluator;
pub mod metrics;
pub mod orchestrator;
pub mod plan;
pub mod project;
pub mod refinement;
pub mod workflow;

pub use evaluator::{Evaluator, QualityScore};
pub use metrics::SquadMetrics;
pub use orchestrator::{Conductor, ConductorBuilder, ProjectCounts, PROJECTS_NAMESPACE};
pub use plan::{CollaborationSummary, SubAgentResults, TripPlan};
pub use project::{Failure, Project, ProjectSnapshot, StateChange, TaskLog, TaskStatus};
pub use refinement::build_instruction;
pub use workflow::WorkflowState;
