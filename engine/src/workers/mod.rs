//! Domain workers
//!
//! Each worker runs a fixed pipeline: fetch memory context, load base
//! knowledge, merge memory signals, derive its artifact, then persist a
//! summary. Only the persistence step is allowed to fail quietly.

pub mod context;
pub mod cost_analyst;
pub mod designer;
pub mod fact_checker;
pub mod knowledge;
pub mod providers;
pub(crate) mod signals;
pub mod types;

use crate::memory::{MemoryGateway, MemoryRecord};
use crate::message_bus::{MessageBus, Notice};
use sdk::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use context::{ContextSummary, MemoryContext};
pub use cost_analyst::{BudgetAnalysis, BudgetRequest, CostAnalyst};
pub use designer::{DesignOutcome, DesignRequest, Designer};
pub use fact_checker::{FactCheckRequest, FactChecker, ResearchReport};
pub use providers::{FactSource, PriceComparisonProvider, StaticFactSource, StaticPriceTable};
pub use types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    Designer,
    CostAnalyst,
    FactChecker,
}

impl WorkerRole {
    pub const ALL: [WorkerRole; 3] = [
        WorkerRole::Designer,
        WorkerRole::CostAnalyst,
        WorkerRole::FactChecker,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Designer => "designer",
            Self::CostAnalyst => "cost_analyst",
            Self::FactChecker => "fact_checker",
        }
    }
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaborators every worker shares.
#[derive(Clone)]
pub struct WorkerEnv {
    /// `None` runs the worker without memory
    pub gateway: Option<Arc<MemoryGateway>>,
    pub bus: Arc<MessageBus>,
    pub clock: Arc<dyn Clock>,
}

impl WorkerEnv {
    pub fn new(
        gateway: Option<Arc<MemoryGateway>>,
        bus: Arc<MessageBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { gateway, bus, clock }
    }

    /// Best-effort write of a worker summary. Failures are logged only.
    pub(crate) async fn persist(&self, role: WorkerRole, record: MemoryRecord) -> bool {
        let Some(gateway) = &self.gateway else {
            return false;
        };
        match gateway.add_record(record).await {
            Ok(outcome) => {
                tracing::debug!(
                    worker = %role,
                    memory_id = %outcome.memory_id,
                    chunks = outcome.chunks_added,
                    "Stored worker summary"
                );
                true
            }
            Err(e) => {
                tracing::warn!(worker = %role, error = %e, "Failed to store worker summary");
                false
            }
        }
    }

    pub(crate) async fn notify(&self, role: WorkerRole, to: WorkerRole, notice: Notice) {
        self.bus.publish(role.as_str(), to.as_str(), notice).await;
    }
}
