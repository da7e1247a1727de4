//! Memory gateway
//!
//! The single entry point workers use to read and write memory. It validates
//! input at the boundary, routes records to partitions by kind, ranks query
//! results across partitions and keeps aggregate statistics.
//!
//! The gateway is constructed once and shared as `Arc<MemoryGateway>`.
//! [`MemoryGateway::shutdown`] flushes statistics and every partition to the
//! snapshot store and closes the gateway; later calls fail with
//! `SquadError::Unavailable`. [`MemoryGateway::restore_fragments`] reloads the
//! partitions on the next start.

use super::chunker::Chunker;
use super::record::{Fragment, MemoryDraft, MemoryKind, MemoryRecord};
use super::search::{rank, QueryMatcher, ScoredFragment};
use super::stats::GatewayStats;
use super::store::{MemoryStore, PartitionSummary, Stored};
use crate::config::MemoryConfig;
use chrono::Duration;
use sdk::errors::{SquadError, ValidationError};
use sdk::{Clock, SnapshotStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Snapshot namespace for statistics and partition contents
pub const MEMORY_NAMESPACE: &str = "memory";
const STATS_ID: &str = "stats";

/// Which partitions a query searches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum KindSelector {
    All,
    Kind(MemoryKind),
    /// A label that names no partition; always yields an empty result
    Unmapped(String),
}

impl KindSelector {
    pub fn parse(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("all") {
            return Self::All;
        }
        match MemoryKind::from_label(label) {
            Some(kind) => Self::Kind(kind),
            None => Self::Unmapped(label.trim().to_string()),
        }
    }

    fn kinds(&self) -> Vec<MemoryKind> {
        match self {
            Self::All => MemoryKind::ALL.to_vec(),
            Self::Kind(kind) => vec![*kind],
            Self::Unmapped(_) => Vec::new(),
        }
    }
}

impl Default for KindSelector {
    fn default() -> Self {
        Self::All
    }
}

impl From<String> for KindSelector {
    fn from(label: String) -> Self {
        Self::parse(&label)
    }
}

impl From<KindSelector> for String {
    fn from(selector: KindSelector) -> Self {
        selector.to_string()
    }
}

impl From<MemoryKind> for KindSelector {
    fn from(kind: MemoryKind) -> Self {
        Self::Kind(kind)
    }
}

impl fmt::Display for KindSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Kind(kind) => write!(f, "{}", kind),
            Self::Unmapped(label) => f.write_str(label),
        }
    }
}

/// A memory search request.
///
/// `destination` and `user_id` are carried for tracing only; they do not filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryQuery {
    #[serde(default)]
    pub text: String,
    #[serde(default, alias = "type")]
    pub kind: KindSelector,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl MemoryQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn kind(mut self, kind: impl Into<KindSelector>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddOutcome {
    pub memory_id: String,
    pub chunks_added: usize,
    pub partition: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub results: Vec<ScoredFragment>,
    pub query_time_ms: f64,
    pub total_candidates: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    #[serde(flatten)]
    pub stats: GatewayStats,
    pub partitions: Vec<PartitionSummary>,
    pub max_chunk_size: usize,
}

pub struct MemoryGateway {
    store: MemoryStore,
    chunker: Chunker,
    stats: Mutex<GatewayStats>,
    clock: Arc<dyn Clock>,
    snapshots: Arc<dyn SnapshotStore>,
    default_limit: usize,
    closed: AtomicBool,
}

impl MemoryGateway {
    pub fn new(
        config: &MemoryConfig,
        clock: Arc<dyn Clock>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        let store = MemoryStore::new(&config.collection_prefix, clock.now());
        info!(
            prefix = %config.collection_prefix,
            max_chunk_size = config.max_chunk_size,
            "Memory gateway initialised with {} partitions",
            MemoryKind::ALL.len()
        );
        Self {
            store,
            chunker: Chunker::new(config.max_chunk_size),
            stats: Mutex::new(GatewayStats::default()),
            clock,
            snapshots,
            default_limit: config.max_results.max(1),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), SquadError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SquadError::Unavailable("gateway has been shut down".into()));
        }
        Ok(())
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Validates an untyped draft and stores it.
    pub async fn add_memory(&self, draft: MemoryDraft) -> Result<AddOutcome, SquadError> {
        self.ensure_open()?;
        let record = draft.validate()?;
        self.insert(record).await
    }

    /// Stores a typed record after checking its required fields.
    pub async fn add_record(&self, record: MemoryRecord) -> Result<AddOutcome, SquadError> {
        self.ensure_open()?;
        record.check()?;
        self.insert(record).await
    }

    async fn insert(&self, record: MemoryRecord) -> Result<AddOutcome, SquadError> {
        let memory_id = record.id.clone();
        let kind = record.kind;
        let fragments = self.chunker.chunk(record);

        {
            let mut stats = self.stats.lock().await;
            stats.record_fragments(&fragments);
        }
        let chunks_added = self.store.append(kind, fragments).await;
        let partition = self.store.partition(kind).descriptor().name.clone();

        debug!(
            memory_id = %memory_id,
            partition = %partition,
            chunks_added,
            "Memory stored"
        );

        Ok(AddOutcome {
            memory_id,
            chunks_added,
            partition,
        })
    }

    /// Searches the selected partitions and returns the top hits across all of them.
    pub async fn query_memory(&self, query: &MemoryQuery) -> Result<QueryOutcome, SquadError> {
        self.ensure_open()?;
        if query.text.trim().is_empty() {
            return Err(ValidationError::missing(vec!["text"]).into());
        }
        let limit = match query.limit {
            Some(0) => {
                return Err(ValidationError::invalid("limit", "must be a positive integer").into())
            }
            Some(n) => n,
            None => self.default_limit,
        };

        let started = self.clock.now();
        let matcher = QueryMatcher::new(&query.text);
        let hits = self.store.scan(&query.kind.kinds(), &matcher).await;
        let total_candidates = hits.len();
        let results = rank(hits, limit);
        let query_time_ms = self.clock.millis_since(started);

        {
            let mut stats = self.stats.lock().await;
            stats.record_query(query_time_ms);
        }

        debug!(
            kind = %query.kind,
            destination = ?query.destination,
            user_id = ?query.user_id,
            total_candidates,
            returned = results.len(),
            "Memory query: {}",
            query.text
        );

        Ok(QueryOutcome {
            results,
            query_time_ms,
            total_candidates,
        })
    }

    pub async fn list_partitions(&self) -> Result<Vec<PartitionSummary>, SquadError> {
        self.ensure_open()?;
        Ok(self.store.summaries().await)
    }

    /// Fragments stored in the partition called `name`.
    pub async fn partition_contents(&self, name: &str) -> Result<Vec<Fragment>, SquadError> {
        self.ensure_open()?;
        Ok(self.store.partition_by_name(name)?.fragments().await)
    }

    /// Removes fragments older than `retention_days`.
    pub async fn cleanup(&self, retention_days: u32) -> Result<usize, SquadError> {
        self.ensure_open()?;
        let now = self.clock.now();
        let cutoff = now - Duration::days(i64::from(retention_days));
        let removed = self.store.retain_newer_than(cutoff).await;

        let mut stats = self.stats.lock().await;
        stats.forget_fragments(&removed);
        stats.last_cleanup = Some(now);
        info!(removed = removed.len(), retention_days, "Memory cleanup finished");
        Ok(removed.len())
    }

    /// Runs [`MemoryGateway::cleanup`] now and then every `every` until the
    /// gateway shuts down or the handle is aborted.
    pub fn spawn_cleanup(
        self: &Arc<Self>,
        retention_days: u32,
        every: std::time::Duration,
    ) -> JoinHandle<()> {
        let gateway = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match gateway.cleanup(retention_days).await {
                    Ok(_) => {}
                    Err(SquadError::Unavailable(_)) => break,
                    Err(e) => warn!(error = %e, "Scheduled memory cleanup failed"),
                }
            }
            debug!("Memory cleanup task stopped");
        })
    }

    pub async fn stats(&self) -> GatewayStats {
        self.stats.lock().await.clone()
    }

    pub async fn status(&self) -> Result<GatewayStatus, SquadError> {
        self.ensure_open()?;
        Ok(GatewayStatus {
            stats: self.stats().await,
            partitions: self.store.summaries().await,
            max_chunk_size: self.chunker.max_chunk_size(),
        })
    }

    /// Reloads statistics flushed by a previous shutdown. Returns false when none exist.
    pub async fn restore_stats(&self) -> Result<bool, SquadError> {
        self.ensure_open()?;
        let Some(blob) = self.snapshots.load(MEMORY_NAMESPACE, STATS_ID).await? else {
            return Ok(false);
        };
        let restored: GatewayStats = serde_json::from_slice(&blob)
            .map_err(|e| SquadError::Persistence(format!("corrupt stats snapshot: {}", e)))?;

        let mut stats = self.stats.lock().await;
        stats.query_count = restored.query_count;
        stats.average_query_ms = restored.average_query_ms;
        stats.last_cleanup = restored.last_cleanup;
        stats.last_flush = restored.last_flush;
        Ok(true)
    }

    /// Reloads partition contents flushed by a previous shutdown, keeping
    /// their insertion order. Returns how many fragments were restored.
    pub async fn restore_fragments(&self) -> Result<usize, SquadError> {
        self.ensure_open()?;
        let mut entries: Vec<Stored> = Vec::new();
        for kind in MemoryKind::ALL {
            let name = &self.store.partition(kind).descriptor().name;
            let Some(blob) = self.snapshots.load(MEMORY_NAMESPACE, name).await? else {
                continue;
            };
            let saved: Vec<Stored> = serde_json::from_slice(&blob).map_err(|e| {
                SquadError::Persistence(format!("corrupt snapshot for partition {}: {}", name, e))
            })?;
            entries.extend(saved.into_iter().filter(|s| s.fragment.kind == kind));
        }

        let restored = self.store.restore(entries).await;
        self.stats.lock().await.record_fragments(&restored);
        info!(restored = restored.len(), "Memory partitions restored");
        Ok(restored.len())
    }

    async fn flush_partitions(&self) -> Result<(), SquadError> {
        for kind in MemoryKind::ALL {
            let partition = self.store.partition(kind);
            let blob = serde_json::to_vec(&self.store.export(kind).await).map_err(|e| {
                SquadError::Persistence(format!("failed to encode partition: {}", e))
            })?;
            self.snapshots
                .save(MEMORY_NAMESPACE, &partition.descriptor().name, blob)
                .await?;
        }
        Ok(())
    }

    /// Flushes partitions and statistics, then closes the gateway. Calling it
    /// twice is a no-op.
    pub async fn shutdown(&self) -> Result<(), SquadError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Err(e) = self.flush_partitions().await {
            warn!("Failed to flush memory partitions: {}", e);
            return Err(e);
        }
        let snapshot = {
            let mut stats = self.stats.lock().await;
            stats.last_flush = Some(self.clock.now());
            stats.clone()
        };
        let blob = serde_json::to_vec(&snapshot)
            .map_err(|e| SquadError::Persistence(format!("failed to encode stats: {}", e)))?;
        if let Err(e) = self.snapshots.save(MEMORY_NAMESPACE, STATS_ID, blob).await {
            warn!("Failed to flush memory statistics: {}", e);
            return Err(e);
        }
        info!(
            total_fragments = snapshot.total_fragments,
            query_count = snapshot.query_count,
            "Memory gateway shut down"
        );
        Ok(())
    }
}
