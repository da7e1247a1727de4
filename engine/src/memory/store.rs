//! Partitioned fragment store
//!
//! Seven append-mostly partitions, one per [`MemoryKind`], each behind its
//! own lock. A global sequence counter stamps every fragment on insert so
//! ranking ties resolve to insertion order across partitions.

use super::record::{Fragment, MemoryKind};
use super::search::{QueryMatcher, ScoredFragment};
use chrono::{DateTime, Utc};
use sdk::errors::SquadError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionDescriptor {
    pub name: String,
    pub kind: MemoryKind,
    pub description: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartitionSummary {
    #[serde(flatten)]
    pub descriptor: PartitionDescriptor,
    pub fragment_count: usize,
}

/// A fragment with the insertion sequence it was stamped with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored {
    pub sequence: u64,
    pub fragment: Fragment,
}

#[derive(Debug)]
pub struct Partition {
    descriptor: PartitionDescriptor,
    fragments: RwLock<Vec<Stored>>,
}

impl Partition {
    fn new(prefix: &str, kind: MemoryKind, created: DateTime<Utc>) -> Self {
        Self {
            descriptor: PartitionDescriptor {
                name: format!("{}_{}", prefix, kind.partition_suffix()),
                kind,
                description: kind.description().to_string(),
                created,
            },
            fragments: RwLock::new(Vec::new()),
        }
    }

    pub fn descriptor(&self) -> &PartitionDescriptor {
        &self.descriptor
    }

    pub async fn len(&self) -> usize {
        self.fragments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.fragments.read().await.is_empty()
    }

    /// Snapshot of the partition's fragments in insertion order.
    pub async fn fragments(&self) -> Vec<Fragment> {
        self.fragments
            .read()
            .await
            .iter()
            .map(|s| s.fragment.clone())
            .collect()
    }
}

#[derive(Debug)]
pub struct MemoryStore {
    partitions: [Partition; 7],
    sequence: AtomicU64,
}

impl MemoryStore {
    pub fn new(prefix: &str, created: DateTime<Utc>) -> Self {
        Self {
            partitions: MemoryKind::ALL.map(|kind| Partition::new(prefix, kind, created)),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn partition(&self, kind: MemoryKind) -> &Partition {
        &self.partitions[kind.index()]
    }

    pub fn partition_by_name(&self, name: &str) -> Result<&Partition, SquadError> {
        self.partitions
            .iter()
            .find(|p| p.descriptor.name == name)
            .ok_or_else(|| SquadError::partition_not_found(name))
    }

    /// Appends all fragments under one write lock; readers never see a partial record.
    pub async fn append(&self, kind: MemoryKind, fragments: Vec<Fragment>) -> usize {
        let count = fragments.len();
        let mut guard = self.partition(kind).fragments.write().await;
        for fragment in fragments {
            let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
            guard.push(Stored { sequence, fragment });
        }
        count
    }

    /// Copy of one partition with insertion sequences, for persistence.
    pub async fn export(&self, kind: MemoryKind) -> Vec<Stored> {
        self.partition(kind).fragments.read().await.clone()
    }

    /// Re-inserts exported fragments in their original global order. Fresh
    /// sequences are assigned; fragments whose id is already present in
    /// their partition are skipped. Returns what was inserted.
    pub async fn restore(&self, mut entries: Vec<Stored>) -> Vec<Fragment> {
        entries.sort_by_key(|e| e.sequence);
        let mut restored = Vec::with_capacity(entries.len());
        for entry in entries {
            let fragment = entry.fragment;
            let mut guard = self.partition(fragment.kind).fragments.write().await;
            if guard.iter().any(|s| s.fragment.id == fragment.id) {
                continue;
            }
            let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
            restored.push(fragment.clone());
            guard.push(Stored { sequence, fragment });
        }
        restored
    }

    /// Scores every fragment in the selected partitions. Unranked.
    pub async fn scan(&self, kinds: &[MemoryKind], matcher: &QueryMatcher) -> Vec<ScoredFragment> {
        let mut hits = Vec::new();
        for kind in kinds {
            let guard = self.partition(*kind).fragments.read().await;
            for stored in guard.iter() {
                if let Some(score) = matcher.score(&stored.fragment.content) {
                    hits.push(ScoredFragment {
                        fragment: stored.fragment.clone(),
                        score,
                        sequence: stored.sequence,
                    });
                }
            }
        }
        hits
    }

    /// Drops fragments created before `cutoff`, returning what was removed.
    pub async fn retain_newer_than(&self, cutoff: DateTime<Utc>) -> Vec<Fragment> {
        let mut removed = Vec::new();
        for partition in &self.partitions {
            let mut guard = partition.fragments.write().await;
            let (keep, drop): (Vec<Stored>, Vec<Stored>) = std::mem::take(&mut *guard)
                .into_iter()
                .partition(|s| s.fragment.metadata.created_at >= cutoff);
            *guard = keep;
            removed.extend(drop.into_iter().map(|s| s.fragment));
        }
        removed
    }

    pub async fn summaries(&self) -> Vec<PartitionSummary> {
        let mut out = Vec::with_capacity(self.partitions.len());
        for partition in &self.partitions {
            out.push(PartitionSummary {
                descriptor: partition.descriptor.clone(),
                fragment_count: partition.len().await,
            });
        }
        out
    }
}
