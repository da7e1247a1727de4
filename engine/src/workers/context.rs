//! Memory context gathered before a worker runs

use super::WorkerRole;
use crate::memory::{Fragment, MemoryGateway, MemoryQuery};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// What a worker learned from memory, reported alongside its artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    pub has_context: bool,
    pub records: usize,
    pub subsets: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryContext {
    pub records: Vec<Fragment>,
    pub has_context: bool,
    pub subsets: BTreeMap<String, Vec<Fragment>>,
}

impl MemoryContext {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Runs every query concurrently and merges the hits in query order,
    /// keeping the first occurrence of each fragment id. Any gateway failure
    /// yields an empty context.
    pub async fn gather(
        gateway: Option<&MemoryGateway>,
        role: WorkerRole,
        queries: Vec<MemoryQuery>,
    ) -> Self {
        let Some(gateway) = gateway else {
            return Self::empty();
        };

        let outcomes = join_all(queries.iter().map(|q| gateway.query_memory(q))).await;

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for (query, outcome) in queries.iter().zip(outcomes) {
            match outcome {
                Ok(outcome) => {
                    for hit in outcome.results {
                        if seen.insert(hit.fragment.id.clone()) {
                            records.push(hit.fragment);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(worker = %role, query = %query.text, error = %e, "Memory unavailable, continuing without context");
                    return Self::empty();
                }
            }
        }

        tracing::debug!(worker = %role, records = records.len(), "Gathered memory context");
        Self {
            has_context: !records.is_empty(),
            records,
            subsets: BTreeMap::new(),
        }
    }

    /// Adds a named subset of the records matching `predicate`.
    pub fn with_subset(mut self, name: &str, predicate: impl Fn(&Fragment) -> bool) -> Self {
        let subset = self.records.iter().filter(|f| predicate(f)).cloned().collect();
        self.subsets.insert(name.to_string(), subset);
        self
    }

    pub fn subset(&self, name: &str) -> &[Fragment] {
        self.subsets.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn summary(&self) -> ContextSummary {
        ContextSummary {
            has_context: self.has_context,
            records: self.records.len(),
            subsets: self
                .subsets
                .iter()
                .map(|(name, fragments)| (name.clone(), fragments.len()))
                .collect(),
        }
    }
}

pub(crate) fn mentions_destination(fragment: &Fragment, destination: &str) -> bool {
    fragment
        .metadata
        .destination
        .as_deref()
        .is_some_and(|d| d.eq_ignore_ascii_case(destination))
        || fragment
            .content
            .to_lowercase()
            .contains(&destination.to_lowercase())
}

pub(crate) fn has_memory_type(fragment: &Fragment, memory_type: &str) -> bool {
    fragment.metadata.memory_type.as_deref() == Some(memory_type)
}

pub(crate) fn belongs_to(fragment: &Fragment, user_id: Option<&str>) -> bool {
    user_id.is_some() && fragment.metadata.user_id.as_deref() == user_id
}

pub(crate) fn contains_any(fragment: &Fragment, words: &[&str]) -> bool {
    let content = fragment.content.to_lowercase();
    words.iter().any(|w| content.contains(w))
}
