//! Aggregate gateway statistics

use super::record::Fragment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayStats {
    pub total_fragments: usize,
    pub by_kind: BTreeMap<String, usize>,
    pub by_source: BTreeMap<String, usize>,
    pub by_destination: BTreeMap<String, usize>,
    pub query_count: u64,
    /// Incremental mean over every successful query
    pub average_query_ms: f64,
    pub last_cleanup: Option<DateTime<Utc>>,
    pub last_flush: Option<DateTime<Utc>>,
}

impl GatewayStats {
    pub(crate) fn record_fragments(&mut self, fragments: &[Fragment]) {
        for fragment in fragments {
            self.total_fragments += 1;
            *self
                .by_kind
                .entry(fragment.kind.as_str().to_string())
                .or_default() += 1;
            *self
                .by_source
                .entry(fragment.metadata.source.clone())
                .or_default() += 1;
            if let Some(dest) = &fragment.metadata.destination {
                *self.by_destination.entry(dest.to_lowercase()).or_default() += 1;
            }
        }
    }

    pub(crate) fn forget_fragments(&mut self, fragments: &[Fragment]) {
        for fragment in fragments {
            self.total_fragments = self.total_fragments.saturating_sub(1);
            decrement(&mut self.by_kind, fragment.kind.as_str());
            decrement(&mut self.by_source, &fragment.metadata.source);
            if let Some(dest) = &fragment.metadata.destination {
                decrement(&mut self.by_destination, &dest.to_lowercase());
            }
        }
    }

    pub(crate) fn record_query(&mut self, elapsed_ms: f64) {
        self.query_count += 1;
        self.average_query_ms += (elapsed_ms - self.average_query_ms) / self.query_count as f64;
    }
}

fn decrement(map: &mut BTreeMap<String, usize>, key: &str) {
    if let Some(count) = map.get_mut(key) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            map.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_average_is_incremental() {
        let mut stats = GatewayStats::default();
        for ms in [10.0, 20.0, 30.0, 40.0] {
            stats.record_query(ms);
        }
        assert_eq!(stats.query_count, 4);
        assert!((stats.average_query_ms - 25.0).abs() < 1e-9);
    }
}
