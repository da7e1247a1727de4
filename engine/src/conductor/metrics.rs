//! Aggregate workflow metrics

use serde::{Deserialize, Serialize};

/// Cycles of designer-validator collaboration in one completed project.
pub const CYCLES_PER_PROJECT: u64 = 2;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SquadMetrics {
    pub trips_planned: u64,
    pub trips_failed: u64,
    pub collaboration_cycles: u64,
    pub average_planning_ms: f64,
    /// Percentage of finished projects that completed
    pub success_rate: f64,
}

impl SquadMetrics {
    pub fn record_success(&mut self, planning_ms: f64) {
        self.trips_planned += 1;
        self.collaboration_cycles += CYCLES_PER_PROJECT;
        let n = self.trips_planned as f64;
        self.average_planning_ms += (planning_ms - self.average_planning_ms) / n;
        self.refresh_rate();
    }

    pub fn record_failure(&mut self) {
        self.trips_failed += 1;
        self.refresh_rate();
    }

    fn refresh_rate(&mut self) {
        let finished = self.trips_planned + self.trips_failed;
        self.success_rate = if finished == 0 {
            0.0
        } else {
            self.trips_planned as f64 / finished as f64 * 100.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_is_incremental() {
        let mut m = SquadMetrics::default();
        m.record_success(100.0);
        m.record_success(200.0);
        m.record_success(600.0);
        assert_eq!(m.average_planning_ms, 300.0);
        assert_eq!(m.collaboration_cycles, 6);
    }

    #[test]
    fn success_rate_counts_failures() {
        let mut m = SquadMetrics::default();
        m.record_success(10.0);
        m.record_failure();
        m.record_failure();
        m.record_success(10.0);
        assert_eq!(m.success_rate, 50.0);
        assert_eq!(m.trips_failed, 2);
    }
}
