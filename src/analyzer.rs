//! Utilization Analysis
//!
//! Converts per-domain CPU-time deltas into normalized shares of their pCPU
//! group and decides whether the current pinning is stable enough to leave
//! alone. Stability is a global AND: one domain swinging past the tolerance
//! triggers a full rebalance pass, never a local adjustment.

use std::collections::HashMap;

use crate::stats::DomainStat;

/// Percentage computation and the stability decision
#[derive(Debug)]
pub struct UtilizationAnalyzer {
    tolerance: u32,
}

impl UtilizationAnalyzer {
    /// `tolerance` is the maximum allowed swing in percentage points between
    /// consecutive samples before the mapping counts as unstable.
    pub fn new(tolerance: u32) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> u32 {
        self.tolerance
    }

    /// Recompute `current_percent_used` for every sampled domain.
    ///
    /// For each physical CPU `p`, a domain's share is its delta divided by
    /// the summed delta of all sampled domains currently pinned to `p`,
    /// rounded to a whole percent. A group with no observed activity is
    /// defined as 0% for all of its domains rather than a division fault.
    /// Unsampled domains keep their previous percentages.
    pub fn update_percentages(&self, stats: &mut [DomainStat]) {
        let mut group_totals: HashMap<usize, u64> = HashMap::new();
        for stat in stats.iter().filter(|s| s.sampled) {
            *group_totals.entry(stat.pcpu).or_insert(0) += stat.cpu_time_diff;
        }

        for stat in stats.iter_mut().filter(|s| s.sampled) {
            let total = group_totals.get(&stat.pcpu).copied().unwrap_or(0);
            stat.current_percent_used = if total == 0 {
                0
            } else {
                ((stat.cpu_time_diff as f64 / total as f64) * 100.0).round() as u32
            };
        }
    }

    /// Whether the mapping is stable: every sampled domain has a prior sample
    /// to compare against and moved at most `tolerance` percentage points.
    ///
    /// A domain on its first sample has no meaningful previous percentage, so
    /// it forces instability; this is what makes the first tick of a run
    /// always rebalance.
    pub fn is_stable(&self, stats: &[DomainStat]) -> bool {
        stats.iter().filter(|s| s.sampled).all(|s| {
            s.ticks_sampled >= 2
                && s.last_percent_used.abs_diff(s.current_percent_used) <= self.tolerance
        })
    }
}
