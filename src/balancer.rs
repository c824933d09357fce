//! Greedy Rebalancing
//!
//! One bin-packing pass: sort the domains by their current share ascending
//! (stable, so equal shares keep their prior order), then hand each one to
//! the least-loaded physical CPU so far, lowest index on ties. The result
//! approximates an even spread without an optimal bin-packing solver and is
//! fully deterministic for a given input snapshot.

use crate::host::Host;
use crate::stats::DomainStat;

/// Outcome of one rebalance pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebalanceReport {
    /// Domains successfully pinned
    pub pinned: usize,
    /// Pin requests the host rejected
    pub failed: usize,
    /// Final per-pCPU capacity sums, in percentage points
    pub capacities: Vec<u32>,
}

/// Computes and applies a fresh domain → pCPU assignment
#[derive(Debug)]
pub struct Balancer;

impl Balancer {
    pub fn new() -> Self {
        Self
    }

    /// Run one bin-packing pass over the sampled domains and issue the pins.
    ///
    /// Every sampled domain is pinned exactly once per pass, even when its
    /// target equals its current placement. A rejected pin is logged and the
    /// pass continues; the domain keeps its previous `pcpu` until the next
    /// pass (the capacity already accumulated for it is not rolled back).
    /// Domains skipped by this tick's refresh do not participate.
    pub fn rebalance<H: Host>(
        &self,
        host: &H,
        stats: &mut [DomainStat],
        pcpu_count: usize,
    ) -> RebalanceReport {
        let mut report = RebalanceReport {
            capacities: vec![0; pcpu_count],
            ..Default::default()
        };
        if pcpu_count == 0 {
            return report;
        }

        stats.sort_by_key(|s| s.current_percent_used);

        for stat in stats.iter_mut().filter(|s| s.sampled) {
            let target = least_loaded(&report.capacities);
            report.capacities[target] += stat.current_percent_used;
            match host.pin_to_physical_cpu(&stat.handle, target) {
                Ok(()) => {
                    stat.pcpu = target;
                    report.pinned += 1;
                }
                Err(e) => {
                    log::warn!("{}; keeping previous pinning", e);
                    report.failed += 1;
                }
            }
        }
        report
    }
}

impl Default for Balancer {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of the least-loaded pCPU. `min_by_key` keeps the first minimum, so
/// ties go to the lowest index.
fn least_loaded(capacities: &[u32]) -> usize {
    capacities
        .iter()
        .enumerate()
        .min_by_key(|&(_, c)| *c)
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}
