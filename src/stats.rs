//! Domain Statistics Collection
//!
//! Per-domain sample state and the per-tick refresh that turns the host's
//! raw cumulative CPU-time counters into interval deltas. The stat set is
//! built once at startup and refreshed in place every tick; a domain whose
//! queries fail mid-run is skipped for that tick and retried on the next,
//! never aborting the cycle.

use crate::host::{DomainHandle, Host};

/// Per-domain sample state, refreshed in place every tick
#[derive(Debug, Clone)]
pub struct DomainStat {
    /// Handle to the domain this entry tracks
    pub handle: DomainHandle,
    /// Previous sample's share of its pCPU group, in [0, 100]
    pub last_percent_used: u32,
    /// Current share of its pCPU group, in [0, 100]
    pub current_percent_used: u32,
    /// Last observed cumulative CPU-time counter
    pub last_cpu_time: u64,
    /// Counter delta over the elapsed interval
    pub cpu_time_diff: u64,
    /// Physical CPU the domain is currently pinned to
    pub pcpu: usize,
    /// Virtual CPUs exposed by the domain (informational; pinning assumes 1)
    pub vcpus: u32,
    /// Whether this tick's refresh succeeded for the domain
    pub sampled: bool,
    /// Lifetime count of successful refreshes
    pub ticks_sampled: u32,
}

impl DomainStat {
    pub fn new(handle: DomainHandle) -> Self {
        Self {
            handle,
            last_percent_used: 0,
            current_percent_used: 0,
            last_cpu_time: 0,
            cpu_time_diff: 0,
            pcpu: 0,
            vcpus: 0,
            sampled: false,
            ticks_sampled: 0,
        }
    }
}

/// Outcome of one refresh round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Domains successfully sampled this tick
    pub sampled: usize,
    /// Domains skipped because a host query failed
    pub skipped: usize,
}

/// Turns one round of raw host counters into per-domain CPU-time deltas.
///
/// Owns the [`DomainStat`] set for the lifetime of a run. Read-only toward
/// the host; all mutation is in-place on the owned stats.
#[derive(Debug)]
pub struct StatsCollector {
    stats: Vec<DomainStat>,
}

impl StatsCollector {
    pub fn new(domains: Vec<DomainHandle>) -> Self {
        Self {
            stats: domains.into_iter().map(DomainStat::new).collect(),
        }
    }

    /// Sample every domain once.
    ///
    /// For each domain both queries (counter and affinity) must succeed
    /// before anything is committed: the previous percentage is rolled, the
    /// saturating counter delta computed, the new counter stored, and the
    /// placement refreshed from the affinity report. A failure on either
    /// query leaves the entry untouched for the tick.
    pub fn refresh<H: Host>(&mut self, host: &H) -> RefreshReport {
        let mut report = RefreshReport::default();
        for stat in &mut self.stats {
            stat.sampled = false;

            let cpu_time = match host.cumulative_cpu_time(&stat.handle) {
                Ok(t) => t,
                Err(e) => {
                    log::warn!("skipping {} this tick: {}", stat.handle, e);
                    report.skipped += 1;
                    continue;
                }
            };
            let affinity = match host.current_affinity(&stat.handle) {
                Ok(a) => a,
                Err(e) => {
                    log::warn!("skipping {} this tick: {}", stat.handle, e);
                    report.skipped += 1;
                    continue;
                }
            };

            if cpu_time < stat.last_cpu_time {
                log::warn!(
                    "cumulative counter for {} went backwards ({} -> {}); treating the interval as idle",
                    stat.handle,
                    stat.last_cpu_time,
                    cpu_time
                );
            }

            stat.last_percent_used = stat.current_percent_used;
            stat.cpu_time_diff = cpu_time.saturating_sub(stat.last_cpu_time);
            stat.last_cpu_time = cpu_time;
            stat.pcpu = affinity.pcpu;
            stat.vcpus = affinity.vcpus;
            stat.sampled = true;
            stat.ticks_sampled += 1;
            report.sampled += 1;
        }
        report
    }

    pub fn stats(&self) -> &[DomainStat] {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut [DomainStat] {
        &mut self.stats
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockHost;

    fn collector_for(host: &MockHost) -> StatsCollector {
        StatsCollector::new(host.active_domains().unwrap())
    }

    #[test]
    fn test_refresh_computes_interval_delta() {
        let host = MockHost::new(2);
        let dom = host.add_domain(1, "vm01", 0);
        let mut collector = collector_for(&host);

        host.set_cpu_time(dom.id, 500);
        let report = collector.refresh(&host);
        assert_eq!(report, RefreshReport { sampled: 1, skipped: 0 });
        assert_eq!(collector.stats()[0].cpu_time_diff, 500);
        assert_eq!(collector.stats()[0].last_cpu_time, 500);
        assert_eq!(collector.stats()[0].ticks_sampled, 1);

        host.set_cpu_time(dom.id, 900);
        collector.refresh(&host);
        assert_eq!(collector.stats()[0].cpu_time_diff, 400);
        assert_eq!(collector.stats()[0].last_cpu_time, 900);
        assert_eq!(collector.stats()[0].ticks_sampled, 2);
    }

    #[test]
    fn test_refresh_rolls_previous_percentage() {
        let host = MockHost::new(2);
        let dom = host.add_domain(1, "vm01", 0);
        let mut collector = collector_for(&host);

        host.set_cpu_time(dom.id, 100);
        collector.refresh(&host);
        collector.stats_mut()[0].current_percent_used = 42;

        host.set_cpu_time(dom.id, 200);
        collector.refresh(&host);
        assert_eq!(collector.stats()[0].last_percent_used, 42);
    }

    #[test]
    fn test_query_failure_skips_domain_only() {
        let host = MockHost::new(2);
        let healthy = host.add_domain(1, "vm01", 0);
        let failing = host.add_domain(2, "vm02", 1);
        let mut collector = collector_for(&host);

        host.set_cpu_time(healthy.id, 300);
        host.set_cpu_time(failing.id, 300);
        host.fail_queries_for(failing.id);

        let report = collector.refresh(&host);
        assert_eq!(report, RefreshReport { sampled: 1, skipped: 1 });

        let stats = collector.stats();
        assert!(stats[0].sampled);
        assert!(!stats[1].sampled, "failed domain must not be sampled");
        assert_eq!(stats[1].ticks_sampled, 0);
        assert_eq!(stats[1].last_cpu_time, 0, "failed domain must be untouched");

        // The domain recovers on the next tick
        host.restore_queries_for(failing.id);
        let report = collector.refresh(&host);
        assert_eq!(report.sampled, 2);
        assert!(collector.stats()[1].sampled);
    }

    #[test]
    fn test_counter_regression_treated_as_idle() {
        let host = MockHost::new(2);
        let dom = host.add_domain(1, "vm01", 0);
        let mut collector = collector_for(&host);

        host.set_cpu_time(dom.id, 1000);
        collector.refresh(&host);

        // Host restarted underneath us: counter went backwards
        host.set_cpu_time(dom.id, 400);
        collector.refresh(&host);
        assert_eq!(collector.stats()[0].cpu_time_diff, 0);
        assert_eq!(collector.stats()[0].last_cpu_time, 400, "counter re-baselines");
    }

    #[test]
    fn test_refresh_tracks_affinity_changes() {
        let host = MockHost::new(4);
        let dom = host.add_domain(1, "vm01", 0);
        let mut collector = collector_for(&host);

        collector.refresh(&host);
        assert_eq!(collector.stats()[0].pcpu, 0);

        // Out-of-band move shows up on the next refresh
        host.pin_to_physical_cpu(&dom, 3).unwrap();
        collector.refresh(&host);
        assert_eq!(collector.stats()[0].pcpu, 3);
        assert_eq!(collector.stats()[0].vcpus, 1);
    }
}
