//! Scheduler Loop
//!
//! The fixed-interval driver that sequences one tick: refresh every domain's
//! stats, normalize them into pCPU shares, test stability, and rebalance when
//! the mapping has drifted. One control flow owns the host connection and the
//! stat set for the whole run; cancellation is cooperative and observed only
//! at the loop boundary, so an in-progress tick always completes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::analyzer::UtilizationAnalyzer;
use crate::balancer::Balancer;
use crate::config::SchedulerConfig;
use crate::host::{Host, HostError};
use crate::stats::StatsCollector;

// ============================================================================
// Error types
// ============================================================================

/// Errors that prevent the scheduler loop from starting
#[derive(Debug, Clone)]
pub enum SchedulerError {
    /// The host reported no usable physical CPUs
    NoCpus,
    /// A host call failed during startup
    Host(HostError),
}

impl std::fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCpus => write!(f, "Host reported zero physical CPUs"),
            Self::Host(e) => write!(f, "Host error: {}", e),
        }
    }
}

impl std::error::Error for SchedulerError {}

impl From<HostError> for SchedulerError {
    fn from(e: HostError) -> Self {
        Self::Host(e)
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

// ============================================================================
// Shutdown token
// ============================================================================

/// Cooperative cancellation handle shared with the signal handler.
///
/// `cancel` flips a sticky flag and posts a wake message so a loop blocked in
/// [`ShutdownToken::wait_timeout`] returns immediately instead of waiting out
/// the remainder of its interval. Clones observe the same token.
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    cancelled: Arc<AtomicBool>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            wake_tx,
            wake_rx,
        }
    }

    /// Request shutdown. Safe to call from a signal handler thread and safe
    /// to call more than once.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let _ = self.wake_tx.try_send(());
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Block for `timeout` or until cancelled, whichever comes first.
    pub fn wait_timeout(&self, timeout: Duration) {
        let _ = self.wake_rx.recv_timeout(timeout);
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Loop state
// ============================================================================

/// Scheduler loop lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Constructed but not yet running
    Idle,
    /// Ticking at the configured interval
    Running,
    /// Cancellation observed, releasing resources
    Stopping,
    /// Terminal: the loop has exited
    Stopped,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

// ============================================================================
// Scheduler loop
// ============================================================================

/// Drives the measure → analyze → rebalance cycle against one host.
///
/// Construction performs the fatal startup work: the pCPU count is read and
/// the active domains are enumerated exactly once, fixing the stat set for
/// the run. Domains that appear later are picked up by restarting the daemon;
/// domains that exit surface as per-tick skips.
#[derive(Debug)]
pub struct SchedulerLoop<H: Host> {
    host: H,
    collector: StatsCollector,
    analyzer: UtilizationAnalyzer,
    balancer: Balancer,
    pcpu_count: usize,
    interval: Duration,
    shutdown: ShutdownToken,
    state: LoopState,
}

impl<H: Host> SchedulerLoop<H> {
    pub fn new(
        host: H,
        interval: Duration,
        config: &SchedulerConfig,
        shutdown: ShutdownToken,
    ) -> SchedulerResult<Self> {
        let pcpu_count = host.physical_cpu_count()?;
        if pcpu_count == 0 {
            return Err(SchedulerError::NoCpus);
        }

        let domains = host.active_domains()?;
        log::info!(
            "scheduling {} domains across {} pCPUs, tolerance {} points, interval {}s",
            domains.len(),
            pcpu_count,
            config.tolerance,
            interval.as_secs()
        );
        if domains.is_empty() {
            log::warn!("no active domains; the loop will idle until restarted with a fleet");
        }

        Ok(Self {
            host,
            collector: StatsCollector::new(domains),
            analyzer: UtilizationAnalyzer::new(config.tolerance),
            balancer: Balancer::new(),
            pcpu_count,
            interval,
            shutdown,
            state: LoopState::Idle,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn pcpu_count(&self) -> usize {
        self.pcpu_count
    }

    /// Run until the shutdown token is cancelled.
    ///
    /// The token is checked only at the loop boundary; a cancellation that
    /// arrives mid-tick lets the tick (including any rebalance pass in it)
    /// finish, then skips the wait and exits. A token cancelled before the
    /// call exits without ticking at all.
    pub fn run(&mut self) {
        self.state = LoopState::Running;

        while !self.shutdown.is_cancelled() {
            self.tick();
            log::debug!("sleeping for {}s", self.interval.as_secs());
            self.shutdown.wait_timeout(self.interval);
        }

        self.state = LoopState::Stopping;
        log::info!("shutdown requested; stopping scheduler loop");
        // Host connection and stat set are released when self drops
        self.state = LoopState::Stopped;
    }

    /// One measurement-and-rebalancing cycle.
    pub fn tick(&mut self) {
        let refresh = self.collector.refresh(&self.host);
        if refresh.skipped > 0 {
            log::debug!(
                "sampled {} domains, skipped {}",
                refresh.sampled,
                refresh.skipped
            );
        }

        self.analyzer.update_percentages(self.collector.stats_mut());
        self.dump_domain_stats();

        if self.analyzer.is_stable(self.collector.stats()) {
            log::debug!("processor mappings are stable");
        } else {
            let report =
                self.balancer
                    .rebalance(&self.host, self.collector.stats_mut(), self.pcpu_count);
            log::info!(
                "processor mappings are not stable; repinned {} domains ({} pin failures)",
                report.pinned,
                report.failed
            );
        }

        self.dump_pinnings();
    }

    fn dump_domain_stats(&self) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        for stat in self.collector.stats() {
            log::debug!(
                "domain {}: cpu_time {} last {}% current {}% pCPU {} vCPUs {}",
                stat.handle,
                stat.last_cpu_time,
                stat.last_percent_used,
                stat.current_percent_used,
                stat.pcpu,
                stat.vcpus
            );
        }
    }

    /// One line per pCPU listing the domains currently pinned to it.
    fn dump_pinnings(&self) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        for pcpu in 0..self.pcpu_count {
            let names: Vec<&str> = self
                .collector
                .stats()
                .iter()
                .filter(|s| s.pcpu == pcpu)
                .map(|s| s.handle.name.as_str())
                .collect();
            log::debug!("CPU {}: {}", pcpu, names.join(" "));
        }
    }
}
