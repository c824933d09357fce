//! vcpusched - vCPU Load-Leveling Scheduler Daemon
//!
//! vcpusched periodically rebalances running VMs ("domains") across the
//! physical CPUs of a single virtualization host, so aggregate CPU load is
//! spread evenly instead of left wherever the domains were originally
//! pinned. It is a lightweight always-on daemon for multi-tenant hosts, not
//! a cluster scheduler: one host, one vCPU per domain, one pin per domain.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        SchedulerLoop                         │
//! │          fixed-interval ticks, cooperative shutdown          │
//! │                                                              │
//! │  ┌────────────────┐   ┌─────────────────────┐   ┌──────────┐ │
//! │  │ StatsCollector │ → │ UtilizationAnalyzer │ → │ Balancer │ │
//! │  │ counter deltas │   │ shares + stability  │   │  greedy  │ │
//! │  └────────────────┘   └─────────────────────┘   └──────────┘ │
//! │   reads counters and affinity           issues pin requests  │
//! └──────────────────────────────────────────────────────────────┘
//!                                │
//!                                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Host trait                          │
//! │  active_domains • physical_cpu_count • cumulative_cpu_time   │
//! │            current_affinity • pin_to_physical_cpu            │
//! │  (in-process SimulatedHost; hypervisor bindings out-of-tree) │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Features
//!
//! - Per-pCPU normalization of raw cumulative CPU-time counters into
//!   percentage shares, with an explicit zero-activity guard
//! - Global stability test against a configurable tolerance (default 15
//!   percentage points); one domain swinging past it triggers a full pass
//! - Deterministic greedy bin-packing: stable ascending sort, least-loaded
//!   pCPU wins, lowest index on ties
//! - Per-domain query and pin failures are skipped and retried next tick,
//!   never aborting a cycle or the process
//! - Cooperative SIGINT shutdown that lets the in-flight tick complete and
//!   wakes the interval wait immediately
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use vcpusched::{load_config, SchedulerLoop, ShutdownToken, SimulatedHost};
//!
//! let config = load_config();
//! let shutdown = ShutdownToken::new();
//!
//! let handler = shutdown.clone();
//! ctrlc::set_handler(move || handler.cancel())?;
//!
//! let host = SimulatedHost::default_fleet();
//! let mut scheduler =
//!     SchedulerLoop::new(host, Duration::from_secs(5), &config, shutdown)?;
//! scheduler.run();
//! ```

// Host boundary
pub mod host;
pub mod sim;

// Measurement-and-rebalancing core
pub mod analyzer;
pub mod balancer;
pub mod scheduler;
pub mod stats;

// Configuration
pub mod config;

pub use analyzer::UtilizationAnalyzer;
pub use balancer::{Balancer, RebalanceReport};
pub use config::{load_config, ConfigError, SchedulerConfig, DEFAULT_TOLERANCE};
pub use host::{DomainAffinity, DomainHandle, DomainId, Host, HostError, HostResult};
pub use scheduler::{
    LoopState, SchedulerError, SchedulerLoop, SchedulerResult, ShutdownToken,
};
pub use sim::{SimDomainSpec, SimulatedHost};
pub use stats::{DomainStat, RefreshReport, StatsCollector};

/// vcpusched version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
