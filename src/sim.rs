//! Simulated Host
//!
//! A deterministic in-memory [`Host`] used by the daemon binary and by
//! loop-level tests, so the scheduler is runnable without a hypervisor.
//! Every domain carries a cyclic table of per-interval CPU-time increments;
//! each counter query advances the table by one entry, so consecutive ticks
//! observe believable deltas and identical runs observe identical ones.

use parking_lot::Mutex;

use crate::host::{DomainAffinity, DomainHandle, Host, HostError, HostResult};

/// Specification of one synthetic domain
#[derive(Debug, Clone)]
pub struct SimDomainSpec {
    /// Domain name reported through the handle
    pub name: String,
    /// Cyclic per-query CPU-time increments, in nanoseconds
    pub burn_pattern: Vec<u64>,
}

impl SimDomainSpec {
    pub fn new(name: impl Into<String>, burn_pattern: Vec<u64>) -> Self {
        Self {
            name: name.into(),
            burn_pattern,
        }
    }
}

struct SimDomain {
    handle: DomainHandle,
    affinity: DomainAffinity,
    cpu_time: u64,
    pattern: Vec<u64>,
    next_burn: usize,
}

struct SimState {
    domains: Vec<SimDomain>,
    next_id: u32,
}

/// In-memory virtualization host with a fixed topology.
///
/// All state sits behind one mutex so the `&self` trait methods can mutate
/// counters and affinities; the scheduler is the only caller in practice.
pub struct SimulatedHost {
    pcpus: usize,
    state: Mutex<SimState>,
}

impl SimulatedHost {
    /// Host with an explicit pCPU count and no domains.
    pub fn new(pcpus: usize) -> Self {
        Self {
            pcpus,
            state: Mutex::new(SimState {
                domains: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Host sized to the machine's core count, populated with a synthetic
    /// fleet of varied burn profiles. Every domain starts on pCPU 0, the
    /// untouched-fresh-fleet placement the scheduler exists to fix.
    pub fn default_fleet() -> Self {
        let host = Self::new(num_cpus::get());
        // Increments are nanoseconds of CPU time per scheduling interval
        host.add_domain(SimDomainSpec::new(
            "web01",
            vec![620_000_000, 580_000_000, 640_000_000, 600_000_000],
        ));
        host.add_domain(SimDomainSpec::new(
            "web02",
            vec![
                200_000_000,
                350_000_000,
                700_000_000,
                900_000_000,
                700_000_000,
                350_000_000,
            ],
        ));
        host.add_domain(SimDomainSpec::new(
            "db01",
            vec![850_000_000, 900_000_000, 880_000_000, 870_000_000],
        ));
        host.add_domain(SimDomainSpec::new(
            "batch01",
            vec![50_000_000, 1_200_000_000, 1_150_000_000, 80_000_000, 60_000_000],
        ));
        host.add_domain(SimDomainSpec::new(
            "cache01",
            vec![120_000_000, 140_000_000, 110_000_000, 130_000_000],
        ));
        host.add_domain(SimDomainSpec::new("idle01", vec![5_000_000, 0, 8_000_000, 0]));
        host
    }

    /// Register a synthetic domain and return its handle.
    pub fn add_domain(&self, spec: SimDomainSpec) -> DomainHandle {
        let mut state = self.state.lock();
        let handle = DomainHandle::new(state.next_id, spec.name);
        state.next_id += 1;
        state.domains.push(SimDomain {
            handle: handle.clone(),
            affinity: DomainAffinity { pcpu: 0, vcpus: 1 },
            cpu_time: 0,
            pattern: spec.burn_pattern,
            next_burn: 0,
        });
        handle
    }

    pub fn domain_count(&self) -> usize {
        self.state.lock().domains.len()
    }
}

fn find_domain<'a>(
    state: &'a mut SimState,
    handle: &DomainHandle,
) -> HostResult<&'a mut SimDomain> {
    state
        .domains
        .iter_mut()
        .find(|d| d.handle.id == handle.id)
        .ok_or_else(|| HostError::DomainQuery {
            domain: handle.name.clone(),
            reason: "domain is not in the active set".to_string(),
        })
}

impl Host for SimulatedHost {
    fn active_domains(&self) -> HostResult<Vec<DomainHandle>> {
        Ok(self
            .state
            .lock()
            .domains
            .iter()
            .map(|d| d.handle.clone())
            .collect())
    }

    fn physical_cpu_count(&self) -> HostResult<usize> {
        Ok(self.pcpus)
    }

    fn cumulative_cpu_time(&self, domain: &DomainHandle) -> HostResult<u64> {
        let mut state = self.state.lock();
        let dom = find_domain(&mut state, domain)?;
        if !dom.pattern.is_empty() {
            let burn = dom.pattern[dom.next_burn % dom.pattern.len()];
            dom.next_burn += 1;
            dom.cpu_time += burn;
        }
        Ok(dom.cpu_time)
    }

    fn current_affinity(&self, domain: &DomainHandle) -> HostResult<DomainAffinity> {
        let mut state = self.state.lock();
        let dom = find_domain(&mut state, domain)?;
        Ok(dom.affinity)
    }

    fn pin_to_physical_cpu(&self, domain: &DomainHandle, pcpu: usize) -> HostResult<()> {
        if pcpu >= self.pcpus {
            return Err(HostError::Pin {
                domain: domain.name.clone(),
                pcpu,
                reason: format!("only {} pCPUs available", self.pcpus),
            });
        }
        let mut state = self.state.lock();
        let dom = find_domain(&mut state, domain)?;
        dom.affinity.pcpu = pcpu;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_advances_cyclically() {
        let host = SimulatedHost::new(2);
        let dom = host.add_domain(SimDomainSpec::new("vm01", vec![100, 50]));

        assert_eq!(host.cumulative_cpu_time(&dom).unwrap(), 100);
        assert_eq!(host.cumulative_cpu_time(&dom).unwrap(), 150);
        // Pattern wraps around
        assert_eq!(host.cumulative_cpu_time(&dom).unwrap(), 250);
        assert_eq!(host.cumulative_cpu_time(&dom).unwrap(), 300);
    }

    #[test]
    fn test_identical_fleets_observe_identical_counters() {
        let spec = SimDomainSpec::new("vm01", vec![70, 30, 400]);
        let host_a = SimulatedHost::new(2);
        let host_b = SimulatedHost::new(2);
        let dom_a = host_a.add_domain(spec.clone());
        let dom_b = host_b.add_domain(spec);

        for _ in 0..7 {
            assert_eq!(
                host_a.cumulative_cpu_time(&dom_a).unwrap(),
                host_b.cumulative_cpu_time(&dom_b).unwrap()
            );
        }
    }

    #[test]
    fn test_pin_records_new_affinity() {
        let host = SimulatedHost::new(4);
        let dom = host.add_domain(SimDomainSpec::new("vm01", vec![100]));

        assert_eq!(host.current_affinity(&dom).unwrap().pcpu, 0);
        host.pin_to_physical_cpu(&dom, 3).unwrap();
        assert_eq!(host.current_affinity(&dom).unwrap().pcpu, 3);
        assert_eq!(host.current_affinity(&dom).unwrap().vcpus, 1);
    }

    #[test]
    fn test_pin_validates_topology() {
        let host = SimulatedHost::new(2);
        let dom = host.add_domain(SimDomainSpec::new("vm01", vec![100]));

        let err = host.pin_to_physical_cpu(&dom, 2).unwrap_err();
        assert!(matches!(err, HostError::Pin { pcpu: 2, .. }));
        assert_eq!(host.current_affinity(&dom).unwrap().pcpu, 0);
    }

    #[test]
    fn test_unknown_domain_is_a_query_error() {
        let host = SimulatedHost::new(2);
        let ghost = DomainHandle::new(99, "ghost");

        assert!(host.cumulative_cpu_time(&ghost).is_err());
        assert!(host.current_affinity(&ghost).is_err());
        assert!(host.pin_to_physical_cpu(&ghost, 0).is_err());
    }

    #[test]
    fn test_default_fleet_topology() {
        let host = SimulatedHost::default_fleet();
        let domains = host.active_domains().unwrap();

        assert!(!domains.is_empty());
        assert_eq!(domains.len(), host.domain_count());
        assert!(host.physical_cpu_count().unwrap() >= 1);
        // Fresh fleet starts wherever it was left: everything on pCPU 0
        for dom in &domains {
            assert_eq!(host.current_affinity(dom).unwrap().pcpu, 0);
        }
    }

    #[test]
    fn test_empty_pattern_stays_idle() {
        let host = SimulatedHost::new(2);
        let dom = host.add_domain(SimDomainSpec::new("vm01", vec![]));

        assert_eq!(host.cumulative_cpu_time(&dom).unwrap(), 0);
        assert_eq!(host.cumulative_cpu_time(&dom).unwrap(), 0);
    }
}
