//! Host Interface
//!
//! The boundary between the scheduler core and the virtualization host.
//! Everything the core needs from the hypervisor (domain enumeration,
//! CPU-time counters, affinity queries, and the pin operation) goes through
//! the [`Host`] trait, so the core never owns a hypervisor connection
//! directly. A production binding (libvirt or similar) implements the trait
//! out-of-tree; [`crate::sim::SimulatedHost`] implements it in-process.

/// Unique domain identifier assigned by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainId(u32);

impl DomainId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for DomainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to an active domain.
///
/// Identity is the host-assigned [`DomainId`]; the name is carried for log
/// output so the core never has to query the host just to label a line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainHandle {
    /// Host-assigned identifier
    pub id: DomainId,
    /// Human-readable domain name
    pub name: String,
}

impl DomainHandle {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id: DomainId::new(id),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for DomainHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (id {})", self.name, self.id)
    }
}

/// Current placement of a domain as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainAffinity {
    /// Physical CPU the domain is currently bound to
    pub pcpu: usize,
    /// Number of virtual CPUs the domain exposes
    pub vcpus: u32,
}

/// Host binding errors
#[derive(Debug, Clone)]
pub enum HostError {
    /// Connection to the virtualization host is down
    Unavailable(String),
    /// A per-domain query failed (the domain may have exited)
    DomainQuery { domain: String, reason: String },
    /// The hypervisor rejected a pin request
    Pin {
        domain: String,
        pcpu: usize,
        reason: String,
    },
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "Host unavailable: {}", msg),
            Self::DomainQuery { domain, reason } => {
                write!(f, "Domain query failed for {}: {}", domain, reason)
            }
            Self::Pin {
                domain,
                pcpu,
                reason,
            } => {
                write!(f, "Pin rejected for {} -> pCPU {}: {}", domain, pcpu, reason)
            }
        }
    }
}

impl std::error::Error for HostError {}

pub type HostResult<T> = Result<T, HostError>;

/// Interface to the virtualization host.
///
/// Implementations own the underlying connection for the process lifetime;
/// the scheduler core only holds [`DomainHandle`] values. Methods take
/// `&self`; bindings that mutate internal bookkeeping use interior
/// mutability.
pub trait Host {
    /// Enumerate the currently active domains.
    fn active_domains(&self) -> HostResult<Vec<DomainHandle>>;

    /// Number of physical CPUs on the node.
    fn physical_cpu_count(&self) -> HostResult<usize>;

    /// Cumulative CPU time consumed by the domain, in host-reported units.
    ///
    /// Monotonically increasing for the lifetime of the domain.
    fn cumulative_cpu_time(&self, domain: &DomainHandle) -> HostResult<u64>;

    /// The domain's current placement (pinned pCPU and vCPU count).
    fn current_affinity(&self, domain: &DomainHandle) -> HostResult<DomainAffinity>;

    /// Bind the domain's single usable vCPU to the given physical CPU.
    fn pin_to_physical_cpu(&self, domain: &DomainHandle, pcpu: usize) -> HostResult<()>;
}

// ============================================================================
// Test double
// ============================================================================


#[cfg(test)]
mod tests {
    use super::mock::MockHost;
    use super::*;

    #[test]
    fn test_handle_display() {
        let handle = DomainHandle::new(7, "web01");
        assert_eq!(handle.to_string(), "web01 (id 7)");
    }

    #[test]
    fn test_mock_pin_updates_affinity() {
        let host = MockHost::new(4);
        let dom = host.add_domain(1, "vm01", 0);

        host.pin_to_physical_cpu(&dom, 2).unwrap();

        assert_eq!(host.affinity_of(dom.id).pcpu, 2);
        assert_eq!(host.pins(), vec![(dom.id, 2)]);
    }

    #[test]
    fn test_mock_rejects_out_of_range_pin() {
        let host = MockHost::new(2);
        let dom = host.add_domain(1, "vm01", 0);

        let err = host.pin_to_physical_cpu(&dom, 5).unwrap_err();
        assert!(matches!(err, HostError::Pin { pcpu: 5, .. }));
        // Placement must be untouched after a rejected pin
        assert_eq!(host.affinity_of(dom.id).pcpu, 0);
    }

    #[test]
    fn test_mock_query_failure() {
        let host = MockHost::new(2);
        let dom = host.add_domain(3, "vm03", 1);
        host.fail_queries_for(dom.id);

        assert!(host.cumulative_cpu_time(&dom).is_err());
        assert!(host.current_affinity(&dom).is_err());
    }
}
