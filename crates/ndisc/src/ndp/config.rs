//! Protocol constants and builder-style configuration.
//!
//! # Example
//!
//! ```
//! use ndisc::ndp::config::{InterfaceConfig, StackConfig};
//! use ndisc::ndp::types::LinkAddr;
//! use std::time::Duration;
//!
//! let stack = StackConfig::new()
//!     .max_unicast_solicit(5)
//!     .delay_first_probe(Duration::from_secs(2));
//!
//! let eth0 = InterfaceConfig::ethernet("eth0", LinkAddr::new([0x02, 0, 0, 0, 0, 1]))
//!     .dad_transmits(2)
//!     .retrans_timer(Duration::from_millis(500));
//! assert_eq!(eth0.dad_transmits, 2);
//! ```

use std::time::Duration;

use super::types::{INTERFACE_ID_LEN, LinkAddr};

/// Default protocol constants (RFC 4861 §10, RFC 4862 §5.1).
pub mod defaults {
    use std::time::Duration;

    /// Neighbor Solicitations sent during DAD.
    pub const DAD_TRANSMITS: u8 = 1;
    /// Ceiling on DAD transmission attempts, counting attempts made while
    /// the link was down.
    pub const DAD_MAX_ATTEMPTS: u8 = 15;
    /// Concurrent DAD sessions per interface.
    pub const MAX_DAD_SESSIONS: usize = 8;
    /// Multicast solicitations sent while resolving.
    pub const MAX_MULTICAST_SOLICIT: u8 = 3;
    /// Unicast probes sent before a neighbor is declared unreachable.
    pub const MAX_UNICAST_SOLICIT: u8 = 3;
    /// Interval between solicitations.
    pub const RETRANS_TIMER: Duration = Duration::from_secs(1);
    /// Time a neighbor stays reachable after confirmation.
    pub const REACHABLE_TIME: Duration = Duration::from_secs(30);
    /// Delay before the first unicast probe.
    pub const DELAY_FIRST_PROBE: Duration = Duration::from_secs(5);
    /// Upper bound on the random delay before a delayed multicast join.
    pub const MAX_RTR_SOLICITATION_DELAY: Duration = Duration::from_secs(1);
    /// Neighbor cache entries per interface.
    pub const NEIGHBOR_CACHE_SIZE: usize = 16;
    /// Packets queued on an incomplete neighbor.
    pub const MAX_QUEUED_PACKETS: usize = 3;
    /// Idle time after which an unused stale neighbor is collected.
    pub const STALE_ENTRY_TIMEOUT: Duration = Duration::from_secs(600);
}

// ============================================================================
// Stack configuration
// ============================================================================

/// Node-wide protocol configuration.
#[derive(Debug, Clone)]
pub struct StackConfig {
    /// Multicast solicitations per resolution attempt.
    pub max_multicast_solicit: u8,
    /// Unicast probes before a neighbor is declared unreachable.
    pub max_unicast_solicit: u8,
    /// Delay before the first unicast probe.
    pub delay_first_probe: Duration,
    /// Upper bound on the delayed multicast join.
    pub max_rtr_solicitation_delay: Duration,
    /// DAD transmission attempt ceiling.
    pub dad_max_attempts: u8,
    /// Concurrent DAD sessions per interface.
    pub max_dad_sessions: usize,
    /// Idle time after which an unused stale neighbor is collected.
    pub stale_entry_timeout: Duration,
    /// Seed for the stack's random delays. Stacks built with the same seed
    /// make the same choices.
    pub random_seed: u64,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StackConfig {
    /// Create a configuration with the standard constants.
    pub fn new() -> Self {
        Self {
            max_multicast_solicit: defaults::MAX_MULTICAST_SOLICIT,
            max_unicast_solicit: defaults::MAX_UNICAST_SOLICIT,
            delay_first_probe: defaults::DELAY_FIRST_PROBE,
            max_rtr_solicitation_delay: defaults::MAX_RTR_SOLICITATION_DELAY,
            dad_max_attempts: defaults::DAD_MAX_ATTEMPTS,
            max_dad_sessions: defaults::MAX_DAD_SESSIONS,
            stale_entry_timeout: defaults::STALE_ENTRY_TIMEOUT,
            random_seed: 0,
        }
    }

    /// Set the number of multicast solicitations per resolution.
    pub fn max_multicast_solicit(mut self, count: u8) -> Self {
        self.max_multicast_solicit = count;
        self
    }

    /// Set the number of unanswered unicast probes tolerated.
    pub fn max_unicast_solicit(mut self, count: u8) -> Self {
        self.max_unicast_solicit = count;
        self
    }

    /// Set the delay before the first probe.
    pub fn delay_first_probe(mut self, delay: Duration) -> Self {
        self.delay_first_probe = delay;
        self
    }

    /// Set the upper bound of the delayed multicast join.
    pub fn max_rtr_solicitation_delay(mut self, delay: Duration) -> Self {
        self.max_rtr_solicitation_delay = delay;
        self
    }

    /// Set the per-interface limit on concurrent DAD sessions.
    pub fn max_dad_sessions(mut self, sessions: usize) -> Self {
        self.max_dad_sessions = sessions;
        self
    }

    /// Set the DAD transmission attempt ceiling.
    pub fn dad_max_attempts(mut self, attempts: u8) -> Self {
        self.dad_max_attempts = attempts;
        self
    }

    /// Set the idle timeout for unused stale neighbors.
    pub fn stale_entry_timeout(mut self, timeout: Duration) -> Self {
        self.stale_entry_timeout = timeout;
        self
    }

    /// Set the seed for random delays.
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }
}

// ============================================================================
// Interface configuration
// ============================================================================

/// Per-interface configuration.
#[derive(Debug, Clone)]
pub struct InterfaceConfig {
    /// Interface name.
    pub name: String,
    /// Hardware address.
    pub link_addr: LinkAddr,
    /// Interface identifier used for autoconfigured addresses.
    pub interface_id: [u8; INTERFACE_ID_LEN],
    /// Loopback interface (no DAD, no neighbor discovery).
    pub loopback: bool,
    /// Link supports multicast (required for DAD and resolution).
    pub multicast: bool,
    /// Act as a router (sets the Router flag in advertisements).
    pub router: bool,
    /// Solicitations sent during DAD; zero disables DAD.
    pub dad_transmits: u8,
    /// Interval between solicitations.
    pub retrans_timer: Duration,
    /// Reachable time.
    pub reachable_time: Duration,
    /// Neighbor cache capacity.
    pub neighbor_capacity: usize,
    /// Packets queued per incomplete neighbor.
    pub queue_capacity: usize,
}

impl InterfaceConfig {
    /// Configuration for a multicast-capable Ethernet interface. The
    /// interface identifier is the modified EUI-64 of `link_addr`.
    pub fn ethernet(name: impl Into<String>, link_addr: LinkAddr) -> Self {
        Self {
            name: name.into(),
            link_addr,
            interface_id: link_addr.interface_id(),
            loopback: false,
            multicast: true,
            router: false,
            dad_transmits: defaults::DAD_TRANSMITS,
            retrans_timer: defaults::RETRANS_TIMER,
            reachable_time: defaults::REACHABLE_TIME,
            neighbor_capacity: defaults::NEIGHBOR_CACHE_SIZE,
            queue_capacity: defaults::MAX_QUEUED_PACKETS,
        }
    }

    /// Configuration for the loopback interface.
    pub fn loopback(name: impl Into<String>) -> Self {
        Self {
            loopback: true,
            multicast: false,
            dad_transmits: 0,
            interface_id: [0, 0, 0, 0, 0, 0, 0, 1],
            ..Self::ethernet(name, LinkAddr::ZERO)
        }
    }

    /// Set the number of DAD solicitations (zero disables DAD).
    pub fn dad_transmits(mut self, count: u8) -> Self {
        self.dad_transmits = count;
        self
    }

    /// Set the retransmit interval.
    pub fn retrans_timer(mut self, interval: Duration) -> Self {
        self.retrans_timer = interval;
        self
    }

    /// Set the reachable time.
    pub fn reachable_time(mut self, time: Duration) -> Self {
        self.reachable_time = time;
        self
    }

    /// Set the neighbor cache capacity.
    pub fn neighbor_capacity(mut self, capacity: usize) -> Self {
        self.neighbor_capacity = capacity;
        self
    }

    /// Set the per-neighbor pending packet queue capacity.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Override the interface identifier.
    pub fn interface_id(mut self, interface_id: [u8; INTERFACE_ID_LEN]) -> Self {
        self.interface_id = interface_id;
        self
    }

    /// Set whether the link supports multicast.
    pub fn multicast(mut self, multicast: bool) -> Self {
        self.multicast = multicast;
        self
    }

    /// Set router behavior.
    pub fn router(mut self, router: bool) -> Self {
        self.router = router;
        self
    }

    /// Check if DAD runs on this interface.
    pub fn dad_enabled(&self) -> bool {
        self.multicast && !self.loopback && self.dad_transmits > 0
    }
}
