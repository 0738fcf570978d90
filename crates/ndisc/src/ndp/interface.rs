//! Per-interface protocol state.

use std::collections::HashMap;
use std::fmt;
use std::net::Ipv6Addr;

use super::address::{AddressId, AddressTable};
use super::config::InterfaceConfig;
use super::dad::DadRecord;
use super::neighbor::NeighborCache;
use super::types::LinkAddr;

/// Interface index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IfIndex(u32);

impl IfIndex {
    /// Create an index from its raw value.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Raw value.
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for IfIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-interface neighbor discovery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterfaceStats {
    /// ND messages received.
    pub in_msgs: u64,
    /// Messages failing validation.
    pub in_errors: u64,
    /// Valid messages discarded by protocol rules.
    pub in_discards: u64,
    /// Neighbor Solicitations received.
    pub ns_in: u64,
    /// Neighbor Advertisements received.
    pub na_in: u64,
    /// Neighbor Solicitations sent.
    pub ns_out: u64,
    /// Neighbor Advertisements sent.
    pub na_out: u64,
    /// Transmit failures.
    pub out_errors: u64,
    /// Packets dropped from or refused by resolution queues.
    pub queue_drops: u64,
    /// Addresses found duplicated.
    pub dad_duplicates: u64,
    /// DAD sessions that could not be started or were abandoned.
    pub dad_aborted: u64,
    /// Neighbor creations refused because the cache was full.
    pub cache_full: u64,
}

/// Default routers learned on an interface.
#[derive(Debug, Clone, Default)]
pub struct DefaultRouterList {
    routers: Vec<Ipv6Addr>,
}

impl DefaultRouterList {
    /// Check if `addr` is a default router.
    pub fn contains(&self, addr: &Ipv6Addr) -> bool {
        self.routers.contains(addr)
    }

    /// Add a router. Returns false if already present.
    pub fn insert(&mut self, addr: Ipv6Addr) -> bool {
        if self.contains(&addr) {
            return false;
        }
        self.routers.push(addr);
        true
    }

    /// Remove a router. Returns whether it was present.
    pub fn remove(&mut self, addr: &Ipv6Addr) -> bool {
        let before = self.routers.len();
        self.routers.retain(|r| r != addr);
        self.routers.len() != before
    }

    /// Iterate over routers in the order they were learned.
    pub fn iter(&self) -> impl Iterator<Item = &Ipv6Addr> {
        self.routers.iter()
    }

    /// Number of routers.
    pub fn len(&self) -> usize {
        self.routers.len()
    }

    /// Check if there are no routers.
    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }
}

/// Neighbor discovery state of one interface.
pub struct Interface {
    pub(crate) index: IfIndex,
    pub(crate) config: InterfaceConfig,
    pub(crate) enabled: bool,
    pub(crate) ipv6_up: bool,
    pub(crate) all_nodes_joined: bool,
    pub(crate) addresses: AddressTable,
    pub(crate) neighbors: NeighborCache,
    pub(crate) routers: DefaultRouterList,
    pub(crate) dad: HashMap<AddressId, DadRecord>,
    pub(crate) stats: InterfaceStats,
}

impl Interface {
    pub(crate) fn new(index: IfIndex, config: InterfaceConfig) -> Self {
        let neighbors = NeighborCache::new(config.neighbor_capacity, config.queue_capacity);
        Self {
            index,
            config,
            enabled: false,
            ipv6_up: false,
            all_nodes_joined: false,
            addresses: AddressTable::new(),
            neighbors,
            routers: DefaultRouterList::default(),
            dad: HashMap::new(),
            stats: InterfaceStats::default(),
        }
    }

    /// Interface index.
    pub fn index(&self) -> IfIndex {
        self.index
    }

    /// Interface name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Configuration.
    pub fn config(&self) -> &InterfaceConfig {
        &self.config
    }

    /// Hardware address.
    pub fn link_addr(&self) -> LinkAddr {
        self.config.link_addr
    }

    /// Check if the interface has been brought up.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check if IPv6 is operational. Cleared when the interface's own
    /// link-local address is found duplicated.
    pub fn is_ipv6_up(&self) -> bool {
        self.enabled && self.ipv6_up
    }

    /// Address table.
    pub fn addresses(&self) -> &AddressTable {
        &self.addresses
    }

    /// Neighbor cache.
    pub fn neighbors(&self) -> &NeighborCache {
        &self.neighbors
    }

    /// Default routers.
    pub fn routers(&self) -> &DefaultRouterList {
        &self.routers
    }

    /// DAD session for an address, if one is running.
    pub fn dad_session(&self, id: AddressId) -> Option<&DadRecord> {
        self.dad.get(&id)
    }

    /// Counters.
    pub fn stats(&self) -> &InterfaceStats {
        &self.stats
    }
}
