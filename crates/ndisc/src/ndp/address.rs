//! Interface address table.
//!
//! # Example
//!
//! ```
//! use ndisc::ndp::address::AddressConfig;
//! use ndisc::ndp::types::{AddressFlags, Lifetime};
//!
//! let config = AddressConfig::new("2001:db8::10".parse().unwrap(), 64)
//!     .preferred(Lifetime::Seconds(1800))
//!     .valid(Lifetime::Seconds(3600))
//!     .flags(AddressFlags::DHCP_ASSIGNED);
//! assert_eq!(config.prefix_len, 64);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv6Addr;
use std::time::Duration;

use super::types::link::interface_id_of;
use super::types::{AddressFlags, AddressState, INTERFACE_ID_LEN, Lifetime, Scope};

/// Stack-wide, monotonically increasing address identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressId(u32);

impl AddressId {
    /// Create an id from its raw value.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw value.
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for AddressId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Parameters for creating an address.
#[derive(Debug, Clone)]
pub struct AddressConfig {
    /// The address.
    pub addr: Ipv6Addr,
    /// Prefix length; zero means "128 minus the interface identifier length".
    pub prefix_len: u8,
    /// Preferred lifetime.
    pub preferred: Lifetime,
    /// Valid lifetime.
    pub valid: Lifetime,
    /// Address flags.
    pub flags: AddressFlags,
}

impl AddressConfig {
    /// Create a permanent address configuration.
    pub fn new(addr: Ipv6Addr, prefix_len: u8) -> Self {
        Self {
            addr,
            prefix_len,
            preferred: Lifetime::Infinite,
            valid: Lifetime::Infinite,
            flags: AddressFlags::NONE,
        }
    }

    /// Set the preferred lifetime.
    pub fn preferred(mut self, lifetime: Lifetime) -> Self {
        self.preferred = lifetime;
        self
    }

    /// Set the valid lifetime.
    pub fn valid(mut self, lifetime: Lifetime) -> Self {
        self.valid = lifetime;
        self
    }

    /// Add flags.
    pub fn flags(mut self, flags: AddressFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Skip duplicate address detection.
    pub fn no_dad(self) -> Self {
        self.flags(AddressFlags::NO_DAD)
    }

    /// Delay the solicited-node join (and DAD) by a random interval.
    pub fn delayed_join(self) -> Self {
        self.flags(AddressFlags::DELAYED_MULTICAST_JOIN)
    }
}

// ============================================================================
// Interface Address
// ============================================================================

/// One IPv6 address bound to an interface.
#[derive(Debug, Clone)]
pub struct InterfaceAddress {
    pub(crate) id: AddressId,
    pub(crate) addr: Ipv6Addr,
    pub(crate) prefix_len: u8,
    pub(crate) state: AddressState,
    pub(crate) flags: AddressFlags,
    pub(crate) preferred: Lifetime,
    pub(crate) valid: Lifetime,
    pub(crate) created_at: Duration,
    pub(crate) lifetimes_from: Duration,
    pub(crate) joined: bool,
    pub(crate) ready: bool,
    pub(crate) verify_retries: u8,
}

impl InterfaceAddress {
    pub(crate) fn new(id: AddressId, config: &AddressConfig, now: Duration) -> Self {
        Self {
            id,
            addr: config.addr,
            prefix_len: config.prefix_len,
            state: AddressState::Tentative,
            flags: config.flags,
            preferred: config.preferred,
            valid: config.valid,
            created_at: now,
            lifetimes_from: now,
            joined: false,
            ready: false,
            verify_retries: 0,
        }
    }

    /// Identifier.
    pub fn id(&self) -> AddressId {
        self.id
    }

    /// The address.
    pub fn addr(&self) -> Ipv6Addr {
        self.addr
    }

    /// Prefix length.
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Lifecycle state.
    pub fn state(&self) -> AddressState {
        self.state
    }

    /// Flags.
    pub fn flags(&self) -> AddressFlags {
        self.flags
    }

    /// Preferred lifetime, counted from the last lifetime update.
    pub fn preferred(&self) -> Lifetime {
        self.preferred
    }

    /// Valid lifetime, counted from the last lifetime update.
    pub fn valid(&self) -> Lifetime {
        self.valid
    }

    /// Creation time.
    pub fn created_at(&self) -> Duration {
        self.created_at
    }

    /// Check if the ready handler has run.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Scope of the address.
    pub fn scope(&self) -> Scope {
        Scope::of(&self.addr)
    }

    /// Check if this is `fe80::/64` formed from `interface_id`.
    pub fn is_canonical_link_local(&self, interface_id: &[u8; INTERFACE_ID_LEN]) -> bool {
        self.addr.is_unicast_link_local() && interface_id_of(&self.addr) == *interface_id
    }

    /// Check if the preferred lifetime has run out at `now`.
    pub(crate) fn preferred_elapsed(&self, now: Duration) -> bool {
        self.preferred
            .duration()
            .is_some_and(|d| now >= self.lifetimes_from + d)
    }
}

// ============================================================================
// Address Table
// ============================================================================

/// Addresses of one interface, in creation order.
#[derive(Debug, Default)]
pub struct AddressTable {
    addrs: BTreeMap<AddressId, InterfaceAddress>,
}

impl AddressTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of addresses.
    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    pub(crate) fn insert(&mut self, addr: InterfaceAddress) {
        self.addrs.insert(addr.id, addr);
    }

    pub(crate) fn remove(&mut self, id: AddressId) -> Option<InterfaceAddress> {
        self.addrs.remove(&id)
    }

    /// Get an address by id.
    pub fn get(&self, id: AddressId) -> Option<&InterfaceAddress> {
        self.addrs.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: AddressId) -> Option<&mut InterfaceAddress> {
        self.addrs.get_mut(&id)
    }

    /// Find an address by value, whatever its state.
    pub fn find(&self, addr: &Ipv6Addr) -> Option<&InterfaceAddress> {
        self.addrs.values().find(|a| a.addr == *addr)
    }

    /// Find the address a received message targets. Duplicated addresses
    /// are not considered ours.
    pub fn find_target(&self, addr: &Ipv6Addr) -> Option<&InterfaceAddress> {
        self.addrs
            .values()
            .find(|a| a.addr == *addr && a.state != AddressState::Duplicated)
    }

    /// Check if `addr` is configured and usable as a source.
    pub fn owns_usable(&self, addr: &Ipv6Addr) -> bool {
        self.find(addr).is_some_and(|a| a.state.is_usable())
    }

    /// Pick a source address for traffic to `dst`: same scope first, then
    /// active before deprecated, then creation order.
    pub fn select_source(&self, dst: &Ipv6Addr) -> Option<Ipv6Addr> {
        let scope = Scope::of(dst);
        self.addrs
            .values()
            .filter(|a| a.state.is_usable())
            .min_by_key(|a| {
                (
                    a.scope() != scope,
                    a.state == AddressState::Deprecated,
                    a.id,
                )
            })
            .map(|a| a.addr)
    }

    /// Iterate over addresses in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &InterfaceAddress> {
        self.addrs.values()
    }

    /// Ids of all addresses.
    pub fn ids(&self) -> Vec<AddressId> {
        self.addrs.keys().copied().collect()
    }
}
