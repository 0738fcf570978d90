//! Address and neighbor state types.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::time::Duration;

/// Lifetime value meaning "forever" on the wire.
pub const INFINITY_LIFE_TIME: u32 = 0xFFFF_FFFF;

// ============================================================================
// Address state
// ============================================================================

/// Lifecycle state of an [`InterfaceAddress`](crate::ndp::InterfaceAddress).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressState {
    /// Undergoing duplicate address detection; not usable for traffic.
    Tentative,
    /// Verified unique and preferred.
    Active,
    /// Still usable but no longer preferred for new communication.
    Deprecated,
    /// Another node holds this address.
    Duplicated,
    /// Being released back to the DHCP server.
    Detached,
}

impl AddressState {
    /// Check if the address may be used as a source or answer solicitations.
    pub fn is_usable(&self) -> bool {
        matches!(self, AddressState::Active | AddressState::Deprecated)
    }

    /// Get the name of this state.
    pub fn name(&self) -> &'static str {
        match self {
            AddressState::Tentative => "tentative",
            AddressState::Active => "active",
            AddressState::Deprecated => "deprecated",
            AddressState::Duplicated => "duplicated",
            AddressState::Detached => "detached",
        }
    }
}

impl fmt::Display for AddressState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Orthogonal address flags. These never drive state transitions on their own.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AddressFlags(u8);

impl AddressFlags {
    /// No flags.
    pub const NONE: AddressFlags = AddressFlags(0);
    /// Formed by stateless autoconfiguration from a prefix.
    pub const STATELESS_AUTO: AddressFlags = AddressFlags(0x01);
    /// Leased from a DHCPv6 server.
    pub const DHCP_ASSIGNED: AddressFlags = AddressFlags(0x02);
    /// Skip duplicate address detection.
    pub const NO_DAD: AddressFlags = AddressFlags(0x04);
    /// Join the solicited-node group after a random delay.
    pub const DELAYED_MULTICAST_JOIN: AddressFlags = AddressFlags(0x08);
    /// Anycast address; never probed.
    pub const ANYCAST: AddressFlags = AddressFlags(0x10);

    const NAMES: [(AddressFlags, &'static str); 5] = [
        (Self::STATELESS_AUTO, "autoconf"),
        (Self::DHCP_ASSIGNED, "dhcp"),
        (Self::NO_DAD, "nodad"),
        (Self::DELAYED_MULTICAST_JOIN, "delayed-join"),
        (Self::ANYCAST, "anycast"),
    ];

    /// Raw bits.
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Check whether all bits of `other` are set.
    pub fn contains(&self, other: AddressFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`.
    pub fn insert(&mut self, other: AddressFlags) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`.
    pub fn remove(&mut self, other: AddressFlags) {
        self.0 &= !other.0;
    }

    /// Names of the set flags.
    pub fn names(&self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl BitOr for AddressFlags {
    type Output = AddressFlags;

    fn bitor(self, rhs: Self) -> Self {
        AddressFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for AddressFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for AddressFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AddressFlags({})", self.names().join("|"))
    }
}

/// Preferred or valid lifetime of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifetime {
    /// Never expires.
    #[default]
    Infinite,
    /// Expires after the given number of seconds.
    Seconds(u32),
}

impl Lifetime {
    /// Interpret a wire lifetime, where `0xFFFFFFFF` is infinite.
    pub fn from_secs(secs: u32) -> Self {
        if secs == INFINITY_LIFE_TIME {
            Lifetime::Infinite
        } else {
            Lifetime::Seconds(secs)
        }
    }

    /// Check if this lifetime never expires.
    pub fn is_infinite(&self) -> bool {
        matches!(self, Lifetime::Infinite)
    }

    /// Duration until expiry, or `None` if infinite.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Lifetime::Infinite => None,
            Lifetime::Seconds(s) => Some(Duration::from_secs(u64::from(*s))),
        }
    }

    /// Wire value.
    pub fn as_secs(&self) -> u32 {
        match self {
            Lifetime::Infinite => INFINITY_LIFE_TIME,
            Lifetime::Seconds(s) => *s,
        }
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Infinite => f.write_str("forever"),
            Lifetime::Seconds(s) => write!(f, "{}sec", s),
        }
    }
}

// ============================================================================
// Neighbor state
// ============================================================================

/// Reachability state of a neighbor cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NeighborState {
    /// Address resolution in progress.
    Incomplete,
    /// Recently confirmed reachable.
    Reachable,
    /// Reachability unknown; nothing happens until traffic is sent.
    Stale,
    /// Waiting for upper-layer confirmation before probing.
    Delay,
    /// Actively probing with unicast solicitations.
    Probe,
}

impl NeighborState {
    /// Get the name of this state.
    pub fn name(&self) -> &'static str {
        match self {
            NeighborState::Incomplete => "INCOMPLETE",
            NeighborState::Reachable => "REACHABLE",
            NeighborState::Stale => "STALE",
            NeighborState::Delay => "DELAY",
            NeighborState::Probe => "PROBE",
        }
    }
}

impl fmt::Display for NeighborState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
