//! Link-layer and IPv6 address helpers used by neighbor discovery.

use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

use crate::util::addr::{AddrError, parse_mac};

/// All-nodes link-local multicast group (`ff02::1`).
pub const ALL_NODES: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

/// All-routers link-local multicast group (`ff02::2`).
pub const ALL_ROUTERS: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 2);

/// Length of an interface identifier in bytes.
pub const INTERFACE_ID_LEN: usize = 8;

/// A 48-bit Ethernet link-layer address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LinkAddr([u8; 6]);

impl LinkAddr {
    /// The all-zero address.
    pub const ZERO: LinkAddr = LinkAddr([0; 6]);

    /// Create a link address from raw octets.
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Create from a byte slice, which must hold at least 6 bytes.
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        let octets: [u8; 6] = data.get(..6)?.try_into().ok()?;
        Some(Self(octets))
    }

    /// Raw octets.
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Map an IPv6 multicast group to its Ethernet multicast address
    /// (`33:33` followed by the low 32 bits of the group).
    pub fn multicast(group: &Ipv6Addr) -> Self {
        let o = group.octets();
        Self([0x33, 0x33, o[12], o[13], o[14], o[15]])
    }

    /// Check if this is a group address.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Modified EUI-64 interface identifier for this address.
    pub fn interface_id(&self) -> [u8; INTERFACE_ID_LEN] {
        let m = self.0;
        [m[0] ^ 0x02, m[1], m[2], 0xff, 0xfe, m[3], m[4], m[5]]
    }
}

impl fmt::Display for LinkAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl fmt::Debug for LinkAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkAddr({})", self)
    }
}

impl FromStr for LinkAddr {
    type Err = AddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_mac(s).map(Self)
    }
}

impl From<[u8; 6]> for LinkAddr {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

// ============================================================================
// IPv6 helpers
// ============================================================================

/// Solicited-node multicast group for an address (`ff02::1:ffXX:XXXX`).
pub fn solicited_node(addr: &Ipv6Addr) -> Ipv6Addr {
    let o = addr.octets();
    Ipv6Addr::from([
        0xff, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01, 0xff, o[13], o[14], o[15],
    ])
}

/// Check whether `addr` is a solicited-node multicast group.
pub fn is_solicited_node(addr: &Ipv6Addr) -> bool {
    let o = addr.octets();
    o[..12] == [0xff, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01] && o[12] == 0xff
}

/// Link-local address formed from an interface identifier.
pub fn link_local(interface_id: &[u8; INTERFACE_ID_LEN]) -> Ipv6Addr {
    let mut o = [0u8; 16];
    o[0] = 0xfe;
    o[1] = 0x80;
    o[8..].copy_from_slice(interface_id);
    Ipv6Addr::from(o)
}

/// Combine a prefix (first `prefix_len` bits of `prefix`) with an
/// interface identifier occupying the low 64 bits.
pub fn with_interface_id(
    prefix: &Ipv6Addr,
    prefix_len: u8,
    interface_id: &[u8; INTERFACE_ID_LEN],
) -> Ipv6Addr {
    let masked = u128::from(mask(prefix, prefix_len));
    let iid = u128::from(Ipv6Addr::from({
        let mut o = [0u8; 16];
        o[8..].copy_from_slice(interface_id);
        o
    }));
    Ipv6Addr::from(masked | iid)
}

/// Keep only the first `prefix_len` bits of `addr`.
pub fn mask(addr: &Ipv6Addr, prefix_len: u8) -> Ipv6Addr {
    let bits = u128::from(*addr);
    let mask = match prefix_len {
        0 => 0,
        l if l >= 128 => u128::MAX,
        l => u128::MAX << (128 - u32::from(l)),
    };
    Ipv6Addr::from(bits & mask)
}

/// Check whether `addr` falls inside `prefix/prefix_len`.
pub fn prefix_contains(prefix: &Ipv6Addr, prefix_len: u8, addr: &Ipv6Addr) -> bool {
    mask(prefix, prefix_len) == mask(addr, prefix_len)
}

/// Low 64 bits of an address.
pub fn interface_id_of(addr: &Ipv6Addr) -> [u8; INTERFACE_ID_LEN] {
    let mut iid = [0u8; INTERFACE_ID_LEN];
    iid.copy_from_slice(&addr.octets()[8..]);
    iid
}

/// Address scope, used for source address selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scope {
    /// Interface-local (loopback).
    Interface,
    /// Link-local.
    Link,
    /// Site-local.
    Site,
    /// Global.
    Global,
}

impl Scope {
    /// Scope of an address. Multicast scope comes from the group's scope nibble.
    pub fn of(addr: &Ipv6Addr) -> Self {
        if addr.is_multicast() {
            return match addr.octets()[1] & 0x0f {
                0x1 => Scope::Interface,
                0x2 => Scope::Link,
                0x3..=0x5 => Scope::Site,
                _ => Scope::Global,
            };
        }
        if addr.is_loopback() {
            Scope::Interface
        } else if addr.is_unicast_link_local() {
            Scope::Link
        } else if addr.segments()[0] & 0xffc0 == 0xfec0 {
            Scope::Site
        } else {
            Scope::Global
        }
    }

    /// Get the name of this scope.
    pub fn name(&self) -> &'static str {
        match self {
            Scope::Interface => "host",
            Scope::Link => "link",
            Scope::Site => "site",
            Scope::Global => "global",
        }
    }
}
