//! Wire formats: the IPv6 fixed header and the Neighbor Solicitation /
//! Neighbor Advertisement ICMPv6 messages.
//!
//! Fixed headers are `zerocopy` structs; variable-length option lists are
//! parsed with `winnow`.
//!
//! # Example
//!
//! ```
//! use ndisc::ndp::wire::{NdMessage, NeighborSolicitation, Ipv6Packet};
//! use std::net::Ipv6Addr;
//!
//! let target: Ipv6Addr = "fe80::1".parse().unwrap();
//! let packet = NeighborSolicitation::new(target)
//!     .to_packet(Ipv6Addr::UNSPECIFIED, ndisc::ndp::types::solicited_node(&target));
//!
//! let ip = Ipv6Packet::parse(&packet).unwrap();
//! let msg = NdMessage::from_bytes(ip.payload).unwrap();
//! assert!(matches!(msg, NdMessage::Solicitation(ns) if ns.target == target));
//! ```

pub mod ipv6;
pub mod nd;

pub use ipv6::{ICMPV6_NEXT_HEADER, Ipv6Header, Ipv6Packet, ND_HOP_LIMIT, checksum};
pub use nd::{
    NdHeader, NdMessage, NdOption, NeighborAdvertisement, NeighborSolicitation, PacketInfo,
    icmp_type, option_type,
};

use winnow::error::{ContextError, ErrMode};

/// Parser result used by the wire parsers.
pub type PResult<T> = std::result::Result<T, ErrMode<ContextError>>;

/// Hard parse failure (no backtracking).
pub(crate) fn cut<T>() -> PResult<T> {
    Err(ErrMode::Cut(ContextError::new()))
}
