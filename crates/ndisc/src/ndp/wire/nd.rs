//! Neighbor Solicitation and Neighbor Advertisement messages (RFC 4861 §4.3, §4.4).

use std::net::Ipv6Addr;

use bytes::{BufMut, Bytes, BytesMut};
use winnow::binary;
use winnow::prelude::*;
use winnow::token::take;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::ipv6::{ND_HOP_LIMIT, build_icmp_packet};
use super::{PResult, cut};
use crate::ndp::error::{Error, Result};
use crate::ndp::types::LinkAddr;
use crate::ndp::types::link::is_solicited_node;

/// ICMPv6 message types handled here.
pub mod icmp_type {
    pub const NEIGHBOR_SOLICITATION: u8 = 135;
    pub const NEIGHBOR_ADVERTISEMENT: u8 = 136;
}

/// Neighbor Discovery option types.
pub mod option_type {
    pub const SOURCE_LINK_ADDR: u8 = 1;
    pub const TARGET_LINK_ADDR: u8 = 2;
}

/// Neighbor Advertisement flag bits (first byte of the flags word).
mod na_flags {
    pub const ROUTER: u8 = 0x80;
    pub const SOLICITED: u8 = 0x40;
    pub const OVERRIDE: u8 = 0x20;
}

/// Fixed part shared by NS and NA: ICMPv6 header, flags/reserved word, target.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NdHeader {
    /// ICMPv6 type.
    pub icmp_type: u8,
    /// ICMPv6 code (must be 0).
    pub code: u8,
    /// ICMPv6 checksum.
    pub checksum: [u8; 2],
    /// NA flags, reserved in NS.
    pub flags: [u8; 4],
    /// Target address.
    pub target: [u8; 16],
}

impl NdHeader {
    /// Size of this structure.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Create a header.
    pub fn new(icmp_type: u8, target: Ipv6Addr) -> Self {
        Self {
            icmp_type,
            target: target.octets(),
            ..Default::default()
        }
    }

    /// Set the first flags byte.
    pub fn with_flags(mut self, flags: u8) -> Self {
        self.flags[0] = flags;
        self
    }

    /// Target address.
    pub fn target_addr(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.target)
    }

    /// Convert to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: Self::SIZE,
                actual: data.len(),
            })
    }
}

// ============================================================================
// Options
// ============================================================================

/// A Neighbor Discovery option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NdOption {
    /// Source link-layer address.
    SourceLinkAddr(LinkAddr),
    /// Target link-layer address.
    TargetLinkAddr(LinkAddr),
    /// Option not interpreted by this implementation.
    Unknown {
        /// Option type.
        kind: u8,
        /// Length in bytes.
        len: usize,
    },
}

impl NdOption {
    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let kind = binary::u8.parse_next(input)?;
        let units = binary::u8.parse_next(input)?;
        if units == 0 {
            return cut();
        }

        let len = usize::from(units) * 8;
        let body: &[u8] = take(len - 2).parse_next(input)?;

        let option = match kind {
            option_type::SOURCE_LINK_ADDR | option_type::TARGET_LINK_ADDR => {
                let Some(addr) = LinkAddr::from_slice(body) else {
                    return cut();
                };
                if kind == option_type::SOURCE_LINK_ADDR {
                    NdOption::SourceLinkAddr(addr)
                } else {
                    NdOption::TargetLinkAddr(addr)
                }
            }
            _ => NdOption::Unknown { kind, len },
        };
        Ok(option)
    }

    fn write_link_addr(buf: &mut BytesMut, kind: u8, addr: &LinkAddr) {
        buf.put_u8(kind);
        buf.put_u8(1);
        buf.put_slice(&addr.octets());
    }
}

fn parse_options(input: &mut &[u8]) -> PResult<Vec<NdOption>> {
    let mut options = Vec::new();
    while !input.is_empty() {
        options.push(NdOption::parse(input)?);
    }
    Ok(options)
}

// ============================================================================
// Messages
// ============================================================================

/// Neighbor Solicitation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborSolicitation {
    /// Address being resolved or verified.
    pub target: Ipv6Addr,
    /// Sender's link-layer address.
    pub source_link_addr: Option<LinkAddr>,
}

impl NeighborSolicitation {
    /// Create a solicitation for `target` without options.
    pub fn new(target: Ipv6Addr) -> Self {
        Self {
            target,
            source_link_addr: None,
        }
    }

    /// Attach a source link-layer address option.
    pub fn source_link_addr(mut self, addr: LinkAddr) -> Self {
        self.source_link_addr = Some(addr);
        self
    }

    /// Serialize the ICMPv6 body with a zero checksum.
    pub fn write_to(&self, buf: &mut BytesMut) {
        let header = NdHeader::new(icmp_type::NEIGHBOR_SOLICITATION, self.target);
        buf.put_slice(header.as_bytes());
        if let Some(addr) = &self.source_link_addr {
            NdOption::write_link_addr(buf, option_type::SOURCE_LINK_ADDR, addr);
        }
    }

    /// Build a complete IPv6 packet.
    pub fn to_packet(&self, src: Ipv6Addr, dst: Ipv6Addr) -> Bytes {
        let mut body = BytesMut::with_capacity(NdHeader::SIZE + 8);
        self.write_to(&mut body);
        build_icmp_packet(src, dst, &body)
    }
}

/// Neighbor Advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborAdvertisement {
    /// Address whose link-layer address is advertised.
    pub target: Ipv6Addr,
    /// Sender is a router.
    pub router: bool,
    /// Sent in response to a solicitation.
    pub solicited: bool,
    /// Should replace an existing cached link-layer address.
    pub override_flag: bool,
    /// Target's link-layer address.
    pub target_link_addr: Option<LinkAddr>,
}

impl NeighborAdvertisement {
    /// Create an advertisement for `target` with all flags clear.
    pub fn new(target: Ipv6Addr) -> Self {
        Self {
            target,
            router: false,
            solicited: false,
            override_flag: false,
            target_link_addr: None,
        }
    }

    /// Set the Router flag.
    pub fn router(mut self, router: bool) -> Self {
        self.router = router;
        self
    }

    /// Set the Solicited flag.
    pub fn solicited(mut self, solicited: bool) -> Self {
        self.solicited = solicited;
        self
    }

    /// Set the Override flag.
    pub fn override_flag(mut self, override_flag: bool) -> Self {
        self.override_flag = override_flag;
        self
    }

    /// Attach a target link-layer address option.
    pub fn target_link_addr(mut self, addr: LinkAddr) -> Self {
        self.target_link_addr = Some(addr);
        self
    }

    fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.router {
            flags |= na_flags::ROUTER;
        }
        if self.solicited {
            flags |= na_flags::SOLICITED;
        }
        if self.override_flag {
            flags |= na_flags::OVERRIDE;
        }
        flags
    }

    /// Serialize the ICMPv6 body with a zero checksum.
    pub fn write_to(&self, buf: &mut BytesMut) {
        let header =
            NdHeader::new(icmp_type::NEIGHBOR_ADVERTISEMENT, self.target).with_flags(self.flags());
        buf.put_slice(header.as_bytes());
        if let Some(addr) = &self.target_link_addr {
            NdOption::write_link_addr(buf, option_type::TARGET_LINK_ADDR, addr);
        }
    }

    /// Build a complete IPv6 packet.
    pub fn to_packet(&self, src: Ipv6Addr, dst: Ipv6Addr) -> Bytes {
        let mut body = BytesMut::with_capacity(NdHeader::SIZE + 8);
        self.write_to(&mut body);
        build_icmp_packet(src, dst, &body)
    }
}

/// Addressing context of a received message, taken from the IPv6 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketInfo {
    /// IPv6 source.
    pub src: Ipv6Addr,
    /// IPv6 destination.
    pub dst: Ipv6Addr,
    /// IPv6 hop limit.
    pub hop_limit: u8,
}

/// A received Neighbor Discovery message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NdMessage {
    /// Neighbor Solicitation.
    Solicitation(NeighborSolicitation),
    /// Neighbor Advertisement.
    Advertisement(NeighborAdvertisement),
}

impl NdMessage {
    /// Parse an ICMPv6 body. Unknown options are skipped; a zero-length
    /// option fails the whole message.
    pub fn parse(input: &mut &[u8]) -> PResult<Self> {
        if input.len() < NdHeader::SIZE {
            return cut();
        }

        let header_bytes: &[u8] = take(NdHeader::SIZE).parse_next(input)?;
        let header = *NdHeader::from_bytes(header_bytes).map_err(|_| {
            winnow::error::ErrMode::Cut(winnow::error::ContextError::new())
        })?;
        if header.code != 0 {
            return cut();
        }

        let options = parse_options(input)?;
        let target = header.target_addr();

        match header.icmp_type {
            icmp_type::NEIGHBOR_SOLICITATION => {
                let source_link_addr = options.iter().find_map(|o| match o {
                    NdOption::SourceLinkAddr(addr) => Some(*addr),
                    _ => None,
                });
                Ok(NdMessage::Solicitation(NeighborSolicitation {
                    target,
                    source_link_addr,
                }))
            }
            icmp_type::NEIGHBOR_ADVERTISEMENT => {
                let target_link_addr = options.iter().find_map(|o| match o {
                    NdOption::TargetLinkAddr(addr) => Some(*addr),
                    _ => None,
                });
                let flags = header.flags[0];
                Ok(NdMessage::Advertisement(NeighborAdvertisement {
                    target,
                    router: flags & na_flags::ROUTER != 0,
                    solicited: flags & na_flags::SOLICITED != 0,
                    override_flag: flags & na_flags::OVERRIDE != 0,
                    target_link_addr,
                }))
            }
            _ => cut(),
        }
    }

    /// Parse an ICMPv6 body from a byte slice.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < NdHeader::SIZE {
            return Err(Error::Truncated {
                expected: NdHeader::SIZE,
                actual: data.len(),
            });
        }
        let mut input = data;
        Self::parse(&mut input)
            .map_err(|_| Error::InvalidMessage("malformed neighbor discovery message".into()))
    }

    /// Target address.
    pub fn target(&self) -> Ipv6Addr {
        match self {
            NdMessage::Solicitation(ns) => ns.target,
            NdMessage::Advertisement(na) => na.target,
        }
    }

    /// Validate the message against its IPv6 addressing (RFC 4861 §7.1).
    pub fn validate(&self, info: &PacketInfo) -> Result<()> {
        if info.hop_limit != ND_HOP_LIMIT {
            return Err(Error::Discarded("hop limit is not 255"));
        }
        if self.target().is_multicast() {
            return Err(Error::Discarded("multicast target"));
        }

        match self {
            NdMessage::Solicitation(ns) => {
                if info.src.is_unspecified() {
                    if !is_solicited_node(&info.dst) {
                        return Err(Error::Discarded(
                            "unspecified source not sent to solicited-node group",
                        ));
                    }
                    if ns.source_link_addr.is_some() {
                        return Err(Error::Discarded(
                            "source link-layer option with unspecified source",
                        ));
                    }
                }
            }
            NdMessage::Advertisement(na) => {
                if info.dst.is_multicast() && na.solicited {
                    return Err(Error::Discarded("solicited advertisement sent to multicast"));
                }
            }
        }
        Ok(())
    }
}
