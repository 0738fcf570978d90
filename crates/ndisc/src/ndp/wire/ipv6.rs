//! IPv6 fixed header and ICMPv6 checksum.

use std::net::Ipv6Addr;

use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::ndp::error::{Error, Result};

/// Next-header value for ICMPv6.
pub const ICMPV6_NEXT_HEADER: u8 = 58;

/// Hop limit required on every Neighbor Discovery message.
pub const ND_HOP_LIMIT: u8 = 255;

/// IPv6 fixed header (RFC 8200). Multi-byte fields are big-endian.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct Ipv6Header {
    /// Version (4 bits), traffic class (8 bits), flow label (20 bits).
    pub ver_tc_flow: [u8; 4],
    /// Payload length.
    pub payload_len: [u8; 2],
    /// Next header.
    pub next_header: u8,
    /// Hop limit.
    pub hop_limit: u8,
    /// Source address.
    pub src: [u8; 16],
    /// Destination address.
    pub dst: [u8; 16],
}

impl Ipv6Header {
    /// Size of this structure.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Create a header for `payload_len` bytes of `next_header` payload.
    pub fn new(src: Ipv6Addr, dst: Ipv6Addr, next_header: u8, payload_len: u16) -> Self {
        Self {
            ver_tc_flow: [0x60, 0, 0, 0],
            payload_len: payload_len.to_be_bytes(),
            next_header,
            hop_limit: 64,
            src: src.octets(),
            dst: dst.octets(),
        }
    }

    /// Set the hop limit.
    pub fn with_hop_limit(mut self, hop_limit: u8) -> Self {
        self.hop_limit = hop_limit;
        self
    }

    /// IP version nibble.
    pub fn version(&self) -> u8 {
        self.ver_tc_flow[0] >> 4
    }

    /// Payload length.
    pub fn payload_len(&self) -> usize {
        usize::from(u16::from_be_bytes(self.payload_len))
    }

    /// Source address.
    pub fn src_addr(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.src)
    }

    /// Destination address.
    pub fn dst_addr(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.dst)
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

/// A parsed view of an IPv6 packet.
#[derive(Debug, Clone, Copy)]
pub struct Ipv6Packet<'a> {
    /// Fixed header.
    pub header: &'a Ipv6Header,
    /// Payload, trimmed to the header's payload length.
    pub payload: &'a [u8],
}

impl<'a> Ipv6Packet<'a> {
    /// Parse a packet. Extension headers are not walked; the payload is
    /// whatever `next_header` names.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let header = Ipv6Header::from_bytes(data)?;
        if header.version() != 6 {
            return Err(Error::InvalidMessage(format!(
                "IP version {} is not 6",
                header.version()
            )));
        }

        let end = Ipv6Header::SIZE + header.payload_len();
        let payload = data.get(Ipv6Header::SIZE..end).ok_or(Error::Truncated {
            expected: end,
            actual: data.len(),
        })?;

        Ok(Self { header, payload })
    }

    /// Source address.
    pub fn src(&self) -> Ipv6Addr {
        self.header.src_addr()
    }

    /// Destination address.
    pub fn dst(&self) -> Ipv6Addr {
        self.header.dst_addr()
    }

    /// Verify the ICMPv6 checksum of the payload.
    pub fn icmp_checksum_ok(&self) -> bool {
        checksum(&self.src(), &self.dst(), ICMPV6_NEXT_HEADER, self.payload) == 0
    }
}

/// Ones'-complement checksum over the IPv6 pseudo-header and `payload`.
///
/// Returns the value to place in the checksum field when the field is
/// zeroed, or zero when verifying a payload with a correct checksum.
pub fn checksum(src: &Ipv6Addr, dst: &Ipv6Addr, next_header: u8, payload: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut add = |data: &[u8]| {
        let mut chunks = data.chunks_exact(2);
        for pair in &mut chunks {
            sum += u32::from(u16::from_be_bytes([pair[0], pair[1]]));
        }
        if let [last] = chunks.remainder() {
            sum += u32::from(*last) << 8;
        }
    };

    add(&src.octets());
    add(&dst.octets());
    add(&(payload.len() as u32).to_be_bytes());
    add(&[0, 0, 0, next_header]);
    add(payload);

    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// Build an ICMPv6 packet with hop limit 255, filling in the checksum at
/// payload offset 2.
pub(crate) fn build_icmp_packet(src: Ipv6Addr, dst: Ipv6Addr, body: &[u8]) -> Bytes {
    let mut icmp = BytesMut::from(body);
    if icmp.len() >= 4 {
        icmp[2..4].copy_from_slice(&[0, 0]);
        let sum = checksum(&src, &dst, ICMPV6_NEXT_HEADER, &icmp);
        icmp[2..4].copy_from_slice(&sum.to_be_bytes());
    }

    let header = Ipv6Header::new(src, dst, ICMPV6_NEXT_HEADER, icmp.len() as u16)
        .with_hop_limit(ND_HOP_LIMIT);

    let mut packet = BytesMut::with_capacity(Ipv6Header::SIZE + icmp.len());
    packet.put_slice(header.as_bytes());
    packet.put_slice(&icmp);
    packet.freeze()
}
