//! Helpers shared by the unit tests.

use std::collections::HashSet;
use std::net::Ipv6Addr;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use super::address::AddressConfig;
use super::config::{InterfaceConfig, StackConfig};
use super::error::{Error, Result};
use super::interface::IfIndex;
use super::link::{LinkLayer, LinkState};
use super::neighbor::NeighborEntry;
use super::stack::NdStack;
use super::types::LinkAddr;
use super::wire::{
    Ipv6Header, Ipv6Packet, NdMessage, NeighborAdvertisement, NeighborSolicitation,
};

/// Link layer that records every frame handed to it.
#[derive(Debug, Default)]
pub(crate) struct RecordingLink {
    sent: Vec<(IfIndex, LinkAddr, Bytes)>,
    down: HashSet<IfIndex>,
    fail: bool,
}

impl RecordingLink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_sends(&mut self, fail: bool) {
        self.fail = fail;
    }

    pub(crate) fn set_down(&mut self, iface: IfIndex, down: bool) {
        if down {
            self.down.insert(iface);
        } else {
            self.down.remove(&iface);
        }
    }

    pub(crate) fn take(&mut self) -> Vec<(IfIndex, LinkAddr, Bytes)> {
        std::mem::take(&mut self.sent)
    }

    fn messages(&self) -> Vec<(Ipv6Addr, Ipv6Addr, NdMessage)> {
        self.sent
            .iter()
            .filter_map(|(_, _, frame)| {
                let ip = Ipv6Packet::parse(frame).ok()?;
                let msg = NdMessage::from_bytes(ip.payload).ok()?;
                Some((ip.src(), ip.dst(), msg))
            })
            .collect()
    }

    pub(crate) fn solicitations(&self) -> Vec<(Ipv6Addr, Ipv6Addr, NeighborSolicitation)> {
        self.messages()
            .into_iter()
            .filter_map(|(src, dst, msg)| match msg {
                NdMessage::Solicitation(ns) => Some((src, dst, ns)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn advertisements(&self) -> Vec<(Ipv6Addr, Ipv6Addr, NeighborAdvertisement)> {
        self.messages()
            .into_iter()
            .filter_map(|(src, dst, msg)| match msg {
                NdMessage::Advertisement(na) => Some((src, dst, na)),
                _ => None,
            })
            .collect()
    }
}

impl LinkLayer for RecordingLink {
    fn send(&mut self, iface: IfIndex, dst: LinkAddr, frame: Bytes) -> Result<()> {
        if self.fail {
            return Err(Error::Link("send refused".into()));
        }
        self.sent.push((iface, dst, frame));
        Ok(())
    }

    fn link_state(&self, iface: IfIndex) -> LinkState {
        if self.down.contains(&iface) {
            LinkState::Down
        } else {
            LinkState::Up
        }
    }
}

pub(crate) fn mac(n: u8) -> LinkAddr {
    LinkAddr::new([0x02, 0, 0, 0, 0, n])
}

pub(crate) fn addr(s: &str) -> Ipv6Addr {
    s.parse().unwrap()
}

pub(crate) fn eth_config(name: &str, n: u8) -> InterfaceConfig {
    InterfaceConfig::ethernet(name, mac(n))
}

pub(crate) fn stack() -> NdStack<RecordingLink> {
    NdStack::new(StackConfig::new(), RecordingLink::new())
}

/// One enabled Ethernet interface.
pub(crate) fn eth_stack() -> (NdStack<RecordingLink>, IfIndex) {
    let mut stack = stack();
    let eth0 = stack.add_interface(eth_config("eth0", 1));
    stack.enable_interface(eth0).unwrap();
    (stack, eth0)
}

/// Enabled loopback and Ethernet interfaces.
pub(crate) fn lo_eth_stack() -> (NdStack<RecordingLink>, IfIndex, IfIndex) {
    let mut stack = stack();
    let lo = stack.add_interface(InterfaceConfig::loopback("lo"));
    let eth0 = stack.add_interface(eth_config("eth0", 1));
    stack.enable_interface(lo).unwrap();
    stack.enable_interface(eth0).unwrap();
    (stack, lo, eth0)
}

/// `eth0` with `2001:db8::10/64` verified, at t=1s, with nothing recorded.
pub(crate) fn eth_stack_with_address() -> (NdStack<RecordingLink>, IfIndex) {
    let (mut stack, eth0) = eth_stack();
    stack
        .add_address(eth0, AddressConfig::new(addr("2001:db8::10"), 64))
        .unwrap();
    stack.advance_by(Duration::from_secs(1));
    stack.link_mut().take();
    stack.take_events();
    (stack, eth0)
}

/// As [`eth_stack_with_address`], plus a `Stale` neighbor `2001:db8::2`.
pub(crate) fn probe_stack() -> (NdStack<RecordingLink>, IfIndex, Ipv6Addr) {
    let (mut stack, eth0) = eth_stack_with_address();
    let peer = addr("2001:db8::2");
    let now = stack.now();
    stack
        .create_neighbor(eth0, NeighborEntry::stale(peer, mac(2), now))
        .unwrap();
    (stack, eth0, peer)
}

pub(crate) fn ns_frame(
    src: Ipv6Addr,
    dst: Ipv6Addr,
    target: Ipv6Addr,
    source_link_addr: Option<LinkAddr>,
) -> Bytes {
    let mut ns = NeighborSolicitation::new(target);
    ns.source_link_addr = source_link_addr;
    ns.to_packet(src, dst)
}

pub(crate) fn na_frame(src: Ipv6Addr, dst: Ipv6Addr, na: &NeighborAdvertisement) -> Bytes {
    na.to_packet(src, dst)
}

/// A non-ICMP packet (next header 59, "no next header").
pub(crate) fn data_packet(src: Ipv6Addr, dst: Ipv6Addr, payload: &[u8]) -> Bytes {
    let header = Ipv6Header::new(src, dst, 59, payload.len() as u16);
    let mut packet = BytesMut::with_capacity(Ipv6Header::SIZE + payload.len());
    packet.put_slice(header.as_bytes());
    packet.put_slice(payload);
    packet.freeze()
}
