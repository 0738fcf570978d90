//! Common test utilities for integration tests.
//!
//! Provides `Lab`, a set of synchronous nodes sharing one virtual Ethernet
//! segment and a common clock, plus small address helpers.

#![allow(dead_code)]

use std::net::Ipv6Addr;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use ndisc::lab::{Frame, LabLink, Segment};
use ndisc::ndp::wire::{ICMPV6_NEXT_HEADER, Ipv6Header, Ipv6Packet, NdMessage};
use ndisc::ndp::{IfIndex, InterfaceConfig, LinkAddr, NdEvent, NdStack, StackConfig};

/// Locally administered MAC ending in `n`.
pub fn mac(n: u8) -> LinkAddr {
    LinkAddr::new([0x02, 0, 0, 0, 0, n])
}

pub fn addr(s: &str) -> Ipv6Addr {
    s.parse().unwrap()
}

/// A UDP-less IPv6 packet ("no next header") carrying `payload`.
pub fn data_packet(src: Ipv6Addr, dst: Ipv6Addr, payload: &[u8]) -> Bytes {
    let header = Ipv6Header::new(src, dst, 59, payload.len() as u16);
    let mut packet = BytesMut::new();
    packet.put_slice(header.as_bytes());
    packet.put_slice(payload);
    packet.freeze()
}

/// Parsed ND message carried by a frame, if any.
pub fn nd_message(frame: &Frame) -> Option<(Ipv6Addr, Ipv6Addr, NdMessage)> {
    let ip = Ipv6Packet::parse(&frame.data).ok()?;
    if ip.header.next_header != ICMPV6_NEXT_HEADER {
        return None;
    }
    let msg = NdMessage::from_bytes(ip.payload).ok()?;
    Some((ip.src(), ip.dst(), msg))
}

/// A node with one Ethernet interface.
pub struct Node {
    pub stack: NdStack<LabLink>,
    pub eth0: IfIndex,
    pub hw: LinkAddr,
}

impl Node {
    pub fn events(&mut self) -> Vec<NdEvent> {
        self.stack.take_events()
    }
}

/// Nodes on one segment, advanced in lockstep.
pub struct Lab {
    pub segment: Segment,
    pub nodes: Vec<Node>,
}

impl Lab {
    pub fn new() -> Self {
        Self {
            segment: Segment::new(),
            nodes: Vec::new(),
        }
    }

    /// Add an enabled node whose hardware address ends in `n`.
    pub fn add_node(&mut self, n: u8) -> usize {
        self.add_node_with(InterfaceConfig::ethernet("eth0", mac(n)))
    }

    pub fn add_node_with(&mut self, config: InterfaceConfig) -> usize {
        let hw = config.link_addr;
        let mut stack = NdStack::new(StackConfig::new(), LabLink::new());
        let eth0 = stack.add_interface(config);
        stack.link_mut().attach(eth0, &self.segment, hw);
        stack.enable_interface(eth0).unwrap();

        // Join the shared clock.
        if let Some(now) = self.nodes.first().map(|n| n.stack.now()) {
            stack.advance_to(now);
        }
        self.nodes.push(Node { stack, eth0, hw });
        self.nodes.len() - 1
    }

    pub fn node(&mut self, i: usize) -> &mut Node {
        &mut self.nodes[i]
    }

    pub fn now(&self) -> Duration {
        self.nodes.first().map(|n| n.stack.now()).unwrap_or_default()
    }

    /// Deliver queued frames until the segment is quiet.
    pub fn pump(&mut self) {
        loop {
            let mut delivered = 0;
            for node in &mut self.nodes {
                for frame in self.segment.take_inbox(node.hw) {
                    delivered += 1;
                    let _ = node.stack.input(node.eth0, &frame);
                }
            }
            if delivered == 0 {
                break;
            }
        }
    }

    /// Advance every node by `delta`, delivering frames at each deadline.
    pub fn advance(&mut self, delta: Duration) {
        let until = self.now() + delta;
        self.pump();
        loop {
            let next = self
                .nodes
                .iter()
                .filter_map(|n| n.stack.next_deadline())
                .filter(|d| *d <= until)
                .min();
            let Some(next) = next else { break };
            for node in &mut self.nodes {
                node.stack.advance_to(next);
            }
            self.pump();
        }
        for node in &mut self.nodes {
            node.stack.advance_to(until);
        }
        self.pump();
    }

    /// Frames sent by `hw` since the log was last cleared.
    pub fn frames_from(&self, hw: LinkAddr) -> Vec<Frame> {
        self.segment
            .frames()
            .into_iter()
            .filter(|f| f.from == hw)
            .collect()
    }

    /// Neighbor Solicitations sent by `hw`.
    pub fn solicitations_from(&self, hw: LinkAddr) -> usize {
        self.frames_from(hw)
            .iter()
            .filter(|f| matches!(nd_message(f), Some((_, _, NdMessage::Solicitation(_)))))
            .count()
    }
}
