//! Address resolution and the output path.
//!
//! Sending never blocks. A packet for a neighbor whose link-layer address
//! is unknown is parked on an `Incomplete` cache entry and the call returns
//! [`Resolution::Pending`]; multicast solicitations then go out on the
//! resolve timer until an advertisement completes the entry (releasing the
//! queue in order) or the solicitation budget runs out (dropping the entry
//! and every route through it).

use std::net::Ipv6Addr;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, trace};

use super::error::{Error, Result};
use super::event::{NdEvent, RemovalReason};
use super::interface::IfIndex;
use super::link::LinkLayer;
use super::multicast::MulticastGroups;
use super::neighbor::{NeighborEntry, NeighborId};
use super::route::{RouteKind, RoutingTable};
use super::stack::NdStack;
use super::timer::TimerKey;
use super::types::{LinkAddr, NeighborState, solicited_node};
use super::wire::{Ipv6Packet, NeighborSolicitation};

/// Outcome of handing a packet to the output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The packet went out to this link-layer address.
    Resolved(LinkAddr),
    /// The packet is queued until the next hop resolves.
    Pending,
}

impl Resolution {
    /// Check if the packet was transmitted.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

impl<L, R, M> NdStack<L, R, M>
where
    L: LinkLayer,
    R: RoutingTable,
    M: MulticastGroups,
{
    /// Send an IPv6 packet out of `iface`, choosing the next hop from its
    /// destination.
    pub fn send(&mut self, iface: IfIndex, packet: Bytes) -> Result<Resolution> {
        let dst = Ipv6Packet::parse(&packet)?.dst();
        let next_hop = self.next_hop(iface, &dst)?;
        self.output(iface, next_hop, packet)
    }

    /// Next hop for `dst`: the destination itself when it is on-link,
    /// otherwise the gateway of the best route.
    pub fn next_hop(&self, iface: IfIndex, dst: &Ipv6Addr) -> Result<Ipv6Addr> {
        if dst.is_multicast() || dst.is_unicast_link_local() {
            return Ok(*dst);
        }
        match self.routes.find_route(dst) {
            Some(route) if route.iface == iface => Ok(match route.kind {
                RouteKind::Gateway => route.next_hop,
                RouteKind::OnLink | RouteKind::Local => *dst,
            }),
            _ => Err(Error::NoRoute(*dst)),
        }
    }

    /// Send `packet` to the on-link neighbor `next_hop`.
    ///
    /// Unknown neighbors get an `Incomplete` entry and a resolve timer due
    /// immediately; the first solicitation goes out the next time the stack
    /// advances.
    pub fn output(&mut self, iface: IfIndex, next_hop: Ipv6Addr, packet: Bytes) -> Result<Resolution> {
        let now = self.now();
        let intf = self.intf_mut(iface)?;
        if !intf.is_ipv6_up() {
            return Err(Error::InterfaceDown(iface));
        }
        if next_hop.is_multicast() {
            let dst = self.link.multicast_map(&next_hop);
            self.transmit(iface, dst, packet)?;
            return Ok(Resolution::Resolved(dst));
        }

        if let Some(id) = intf.neighbors.find(&next_hop) {
            let Some(entry) = intf.neighbors.get_mut(id) else {
                return Err(Error::NeighborNotFound { addr: next_hop });
            };
            entry.used_at = now;
            return match entry.link_addr() {
                Some(dst) => {
                    if entry.state() == NeighborState::Stale {
                        self.nud_send_trigger(iface, id);
                    }
                    self.transmit(iface, dst, packet)?;
                    Ok(Resolution::Resolved(dst))
                }
                None => {
                    if entry.enqueue(packet).is_some() {
                        intf.stats.queue_drops += 1;
                        debug!(%iface, neighbor = %next_hop, "resolution queue full, dropped oldest packet");
                    }
                    Ok(Resolution::Pending)
                }
            };
        }

        let queue_capacity = intf.neighbors.queue_capacity();
        let id = self.create_neighbor(iface, NeighborEntry::incomplete(next_hop, queue_capacity, now))?;
        let seq = self.next_seq();
        let intf = self.intf_mut(iface)?;
        let Some(entry) = intf.neighbors.get_mut(id) else {
            return Err(Error::NeighborNotFound { addr: next_hop });
        };
        if entry.enqueue(packet).is_some() {
            intf.stats.queue_drops += 1;
        }
        entry.resolve_seq = seq;
        debug!(%iface, neighbor = %next_hop, "resolving");
        self.timers.arm(
            TimerKey::Resolve {
                iface,
                neighbor: id,
                seq,
            },
            Duration::ZERO,
        );
        Ok(Resolution::Pending)
    }

    /// Look up the link-layer address of a neighbor without sending.
    pub fn lookup(&self, iface: IfIndex, addr: &Ipv6Addr) -> Option<LinkAddr> {
        if addr.is_multicast() {
            return Some(self.link.multicast_map(addr));
        }
        self.interfaces
            .get(&iface)?
            .neighbors
            .get_by_addr(addr)?
            .link_addr()
    }

    /// Resolution retransmit timer.
    pub(crate) fn resolve_timer(&mut self, iface: IfIndex, id: NeighborId, seq: u32) {
        let max_solicits = self.config.max_multicast_solicit;
        let Some(intf) = self.interfaces.get_mut(&iface) else {
            return;
        };
        let retrans = intf.config.retrans_timer;
        let own_link_addr = intf.config.link_addr;
        let Some(entry) = intf.neighbors.get_mut(id) else {
            trace!(%iface, neighbor = ?id, "resolve timer for deleted neighbor");
            return;
        };
        if entry.resolve_seq != seq || entry.state() != NeighborState::Incomplete {
            trace!(%iface, neighbor = %entry.addr(), seq, "stale resolve timer");
            return;
        }

        let target = entry.addr();
        if entry.resends >= max_solicits {
            info!(%iface, neighbor = %target, queued = entry.queued(), "address resolution failed");
            if entry.router || intf.routers.contains(&target) {
                self.remove_default_router(iface, &target, RemovalReason::Unresolved);
            } else {
                self.delete_neighbor_entry(iface, id, RemovalReason::Unresolved);
            }
            return;
        }

        entry.resends += 1;
        let src = entry
            .queued_source()
            .filter(|s| intf.addresses.owns_usable(s))
            .or_else(|| intf.addresses.select_source(&target));
        self.timers.arm(
            TimerKey::Resolve {
                iface,
                neighbor: id,
                seq,
            },
            retrans,
        );

        let Some(src) = src else {
            debug!(%iface, neighbor = %target, "no usable source address, solicitation skipped");
            return;
        };
        let group = solicited_node(&target);
        let dst_link = self.link.multicast_map(&group);
        let ns = NeighborSolicitation::new(target).source_link_addr(own_link_addr);
        self.send_solicitation(iface, src, group, dst_link, ns);
    }

    /// An `Incomplete` entry learned its link-layer address: release the
    /// queued packets in order.
    pub(crate) fn resolution_complete(
        &mut self,
        iface: IfIndex,
        id: NeighborId,
        link_addr: LinkAddr,
        state: NeighborState,
    ) {
        let now = self.now();
        let Some(entry) = self
            .interfaces
            .get_mut(&iface)
            .and_then(|i| i.neighbors.get_mut(id))
        else {
            return;
        };
        let seq = entry.resolve_seq;
        let addr = entry.addr();
        let packets = entry.complete(link_addr, state, now);
        if seq != 0 {
            self.timers.disarm(&TimerKey::Resolve {
                iface,
                neighbor: id,
                seq,
            });
        }

        debug!(%iface, neighbor = %addr, %link_addr, %state, queued = packets.len(), "neighbor resolved");
        self.emit(NdEvent::NeighborResolved {
            iface,
            addr,
            link_addr,
        });
        for packet in packets {
            // Failures are counted by transmit.
            let _ = self.transmit(iface, link_addr, packet);
        }
    }
}
