//! Neighbor Solicitation and Advertisement input.

use std::net::Ipv6Addr;

use tracing::{debug, trace};

use super::error::{Error, Result};
use super::interface::IfIndex;
use super::link::LinkLayer;
use super::multicast::MulticastGroups;
use super::neighbor::NeighborEntry;
use super::route::RoutingTable;
use super::stack::NdStack;
use super::types::{ALL_NODES, AddressFlags, AddressState, LinkAddr, NeighborState};
use super::wire::{
    ICMPV6_NEXT_HEADER, Ipv6Packet, NdMessage, NeighborAdvertisement, NeighborSolicitation,
    PacketInfo, icmp_type,
};

impl<L, R, M> NdStack<L, R, M>
where
    L: LinkLayer,
    R: RoutingTable,
    M: MulticastGroups,
{
    /// Process a received IPv6 packet carrying a Neighbor Solicitation or
    /// Advertisement.
    ///
    /// Anything malformed or ruled out by the protocol is discarded with
    /// [`Error::Discarded`] (or a parse error) and counted; none of these
    /// are fatal.
    pub fn input(&mut self, iface: IfIndex, packet: &[u8]) -> Result<()> {
        let intf = self.intf_mut(iface)?;
        if !intf.is_ipv6_up() {
            intf.stats.in_discards += 1;
            return Err(Error::Discarded("IPv6 is down on the interface"));
        }

        let ip = match Ipv6Packet::parse(packet) {
            Ok(ip) => ip,
            Err(e) => {
                intf.stats.in_errors += 1;
                return Err(e);
            }
        };
        let is_nd = ip.header.next_header == ICMPV6_NEXT_HEADER
            && matches!(
                ip.payload.first(),
                Some(&icmp_type::NEIGHBOR_SOLICITATION | &icmp_type::NEIGHBOR_ADVERTISEMENT)
            );
        if !is_nd {
            intf.stats.in_discards += 1;
            return Err(Error::Discarded("not a neighbor discovery message"));
        }
        if !ip.icmp_checksum_ok() {
            intf.stats.in_errors += 1;
            return Err(Error::Discarded("bad ICMPv6 checksum"));
        }

        let info = PacketInfo {
            src: ip.src(),
            dst: ip.dst(),
            hop_limit: ip.header.hop_limit,
        };
        let message = match NdMessage::from_bytes(ip.payload).and_then(|m| {
            m.validate(&info)?;
            Ok(m)
        }) {
            Ok(m) => m,
            Err(e) => {
                debug!(%iface, src = %info.src, error = %e, "invalid neighbor discovery message");
                intf.stats.in_errors += 1;
                return Err(e);
            }
        };

        intf.stats.in_msgs += 1;
        match message {
            NdMessage::Solicitation(ns) => {
                intf.stats.ns_in += 1;
                self.ns_input(iface, &info, ns)
            }
            NdMessage::Advertisement(na) => {
                intf.stats.na_in += 1;
                self.na_input(iface, &info, na)
            }
        }
    }

    fn discard(&mut self, iface: IfIndex, reason: &'static str) -> Result<()> {
        trace!(%iface, reason, "discarding neighbor discovery message");
        if let Some(intf) = self.interfaces.get_mut(&iface) {
            intf.stats.in_discards += 1;
        }
        Err(Error::Discarded(reason))
    }

    fn ns_input(&mut self, iface: IfIndex, info: &PacketInfo, ns: NeighborSolicitation) -> Result<()> {
        let intf = self.intf(iface)?;
        let Some(target) = intf.addresses.find_target(&ns.target) else {
            return self.discard(iface, "solicitation target is not ours");
        };
        if info.src == ns.target {
            return self.discard(iface, "solicitation source is its target");
        }
        let (id, state, anycast) = (
            target.id(),
            target.state(),
            target.flags().contains(AddressFlags::ANYCAST),
        );
        let router = intf.config.router;
        let own_link_addr = intf.config.link_addr;

        if state == AddressState::Tentative {
            if info.src.is_unspecified() && info.dst != ns.target {
                self.dad_ns_input(iface, id);
                return Ok(());
            }
            return self.discard(iface, "solicitation for a tentative address");
        }
        if !state.is_usable() {
            return self.discard(iface, "solicitation for a detached address");
        }

        if !info.src.is_unspecified()
            && let Some(link_addr) = ns.source_link_addr
        {
            self.learn_from_solicitation(iface, info.src, link_addr);
        }

        let solicited = !info.src.is_unspecified();
        let na = NeighborAdvertisement::new(ns.target)
            .router(router)
            .solicited(solicited)
            .override_flag(!anycast)
            .target_link_addr(own_link_addr);
        let dst = if solicited { info.src } else { ALL_NODES };
        let reply = na.to_packet(ns.target, dst);
        match self.output(iface, dst, reply) {
            Ok(_) => self.count_advertisement(iface, &na),
            Err(e) => debug!(%iface, %dst, error = %e, "failed to send advertisement"),
        }
        Ok(())
    }

    /// Record the sender of a solicitation. The result is `Stale`: a
    /// solicitation says nothing about the reverse path.
    fn learn_from_solicitation(&mut self, iface: IfIndex, src: Ipv6Addr, link_addr: LinkAddr) {
        let now = self.now();
        let Some(intf) = self.interfaces.get(&iface) else {
            return;
        };
        let Some(id) = intf.neighbors.find(&src) else {
            if let Err(e) = self.create_neighbor(iface, NeighborEntry::stale(src, link_addr, now)) {
                debug!(%iface, neighbor = %src, error = %e, "not caching solicitation sender");
            }
            return;
        };
        let Some(entry) = intf.neighbors.get(id) else {
            return;
        };
        if entry.permanent {
            return;
        }
        match entry.link_addr() {
            None => self.resolution_complete(iface, id, link_addr, NeighborState::Stale),
            Some(cached) if cached != link_addr => {
                if let Some(entry) = self
                    .interfaces
                    .get_mut(&iface)
                    .and_then(|i| i.neighbors.get_mut(id))
                {
                    entry.set_link_addr(link_addr);
                }
                self.mark_stale(iface, id);
            }
            Some(_) => {}
        }
    }

    fn na_input(
        &mut self,
        iface: IfIndex,
        info: &PacketInfo,
        na: NeighborAdvertisement,
    ) -> Result<()> {
        let intf = self.intf(iface)?;
        if let Some(own) = intf.addresses.find(&na.target) {
            if own.state() == AddressState::Tentative && info.dst != na.target {
                let id = own.id();
                self.dad_na_input(iface, id);
                return Ok(());
            }
            return self.discard(iface, "advertisement for one of our addresses");
        }

        let Some(id) = intf.neighbors.find(&na.target) else {
            return self.discard(iface, "no entry for advertised target");
        };
        let Some(entry) = intf.neighbors.get(id) else {
            return self.discard(iface, "no entry for advertised target");
        };
        if entry.permanent {
            return Ok(());
        }

        let Some(cached) = entry.link_addr() else {
            let Some(link_addr) = na.target_link_addr else {
                return self.discard(iface, "advertisement without target link-layer address");
            };
            let state = if na.solicited {
                NeighborState::Reachable
            } else {
                NeighborState::Stale
            };
            if let Some(entry) = self
                .interfaces
                .get_mut(&iface)
                .and_then(|i| i.neighbors.get_mut(id))
            {
                entry.router = na.router;
            }
            self.resolution_complete(iface, id, link_addr, state);
            return Ok(());
        };

        let changed = na.target_link_addr.is_some_and(|l| l != cached);
        let was_router = entry.router;
        let Some(entry) = self
            .interfaces
            .get_mut(&iface)
            .and_then(|i| i.neighbors.get_mut(id))
        else {
            return Ok(());
        };

        if !na.override_flag && changed {
            if entry.state() == NeighborState::Reachable {
                entry.set_state(NeighborState::Stale);
            }
            trace!(%iface, neighbor = %na.target, "non-override advertisement with new address ignored");
            return Ok(());
        }

        if let Some(link_addr) = na.target_link_addr {
            entry.set_link_addr(link_addr);
        }
        entry.router = na.router;
        if na.solicited {
            self.confirm_neighbor(iface, id);
        } else if changed {
            self.mark_stale(iface, id);
        }
        if was_router && !na.router {
            debug!(%iface, neighbor = %na.target, "neighbor is no longer a router");
            self.drop_default_router(iface, &na.target);
        }
        Ok(())
    }
}
