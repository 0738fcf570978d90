//! Neighbor Unreachability Detection and neighbor cache management.
//!
//! Idle neighbors are never polled. A per-interface sweep downgrades
//! `Reachable` entries whose confirmation is older than the reachable time;
//! only when traffic is sent to a `Stale` entry does it enter `Delay`, and
//! if nothing confirms it by the end of the delay it is probed with unicast
//! solicitations until it answers or the probe budget runs out.

use std::net::Ipv6Addr;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use super::error::{Error, Result};
use super::event::{NdEvent, RemovalReason};
use super::interface::IfIndex;
use super::link::LinkLayer;
use super::multicast::MulticastGroups;
use super::neighbor::{NeighborEntry, NeighborId};
use super::route::{Route, RoutingTable};
use super::stack::NdStack;
use super::timer::TimerKey;
use super::types::{LinkAddr, NeighborState};
use super::wire::NeighborSolicitation;

impl<L, R, M> NdStack<L, R, M>
where
    L: LinkLayer,
    R: RoutingTable,
    M: MulticastGroups,
{
    // ========================================================================
    // Reachability
    // ========================================================================

    /// Periodic sweep: age out reachable entries, collect idle stale ones,
    /// and re-arm for the soonest pending expiry.
    pub(crate) fn nud_sweep(&mut self, iface: IfIndex) {
        let now = self.now();
        let idle_timeout = self.config.stale_entry_timeout;
        let Some(intf) = self.interfaces.get_mut(&iface) else {
            return;
        };
        let reachable = intf.config.reachable_time;

        let mut next: Option<Duration> = None;
        let mut idle = Vec::new();
        for (id, entry) in intf.neighbors.iter_mut() {
            if entry.permanent {
                continue;
            }
            match entry.state() {
                NeighborState::Reachable => {
                    let deadline = entry.confirmed_at.unwrap_or(entry.used_at) + reachable;
                    if deadline <= now {
                        entry.set_state(NeighborState::Stale);
                        trace!(%iface, neighbor = %entry.addr(), "reachable time expired");
                    } else {
                        let left = deadline - now;
                        next = Some(next.map_or(left, |n| n.min(left)));
                    }
                }
                NeighborState::Stale if !entry.router && entry.probe_seq == 0 => {
                    let last = entry.used_at.max(entry.confirmed_at.unwrap_or_default());
                    if now.saturating_sub(last) >= idle_timeout {
                        idle.push(id);
                    }
                }
                _ => {}
            }
        }

        for id in idle {
            self.delete_neighbor_entry(iface, id, RemovalReason::Expired);
        }
        self.timers
            .arm(TimerKey::Sweep { iface }, next.unwrap_or(reachable));
    }

    /// Traffic is about to go to a `Stale` neighbor: start the delay timer.
    pub(crate) fn nud_send_trigger(&mut self, iface: IfIndex, id: NeighborId) {
        let delay = self.config.delay_first_probe;
        let Some(entry) = self
            .interfaces
            .get(&iface)
            .and_then(|i| i.neighbors.get(id))
        else {
            return;
        };
        if entry.state() != NeighborState::Stale || entry.probe_seq != 0 || entry.permanent {
            return;
        }

        let seq = self.next_seq();
        let Some(entry) = self
            .interfaces
            .get_mut(&iface)
            .and_then(|i| i.neighbors.get_mut(id))
        else {
            return;
        };
        entry.set_state(NeighborState::Delay);
        entry.probe_seq = seq;
        entry.unanswered_probes = 0;
        trace!(%iface, neighbor = %entry.addr(), ?delay, "entering delay");
        self.timers.arm(
            TimerKey::Probe {
                iface,
                neighbor: id,
                seq,
            },
            delay,
        );
    }

    /// Delay/probe timer.
    pub(crate) fn nud_probe_timer(&mut self, iface: IfIndex, id: NeighborId, seq: u32) {
        let max_probes = self.config.max_unicast_solicit;
        let Some(intf) = self.interfaces.get_mut(&iface) else {
            return;
        };
        let retrans = intf.config.retrans_timer;
        let own_link_addr = intf.config.link_addr;
        let Some(entry) = intf.neighbors.get_mut(id) else {
            trace!(%iface, neighbor = ?id, "probe timer for deleted neighbor");
            return;
        };
        if entry.probe_seq != seq {
            trace!(%iface, neighbor = %entry.addr(), seq, "stale probe timer");
            return;
        }

        let target = entry.addr();
        match entry.state() {
            NeighborState::Stale => {
                trace!(%iface, neighbor = %target, "probe raced with the sweep");
                entry.clear_probe();
            }
            NeighborState::Reachable => entry.clear_probe(),
            _ if entry.unanswered_probes < max_probes => {
                entry.set_state(NeighborState::Probe);
                entry.unanswered_probes += 1;
                let probes = entry.unanswered_probes;
                let dst_link = entry.link_addr();
                let src = intf.addresses.select_source(&target);
                self.timers.arm(
                    TimerKey::Probe {
                        iface,
                        neighbor: id,
                        seq,
                    },
                    retrans,
                );

                match (src, dst_link) {
                    (Some(src), Some(dst_link)) => {
                        debug!(%iface, neighbor = %target, probes, "probing neighbor");
                        let ns = NeighborSolicitation::new(target).source_link_addr(own_link_addr);
                        self.send_solicitation(iface, src, target, dst_link, ns);
                    }
                    _ => debug!(%iface, neighbor = %target, "no source address for probe"),
                }
            }
            NeighborState::Delay | NeighborState::Probe => {
                info!(%iface, neighbor = %target, "neighbor unreachable");
                if entry.router || intf.routers.contains(&target) {
                    self.remove_default_router(iface, &target, RemovalReason::Unreachable);
                } else {
                    self.delete_neighbor_entry(iface, id, RemovalReason::Unreachable);
                }
            }
            _ => entry.clear_probe(),
        }
    }

    /// Mark a neighbor reachable and cancel its probing.
    pub(crate) fn confirm_neighbor(&mut self, iface: IfIndex, id: NeighborId) {
        let now = self.now();
        let Some(entry) = self
            .interfaces
            .get_mut(&iface)
            .and_then(|i| i.neighbors.get_mut(id))
        else {
            return;
        };
        let seq = entry.probe_seq;
        if !entry.confirm(now) {
            return;
        }
        entry.clear_probe();
        if seq != 0 {
            self.timers.disarm(&TimerKey::Probe {
                iface,
                neighbor: id,
                seq,
            });
        }
    }

    /// Stop probing and fall back to `Stale`.
    pub(crate) fn mark_stale(&mut self, iface: IfIndex, id: NeighborId) {
        let Some(entry) = self
            .interfaces
            .get_mut(&iface)
            .and_then(|i| i.neighbors.get_mut(id))
        else {
            return;
        };
        let seq = entry.probe_seq;
        entry.set_state(NeighborState::Stale);
        entry.clear_probe();
        if seq != 0 {
            self.timers.disarm(&TimerKey::Probe {
                iface,
                neighbor: id,
                seq,
            });
        }
    }

    /// Upper-layer hint that traffic to `dst` is making progress. Confirms
    /// the next hop unless it is still being resolved.
    pub fn confirm_reachability(&mut self, iface: IfIndex, dst: &Ipv6Addr) -> Result<()> {
        let next_hop = match self.routes.find_route(dst) {
            Some(route) if route.is_gateway() && route.iface == iface => route.next_hop,
            _ => *dst,
        };
        let intf = self.intf(iface)?;
        let id = intf
            .neighbors
            .find(&next_hop)
            .ok_or(Error::NeighborNotFound { addr: next_hop })?;
        if intf
            .neighbors
            .get(id)
            .is_some_and(|e| e.state() == NeighborState::Incomplete)
        {
            return Ok(());
        }
        self.confirm_neighbor(iface, id);
        Ok(())
    }

    // ========================================================================
    // Cache management
    // ========================================================================

    /// Insert an entry, evicting the least recently used idle entry if the
    /// cache is full. Default routers are never evicted.
    pub(crate) fn create_neighbor(&mut self, iface: IfIndex, entry: NeighborEntry) -> Result<NeighborId> {
        let intf = self.intf_mut(iface)?;
        if intf.neighbors.is_full() {
            let routers = &intf.routers;
            match intf
                .neighbors
                .eviction_candidate(|e| routers.contains(&e.addr()))
            {
                Some(victim) => {
                    self.delete_neighbor_entry(iface, victim, RemovalReason::Evicted);
                }
                None => {
                    intf.stats.cache_full += 1;
                    warn!(%iface, neighbor = %entry.addr(), "neighbor cache full");
                    return Err(Error::CacheFull(iface));
                }
            }
        }

        let intf = self.intf_mut(iface)?;
        let addr = entry.addr();
        match intf.neighbors.insert(entry) {
            Ok(id) => {
                trace!(%iface, neighbor = %addr, ?id, "neighbor created");
                Ok(id)
            }
            Err(_) => {
                intf.stats.cache_full += 1;
                warn!(%iface, neighbor = %addr, "neighbor cache full");
                Err(Error::CacheFull(iface))
            }
        }
    }

    /// Remove an entry with everything hanging off it: its timers, queued
    /// packets and every route that uses it as next hop.
    pub(crate) fn delete_neighbor_entry(
        &mut self,
        iface: IfIndex,
        id: NeighborId,
        reason: RemovalReason,
    ) -> bool {
        let Some(intf) = self.interfaces.get_mut(&iface) else {
            return false;
        };
        let Some(mut entry) = intf.neighbors.remove(id) else {
            return false;
        };
        let dropped = entry.discard_queue();
        intf.stats.queue_drops += dropped as u64;

        if entry.probe_seq != 0 {
            self.timers.disarm(&TimerKey::Probe {
                iface,
                neighbor: id,
                seq: entry.probe_seq,
            });
        }
        if entry.resolve_seq != 0 {
            self.timers.disarm(&TimerKey::Resolve {
                iface,
                neighbor: id,
                seq: entry.resolve_seq,
            });
        }

        let addr = entry.addr();
        let routes = self.routes.delete_routes_by_gateway(iface, &addr);
        debug!(
            %iface,
            neighbor = %addr,
            reason = reason.name(),
            routes = routes.len(),
            dropped,
            "neighbor removed"
        );
        self.emit(NdEvent::NeighborRemoved { iface, addr, reason });
        true
    }

    /// Add or pin a permanent entry.
    pub fn add_static_neighbor(
        &mut self,
        iface: IfIndex,
        addr: Ipv6Addr,
        link_addr: LinkAddr,
    ) -> Result<NeighborId> {
        let now = self.now();
        let Some(id) = self.intf(iface)?.neighbors.find(&addr) else {
            let id = self.create_neighbor(iface, NeighborEntry::permanent(addr, link_addr, now))?;
            debug!(%iface, neighbor = %addr, %link_addr, "static neighbor added");
            return Ok(id);
        };

        let incomplete = self
            .intf(iface)?
            .neighbors
            .get(id)
            .is_some_and(|e| e.state() == NeighborState::Incomplete);
        if incomplete {
            self.resolution_complete(iface, id, link_addr, NeighborState::Reachable);
        } else if let Some(entry) = self.intf_mut(iface)?.neighbors.get_mut(id) {
            entry.set_link_addr(link_addr);
        }
        self.confirm_neighbor(iface, id);
        if let Some(entry) = self.intf_mut(iface)?.neighbors.get_mut(id) {
            entry.permanent = true;
        }
        Ok(id)
    }

    /// Delete the entry for `addr`.
    pub fn delete_neighbor(&mut self, iface: IfIndex, addr: &Ipv6Addr) -> Result<()> {
        let id = self
            .intf(iface)?
            .neighbors
            .find(addr)
            .ok_or(Error::NeighborNotFound { addr: *addr })?;
        self.delete_neighbor_entry(iface, id, RemovalReason::Deleted);
        Ok(())
    }

    /// Delete every non-permanent entry. Returns how many were removed.
    pub fn flush_neighbors(&mut self, iface: IfIndex) -> Result<usize> {
        let ids: Vec<NeighborId> = self
            .intf(iface)?
            .neighbors
            .iter()
            .filter(|(_, e)| !e.permanent)
            .map(|(id, _)| id)
            .collect();
        let count = ids
            .into_iter()
            .filter(|id| self.delete_neighbor_entry(iface, *id, RemovalReason::Deleted))
            .count();
        Ok(count)
    }

    // ========================================================================
    // Default routers
    // ========================================================================

    /// Record a default router and install a `::/0` route through it.
    pub fn add_default_router(&mut self, iface: IfIndex, router: Ipv6Addr) -> Result<()> {
        let intf = self.intf_mut(iface)?;
        if !intf.routers.insert(router) {
            return Ok(());
        }
        if let Some(entry) = intf
            .neighbors
            .find(&router)
            .and_then(|id| intf.neighbors.get_mut(id))
        {
            entry.router = true;
        }
        self.routes
            .add_route(Route::via(Ipv6Addr::UNSPECIFIED, 0, router, iface))?;
        info!(%iface, %router, "default router added");
        Ok(())
    }

    /// Remove a default router, its routes and its neighbor entry.
    pub fn delete_default_router(&mut self, iface: IfIndex, router: &Ipv6Addr) -> Result<()> {
        if !self.intf(iface)?.routers.contains(router) {
            return Err(Error::NeighborNotFound { addr: *router });
        }
        self.remove_default_router(iface, router, RemovalReason::Deleted);
        Ok(())
    }

    pub(crate) fn remove_default_router(
        &mut self,
        iface: IfIndex,
        router: &Ipv6Addr,
        reason: RemovalReason,
    ) {
        self.drop_default_router(iface, router);
        if let Some(id) = self
            .interfaces
            .get(&iface)
            .and_then(|i| i.neighbors.find(router))
        {
            self.delete_neighbor_entry(iface, id, reason);
        }
    }

    /// Forget a router record and its routes, keeping the neighbor entry.
    pub(crate) fn drop_default_router(&mut self, iface: IfIndex, router: &Ipv6Addr) {
        let Some(intf) = self.interfaces.get_mut(&iface) else {
            return;
        };
        if intf.routers.remove(router) {
            let routes = self.routes.delete_routes_by_gateway(iface, router);
            info!(%iface, %router, routes = routes.len(), "default router removed");
        }
    }
}
