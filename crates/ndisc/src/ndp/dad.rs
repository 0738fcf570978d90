//! Duplicate Address Detection.
//!
//! A [`DadRecord`] exists for an address only while it is `Tentative` and a
//! probing session is running. The first solicitation goes out when the
//! session starts; each retransmit interval the timer either sends the
//! next one or, once `dad_transmits` have been sent, decides. Solicitations
//! from other nodes probing the same address are counted and consulted at
//! the decision; an advertisement for the address ends the session at once.

use std::net::Ipv6Addr;

use tracing::{debug, info, trace, warn};

use super::address::AddressId;
use super::event::NdEvent;
use super::interface::IfIndex;
use super::link::LinkLayer;
use super::multicast::MulticastGroups;
use super::route::RoutingTable;
use super::stack::NdStack;
use super::timer::TimerKey;
use super::types::{AddressFlags, AddressState, solicited_node};
use super::wire::NeighborSolicitation;

/// Probing session for one tentative address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DadRecord {
    addr: AddressId,
    retries: u8,
    pub(crate) sent: u8,
    pub(crate) attempts: u8,
    pub(crate) ns_received: u32,
    pub(crate) na_received: u32,
}

impl DadRecord {
    pub(crate) fn new(addr: AddressId, retries: u8) -> Self {
        Self {
            addr,
            retries,
            sent: 0,
            attempts: 0,
            ns_received: 0,
            na_received: 0,
        }
    }

    /// Address under test.
    pub fn addr(&self) -> AddressId {
        self.addr
    }

    /// Solicitations to send before deciding.
    pub fn retries(&self) -> u8 {
        self.retries
    }

    /// Solicitations sent.
    pub fn sent(&self) -> u8 {
        self.sent
    }

    /// Transmission attempts, including ones skipped while the link was down.
    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    /// Solicitations for the address received from other nodes.
    pub fn ns_received(&self) -> u32 {
        self.ns_received
    }

    /// Advertisements for the address received.
    pub fn na_received(&self) -> u32 {
        self.na_received
    }

    /// Check if anything seen so far says another node holds the address.
    pub fn conflict_seen(&self) -> bool {
        self.ns_received > 0 || self.na_received > 0
    }
}

impl<L, R, M> NdStack<L, R, M>
where
    L: LinkLayer,
    R: RoutingTable,
    M: MulticastGroups,
{
    /// Start DAD for a tentative address.
    ///
    /// Addresses that are exempt (anycast, `NO_DAD`, DAD disabled on the
    /// interface) are verified on the spot. On a non-operational interface
    /// the start is deferred until the link comes up.
    pub(crate) fn dad_start(&mut self, iface: IfIndex, id: AddressId) {
        let operational = self.is_operational(iface);
        let max_sessions = self.config.max_dad_sessions;
        let Some(intf) = self.interfaces.get_mut(&iface) else {
            return;
        };
        let dad_enabled = intf.config.dad_enabled();
        let retries = intf.config.dad_transmits;
        let retrans = intf.config.retrans_timer;
        let Some(entry) = intf.addresses.get(id) else {
            return;
        };
        if entry.state != AddressState::Tentative {
            return;
        }
        let addr = entry.addr;

        let exempt = entry.flags.contains(AddressFlags::ANYCAST)
            || entry.flags.contains(AddressFlags::NO_DAD);
        if !dad_enabled || exempt {
            debug!(%iface, %addr, "duplicate address detection skipped");
            self.dad_unique(iface, id);
            return;
        }
        if intf.dad.contains_key(&id) {
            return;
        }
        if !operational {
            debug!(%iface, %addr, "interface not operational, deferring DAD");
            return;
        }
        if intf.dad.len() >= max_sessions {
            warn!(%iface, %addr, sessions = intf.dad.len(), "no room for DAD session, aborting");
            intf.stats.dad_aborted += 1;
            return;
        }

        intf.dad.insert(id, DadRecord::new(id, retries));
        debug!(%iface, %addr, retries, "starting duplicate address detection");
        self.emit(NdEvent::AddressTentative { iface, addr });
        self.dad_output(iface, id);
        self.timers.arm(TimerKey::Dad { iface, addr: id }, retrans);
    }

    /// Send one DAD solicitation from the unspecified address to the
    /// target's solicited-node group.
    fn dad_output(&mut self, iface: IfIndex, id: AddressId) {
        let up = self.is_operational(iface);
        let Some(intf) = self.interfaces.get_mut(&iface) else {
            return;
        };
        let Some(target) = intf.addresses.get(id).map(|a| a.addr) else {
            return;
        };
        let Some(record) = intf.dad.get_mut(&id) else {
            return;
        };
        record.attempts = record.attempts.saturating_add(1);
        if !up {
            debug!(%iface, addr = %target, "link down, DAD solicitation not sent");
            return;
        }

        let group = solicited_node(&target);
        let dst_link = self.link.multicast_map(&group);
        let ns = NeighborSolicitation::new(target);
        if self.send_solicitation(iface, Ipv6Addr::UNSPECIFIED, group, dst_link, ns)
            && let Some(record) = self.dad_record_mut(iface, id)
        {
            record.sent += 1;
        }
    }

    fn dad_record_mut(&mut self, iface: IfIndex, id: AddressId) -> Option<&mut DadRecord> {
        self.interfaces.get_mut(&iface)?.dad.get_mut(&id)
    }

    /// Retransmit/decision timer.
    pub(crate) fn dad_timer(&mut self, iface: IfIndex, id: AddressId) {
        let max_attempts = self.config.dad_max_attempts;
        let Some(intf) = self.interfaces.get_mut(&iface) else {
            return;
        };
        let Some(record) = intf.dad.get(&id) else {
            trace!(%iface, addr = %id, "DAD timer for finished session");
            return;
        };
        let retrans = intf.config.retrans_timer;
        let state = intf.addresses.get(id).map(|a| a.state);
        if state != Some(AddressState::Tentative) {
            trace!(%iface, addr = %id, ?state, "address left tentative, dropping DAD session");
            intf.dad.remove(&id);
            return;
        }

        if record.sent < record.retries {
            if record.attempts >= max_attempts {
                warn!(%iface, addr = %id, attempts = record.attempts, "DAD attempts exhausted");
                intf.stats.dad_aborted += 1;
                intf.dad.remove(&id);
                return;
            }
            self.dad_output(iface, id);
            self.timers.arm(TimerKey::Dad { iface, addr: id }, retrans);
            return;
        }

        if record.conflict_seen() {
            self.dad_duplicated(iface, id);
        } else {
            self.dad_unique(iface, id);
        }
    }

    /// A solicitation from the unspecified address targets a tentative
    /// address of ours: another node is probing it too.
    pub(crate) fn dad_ns_input(&mut self, iface: IfIndex, id: AddressId) {
        match self.dad_record_mut(iface, id) {
            Some(record) if record.sent > 0 => {
                record.ns_received += 1;
                debug!(%iface, addr = %id, "solicitation for tentative address recorded");
            }
            _ => self.dad_duplicated(iface, id),
        }
    }

    /// An advertisement claims a tentative address of ours.
    pub(crate) fn dad_na_input(&mut self, iface: IfIndex, id: AddressId) {
        if let Some(record) = self.dad_record_mut(iface, id) {
            record.na_received += 1;
        }
        self.dad_duplicated(iface, id);
    }

    /// Stop a session. Returns whether one was running.
    pub(crate) fn dad_stop(&mut self, iface: IfIndex, id: AddressId) -> bool {
        self.timers.disarm(&TimerKey::Dad { iface, addr: id });
        self.interfaces
            .get_mut(&iface)
            .is_some_and(|intf| intf.dad.remove(&id).is_some())
    }

    pub(crate) fn dad_duplicated(&mut self, iface: IfIndex, id: AddressId) {
        self.dad_stop(iface, id);
        let Some(intf) = self.interfaces.get_mut(&iface) else {
            return;
        };
        let Some(entry) = intf.addresses.get_mut(id) else {
            return;
        };
        if entry.state != AddressState::Tentative {
            return;
        }
        entry.state = AddressState::Duplicated;
        intf.stats.dad_duplicates += 1;
        warn!(%iface, addr = %entry.addr, "duplicate address detected");
        self.address_duplicated(iface, id);
    }

    pub(crate) fn dad_unique(&mut self, iface: IfIndex, id: AddressId) {
        self.dad_stop(iface, id);
        let now = self.now();
        let Some(entry) = self
            .interfaces
            .get_mut(&iface)
            .and_then(|intf| intf.addresses.get_mut(id))
        else {
            return;
        };
        if entry.state != AddressState::Tentative {
            return;
        }
        entry.state = if entry.preferred_elapsed(now) {
            AddressState::Deprecated
        } else {
            AddressState::Active
        };
        info!(%iface, addr = %entry.addr, state = %entry.state, "address verified");
        self.address_ready(iface, id);
    }

    /// Restart DAD for tentative addresses that have no session, e.g.
    /// after the link comes back.
    pub(crate) fn dad_resume(&mut self, iface: IfIndex) {
        let Some(intf) = self.interfaces.get(&iface) else {
            return;
        };
        let pending: Vec<AddressId> = intf
            .addresses
            .iter()
            .filter(|a| a.state == AddressState::Tentative && a.joined)
            .filter(|a| !intf.dad.contains_key(&a.id))
            .map(|a| a.id)
            .collect();
        for id in pending {
            self.dad_start(iface, id);
        }
    }
}
