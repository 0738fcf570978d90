//! The neighbor discovery stack.
//!
//! [`NdStack`] owns every interface's address table and neighbor cache plus
//! the timer queue, and is driven from a single context: packet input,
//! management calls and timer expiry all take `&mut self`, so protocol
//! events are serialized by construction. The engines are split across
//! modules as further `impl` blocks:
//!
//! - `dad` - duplicate address detection
//! - `nud` - neighbor unreachability detection and cache management
//! - `resolve` - address resolution and the output path
//! - `input` - Neighbor Solicitation / Advertisement processing
//! - `lifecycle` - address creation, verification, expiry and deletion
//!
//! # Example
//!
//! ```ignore
//! use ndisc::ndp::{NdStack, StackConfig, InterfaceConfig, AddressConfig};
//! use std::time::Duration;
//!
//! let mut stack = NdStack::new(StackConfig::new(), my_driver);
//! let eth0 = stack.add_interface(InterfaceConfig::ethernet("eth0", mac));
//! stack.enable_interface(eth0)?;
//! stack.add_address(eth0, AddressConfig::new("2001:db8::10".parse()?, 64))?;
//!
//! // Let DAD run its course.
//! stack.advance_by(Duration::from_secs(2));
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::net::Ipv6Addr;
use std::time::Duration;

use bytes::Bytes;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{trace, warn};

use super::address::{AddressId, InterfaceAddress};
use super::config::{InterfaceConfig, StackConfig};
use super::error::{Error, Result};
use super::event::NdEvent;
use super::interface::{IfIndex, Interface};
use super::link::{LinkLayer, LinkState};
use super::multicast::{GroupTable, MulticastGroups};
use super::neighbor::NeighborEntry;
use super::route::{RouteTable, RoutingTable};
use super::timer::{TimerKey, TimerQueue};
use super::types::LinkAddr;
use super::wire::{NeighborAdvertisement, NeighborSolicitation};

/// IPv6 neighbor discovery state for a node.
pub struct NdStack<L, R = RouteTable, M = GroupTable> {
    pub(crate) config: StackConfig,
    pub(crate) link: L,
    pub(crate) routes: R,
    pub(crate) groups: M,
    pub(crate) interfaces: BTreeMap<IfIndex, Interface>,
    pub(crate) timers: TimerQueue,
    pub(crate) events: VecDeque<NdEvent>,
    pub(crate) loopback: Option<IfIndex>,
    pub(crate) rng: StdRng,
    next_ifindex: u32,
    next_address_id: u32,
    next_seq: u32,
}

impl<L: LinkLayer> NdStack<L> {
    /// Create a stack with in-memory routing and multicast tables.
    pub fn new(config: StackConfig, link: L) -> Self {
        Self::with_collaborators(config, link, RouteTable::new(), GroupTable::new())
    }
}

impl<L, R, M> NdStack<L, R, M>
where
    L: LinkLayer,
    R: RoutingTable,
    M: MulticastGroups,
{
    /// Create a stack on top of caller-provided collaborators.
    pub fn with_collaborators(config: StackConfig, link: L, routes: R, groups: M) -> Self {
        let rng = StdRng::seed_from_u64(config.random_seed);
        Self {
            config,
            link,
            routes,
            groups,
            interfaces: BTreeMap::new(),
            timers: TimerQueue::new(),
            events: VecDeque::new(),
            loopback: None,
            rng,
            next_ifindex: 1,
            next_address_id: 1,
            next_seq: 1,
        }
    }

    /// Stack configuration.
    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Link-layer collaborator.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Link-layer collaborator, mutably.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Routing table.
    pub fn routes(&self) -> &R {
        &self.routes
    }

    /// Routing table, mutably (static routes).
    pub fn routes_mut(&mut self) -> &mut R {
        &mut self.routes
    }

    /// Multicast membership table.
    pub fn groups(&self) -> &M {
        &self.groups
    }

    /// Timer queue.
    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    /// Earliest timer deadline.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    // ========================================================================
    // Interfaces
    // ========================================================================

    /// Register an interface. It stays down until
    /// [`enable_interface`](Self::enable_interface) or an address attach.
    pub fn add_interface(&mut self, config: InterfaceConfig) -> IfIndex {
        let index = IfIndex::new(self.next_ifindex);
        self.next_ifindex += 1;
        if config.loopback && self.loopback.is_none() {
            self.loopback = Some(index);
        }
        trace!(%index, name = %config.name, "interface added");
        self.interfaces.insert(index, Interface::new(index, config));
        index
    }

    /// Look up an interface.
    pub fn interface(&self, iface: IfIndex) -> Option<&Interface> {
        self.interfaces.get(&iface)
    }

    /// Look up an interface by name.
    pub fn interface_by_name(&self, name: &str) -> Option<&Interface> {
        self.interfaces.values().find(|i| i.name() == name)
    }

    /// Iterate over interfaces in index order.
    pub fn interfaces(&self) -> impl Iterator<Item = &Interface> {
        self.interfaces.values()
    }

    /// Look up an address on an interface.
    pub fn address(&self, iface: IfIndex, addr: &Ipv6Addr) -> Option<&InterfaceAddress> {
        self.interfaces.get(&iface)?.addresses.find(addr)
    }

    /// Look up a neighbor entry on an interface.
    pub fn neighbor(&self, iface: IfIndex, addr: &Ipv6Addr) -> Option<&NeighborEntry> {
        self.interfaces.get(&iface)?.neighbors.get_by_addr(addr)
    }

    pub(crate) fn intf(&self, iface: IfIndex) -> Result<&Interface> {
        self.interfaces
            .get(&iface)
            .ok_or(Error::InterfaceNotFound(iface))
    }

    pub(crate) fn intf_mut(&mut self, iface: IfIndex) -> Result<&mut Interface> {
        self.interfaces
            .get_mut(&iface)
            .ok_or(Error::InterfaceNotFound(iface))
    }

    /// IPv6 is up on the interface and the driver reports carrier.
    pub(crate) fn is_operational(&self, iface: IfIndex) -> bool {
        self.interfaces
            .get(&iface)
            .is_some_and(|i| i.is_ipv6_up())
            && self.link.link_state(iface) == LinkState::Up
    }

    // ========================================================================
    // Events and ids
    // ========================================================================

    /// Take all events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<NdEvent> {
        self.events.drain(..).collect()
    }

    pub(crate) fn emit(&mut self, event: NdEvent) {
        trace!(?event, "event");
        self.events.push_back(event);
    }

    pub(crate) fn next_address_id(&mut self) -> AddressId {
        let id = AddressId::new(self.next_address_id);
        self.next_address_id = self.next_address_id.wrapping_add(1).max(1);
        id
    }

    /// Next probe/resolve sequence number; never zero.
    pub(crate) fn next_seq(&mut self) -> u32 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1).max(1);
        seq
    }

    // ========================================================================
    // Time
    // ========================================================================

    /// Fire every timer due at or before `now`, in deadline order.
    pub fn advance_to(&mut self, now: Duration) {
        while let Some(key) = self.timers.pop_due(now) {
            self.on_timer(key);
        }
    }

    /// Advance the clock by `delta`, firing due timers.
    pub fn advance_by(&mut self, delta: Duration) {
        let until = self.timers.now() + delta;
        self.advance_to(until);
    }

    fn on_timer(&mut self, key: TimerKey) {
        trace!(?key, now = ?self.now(), "timer fired");
        match key {
            TimerKey::Dad { iface, addr } => self.dad_timer(iface, addr),
            TimerKey::Verify { iface, addr } => self.verify_address(iface, addr),
            TimerKey::Join { iface, addr } => self.delayed_join(iface, addr),
            TimerKey::Deprecate { iface, addr } => self.deprecate_address(iface, addr),
            TimerKey::Expire { iface, addr } => self.expire_address(iface, addr),
            TimerKey::Sweep { iface } => self.nud_sweep(iface),
            TimerKey::Probe {
                iface,
                neighbor,
                seq,
            } => self.nud_probe_timer(iface, neighbor, seq),
            TimerKey::Resolve {
                iface,
                neighbor,
                seq,
            } => self.resolve_timer(iface, neighbor, seq),
        }
    }

    // ========================================================================
    // Transmit helpers
    // ========================================================================

    /// Hand a frame to the driver, counting failures.
    pub(crate) fn transmit(&mut self, iface: IfIndex, dst: LinkAddr, frame: Bytes) -> Result<()> {
        let result = self.link.send(iface, dst, frame);
        if let Err(e) = &result {
            warn!(%iface, %dst, error = %e, "transmit failed");
            if let Some(intf) = self.interfaces.get_mut(&iface) {
                intf.stats.out_errors += 1;
            }
        }
        result
    }

    /// Send a Neighbor Solicitation. Returns whether the driver accepted it.
    pub(crate) fn send_solicitation(
        &mut self,
        iface: IfIndex,
        src: Ipv6Addr,
        dst: Ipv6Addr,
        dst_link: LinkAddr,
        ns: NeighborSolicitation,
    ) -> bool {
        trace!(%iface, %src, %dst, target = %ns.target, "sending neighbor solicitation");
        let packet = ns.to_packet(src, dst);
        let sent = self.transmit(iface, dst_link, packet).is_ok();
        if sent && let Some(intf) = self.interfaces.get_mut(&iface) {
            intf.stats.ns_out += 1;
        }
        sent
    }

    /// Count a Neighbor Advertisement as sent.
    pub(crate) fn count_advertisement(&mut self, iface: IfIndex, na: &NeighborAdvertisement) {
        trace!(%iface, target = %na.target, solicited = na.solicited, "sent neighbor advertisement");
        if let Some(intf) = self.interfaces.get_mut(&iface) {
            intf.stats.na_out += 1;
        }
    }
}
