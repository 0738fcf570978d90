//! Address lifecycle.
//!
//! Every interface address goes through here on creation and deletion.
//! Creation validates the request, installs the prefix and loopback host
//! routes, arms lifetime timers and hands the address to DAD (possibly
//! after a random join delay). A verification timer independent of DAD
//! follows each tentative address and finishes off the two terminal
//! outcomes: ready addresses get their groups and router solicitation,
//! duplicated ones get deleted.
//!
//! Deletion stops every timer keyed by the address, leaves its
//! solicited-node group and removes every route that depended on it
//! before the record is dropped.

use std::net::Ipv6Addr;

use tracing::{debug, error, info, warn};

use super::address::{AddressConfig, AddressId, InterfaceAddress};
use super::error::{Error, Result};
use super::event::{NdEvent, RemovalReason};
use super::interface::IfIndex;
use super::link::{LinkLayer, LinkState};
use super::multicast::MulticastGroups;
use super::route::{Route, RoutingTable};
use super::stack::NdStack;
use super::timer::TimerKey;
use super::types::link::{link_local, with_interface_id};
use super::types::{ALL_NODES, AddressFlags, AddressState, INTERFACE_ID_LEN, Lifetime, solicited_node};
use crate::util::random_delay;

/// Prefix length of a stateless autoconfigured address.
pub const AUTOCONF_PREFIX_LEN: u8 = 128 - (INTERFACE_ID_LEN as u8) * 8;

/// Lifetime left after `elapsed` has passed.
fn remaining(lifetime: Lifetime, elapsed: std::time::Duration) -> Lifetime {
    match lifetime {
        Lifetime::Infinite => Lifetime::Infinite,
        Lifetime::Seconds(s) => {
            let elapsed = u32::try_from(elapsed.as_secs()).unwrap_or(u32::MAX);
            Lifetime::Seconds(s.saturating_sub(elapsed))
        }
    }
}

fn check_lifetimes(preferred: Lifetime, valid: Lifetime) -> Result<()> {
    if preferred.as_secs() > valid.as_secs() {
        return Err(Error::InvalidLifetime {
            preferred: preferred.as_secs(),
            valid: valid.as_secs(),
        });
    }
    Ok(())
}

impl<L, R, M> NdStack<L, R, M>
where
    L: LinkLayer,
    R: RoutingTable,
    M: MulticastGroups,
{
    // ========================================================================
    // Interface state
    // ========================================================================

    /// Bring IPv6 up on an interface: join all-nodes, start the reachability
    /// sweep and run DAD for any address that was waiting.
    pub fn enable_interface(&mut self, iface: IfIndex) -> Result<()> {
        let reachable = {
            let intf = self.intf_mut(iface)?;
            if intf.is_ipv6_up() {
                return Ok(());
            }
            intf.enabled = true;
            intf.ipv6_up = true;
            intf.config.reachable_time
        };
        info!(%iface, "IPv6 enabled");

        let intf = self.intf_mut(iface)?;
        let join_all_nodes = intf.config.multicast && !intf.all_nodes_joined;
        let loopback = intf.config.loopback;
        if join_all_nodes {
            intf.all_nodes_joined = true;
            if let Err(e) = self.groups.join(iface, ALL_NODES) {
                warn!(%iface, error = %e, "failed to join all-nodes group");
            }
        }
        if !loopback {
            let sweep = TimerKey::Sweep { iface };
            if !self.timers.is_armed(&sweep) {
                self.timers.arm(sweep, reachable);
            }
        }
        self.dad_resume(iface);
        Ok(())
    }

    /// React to a carrier change reported by the driver.
    pub fn link_changed(&mut self, iface: IfIndex, state: LinkState) {
        info!(%iface, state = state.name(), "link state changed");
        if state == LinkState::Up && self.interfaces.get(&iface).is_some_and(|i| i.is_ipv6_up()) {
            self.dad_resume(iface);
        }
    }

    /// Tear down an interface: every address, neighbor, router and timer.
    pub fn remove_interface(&mut self, iface: IfIndex) -> Result<()> {
        let intf = self.intf(iface)?;
        let addresses = intf.addresses.ids();
        let neighbors = intf.neighbors.ids();
        let routers: Vec<Ipv6Addr> = intf.routers.iter().copied().collect();
        let leave_all_nodes = intf.all_nodes_joined;

        for id in addresses {
            self.remove_address(iface, id);
        }
        for id in neighbors {
            self.delete_neighbor_entry(iface, id, RemovalReason::Deleted);
        }
        for router in routers {
            self.drop_default_router(iface, &router);
        }
        self.timers.disarm(&TimerKey::Sweep { iface });
        if leave_all_nodes && let Err(e) = self.groups.leave(iface, ALL_NODES) {
            warn!(%iface, error = %e, "failed to leave all-nodes group");
        }

        self.interfaces.remove(&iface);
        if self.loopback == Some(iface) {
            self.loopback = None;
        }
        info!(%iface, "interface removed");
        Ok(())
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Add an address to an interface.
    ///
    /// The address starts `Tentative` (unless `NO_DAD` or on loopback) and
    /// becomes usable once DAD finds it unique.
    pub fn add_address(&mut self, iface: IfIndex, config: AddressConfig) -> Result<AddressId> {
        let now = self.now();
        let lo = self.loopback;

        let mut config = config;
        config.prefix_len = match config.prefix_len {
            0 => AUTOCONF_PREFIX_LEN,
            len if len > 128 => return Err(Error::InvalidPrefix(len)),
            len => len,
        };
        check_lifetimes(config.preferred, config.valid)?;

        let (is_loopback_dev, multicast) = {
            let intf = self.intf(iface)?;
            if intf.addresses.find(&config.addr).is_some() {
                return Err(Error::AddressExists { addr: config.addr });
            }
            (intf.config.loopback, intf.config.multicast)
        };

        let id = self.next_address_id();
        let mut entry = InterfaceAddress::new(id, &config, now);
        let skip_dad = is_loopback_dev
            || config.flags.contains(AddressFlags::NO_DAD)
            || config.flags.contains(AddressFlags::ANYCAST);
        if skip_dad {
            entry.state = if entry.preferred_elapsed(now) {
                AddressState::Deprecated
            } else {
                AddressState::Active
            };
        }
        let addr = config.addr;
        self.intf_mut(iface)?.addresses.insert(entry);
        info!(%iface, %addr, prefix_len = config.prefix_len, flags = ?config.flags, "address added");

        if let Some(d) = config.preferred.duration() {
            self.timers.arm(TimerKey::Deprecate { iface, addr: id }, d);
        }
        if let Some(d) = config.valid.duration() {
            self.timers.arm(TimerKey::Expire { iface, addr: id }, d);
        }

        if config.prefix_len < 128 {
            self.install_route(Route::on_link(addr, config.prefix_len, addr, iface));
        }
        if !is_loopback_dev && let Some(lo) = lo {
            self.install_route(Route::local(addr, lo));
        }

        if is_loopback_dev {
            self.address_ready(iface, id);
        } else if multicast && config.flags.contains(AddressFlags::DELAYED_MULTICAST_JOIN) {
            let delay = random_delay(&mut self.rng, self.config.max_rtr_solicitation_delay);
            debug!(%iface, %addr, ?delay, "delaying solicited-node join");
            self.timers.arm(TimerKey::Join { iface, addr: id }, delay);
        } else {
            self.join_solicited_node(iface, id);
            self.begin_verification(iface, id);
        }
        Ok(id)
    }

    /// Manually attach an address, bringing the interface up first.
    pub fn attach_address(
        &mut self,
        iface: IfIndex,
        addr: Ipv6Addr,
        prefix_len: u8,
    ) -> Result<AddressId> {
        self.enable_interface(iface)?;
        self.add_address(iface, AddressConfig::new(addr, prefix_len))
    }

    /// Bring the interface up and configure its link-local address
    /// (`fe80::/64` plus the interface identifier). Loopback gets `::1`.
    pub fn autoconfigure(&mut self, iface: IfIndex) -> Result<AddressId> {
        self.enable_interface(iface)?;
        let intf = self.intf(iface)?;
        let (addr, config) = if intf.config.loopback {
            let addr = Ipv6Addr::LOCALHOST;
            (addr, AddressConfig::new(addr, 128))
        } else {
            let addr = link_local(&intf.config.interface_id);
            let config = AddressConfig::new(addr, AUTOCONF_PREFIX_LEN)
                .flags(AddressFlags::STATELESS_AUTO)
                .delayed_join();
            (addr, config)
        };
        if let Some(existing) = intf.addresses.find(&addr) {
            return Ok(existing.id());
        }
        self.add_address(iface, config)
    }

    /// Form an address from an advertised prefix and the interface
    /// identifier. An existing address gets its lifetimes refreshed.
    pub fn add_address_from_prefix(
        &mut self,
        iface: IfIndex,
        prefix: Ipv6Addr,
        prefix_len: u8,
        preferred: Lifetime,
        valid: Lifetime,
    ) -> Result<AddressId> {
        if usize::from(prefix_len) + INTERFACE_ID_LEN * 8 > 128 {
            return Err(Error::InvalidPrefix(prefix_len));
        }
        check_lifetimes(preferred, valid)?;

        let intf = self.intf(iface)?;
        let iid = intf.config.interface_id;
        let own_link_local = link_local(&iid);
        if intf
            .addresses
            .find(&own_link_local)
            .is_some_and(|a| a.state() == AddressState::Duplicated)
        {
            warn!(%iface, "interface identifier is duplicated, not forming address");
            return Err(Error::DuplicateInterfaceId(iface));
        }

        let addr = with_interface_id(&prefix, prefix_len, &iid);
        if let Some(id) = intf.addresses.find(&addr).map(|a| a.id()) {
            self.update_lifetimes(iface, &addr, Some(preferred), Some(valid))?;
            return Ok(id);
        }
        self.add_address(
            iface,
            AddressConfig::new(addr, prefix_len)
                .preferred(preferred)
                .valid(valid)
                .flags(AddressFlags::STATELESS_AUTO)
                .delayed_join(),
        )
    }

    /// Replace an address's lifetimes. `None` keeps the remaining time of
    /// that lifetime. A renewed preferred lifetime reactivates a deprecated
    /// address.
    pub fn update_lifetimes(
        &mut self,
        iface: IfIndex,
        addr: &Ipv6Addr,
        preferred: Option<Lifetime>,
        valid: Option<Lifetime>,
    ) -> Result<()> {
        let now = self.now();
        let intf = self.intf_mut(iface)?;
        let entry = intf
            .addresses
            .find(addr)
            .map(|a| a.id())
            .and_then(|id| intf.addresses.get_mut(id))
            .ok_or(Error::AddressNotFound { addr: *addr })?;

        let elapsed = now.saturating_sub(entry.lifetimes_from);
        let preferred = preferred.unwrap_or_else(|| remaining(entry.preferred, elapsed));
        let valid = valid.unwrap_or_else(|| remaining(entry.valid, elapsed));
        check_lifetimes(preferred, valid)?;

        entry.preferred = preferred;
        entry.valid = valid;
        entry.lifetimes_from = now;
        let id = entry.id;
        if entry.state == AddressState::Deprecated && preferred.as_secs() > 0 {
            entry.state = AddressState::Active;
            debug!(%iface, %addr, "deprecated address reactivated");
        }
        debug!(%iface, %addr, %preferred, %valid, "lifetimes updated");

        let deprecate = TimerKey::Deprecate { iface, addr: id };
        match preferred.duration() {
            Some(d) => self.timers.arm(deprecate, d),
            None => {
                self.timers.disarm(&deprecate);
            }
        }
        let expire = TimerKey::Expire { iface, addr: id };
        match valid.duration() {
            Some(d) => self.timers.arm(expire, d),
            None => {
                self.timers.disarm(&expire);
            }
        }
        Ok(())
    }

    fn install_route(&mut self, route: Route) {
        if let Err(e) = self.routes.add_route(route) {
            warn!(%route, error = %e, "failed to install route");
        }
    }

    fn join_solicited_node(&mut self, iface: IfIndex, id: AddressId) {
        let Some(intf) = self.interfaces.get_mut(&iface) else {
            return;
        };
        let multicast = intf.config.multicast;
        let Some(entry) = intf.addresses.get_mut(id) else {
            return;
        };
        if entry.joined {
            return;
        }
        entry.joined = true;
        let group = solicited_node(&entry.addr);
        if multicast && let Err(e) = self.groups.join(iface, group) {
            warn!(%iface, %group, error = %e, "failed to join solicited-node group");
        }
    }

    /// Start DAD for a freshly joined address and follow it with the
    /// verification timer.
    fn begin_verification(&mut self, iface: IfIndex, id: AddressId) {
        self.dad_start(iface, id);
        let Some(intf) = self.interfaces.get(&iface) else {
            return;
        };
        let retrans = intf.config.retrans_timer;
        match intf.addresses.get(id).map(|a| a.state) {
            Some(AddressState::Tentative) => {
                self.timers.arm(TimerKey::Verify { iface, addr: id }, retrans);
            }
            Some(state) if state.is_usable() => self.address_ready(iface, id),
            _ => {}
        }
    }

    // ========================================================================
    // Timers
    // ========================================================================

    pub(crate) fn delayed_join(&mut self, iface: IfIndex, id: AddressId) {
        if self
            .interfaces
            .get(&iface)
            .and_then(|i| i.addresses.get(id))
            .is_none()
        {
            return;
        }
        self.join_solicited_node(iface, id);
        self.begin_verification(iface, id);
    }

    pub(crate) fn deprecate_address(&mut self, iface: IfIndex, id: AddressId) {
        let Some(entry) = self
            .interfaces
            .get_mut(&iface)
            .and_then(|i| i.addresses.get_mut(id))
        else {
            return;
        };
        if entry.state != AddressState::Active {
            return;
        }
        entry.state = AddressState::Deprecated;
        let addr = entry.addr;
        info!(%iface, %addr, "preferred lifetime expired, address deprecated");
        self.emit(NdEvent::AddressDeprecated { iface, addr });
    }

    pub(crate) fn expire_address(&mut self, iface: IfIndex, id: AddressId) {
        if let Some(entry) = self
            .interfaces
            .get(&iface)
            .and_then(|i| i.addresses.get(id))
        {
            info!(%iface, addr = %entry.addr, "valid lifetime expired");
            self.remove_address(iface, id);
        }
    }

    /// Secondary check of an address after DAD had its chance.
    pub(crate) fn verify_address(&mut self, iface: IfIndex, id: AddressId) {
        let Some(intf) = self.interfaces.get_mut(&iface) else {
            return;
        };
        let retrans = intf.config.retrans_timer;
        let limit = intf.config.dad_transmits;
        let in_session = intf.dad.contains_key(&id);
        let Some(entry) = intf.addresses.get_mut(id) else {
            return;
        };
        match entry.state {
            AddressState::Duplicated => {
                info!(%iface, addr = %entry.addr, "removing duplicated address");
                self.remove_address(iface, id);
            }
            AddressState::Tentative => {
                entry.verify_retries = entry.verify_retries.saturating_add(1);
                if entry.verify_retries <= limit || in_session {
                    self.timers.arm(TimerKey::Verify { iface, addr: id }, retrans);
                } else {
                    warn!(%iface, addr = %entry.addr, "address still tentative after verification");
                }
            }
            AddressState::Active | AddressState::Deprecated => self.address_ready(iface, id),
            AddressState::Detached => {}
        }
    }

    // ========================================================================
    // Terminal outcomes
    // ========================================================================

    /// The address is usable: make sure its group is joined, announce it
    /// and ask for routers once the link-local address is up.
    pub(crate) fn address_ready(&mut self, iface: IfIndex, id: AddressId) {
        self.join_solicited_node(iface, id);
        let Some(intf) = self.interfaces.get_mut(&iface) else {
            return;
        };
        let solicit_routers = !intf.config.router && !intf.config.loopback;
        let iid = intf.config.interface_id;
        let Some(entry) = intf.addresses.get_mut(id) else {
            return;
        };
        if entry.ready || !entry.state.is_usable() {
            return;
        }
        entry.ready = true;
        let addr = entry.addr;
        let canonical = entry.is_canonical_link_local(&iid);
        self.timers.disarm(&TimerKey::Verify { iface, addr: id });

        debug!(%iface, %addr, "address ready");
        self.emit(NdEvent::AddressReady { iface, addr });
        if canonical && solicit_routers {
            self.emit(NdEvent::RouterSolicitation { iface });
        }
    }

    /// Another node holds the address. Losing the interface's own
    /// link-local address takes IPv6 down on it; the address itself goes
    /// away when the verification timer runs.
    pub(crate) fn address_duplicated(&mut self, iface: IfIndex, id: AddressId) {
        let Some(intf) = self.interfaces.get_mut(&iface) else {
            return;
        };
        let retrans = intf.config.retrans_timer;
        let iid = intf.config.interface_id;
        let Some(entry) = intf.addresses.get(id) else {
            return;
        };
        let addr = entry.addr;
        let dhcp = entry.flags.contains(AddressFlags::DHCP_ASSIGNED);
        let canonical = entry.is_canonical_link_local(&iid);

        self.emit(NdEvent::AddressDuplicated { iface, addr });
        if dhcp {
            self.emit(NdEvent::DhcpDecline { iface, addr });
        }
        if canonical && let Some(intf) = self.interfaces.get_mut(&iface) {
            intf.ipv6_up = false;
            error!(%iface, %addr, "link-local address is duplicated, disabling IPv6");
            self.emit(NdEvent::InterfaceDisabled { iface });
        }
        self.timers.arm(TimerKey::Verify { iface, addr: id }, retrans);
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    /// Delete an address and everything that depends on it.
    pub fn delete_address(&mut self, iface: IfIndex, addr: &Ipv6Addr) -> Result<()> {
        let id = self
            .intf(iface)?
            .addresses
            .find(addr)
            .map(|a| a.id())
            .ok_or(Error::AddressNotFound { addr: *addr })?;
        self.remove_address(iface, id);
        Ok(())
    }

    pub(crate) fn remove_address(&mut self, iface: IfIndex, id: AddressId) -> bool {
        self.dad_stop(iface, id);
        for key in [
            TimerKey::Verify { iface, addr: id },
            TimerKey::Join { iface, addr: id },
            TimerKey::Deprecate { iface, addr: id },
            TimerKey::Expire { iface, addr: id },
        ] {
            self.timers.disarm(&key);
        }

        let lo = self.loopback;
        let Some(intf) = self.interfaces.get_mut(&iface) else {
            return false;
        };
        let multicast = intf.config.multicast;
        let Some(entry) = intf.addresses.get_mut(id) else {
            return false;
        };
        let addr = entry.addr;
        let joined = entry.joined;
        let release = entry.flags.contains(AddressFlags::DHCP_ASSIGNED)
            && entry.state != AddressState::Duplicated;
        entry.state = AddressState::Detached;

        if joined && multicast {
            let group = solicited_node(&addr);
            if let Err(e) = self.groups.leave(iface, group) {
                warn!(%iface, %group, error = %e, "failed to leave solicited-node group");
            }
        }

        let removed = self.remove_address_routes(iface, &addr, lo);
        debug!(%iface, %addr, routes = removed, "address routes removed");

        if release {
            self.emit(NdEvent::DhcpRelease { iface, addr });
        }
        if let Some(intf) = self.interfaces.get_mut(&iface) {
            intf.addresses.remove(id);
        }
        info!(%iface, %addr, "address removed");
        self.emit(NdEvent::AddressRemoved { iface, addr });
        true
    }

    /// Remove the routes owned by `addr`, then every gateway route left
    /// without an on-link path to its gateway. Returns how many were removed.
    fn remove_address_routes(&mut self, iface: IfIndex, addr: &Ipv6Addr, lo: Option<IfIndex>) -> usize {
        let mut removed = self.routes.delete_routes_by_gateway(iface, addr);
        if let Some(lo) = lo
            && lo != iface
        {
            let host = Route::local(*addr, lo);
            if self.routes.delete_route(&host) {
                removed.push(host);
            }
        }

        let mut count = removed.len();
        let mut work = removed;
        while let Some(gone) = work.pop() {
            let table = self.routes.routes();
            let orphans: Vec<Route> = table
                .iter()
                .filter(|r| {
                    r.is_gateway()
                        && r.iface == gone.iface
                        && !r.next_hop.is_unicast_link_local()
                        && gone.covers(&r.next_hop)
                        && !table.iter().any(|o| {
                            !o.is_gateway() && o.iface == r.iface && o.covers(&r.next_hop)
                        })
                })
                .copied()
                .collect();
            for route in orphans {
                if self.routes.delete_route(&route) {
                    debug!(%route, "removing route through lost prefix");
                    count += 1;
                    work.push(route);
                }
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ndp::config::{InterfaceConfig, StackConfig};
    use crate::ndp::fixtures::{RecordingLink, addr, eth_config, eth_stack, lo_eth_stack};
    use crate::ndp::route::RouteKind;

    #[test]
    fn test_add_installs_routes() {
        let (mut stack, lo, eth0) = lo_eth_stack();
        let a = addr("2001:db8::10");
        stack.add_address(eth0, AddressConfig::new(a, 64)).unwrap();

        let routes = stack.routes().routes();
        assert!(routes.contains(&Route::on_link(a, 64, a, eth0)));
        assert!(routes.contains(&Route::local(a, lo)));
    }

    #[test]
    fn test_host_address_has_no_prefix_route() {
        let (mut stack, _lo, eth0) = lo_eth_stack();
        stack
            .add_address(eth0, AddressConfig::new(addr("2001:db8::10"), 128))
            .unwrap();
        assert!(
            stack
                .routes()
                .routes()
                .iter()
                .all(|r| r.kind != RouteKind::OnLink)
        );
    }

    #[test]
    fn test_loopback_address_active_immediately() {
        let (mut stack, lo, _eth0) = lo_eth_stack();
        stack.enable_interface(lo).unwrap();
        let id = stack.autoconfigure(lo).unwrap();
        let entry = stack.interface(lo).unwrap().addresses().get(id).unwrap();
        assert_eq!(entry.state(), AddressState::Active);
        assert!(entry.is_ready());
        assert!(stack.routes().routes().iter().all(|r| r.kind != RouteKind::Local));
    }

    #[test]
    fn test_rejects_bad_requests() {
        let (mut stack, eth0) = eth_stack();
        let a = addr("2001:db8::10");
        assert!(matches!(
            stack.add_address(eth0, AddressConfig::new(a, 129)),
            Err(Error::InvalidPrefix(129))
        ));
        assert!(matches!(
            stack.add_address(
                eth0,
                AddressConfig::new(a, 64)
                    .preferred(Lifetime::Seconds(20))
                    .valid(Lifetime::Seconds(10))
            ),
            Err(Error::InvalidLifetime { .. })
        ));
        stack.add_address(eth0, AddressConfig::new(a, 64)).unwrap();
        assert!(
            stack
                .add_address(eth0, AddressConfig::new(a, 64))
                .unwrap_err()
                .is_already_exists()
        );
    }

    #[test]
    fn test_zero_prefix_means_interface_id_length() {
        let (mut stack, eth0) = eth_stack();
        let a = addr("2001:db8::10");
        stack.add_address(eth0, AddressConfig::new(a, 0)).unwrap();
        assert_eq!(stack.address(eth0, &a).unwrap().prefix_len(), 64);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (mut stack, lo, eth0) = lo_eth_stack();
        let a = addr("2001:db8::10");
        let b = addr("2001:db8:1::20");
        stack.add_address(eth0, AddressConfig::new(a, 64)).unwrap();
        stack.add_address(eth0, AddressConfig::new(b, 64)).unwrap();
        let before = stack.routes().routes().len();

        stack.delete_address(eth0, &a).unwrap();
        let after_first = stack.routes().routes();
        assert_eq!(after_first.len(), before - 2);
        assert!(after_first.contains(&Route::local(b, lo)));

        assert!(stack.delete_address(eth0, &a).unwrap_err().is_not_found());
        assert_eq!(stack.routes().routes(), after_first);
    }

    #[test]
    fn test_delete_removes_second_order_routes() {
        let (mut stack, eth0) = eth_stack();
        let a = addr("2001:db8::10");
        stack.add_address(eth0, AddressConfig::new(a, 64)).unwrap();
        let gw = addr("2001:db8::1");
        let via_gw = Route::via(addr("2001:db8:5::"), 48, gw, eth0);
        let via_via = Route::via(addr("2001:db8:5::"), 64, addr("2001:db8:5::1"), eth0);
        stack.routes_mut().add_route(via_gw).unwrap();
        stack.routes_mut().add_route(via_via).unwrap();
        let unrelated = Route::via(Ipv6Addr::UNSPECIFIED, 0, addr("fe80::1"), eth0);
        stack.routes_mut().add_route(unrelated).unwrap();

        stack.delete_address(eth0, &a).unwrap();
        let routes = stack.routes().routes();
        assert!(!routes.contains(&via_gw));
        assert!(!routes.contains(&via_via));
        assert!(routes.contains(&unrelated));
    }

    #[test]
    fn test_delete_stops_timers_and_leaves_group() {
        let (mut stack, eth0) = eth_stack();
        let a = addr("2001:db8::10");
        let id = stack
            .add_address(
                eth0,
                AddressConfig::new(a, 64)
                    .preferred(Lifetime::Seconds(100))
                    .valid(Lifetime::Seconds(200)),
            )
            .unwrap();
        assert!(stack.groups().is_member(eth0, &solicited_node(&a)));

        stack.delete_address(eth0, &a).unwrap();
        for key in [
            TimerKey::Dad { iface: eth0, addr: id },
            TimerKey::Verify { iface: eth0, addr: id },
            TimerKey::Deprecate { iface: eth0, addr: id },
            TimerKey::Expire { iface: eth0, addr: id },
        ] {
            assert!(!stack.timers().is_armed(&key));
        }
        assert!(!stack.groups().is_member(eth0, &solicited_node(&a)));
        assert!(stack.interface(eth0).unwrap().dad_session(id).is_none());
    }

    #[test]
    fn test_lifetimes_deprecate_then_expire() {
        let (mut stack, eth0) = eth_stack();
        let a = addr("2001:db8::10");
        stack
            .add_address(
                eth0,
                AddressConfig::new(a, 64)
                    .preferred(Lifetime::Seconds(10))
                    .valid(Lifetime::Seconds(20)),
            )
            .unwrap();
        stack.advance_by(Duration::from_secs(10));
        assert_eq!(stack.address(eth0, &a).unwrap().state(), AddressState::Deprecated);

        stack.advance_by(Duration::from_secs(10));
        assert!(stack.address(eth0, &a).is_none());
        assert!(
            stack
                .take_events()
                .contains(&NdEvent::AddressRemoved { iface: eth0, addr: a })
        );
    }

    #[test]
    fn test_update_lifetimes_reactivates() {
        let (mut stack, eth0) = eth_stack();
        let a = addr("2001:db8::10");
        stack
            .add_address(
                eth0,
                AddressConfig::new(a, 64)
                    .preferred(Lifetime::Seconds(5))
                    .valid(Lifetime::Seconds(50)),
            )
            .unwrap();
        stack.advance_by(Duration::from_secs(6));
        assert_eq!(stack.address(eth0, &a).unwrap().state(), AddressState::Deprecated);

        stack
            .update_lifetimes(eth0, &a, Some(Lifetime::Seconds(30)), None)
            .unwrap();
        let entry = stack.address(eth0, &a).unwrap();
        assert_eq!(entry.state(), AddressState::Active);
        assert_eq!(entry.valid(), Lifetime::Seconds(44));
    }

    #[test]
    fn test_autoconfigure_link_local() {
        let (mut stack, eth0) = eth_stack();
        let id = stack.autoconfigure(eth0).unwrap();
        let iid = stack.interface(eth0).unwrap().config().interface_id;
        let entry = stack.interface(eth0).unwrap().addresses().get(id).unwrap();
        assert_eq!(entry.addr(), link_local(&iid));
        assert!(entry.flags().contains(AddressFlags::STATELESS_AUTO));

        // Join delay is at most one second, then one DAD interval.
        stack.advance_by(Duration::from_secs(3));
        let events = stack.take_events();
        assert!(events.contains(&NdEvent::AddressReady {
            iface: eth0,
            addr: link_local(&iid)
        }));
        assert!(events.contains(&NdEvent::RouterSolicitation { iface: eth0 }));
    }

    #[test]
    fn test_join_delay_follows_seed() {
        fn join_delay(seed: u64) -> Duration {
            let config = StackConfig::new().random_seed(seed);
            let mut stack = NdStack::new(config, RecordingLink::new());
            let eth0 = stack.add_interface(eth_config("eth0", 1));
            stack.enable_interface(eth0).unwrap();
            let id = stack.autoconfigure(eth0).unwrap();
            stack
                .timers
                .remaining(&TimerKey::Join { iface: eth0, addr: id })
                .unwrap()
        }

        let delay = join_delay(9);
        assert!(delay <= StackConfig::new().max_rtr_solicitation_delay);
        assert_eq!(join_delay(9), delay);
    }

    #[test]
    fn test_verification_gives_up_without_dad_session() {
        let (mut stack, eth0) = eth_stack();
        stack.config.max_dad_sessions = 0;
        let a = addr("2001:db8::10");
        let id = stack.add_address(eth0, AddressConfig::new(a, 64)).unwrap();
        let verify = TimerKey::Verify { iface: eth0, addr: id };
        assert!(stack.interface(eth0).unwrap().dad_session(id).is_none());
        assert!(stack.timers.is_armed(&verify));

        // One retry per DAD transmission, then the timer stays quiet.
        stack.advance_by(Duration::from_secs(1));
        assert!(stack.timers.is_armed(&verify));
        stack.advance_by(Duration::from_secs(1));
        assert!(!stack.timers.is_armed(&verify));

        stack.advance_by(Duration::from_secs(10));
        let entry = stack.address(eth0, &a).unwrap();
        assert_eq!(entry.state(), AddressState::Tentative);
        assert_eq!(entry.verify_retries, 2);
        assert!(
            !stack
                .take_events()
                .iter()
                .any(|e| matches!(e, NdEvent::AddressReady { .. }))
        );
    }

    #[test]
    fn test_from_prefix_refreshes_existing() {
        let (mut stack, eth0) = eth_stack();
        let prefix = addr("2001:db8:1::");
        let first = stack
            .add_address_from_prefix(
                eth0,
                prefix,
                64,
                Lifetime::Seconds(100),
                Lifetime::Seconds(200),
            )
            .unwrap();
        let again = stack
            .add_address_from_prefix(
                eth0,
                prefix,
                64,
                Lifetime::Seconds(300),
                Lifetime::Seconds(400),
            )
            .unwrap();
        assert_eq!(first, again);
        let entry = stack.interface(eth0).unwrap().addresses().get(first).unwrap();
        assert_eq!(entry.valid(), Lifetime::Seconds(400));

        assert!(matches!(
            stack.add_address_from_prefix(eth0, prefix, 80, Lifetime::Infinite, Lifetime::Infinite),
            Err(Error::InvalidPrefix(80))
        ));
    }

    #[test]
    fn test_from_prefix_refused_after_link_local_duplicate() {
        let (mut stack, eth0) = eth_stack();
        let iid = stack.interface(eth0).unwrap().config().interface_id;
        let ll = link_local(&iid);
        let id = stack.add_address(eth0, AddressConfig::new(ll, 64)).unwrap();
        stack.dad_duplicated(eth0, id);

        assert!(!stack.interface(eth0).unwrap().is_ipv6_up());
        assert!(matches!(
            stack.add_address_from_prefix(
                eth0,
                addr("2001:db8::"),
                64,
                Lifetime::Infinite,
                Lifetime::Infinite
            ),
            Err(Error::DuplicateInterfaceId(_))
        ));
    }

    #[test]
    fn test_duplicate_removed_by_verification() {
        let (mut stack, eth0) = eth_stack();
        let a = addr("2001:db8::10");
        let id = stack
            .add_address(
                eth0,
                AddressConfig::new(a, 64).flags(AddressFlags::DHCP_ASSIGNED),
            )
            .unwrap();
        stack.dad_duplicated(eth0, id);
        assert_eq!(stack.address(eth0, &a).unwrap().state(), AddressState::Duplicated);

        stack.advance_by(Duration::from_secs(1));
        assert!(stack.address(eth0, &a).is_none());
        let events = stack.take_events();
        assert!(events.contains(&NdEvent::DhcpDecline { iface: eth0, addr: a }));
        assert!(!events.contains(&NdEvent::DhcpRelease { iface: eth0, addr: a }));
    }

    #[test]
    fn test_dhcp_release_on_delete() {
        let (mut stack, eth0) = eth_stack();
        let a = addr("2001:db8::10");
        stack
            .add_address(
                eth0,
                AddressConfig::new(a, 64).flags(AddressFlags::DHCP_ASSIGNED),
            )
            .unwrap();
        stack.delete_address(eth0, &a).unwrap();
        assert!(
            stack
                .take_events()
                .contains(&NdEvent::DhcpRelease { iface: eth0, addr: a })
        );
    }

    #[test]
    fn test_remove_interface() {
        let (mut stack, eth0) = eth_stack();
        stack
            .add_address(eth0, AddressConfig::new(addr("2001:db8::10"), 64))
            .unwrap();
        stack.remove_interface(eth0).unwrap();
        assert!(stack.interface(eth0).is_none());
        assert!(stack.routes().routes().is_empty());
        assert_eq!(stack.timers().len(), 0);
        assert!(stack.groups().groups(eth0).is_empty());
    }

    #[test]
    fn test_attach_enables_interface() {
        let mut stack = crate::ndp::fixtures::stack();
        let eth1 = stack.add_interface(InterfaceConfig::ethernet(
            "eth1",
            crate::ndp::fixtures::mac(7),
        ));
        stack.attach_address(eth1, addr("2001:db8::7"), 64).unwrap();
        assert!(stack.interface(eth1).unwrap().is_ipv6_up());
        assert_eq!(stack.link_mut().solicitations().len(), 1);
    }
}
