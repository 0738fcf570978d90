//! Routing table collaborator.
//!
//! The stack installs and removes routes as addresses and neighbors come
//! and go, and consults the table for next-hop determination. Any routing
//! implementation can be plugged in through [`RoutingTable`]; [`RouteTable`]
//! is a plain in-memory longest-prefix-match table.
//!
//! # Example
//!
//! ```
//! use ndisc::ndp::route::{Route, RouteTable, RoutingTable};
//! use ndisc::ndp::IfIndex;
//!
//! let eth0 = IfIndex::new(1);
//! let mut table = RouteTable::new();
//! table.add_route(Route::via("::".parse().unwrap(), 0, "fe80::1".parse().unwrap(), eth0)).unwrap();
//!
//! let route = table.find_route(&"2001:db8::5".parse().unwrap()).unwrap();
//! assert!(route.is_gateway());
//! ```

use std::fmt;
use std::net::Ipv6Addr;

use super::error::Result;
use super::interface::IfIndex;
use super::types::link::{mask, prefix_contains};

/// What kind of next hop a route uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    /// Destinations are on-link; `next_hop` is the local address owning the prefix.
    OnLink,
    /// Host route to a local address through the loopback interface.
    Local,
    /// Destinations are reached through the router in `next_hop`.
    Gateway,
}

impl RouteKind {
    /// Get the name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            RouteKind::OnLink => "onlink",
            RouteKind::Local => "local",
            RouteKind::Gateway => "gateway",
        }
    }
}

/// A route entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Route {
    /// Destination prefix.
    pub destination: Ipv6Addr,
    /// Prefix length.
    pub prefix_len: u8,
    /// Gateway, local address or loopback address, depending on `kind`.
    pub next_hop: Ipv6Addr,
    /// Outgoing interface.
    pub iface: IfIndex,
    /// Route kind.
    pub kind: RouteKind,
}

impl Route {
    /// On-link prefix route owned by `local`.
    pub fn on_link(prefix: Ipv6Addr, prefix_len: u8, local: Ipv6Addr, iface: IfIndex) -> Self {
        Self {
            destination: mask(&prefix, prefix_len),
            prefix_len,
            next_hop: local,
            iface,
            kind: RouteKind::OnLink,
        }
    }

    /// Host route delivering `addr` through the loopback interface.
    pub fn local(addr: Ipv6Addr, loopback: IfIndex) -> Self {
        Self {
            destination: addr,
            prefix_len: 128,
            next_hop: Ipv6Addr::LOCALHOST,
            iface: loopback,
            kind: RouteKind::Local,
        }
    }

    /// Route to `destination/prefix_len` through `gateway`.
    pub fn via(destination: Ipv6Addr, prefix_len: u8, gateway: Ipv6Addr, iface: IfIndex) -> Self {
        Self {
            destination: mask(&destination, prefix_len),
            prefix_len,
            next_hop: gateway,
            iface,
            kind: RouteKind::Gateway,
        }
    }

    /// Check if the route goes through a router.
    pub fn is_gateway(&self) -> bool {
        self.kind == RouteKind::Gateway
    }

    /// Check if `addr` is covered by this route.
    pub fn covers(&self, addr: &Ipv6Addr) -> bool {
        prefix_contains(&self.destination, self.prefix_len, addr)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.destination, self.prefix_len)?;
        match self.kind {
            RouteKind::Gateway => write!(f, " via {}", self.next_hop)?,
            RouteKind::OnLink => write!(f, " src {}", self.next_hop)?,
            RouteKind::Local => f.write_str(" local")?,
        }
        write!(f, " dev {}", self.iface)
    }
}

/// Routing table operations used by the stack.
pub trait RoutingTable {
    /// Install a route. Installing an identical route again is not an error.
    fn add_route(&mut self, route: Route) -> Result<()>;

    /// Remove one exact route. Returns whether it existed.
    fn delete_route(&mut self, route: &Route) -> bool;

    /// Remove every route on `iface` whose next hop is `gateway`.
    /// Returns the removed routes.
    fn delete_routes_by_gateway(&mut self, iface: IfIndex, gateway: &Ipv6Addr) -> Vec<Route>;

    /// Longest-prefix match for `destination`.
    fn find_route(&self, destination: &Ipv6Addr) -> Option<Route>;

    /// Snapshot of all routes.
    fn routes(&self) -> Vec<Route>;
}

/// In-memory routing table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Check if an exact route is installed.
    pub fn contains(&self, route: &Route) -> bool {
        self.routes.contains(route)
    }

    /// Iterate over installed routes.
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }
}

impl RoutingTable for RouteTable {
    fn add_route(&mut self, route: Route) -> Result<()> {
        if !self.routes.contains(&route) {
            self.routes.push(route);
        }
        Ok(())
    }

    fn delete_route(&mut self, route: &Route) -> bool {
        let before = self.routes.len();
        self.routes.retain(|r| r != route);
        self.routes.len() != before
    }

    fn delete_routes_by_gateway(&mut self, iface: IfIndex, gateway: &Ipv6Addr) -> Vec<Route> {
        let (removed, kept): (Vec<Route>, Vec<Route>) = self
            .routes
            .drain(..)
            .partition(|r| r.iface == iface && r.next_hop == *gateway);
        self.routes = kept;
        removed
    }

    fn find_route(&self, destination: &Ipv6Addr) -> Option<Route> {
        self.routes
            .iter()
            .filter(|r| r.covers(destination))
            .fold(None, |best: Option<&Route>, r| match best {
                Some(b) if b.prefix_len >= r.prefix_len => Some(b),
                _ => Some(r),
            })
            .copied()
    }

    fn routes(&self) -> Vec<Route> {
        self.routes.clone()
    }
}
