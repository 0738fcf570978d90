//! IPv6 Neighbor Discovery for a single node.
//!
//! This module implements the host side of Neighbor Discovery over
//! pluggable link-layer, routing and multicast collaborators: Duplicate
//! Address Detection, Neighbor Unreachability Detection, Address Resolution
//! with a bounded per-interface neighbor cache, and the address lifecycle
//! (tentative, active, deprecated, removed).
//!
//! # Quick Start
//!
//! ```ignore
//! use ndisc::ndp::{AddressConfig, InterfaceConfig, NdStack, StackConfig};
//! use std::time::Duration;
//!
//! let mut stack = NdStack::new(StackConfig::new(), driver);
//! let eth0 = stack.add_interface(InterfaceConfig::ethernet("eth0", mac));
//! stack.enable_interface(eth0)?;
//! stack.autoconfigure(eth0)?;
//!
//! // Drive timers from a clock of your choice...
//! stack.advance_by(Duration::from_millis(100));
//!
//! // ...or hand the stack to a tokio task.
//! let (handle, _task) = ndisc::ndp::worker::spawn(stack);
//! ```
//!
//! # Sending
//!
//! ```ignore
//! use ndisc::ndp::Resolution;
//!
//! match stack.send(eth0, packet)? {
//!     Resolution::Resolved(mac) => println!("sent to {mac}"),
//!     Resolution::Pending => println!("queued until the neighbor answers"),
//! }
//! ```

pub mod address;
pub mod arena;
pub mod config;
mod dad;
mod error;
pub mod event;
#[cfg(test)]
mod fixtures;
mod input;
pub mod interface;
mod lifecycle;
pub mod link;
pub mod multicast;
pub mod neighbor;
mod nud;
mod resolve;
pub mod route;
mod stack;
pub mod timer;
pub mod types;
pub mod wire;
pub mod worker;

pub use address::{AddressConfig, AddressId, AddressTable, InterfaceAddress};
pub use config::{InterfaceConfig, StackConfig};
pub use dad::DadRecord;
pub use error::{Error, Result};
pub use event::{EventStream, NdEvent, RemovalReason};
pub use interface::{DefaultRouterList, IfIndex, Interface, InterfaceStats};
pub use lifecycle::AUTOCONF_PREFIX_LEN;
pub use link::{LinkLayer, LinkState};
pub use multicast::{GroupTable, MulticastGroups};
pub use neighbor::{NeighborCache, NeighborEntry, NeighborId};
pub use resolve::Resolution;
pub use route::{Route, RouteKind, RouteTable, RoutingTable};
pub use stack::NdStack;
pub use types::{
    AddressFlags, AddressState, LinkAddr, Lifetime, NeighborState, Scope, solicited_node,
};
pub use worker::WorkerHandle;
