//! Strongly-typed address, link and state definitions.

pub mod link;
pub mod state;

pub use link::{ALL_NODES, ALL_ROUTERS, INTERFACE_ID_LEN, LinkAddr, Scope, solicited_node};
pub use state::{AddressFlags, AddressState, INFINITY_LIFE_TIME, Lifetime, NeighborState};
