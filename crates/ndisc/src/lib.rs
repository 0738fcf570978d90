//! IPv6 Neighbor Discovery for embedded and user-space network stacks.
//!
//! This crate implements the host side of IPv6 Neighbor Discovery: Duplicate
//! Address Detection, Neighbor Unreachability Detection, Address Resolution
//! and the interface address lifecycle. The protocol engine is a plain
//! synchronous state machine driven by packet input, management calls and a
//! virtual clock; the link layer, routing table and multicast membership are
//! traits you implement (or take the in-memory defaults).
//!
//! # Features
//!
//! - `output` - JSON/text output formatting
//! - `lab` - In-memory Ethernet segment implementing `LinkLayer`
//! - `full` - All features enabled
//!
//! # Example
//!
//! ```ignore
//! use ndisc::ndp::{AddressConfig, InterfaceConfig, NdStack, StackConfig};
//!
//! #[tokio::main]
//! async fn main() -> ndisc::Result<()> {
//!     let mut stack = NdStack::new(StackConfig::new(), driver);
//!     let eth0 = stack.add_interface(InterfaceConfig::ethernet("eth0", mac));
//!     stack.enable_interface(eth0)?;
//!
//!     let (handle, _task) = ndisc::ndp::worker::spawn(stack);
//!     let addr = "2001:db8::10".parse().expect("valid address");
//!     handle.add_address(eth0, AddressConfig::new(addr, 64)).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Event Monitoring
//!
//! ```ignore
//! use ndisc::ndp::NdEvent;
//! use tokio_stream::StreamExt;
//!
//! let mut events = handle.subscribe()?;
//! while let Some(event) = events.next().await {
//!     match event {
//!         NdEvent::AddressReady { addr, .. } => println!("{addr} ready"),
//!         NdEvent::NeighborResolved { addr, link_addr, .. } => {
//!             println!("{addr} is at {link_addr}")
//!         }
//!         _ => {}
//!     }
//! }
//! ```

// Core modules (always available)
pub mod ndp;
pub mod util;

// Feature-gated modules
#[cfg(feature = "output")]
pub mod output;

#[cfg(feature = "lab")]
pub mod lab;

// Re-export common types at crate root for convenience
pub use ndp::{Error, NdStack, Result};
