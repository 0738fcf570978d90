//! Link-layer collaborator contract.

use std::net::Ipv6Addr;

use bytes::Bytes;

use super::error::Result;
use super::interface::IfIndex;
use super::types::LinkAddr;

/// Physical link state reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    /// Carrier present.
    Up,
    /// No carrier.
    Down,
}

impl LinkState {
    /// Get the name of this state.
    pub fn name(&self) -> &'static str {
        match self {
            LinkState::Up => "UP",
            LinkState::Down => "DOWN",
        }
    }
}

/// Driver-side operations used by the stack.
///
/// Frames handed to [`send`](LinkLayer::send) are complete IPv6 packets;
/// the driver adds its own framing. Inbound packets flow the other way
/// through [`NdStack::input`](super::NdStack::input), normally via
/// [`WorkerHandle::deliver`](super::worker::WorkerHandle::deliver) from
/// interrupt context.
pub trait LinkLayer {
    /// Transmit `frame` to `dst` on `iface`.
    fn send(&mut self, iface: IfIndex, dst: LinkAddr, frame: Bytes) -> Result<()>;

    /// Current link state of `iface`.
    fn link_state(&self, iface: IfIndex) -> LinkState;

    /// Link-layer address for an IPv6 multicast group.
    fn multicast_map(&self, group: &Ipv6Addr) -> LinkAddr {
        LinkAddr::multicast(group)
    }
}

impl<T: LinkLayer + ?Sized> LinkLayer for Box<T> {
    fn send(&mut self, iface: IfIndex, dst: LinkAddr, frame: Bytes) -> Result<()> {
        (**self).send(iface, dst, frame)
    }

    fn link_state(&self, iface: IfIndex) -> LinkState {
        (**self).link_state(iface)
    }

    fn multicast_map(&self, group: &Ipv6Addr) -> LinkAddr {
        (**self).multicast_map(group)
    }
}
