//! Protocol events.
//!
//! The stack records an [`NdEvent`] for every terminal transition (address
//! verified or duplicated, neighbor resolved or lost) and for requests aimed
//! at collaborators outside this crate (router solicitation, DHCP lease
//! release). The worker fans them out to subscribers as an [`EventStream`].
//!
//! # Example
//!
//! ```ignore
//! use ndisc::ndp::event::NdEvent;
//! use tokio_stream::StreamExt;
//!
//! let mut events = handle.subscribe()?;
//! while let Some(event) = events.next().await {
//!     if let NdEvent::AddressDuplicated { iface, addr } = event {
//!         eprintln!("{addr} is already in use on {iface}");
//!     }
//! }
//! ```

use std::net::Ipv6Addr;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::interface::IfIndex;
use super::types::LinkAddr;

/// Why a neighbor entry was deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// NUD probes went unanswered.
    Unreachable,
    /// Address resolution gave up.
    Unresolved,
    /// Made room for a new entry.
    Evicted,
    /// Stale and idle past the entry timeout.
    Expired,
    /// Deleted by management or interface teardown.
    Deleted,
}

impl RemovalReason {
    /// Get the name of this reason.
    pub fn name(&self) -> &'static str {
        match self {
            RemovalReason::Unreachable => "unreachable",
            RemovalReason::Unresolved => "unresolved",
            RemovalReason::Evicted => "evicted",
            RemovalReason::Expired => "expired",
            RemovalReason::Deleted => "deleted",
        }
    }
}

/// Neighbor discovery events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NdEvent {
    /// DAD started for an address.
    AddressTentative { iface: IfIndex, addr: Ipv6Addr },
    /// An address passed verification and is usable.
    AddressReady { iface: IfIndex, addr: Ipv6Addr },
    /// An address's preferred lifetime ran out.
    AddressDeprecated { iface: IfIndex, addr: Ipv6Addr },
    /// Another node holds an address.
    AddressDuplicated { iface: IfIndex, addr: Ipv6Addr },
    /// An address was removed from its interface.
    AddressRemoved { iface: IfIndex, addr: Ipv6Addr },
    /// IPv6 was disabled on an interface after its link-local address was
    /// found duplicated.
    InterfaceDisabled { iface: IfIndex },
    /// A neighbor's link-layer address became known.
    NeighborResolved {
        iface: IfIndex,
        addr: Ipv6Addr,
        link_addr: LinkAddr,
    },
    /// A neighbor entry was deleted.
    NeighborRemoved {
        iface: IfIndex,
        addr: Ipv6Addr,
        reason: RemovalReason,
    },
    /// The link-local address is ready and a host should solicit routers.
    RouterSolicitation { iface: IfIndex },
    /// A DHCP lease for the address should be released.
    DhcpRelease { iface: IfIndex, addr: Ipv6Addr },
    /// A DHCP-assigned address was a duplicate and should be declined.
    DhcpDecline { iface: IfIndex, addr: Ipv6Addr },
}

impl NdEvent {
    /// Interface the event concerns.
    pub fn iface(&self) -> IfIndex {
        match *self {
            NdEvent::AddressTentative { iface, .. }
            | NdEvent::AddressReady { iface, .. }
            | NdEvent::AddressDeprecated { iface, .. }
            | NdEvent::AddressDuplicated { iface, .. }
            | NdEvent::AddressRemoved { iface, .. }
            | NdEvent::InterfaceDisabled { iface }
            | NdEvent::NeighborResolved { iface, .. }
            | NdEvent::NeighborRemoved { iface, .. }
            | NdEvent::RouterSolicitation { iface }
            | NdEvent::DhcpRelease { iface, .. }
            | NdEvent::DhcpDecline { iface, .. } => iface,
        }
    }

    /// Returns true for address lifecycle events.
    pub fn is_address(&self) -> bool {
        matches!(
            self,
            NdEvent::AddressTentative { .. }
                | NdEvent::AddressReady { .. }
                | NdEvent::AddressDeprecated { .. }
                | NdEvent::AddressDuplicated { .. }
                | NdEvent::AddressRemoved { .. }
        )
    }

    /// Returns true for neighbor cache events.
    pub fn is_neighbor(&self) -> bool {
        matches!(
            self,
            NdEvent::NeighborResolved { .. } | NdEvent::NeighborRemoved { .. }
        )
    }
}

/// A stream of [`NdEvent`]s from a running worker.
///
/// Implements [`Stream`]; the stream ends when the worker stops.
pub struct EventStream {
    inner: UnboundedReceiverStream<NdEvent>,
}

impl EventStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<NdEvent>) -> Self {
        Self {
            inner: UnboundedReceiverStream::new(rx),
        }
    }
}

impl Stream for EventStream {
    type Item = NdEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}
