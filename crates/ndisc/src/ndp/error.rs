//! Error types for neighbor discovery operations.

use std::io;
use std::net::Ipv6Addr;

use super::interface::IfIndex;

/// Result type for neighbor discovery operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during neighbor discovery operations.
///
/// Retry exhaustion (DAD decided, NUD probes unanswered, resolution
/// abandoned) is never reported through this type; those are terminal
/// transitions surfaced as [`NdEvent`](super::NdEvent)s.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from a collaborator.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Interface index is not registered with the stack.
    #[error("interface not found: {0}")]
    InterfaceNotFound(IfIndex),

    /// Interface exists but IPv6 is not operational on it.
    #[error("interface {0} is down")]
    InterfaceDown(IfIndex),

    /// Address is not configured on the interface.
    #[error("address not found: {addr}")]
    AddressNotFound {
        /// The address that was looked up.
        addr: Ipv6Addr,
    },

    /// Address is already configured on the interface.
    #[error("address already configured: {addr}")]
    AddressExists {
        /// The conflicting address.
        addr: Ipv6Addr,
    },

    /// Prefix length out of range for the interface identifier.
    #[error("invalid prefix length: {0}")]
    InvalidPrefix(u8),

    /// Preferred lifetime exceeds the valid lifetime.
    #[error("invalid lifetime: preferred {preferred} exceeds valid {valid}")]
    InvalidLifetime {
        /// Preferred lifetime in seconds.
        preferred: u32,
        /// Valid lifetime in seconds.
        valid: u32,
    },

    /// The interface identifier's link-local form failed DAD.
    #[error("interface identifier is duplicated on {0}")]
    DuplicateInterfaceId(IfIndex),

    /// Neighbor entry not present in the cache.
    #[error("neighbor not found: {addr}")]
    NeighborNotFound {
        /// The neighbor address that was looked up.
        addr: Ipv6Addr,
    },

    /// Neighbor cache is full and no entry can be evicted.
    #[error("neighbor cache full on {0}")]
    CacheFull(IfIndex),

    /// No route covers the destination.
    #[error("no route to {0}")]
    NoRoute(Ipv6Addr),

    /// Message was truncated.
    #[error("message truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected message length.
        expected: usize,
        /// Actual bytes received.
        actual: usize,
    },

    /// Invalid message format.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Inbound packet was silently discarded.
    #[error("packet discarded: {0}")]
    Discarded(&'static str),

    /// The link layer refused a frame.
    #[error("link send failed: {0}")]
    Link(String),

    /// The worker task is gone.
    #[error("neighbor discovery worker stopped")]
    WorkerClosed,
}

impl Error {
    /// Check if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::InterfaceNotFound(_)
                | Error::AddressNotFound { .. }
                | Error::NeighborNotFound { .. }
                | Error::NoRoute(_)
        )
    }

    /// Check if the error is an inbound-packet discard disposition.
    ///
    /// Malformed or irrelevant input is discarded rather than answered;
    /// callers normally log these at debug level and move on.
    pub fn is_discard(&self) -> bool {
        matches!(
            self,
            Error::Discarded(_) | Error::Truncated { .. } | Error::InvalidMessage(_)
        )
    }

    /// Check if this is an "already exists" error.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AddressExists { .. })
    }
}
