//! Printable implementation for NdEvent.

use std::io::Write;

use crate::ndp::NdEvent;
use crate::output::{OutputOptions, Printable};

impl NdEvent {
    /// Short action name used in monitor output.
    pub fn action(&self) -> &'static str {
        match self {
            NdEvent::AddressTentative { .. } => "tentative",
            NdEvent::AddressReady { .. } => "ready",
            NdEvent::AddressDeprecated { .. } => "deprecated",
            NdEvent::AddressDuplicated { .. } => "duplicated",
            NdEvent::AddressRemoved { .. } => "removed",
            NdEvent::InterfaceDisabled { .. } => "disabled",
            NdEvent::NeighborResolved { .. } => "resolved",
            NdEvent::NeighborRemoved { .. } => "removed",
            NdEvent::RouterSolicitation { .. } => "solicit-routers",
            NdEvent::DhcpRelease { .. } => "dhcp-release",
            NdEvent::DhcpDecline { .. } => "dhcp-decline",
        }
    }

    fn object(&self) -> &'static str {
        if self.is_address() {
            "addr"
        } else if self.is_neighbor() {
            "neigh"
        } else {
            "link"
        }
    }
}

impl Printable for NdEvent {
    fn print_text<W: Write>(&self, w: &mut W, _opts: &OutputOptions) -> std::io::Result<()> {
        let iface = self.iface();
        match self {
            NdEvent::AddressTentative { addr, .. }
            | NdEvent::AddressReady { addr, .. }
            | NdEvent::AddressDeprecated { addr, .. }
            | NdEvent::AddressDuplicated { addr, .. }
            | NdEvent::AddressRemoved { addr, .. } => {
                writeln!(w, "ADDR {}: {} dev {}", self.action().to_uppercase(), addr, iface)
            }
            NdEvent::NeighborResolved {
                addr, link_addr, ..
            } => writeln!(w, "NEIGH RESOLVED: {} lladdr {} dev {}", addr, link_addr, iface),
            NdEvent::NeighborRemoved { addr, reason, .. } => writeln!(
                w,
                "NEIGH DEL: {} dev {} reason {}",
                addr,
                iface,
                reason.name()
            ),
            NdEvent::InterfaceDisabled { .. } => {
                writeln!(w, "LINK: dev {} ipv6 disabled (duplicate interface id)", iface)
            }
            NdEvent::RouterSolicitation { .. } => {
                writeln!(w, "LINK: dev {} ready to solicit routers", iface)
            }
            NdEvent::DhcpRelease { addr, .. } => {
                writeln!(w, "DHCP RELEASE: {} dev {}", addr, iface)
            }
            NdEvent::DhcpDecline { addr, .. } => {
                writeln!(w, "DHCP DECLINE: {} dev {}", addr, iface)
            }
        }
    }

    fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::json!({
            "object": self.object(),
            "action": self.action(),
            "ifindex": self.iface().get(),
        });

        match self {
            NdEvent::AddressTentative { addr, .. }
            | NdEvent::AddressReady { addr, .. }
            | NdEvent::AddressDeprecated { addr, .. }
            | NdEvent::AddressDuplicated { addr, .. }
            | NdEvent::AddressRemoved { addr, .. }
            | NdEvent::DhcpRelease { addr, .. }
            | NdEvent::DhcpDecline { addr, .. } => {
                obj["addr"] = serde_json::json!(addr.to_string());
            }
            NdEvent::NeighborResolved {
                addr, link_addr, ..
            } => {
                obj["dst"] = serde_json::json!(addr.to_string());
                obj["lladdr"] = serde_json::json!(link_addr.to_string());
            }
            NdEvent::NeighborRemoved { addr, reason, .. } => {
                obj["dst"] = serde_json::json!(addr.to_string());
                obj["reason"] = serde_json::json!(reason.name());
            }
            NdEvent::InterfaceDisabled { .. } | NdEvent::RouterSolicitation { .. } => {}
        }

        obj
    }
}
