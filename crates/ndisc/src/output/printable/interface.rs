//! Printable implementations for Interface and InterfaceStats.

use std::io::Write;

use crate::ndp::{Interface, InterfaceStats};
use crate::output::{OutputOptions, Printable};

impl Printable for Interface {
    fn print_text<W: Write>(&self, w: &mut W, opts: &OutputOptions) -> std::io::Result<()> {
        let mut flags = Vec::new();
        if self.config().loopback {
            flags.push("LOOPBACK");
        }
        if self.config().multicast {
            flags.push("MULTICAST");
        }
        if self.is_enabled() {
            flags.push("UP");
        }
        if self.is_enabled() && !self.is_ipv6_up() {
            flags.push("NOIPV6");
        }

        writeln!(w, "{}: {}: <{}>", self.index(), self.name(), flags.join(","))?;
        writeln!(w, "    link/ether {}", self.link_addr())?;

        for addr in self.addresses().iter() {
            addr.print_text(w, opts)?;
        }

        if opts.details {
            for router in self.routers().iter() {
                writeln!(w, "    default router {}", router)?;
            }
        }
        if opts.stats {
            self.stats().print_text(w, opts)?;
        }

        Ok(())
    }

    fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::json!({
            "ifindex": self.index().get(),
            "ifname": self.name(),
            "address": self.link_addr().to_string(),
            "up": self.is_enabled(),
            "ipv6": self.is_ipv6_up(),
            "addr_info": self.addresses().iter().map(|a| a.to_json()).collect::<Vec<_>>(),
        });

        if !self.routers().is_empty() {
            obj["routers"] = serde_json::json!(
                self.routers().iter().map(|r| r.to_string()).collect::<Vec<_>>()
            );
        }
        obj["stats"] = self.stats().to_json();

        obj
    }
}

impl InterfaceStats {
    fn counters(&self) -> [(&'static str, u64); 12] {
        [
            ("in_msgs", self.in_msgs),
            ("in_errors", self.in_errors),
            ("in_discards", self.in_discards),
            ("ns_in", self.ns_in),
            ("na_in", self.na_in),
            ("ns_out", self.ns_out),
            ("na_out", self.na_out),
            ("out_errors", self.out_errors),
            ("queue_drops", self.queue_drops),
            ("dad_duplicates", self.dad_duplicates),
            ("dad_aborted", self.dad_aborted),
            ("cache_full", self.cache_full),
        ]
    }
}

impl Printable for InterfaceStats {
    fn print_text<W: Write>(&self, w: &mut W, _opts: &OutputOptions) -> std::io::Result<()> {
        let counters = self.counters();
        for row in counters.chunks(4) {
            write!(w, "   ")?;
            for (name, value) in row {
                write!(w, " {} {}", name, value)?;
            }
            writeln!(w)?;
        }
        Ok(())
    }

    fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .counters()
            .iter()
            .map(|(name, value)| (name.to_string(), serde_json::json!(value)))
            .collect();
        serde_json::Value::Object(map)
    }
}
