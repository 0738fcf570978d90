//! Printable implementation for NeighborEntry.

use std::io::Write;

use crate::ndp::NeighborEntry;
use crate::output::formatting::format_secs;
use crate::output::{OutputOptions, Printable};

impl Printable for NeighborEntry {
    fn print_text<W: Write>(&self, w: &mut W, opts: &OutputOptions) -> std::io::Result<()> {
        write!(w, "{}", self.addr())?;
        if let Some(lladdr) = self.link_addr() {
            write!(w, " lladdr {}", lladdr)?;
        }
        if self.is_router() {
            write!(w, " router")?;
        }
        if self.is_permanent() {
            write!(w, " PERMANENT")?;
        } else {
            write!(w, " {}", self.state())?;
        }

        if opts.details {
            write!(w, " used {}", format_secs(self.used_at()))?;
            if let Some(confirmed) = self.confirmed_at() {
                write!(w, " confirmed {}", format_secs(confirmed))?;
            }
            if self.queued() > 0 {
                write!(w, " queued {}", self.queued())?;
            }
        }

        writeln!(w)
    }

    fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::json!({
            "dst": self.addr().to_string(),
            "state": self.state().name(),
        });

        if let Some(lladdr) = self.link_addr() {
            obj["lladdr"] = serde_json::json!(lladdr.to_string());
        }
        if self.is_router() {
            obj["router"] = serde_json::json!(true);
        }
        if self.is_permanent() {
            obj["permanent"] = serde_json::json!(true);
        }
        if self.unanswered_probes() > 0 {
            obj["probes"] = serde_json::json!(self.unanswered_probes());
        }

        obj
    }
}
