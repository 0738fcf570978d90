//! Printable implementation for Route.

use std::io::Write;

use crate::ndp::{Route, RouteKind};
use crate::output::{OutputOptions, Printable};

impl Printable for Route {
    fn print_text<W: Write>(&self, w: &mut W, _opts: &OutputOptions) -> std::io::Result<()> {
        writeln!(w, "{}", self)
    }

    fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::json!({
            "dst": format!("{}/{}", self.destination, self.prefix_len),
            "dev": self.iface.get(),
            "type": self.kind.name(),
        });

        match self.kind {
            RouteKind::Gateway => obj["gateway"] = serde_json::json!(self.next_hop.to_string()),
            RouteKind::OnLink => obj["prefsrc"] = serde_json::json!(self.next_hop.to_string()),
            RouteKind::Local => {}
        }

        obj
    }
}
