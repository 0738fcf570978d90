//! Printable implementation for InterfaceAddress.

use std::io::Write;

use crate::ndp::{AddressState, InterfaceAddress};
use crate::output::formatting::{format_lifetime, format_secs, lifetime_json};
use crate::output::{OutputOptions, Printable};

impl Printable for InterfaceAddress {
    fn print_text<W: Write>(&self, w: &mut W, opts: &OutputOptions) -> std::io::Result<()> {
        write!(
            w,
            "    inet6 {}/{} scope {}",
            self.addr(),
            self.prefix_len(),
            self.scope().name()
        )?;

        // Active is the unremarkable case, like `ip` omitting it.
        if self.state() != AddressState::Active {
            write!(w, " {}", self.state())?;
        }
        for flag in self.flags().names() {
            write!(w, " {}", flag)?;
        }
        writeln!(w)?;

        write!(
            w,
            "       valid_lft {} preferred_lft {}",
            format_lifetime(self.valid()),
            format_lifetime(self.preferred())
        )?;
        if opts.details {
            write!(w, " created {}", format_secs(self.created_at()))?;
        }
        writeln!(w)
    }

    fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::json!({
            "local": self.addr().to_string(),
            "prefixlen": self.prefix_len(),
            "scope": self.scope().name(),
            "state": self.state().name(),
            "valid_life_time": lifetime_json(self.valid()),
            "preferred_life_time": lifetime_json(self.preferred()),
        });

        let flags = self.flags().names();
        if !flags.is_empty() {
            obj["flags"] = serde_json::json!(flags);
        }

        obj
    }
}
