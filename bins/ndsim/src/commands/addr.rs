//! ndsim addr - address lifetimes and deletion.

use std::io::Write;
use std::net::Ipv6Addr;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use ndisc::ndp::{AddressConfig, InterfaceConfig, Lifetime};
use ndisc::output::{MonitorConfig, OutputFormat, OutputOptions};
use ndisc::util::{format_prefix, parse_prefix};

use crate::sim::{Sim, Table, mac};

fn lifetime(secs: Option<u32>) -> Lifetime {
    secs.map_or(Lifetime::Infinite, Lifetime::Seconds)
}

#[derive(Args)]
pub struct AddrCmd {
    /// Address to configure (ADDRESS/PREFIX_LEN, a bare address is /128).
    #[arg(default_value = "2001:db8::10/64")]
    address: String,

    /// Preferred lifetime in seconds (default forever).
    #[arg(long)]
    preferred: Option<u32>,

    /// Valid lifetime in seconds (default forever).
    #[arg(long)]
    valid: Option<u32>,

    /// Seconds to simulate.
    #[arg(long, default_value_t = 10)]
    duration: u64,

    /// Delete the address at this second.
    #[arg(long)]
    delete_at: Option<u64>,

    /// Treat the address as prefix + interface identifier.
    #[arg(long)]
    from_prefix: bool,
}

impl AddrCmd {
    pub async fn run(
        &self,
        format: OutputFormat,
        opts: &OutputOptions,
        monitor: Option<MonitorConfig>,
    ) -> anyhow::Result<()> {
        let (address, prefix_len) = parse_prefix(&self.address)
            .with_context(|| format!("invalid address: {}", self.address))?;

        let mut sim = Sim::new(monitor);
        let a = sim.add_node(InterfaceConfig::ethernet("eth0", mac(1)))?;
        sim.watch(a)?;

        let node = sim.node(a);
        let eth0 = node.eth0;
        let preferred = lifetime(self.preferred);
        let valid = lifetime(self.valid);

        let target = if self.from_prefix {
            let (prefix, len) = (address, prefix_len);
            node.handle
                .with(move |stack| -> ndisc::Result<Ipv6Addr> {
                    let id = stack.add_address_from_prefix(eth0, prefix, len, preferred, valid)?;
                    let intf = stack
                        .interface(eth0)
                        .ok_or(ndisc::Error::InterfaceNotFound(eth0))?;
                    intf.addresses()
                        .get(id)
                        .map(|a| a.addr())
                        .ok_or(ndisc::Error::AddressNotFound { addr: prefix })
                })
                .await??
        } else {
            node.handle
                .add_address(
                    eth0,
                    AddressConfig::new(address, prefix_len)
                        .preferred(preferred)
                        .valid(valid),
                )
                .await?;
            address
        };

        for second in 0..self.duration {
            if self.delete_at == Some(second) {
                node.handle.delete_address(eth0, target).await?;
            }
            sim.run_for(Duration::from_secs(1)).await;
        }

        let reports = sim.finish().await?;
        if format == OutputFormat::Text && opts.details {
            writeln!(
                std::io::stdout().lock(),
                "configured {}",
                format_prefix(&target, prefix_len)
            )?;
        }
        reports[a].print(&[Table::Interface, Table::Routes], format, opts)
    }
}
