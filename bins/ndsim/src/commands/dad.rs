//! ndsim dad - duplicate address detection on a shared segment.

use std::net::Ipv6Addr;
use std::time::Duration;

use clap::Args;
use ndisc::ndp::{AddressConfig, InterfaceConfig};
use ndisc::output::{MonitorConfig, OutputFormat, OutputOptions};
use ndisc::util::parse_addr;

use crate::sim::{Sim, Table, mac};

#[derive(Args)]
pub struct DadCmd {
    /// Address to verify. Without one, the interface's link-local
    /// address is autoconfigured.
    #[arg(value_parser = parse_addr)]
    address: Option<Ipv6Addr>,

    /// Prefix length.
    #[arg(long, default_value_t = 64)]
    prefix_len: u8,

    /// Solicitations to send before accepting the address.
    #[arg(long, default_value_t = 1)]
    transmits: u8,

    /// Milliseconds between solicitations.
    #[arg(long, default_value_t = 1000)]
    retrans_ms: u64,

    /// Let another node own the address first.
    #[arg(long)]
    conflict: bool,

    /// Start a second node probing for the same address at the same time.
    #[arg(long, conflicts_with = "conflict")]
    race: bool,
}

impl DadCmd {
    pub async fn run(
        &self,
        format: OutputFormat,
        opts: &OutputOptions,
        monitor: Option<MonitorConfig>,
    ) -> anyhow::Result<()> {
        let retrans = Duration::from_millis(self.retrans_ms);
        let mut sim = Sim::new(monitor);
        let a = sim.add_node(
            InterfaceConfig::ethernet("eth0", mac(1))
                .dad_transmits(self.transmits)
                .retrans_timer(retrans),
        )?;
        sim.watch(a)?;

        // The contested address defaults to A's own link-local address.
        let target = self
            .address
            .unwrap_or_else(|| ndisc::ndp::types::link::link_local(&mac(1).interface_id()));

        if self.conflict || self.race {
            let b = sim.add_node(InterfaceConfig::ethernet("eth0", mac(2)))?;
            let mut config = AddressConfig::new(target, self.prefix_len);
            if self.conflict {
                config = config.no_dad();
            }
            let node = sim.node(b);
            node.handle.add_address(node.eth0, config).await?;
        }

        let node = sim.node(a);
        match self.address {
            Some(addr) => {
                node.handle
                    .add_address(node.eth0, AddressConfig::new(addr, self.prefix_len))
                    .await?;
            }
            None => {
                let eth0 = node.eth0;
                node.handle
                    .with(move |stack| stack.autoconfigure(eth0))
                    .await??;
            }
        }

        // Long enough for the last solicitation's wait to run out.
        sim.run_for(retrans * (u32::from(self.transmits) + 1)).await;

        let reports = sim.finish().await?;
        reports[a].print(&[Table::Interface], format, opts)
    }
}
