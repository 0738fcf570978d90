//! ndsim nud - neighbor unreachability detection over time.

use std::net::Ipv6Addr;
use std::time::Duration;

use clap::Args;
use ndisc::ndp::{AddressConfig, InterfaceConfig, LinkState};
use ndisc::output::{MonitorConfig, OutputFormat, OutputOptions};

use super::resolve::packet;
use crate::sim::{Sim, Table, mac};

/// Off-link destination reached through the peer when it is a router.
const REMOTE: Ipv6Addr = Ipv6Addr::new(0x2001, 0xdb8, 0xff, 0, 0, 0, 0, 1);

#[derive(Args)]
pub struct NudCmd {
    /// Seconds to simulate.
    #[arg(long, default_value_t = 60)]
    duration: u64,

    /// Send a packet to the peer every this many seconds (0 disables).
    #[arg(long, default_value_t = 10)]
    interval: u64,

    /// Second at which the peer stops answering.
    #[arg(long)]
    silent_after: Option<u64>,

    /// Use the peer as default router and send off-link traffic through it.
    #[arg(long)]
    router: bool,

    /// Reachable time in seconds.
    #[arg(long, default_value_t = 30)]
    reachable: u64,
}

impl NudCmd {
    pub async fn run(
        &self,
        format: OutputFormat,
        opts: &OutputOptions,
        monitor: Option<MonitorConfig>,
    ) -> anyhow::Result<()> {
        let local: Ipv6Addr = "2001:db8::1".parse()?;
        let peer: Ipv6Addr = "2001:db8::2".parse()?;

        let mut sim = Sim::new(monitor);
        let a = sim.add_node(
            InterfaceConfig::ethernet("eth0", mac(1))
                .reachable_time(Duration::from_secs(self.reachable)),
        )?;
        let b = sim.add_node(InterfaceConfig::ethernet("eth0", mac(2)).router(self.router))?;
        sim.watch(a)?;

        for (i, addr) in [(a, local), (b, peer)] {
            let node = sim.node(i);
            node.handle
                .add_address(node.eth0, AddressConfig::new(addr, 64).no_dad())
                .await?;
        }

        let node = sim.node(a);
        let eth0 = node.eth0;
        let dst = if self.router {
            node.handle
                .with(move |stack| stack.add_default_router(eth0, peer))
                .await??;
            REMOTE
        } else {
            peer
        };

        for second in 0..self.duration {
            if self.silent_after == Some(second) {
                sim.set_link(b, LinkState::Down)?;
            }
            if self.interval > 0 && second % self.interval == 0 {
                // Fails once the route through a lost router is gone.
                if let Err(e) = node.handle.send(eth0, packet(local, dst, b"nud")).await {
                    tracing::info!(error = %e, "send failed");
                }
            }
            sim.run_for(Duration::from_secs(1)).await;
        }

        let reports = sim.finish().await?;
        reports[a].print(&[Table::Neighbors, Table::Routes], format, opts)
    }
}
