//! ndsim resolve - address resolution between two nodes.

use std::io::Write;
use std::net::Ipv6Addr;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use clap::Args;
use ndisc::ndp::wire::Ipv6Header;
use ndisc::ndp::{AddressConfig, InterfaceConfig, LinkState, Resolution};
use ndisc::output::{MonitorConfig, OutputFormat, OutputOptions};
use ndisc::util::parse_addr;

use crate::sim::{Sim, Table, mac};

/// IPv6 "no next header".
const NO_NEXT_HEADER: u8 = 59;

/// Build an IPv6 packet with no upper-layer header.
pub fn packet(src: Ipv6Addr, dst: Ipv6Addr, payload: &[u8]) -> Bytes {
    let header = Ipv6Header::new(src, dst, NO_NEXT_HEADER, payload.len() as u16);
    let mut packet = BytesMut::with_capacity(Ipv6Header::SIZE + payload.len());
    packet.put_slice(header.as_bytes());
    packet.put_slice(payload);
    packet.freeze()
}

#[derive(Args)]
pub struct ResolveCmd {
    /// Local address.
    #[arg(long, default_value = "2001:db8::1", value_parser = parse_addr)]
    local: Ipv6Addr,

    /// Peer address.
    #[arg(long, default_value = "2001:db8::2", value_parser = parse_addr)]
    peer: Ipv6Addr,

    /// Packets to send before the peer answers.
    #[arg(short = 'c', long, default_value_t = 1)]
    count: u8,

    /// Pending packets kept per unresolved neighbor.
    #[arg(long, default_value_t = 3)]
    queue: usize,

    /// The peer never answers.
    #[arg(long)]
    silent: bool,
}

impl ResolveCmd {
    pub async fn run(
        &self,
        format: OutputFormat,
        opts: &OutputOptions,
        monitor: Option<MonitorConfig>,
    ) -> anyhow::Result<()> {
        let mut sim = Sim::new(monitor);
        let a =
            sim.add_node(InterfaceConfig::ethernet("eth0", mac(1)).queue_capacity(self.queue))?;
        let b = sim.add_node(InterfaceConfig::ethernet("eth0", mac(2)))?;
        sim.watch(a)?;

        for (i, addr) in [(a, self.local), (b, self.peer)] {
            let node = sim.node(i);
            node.handle
                .add_address(node.eth0, AddressConfig::new(addr, 64).no_dad())
                .await?;
        }
        if self.silent {
            sim.set_link(b, LinkState::Down)?;
        }

        let node = sim.node(a);
        let mut results = Vec::with_capacity(usize::from(self.count));
        for seq in 0..self.count {
            let result = node
                .handle
                .send(node.eth0, packet(self.local, self.peer, &[seq]))
                .await?;
            results.push(result);
        }

        // Resolution gives up after three solicitations a second apart.
        sim.run_for(Duration::from_secs(4)).await;

        let reports = sim.finish().await?;
        if format == OutputFormat::Text && opts.details {
            let mut stdout = std::io::stdout().lock();
            for (seq, result) in results.iter().enumerate() {
                match result {
                    Resolution::Resolved(lladdr) => {
                        writeln!(stdout, "packet {seq}: sent to {lladdr}")?
                    }
                    Resolution::Pending => writeln!(stdout, "packet {seq}: queued")?,
                }
            }
        }
        reports[a].print(&[Table::Neighbors], format, opts)
    }
}
