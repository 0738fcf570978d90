//! Simulated nodes on a shared lab segment.
//!
//! Every node runs on its own worker task. The segment hands frames
//! directly to the receiving worker, so scenarios only need to issue
//! commands and sleep.

use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use ndisc::lab::{LabLink, Segment};
use ndisc::ndp::worker::{self, WorkerHandle};
use ndisc::ndp::{
    IfIndex, InterfaceConfig, LinkAddr, LinkState, NdStack, RoutingTable, StackConfig,
};
use ndisc::output::{
    MonitorConfig, OutputFormat, OutputOptions, Printable, print_all_to, print_event,
    print_monitor_start,
};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::StreamExt;

/// Locally administered MAC ending in `n`.
pub fn mac(n: u8) -> LinkAddr {
    LinkAddr::new([0x02, 0, 0, 0, 0, n])
}

pub struct Node {
    pub handle: WorkerHandle<LabLink>,
    pub eth0: IfIndex,
    pub hw: LinkAddr,
    task: JoinHandle<NdStack<LabLink>>,
}

pub struct Sim {
    segment: Segment,
    nodes: Vec<Node>,
    start: Instant,
    monitor: Option<MonitorConfig>,
    printers: Vec<JoinHandle<()>>,
}

impl Sim {
    pub fn new(monitor: Option<MonitorConfig>) -> Self {
        Self {
            segment: Segment::new(),
            nodes: Vec::new(),
            start: Instant::now(),
            monitor,
            printers: Vec::new(),
        }
    }

    /// Add a node with one enabled interface, wired to the segment.
    pub fn add_node(&mut self, config: InterfaceConfig) -> anyhow::Result<usize> {
        let hw = config.link_addr;
        // Seeded per node so runs repeat but nodes do not move in lockstep.
        let seed = self.nodes.len() as u64;
        let mut stack = NdStack::new(StackConfig::new().random_seed(seed), LabLink::new());
        let eth0 = stack.add_interface(config);
        stack.link_mut().attach(eth0, &self.segment, hw);
        stack.enable_interface(eth0)?;

        let (handle, task) = worker::spawn(stack);
        let rx = handle.clone();
        self.segment.connect(hw, move |frame: Bytes| {
            let _ = rx.deliver(eth0, frame);
        });

        self.nodes.push(Node {
            handle,
            eth0,
            hw,
            task,
        });
        Ok(self.nodes.len() - 1)
    }

    pub fn node(&self, i: usize) -> &Node {
        &self.nodes[i]
    }

    /// Print node `i`'s events if monitoring was requested.
    pub fn watch(&mut self, i: usize) -> anyhow::Result<()> {
        let Some(config) = self.monitor else {
            return Ok(());
        };
        let mut events = self.nodes[i].handle.subscribe()?;
        print_monitor_start(
            &mut std::io::stdout().lock(),
            &config,
            "Watching neighbor discovery events...",
        )?;

        let start = self.start;
        self.printers.push(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let mut stdout = std::io::stdout().lock();
                if print_event(&mut stdout, &event, start.elapsed(), &config).is_err() {
                    break;
                }
            }
        }));
        Ok(())
    }

    /// Bring node `i`'s carrier up or down.
    pub fn set_link(&self, i: usize, state: LinkState) -> anyhow::Result<()> {
        let node = &self.nodes[i];
        self.segment.set_link(node.hw, state);
        node.handle.link_changed(node.eth0, state)?;
        Ok(())
    }

    /// Time since the simulation started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Let the simulation run.
    pub async fn run_for(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Stop every node and collect their final state.
    pub async fn finish(self) -> anyhow::Result<Vec<Report>> {
        let mut reports = Vec::with_capacity(self.nodes.len());
        for node in self.nodes {
            // Already stopped if the worker exited on its own.
            let _ = node.handle.shutdown();
            let stack = node.task.await.context("node worker panicked")?;
            reports.push(Report {
                stack,
                eth0: node.eth0,
            });
        }
        for printer in self.printers {
            printer.await.context("event printer panicked")?;
        }
        Ok(reports)
    }
}

/// Tables a report can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Interface,
    Neighbors,
    Routes,
}

impl Table {
    fn name(self) -> &'static str {
        match self {
            Table::Interface => "interface",
            Table::Neighbors => "neighbors",
            Table::Routes => "routes",
        }
    }
}

/// A stopped node's stack.
pub struct Report {
    pub stack: NdStack<LabLink>,
    pub eth0: IfIndex,
}

impl Report {
    fn render<W: Write>(
        &self,
        w: &mut W,
        table: Table,
        format: OutputFormat,
        opts: &OutputOptions,
    ) -> anyhow::Result<()> {
        let intf = self
            .stack
            .interface(self.eth0)
            .context("interface was removed")?;
        match table {
            Table::Interface => print_all_to(w, &[intf], format, opts)?,
            Table::Neighbors => {
                let entries: Vec<_> = intf.neighbors().iter().map(|(_, e)| e).collect();
                print_all_to(w, &entries, format, opts)?;
            }
            Table::Routes => print_all_to(w, &self.stack.routes().routes(), format, opts)?,
        }
        Ok(())
    }

    fn json(&self, table: Table) -> anyhow::Result<serde_json::Value> {
        let intf = self
            .stack
            .interface(self.eth0)
            .context("interface was removed")?;
        let values = match table {
            Table::Interface => vec![intf.to_json()],
            Table::Neighbors => intf.neighbors().iter().map(|(_, e)| e.to_json()).collect(),
            Table::Routes => self
                .stack
                .routes()
                .routes()
                .iter()
                .map(|r| r.to_json())
                .collect(),
        };
        Ok(serde_json::Value::Array(values))
    }

    /// Print `tables` to stdout.
    ///
    /// A single table prints as a JSON array; several print as one object
    /// keyed by table name.
    pub fn print(
        &self,
        tables: &[Table],
        format: OutputFormat,
        opts: &OutputOptions,
    ) -> anyhow::Result<()> {
        let mut stdout = std::io::stdout().lock();
        match (format, tables) {
            (OutputFormat::Json, [_, _, ..]) => {
                let mut obj = serde_json::Map::new();
                for table in tables {
                    obj.insert(table.name().to_string(), self.json(*table)?);
                }
                let json = serde_json::Value::Object(obj);
                if opts.pretty {
                    serde_json::to_writer_pretty(&mut stdout, &json)?;
                } else {
                    serde_json::to_writer(&mut stdout, &json)?;
                }
                writeln!(stdout)?;
            }
            _ => {
                for (i, table) in tables.iter().enumerate() {
                    if i > 0 && format == OutputFormat::Text {
                        writeln!(stdout)?;
                    }
                    self.render(&mut stdout, *table, format, opts)?;
                }
            }
        }
        Ok(())
    }
}
