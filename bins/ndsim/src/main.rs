//! ndsim - simulate IPv6 neighbor discovery on a virtual segment.

mod commands;
mod sim;

use clap::{Parser, Subcommand};
use ndisc::output::{MonitorConfig, OutputFormat, OutputOptions};

#[derive(Parser)]
#[command(
    name = "ndsim",
    version,
    about = "Neighbor discovery simulator",
    long_about = "Runs nodes on a virtual Ethernet segment and reports what \
                  neighbor discovery did. Time is simulated unless --realtime \
                  is given."
)]
struct Cli {
    /// Output JSON.
    #[arg(short = 'j', long, global = true)]
    json: bool,

    /// Pretty print JSON.
    #[arg(short = 'p', long, global = true)]
    pretty: bool,

    /// Show statistics.
    #[arg(short = 's', long, global = true)]
    stats: bool,

    /// Show details.
    #[arg(short = 'd', long, global = true)]
    details: bool,

    /// Print protocol events as they happen.
    #[arg(short = 'e', long, global = true)]
    events: bool,

    /// Prefix events with the simulated time.
    #[arg(short = 't', long, global = true)]
    timestamp: bool,

    /// Run on the wall clock instead of simulated time.
    #[arg(long, global = true)]
    realtime: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run duplicate address detection for an address.
    Dad(commands::dad::DadCmd),

    /// Resolve a neighbor and flush queued packets.
    #[command(visible_alias = "res")]
    Resolve(commands::resolve::ResolveCmd),

    /// Watch neighbor reachability over time.
    Nud(commands::nud::NudCmd),

    /// Follow an address through its lifetimes.
    #[command(visible_alias = "a", visible_alias = "address")]
    Addr(commands::addr::AddrCmd),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if !cli.realtime {
        tokio::time::pause();
    }

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let opts = OutputOptions {
        stats: cli.stats,
        details: cli.details,
        pretty: cli.pretty,
    };

    let monitor = cli.events.then(|| {
        MonitorConfig::new()
            .with_timestamp(cli.timestamp)
            .with_format(format)
            .with_opts(opts)
    });

    // Execute command
    let result = match cli.command {
        Command::Dad(cmd) => cmd.run(format, &opts, monitor).await,
        Command::Resolve(cmd) => cmd.run(format, &opts, monitor).await,
        Command::Nud(cmd) => cmd.run(format, &opts, monitor).await,
        Command::Addr(cmd) => cmd.run(format, &opts, monitor).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
