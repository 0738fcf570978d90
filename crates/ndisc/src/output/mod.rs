//! Output formatting (JSON/text) for stack snapshots.
//!
//! Interfaces, addresses, neighbor entries and routes implement
//! [`Printable`], so a caller holding a stack (or a snapshot taken through
//! [`WorkerHandle::with`](crate::ndp::WorkerHandle::with)) can render them
//! in the format of `ip -6 addr` / `ip -6 neigh` or as JSON.
//!
//! # Example
//!
//! ```ignore
//! use ndisc::output::{OutputFormat, OutputOptions, print_all};
//!
//! let interfaces: Vec<_> = stack.interfaces().collect();
//! print_all(&interfaces, OutputFormat::Text, &OutputOptions::default())?;
//! ```

pub mod formatting;
mod monitor;
mod printable;

pub use monitor::{MonitorConfig, print_event, print_monitor_start};

use std::io::Write;

/// Output format options.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    /// Show per-interface counters.
    pub stats: bool,
    /// Show extra details (routers, DAD sessions, timestamps).
    pub details: bool,
    /// Pretty print (for JSON).
    pub pretty: bool,
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text output.
    #[default]
    Text,
    /// JSON output.
    Json,
}

/// Trait for types that can be printed.
pub trait Printable {
    /// Print as plain text.
    fn print_text<W: Write>(&self, w: &mut W, opts: &OutputOptions) -> std::io::Result<()>;

    /// Convert to JSON value.
    fn to_json(&self) -> serde_json::Value;

    /// Print in the specified format.
    fn print<W: Write>(
        &self,
        w: &mut W,
        format: OutputFormat,
        opts: &OutputOptions,
    ) -> std::io::Result<()> {
        match format {
            OutputFormat::Text => self.print_text(w, opts),
            OutputFormat::Json => {
                write_json(w, &self.to_json(), opts)?;
                Ok(())
            }
        }
    }
}

impl<T: Printable + ?Sized> Printable for &T {
    fn print_text<W: Write>(&self, w: &mut W, opts: &OutputOptions) -> std::io::Result<()> {
        (**self).print_text(w, opts)
    }

    fn to_json(&self) -> serde_json::Value {
        (**self).to_json()
    }
}

fn write_json<W: Write>(
    w: &mut W,
    json: &serde_json::Value,
    opts: &OutputOptions,
) -> std::io::Result<()> {
    if opts.pretty {
        serde_json::to_writer_pretty(&mut *w, json)?;
    } else {
        serde_json::to_writer(&mut *w, json)?;
    }
    writeln!(w)
}

/// Print a list of Printable items to stdout.
pub fn print_all<T: Printable>(
    items: &[T],
    format: OutputFormat,
    opts: &OutputOptions,
) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    print_all_to(&mut stdout, items, format, opts)
}

/// Print a list of Printable items to a custom writer.
///
/// JSON output is a single array.
pub fn print_all_to<W: Write, T: Printable>(
    w: &mut W,
    items: &[T],
    format: OutputFormat,
    opts: &OutputOptions,
) -> std::io::Result<()> {
    match format {
        OutputFormat::Text => {
            for item in items {
                item.print_text(w, opts)?;
            }
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::Value::Array(items.iter().map(|i| i.to_json()).collect());
            write_json(w, &json, opts)
        }
    }
}
