//! Event monitor output.
//!
//! Prints [`NdEvent`]s one per line, optionally prefixed with the stack
//! time at which they were observed.
//!
//! # Example
//!
//! ```ignore
//! use ndisc::output::{MonitorConfig, OutputFormat, print_event};
//! use tokio_stream::StreamExt;
//!
//! let config = MonitorConfig::new()
//!     .with_timestamp(true)
//!     .with_format(OutputFormat::Text);
//!
//! let mut events = handle.subscribe()?;
//! let mut stdout = std::io::stdout().lock();
//! while let Some(event) = events.next().await {
//!     print_event(&mut stdout, &event, start.elapsed(), &config)?;
//! }
//! ```

use std::io::{self, Write};
use std::time::Duration;

use super::formatting::format_secs;
use super::{OutputFormat, OutputOptions, Printable};
use crate::ndp::NdEvent;

/// Configuration for monitor output.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonitorConfig {
    /// Whether to prefix output with timestamps.
    pub timestamp: bool,
    /// Output format (text or JSON).
    pub format: OutputFormat,
    /// Output options.
    pub opts: OutputOptions,
}

impl MonitorConfig {
    /// Create a new monitor config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable timestamp prefixes.
    pub fn with_timestamp(mut self, enabled: bool) -> Self {
        self.timestamp = enabled;
        self
    }

    /// Set the output format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the output options.
    pub fn with_opts(mut self, opts: OutputOptions) -> Self {
        self.opts = opts;
        self
    }
}

/// Print one event. `at` is the stack time it was observed.
///
/// JSON output is one object per line, with an `"at"` member when
/// timestamps are enabled.
pub fn print_event<W: Write>(
    w: &mut W,
    event: &NdEvent,
    at: Duration,
    config: &MonitorConfig,
) -> io::Result<()> {
    match config.format {
        OutputFormat::Text => {
            if config.timestamp {
                write!(w, "[{:>9}] ", format_secs(at))?;
            }
            event.print_text(w, &config.opts)?;
        }
        OutputFormat::Json => {
            let mut json = event.to_json();
            if config.timestamp {
                json["at"] = serde_json::json!(at.as_secs_f64());
            }
            writeln!(w, "{}", json)?;
        }
    }
    w.flush()
}

/// Print a startup message for monitor mode (text format only).
pub fn print_monitor_start<W: Write>(
    w: &mut W,
    config: &MonitorConfig,
    message: &str,
) -> io::Result<()> {
    if config.format == OutputFormat::Text {
        writeln!(w, "{}", message)?;
    }
    Ok(())
}
