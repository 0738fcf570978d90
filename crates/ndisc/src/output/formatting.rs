//! Shared formatting helpers for stack snapshots.
//!
//! # Example
//!
//! ```
//! use ndisc::output::formatting::{format_lifetime, format_secs};
//! use ndisc::ndp::Lifetime;
//! use std::time::Duration;
//!
//! assert_eq!(format_lifetime(Lifetime::Infinite), "forever");
//! assert_eq!(format_lifetime(Lifetime::Seconds(90)), "90sec");
//! assert_eq!(format_secs(Duration::from_millis(1500)), "1.500s");
//! ```

use std::time::Duration;

use crate::ndp::Lifetime;

/// Format a lifetime the way `ip -6 addr` does.
pub fn format_lifetime(lifetime: Lifetime) -> String {
    lifetime.to_string()
}

/// Format a stack timestamp as seconds with millisecond precision.
pub fn format_secs(t: Duration) -> String {
    format!("{}.{:03}s", t.as_secs(), t.subsec_millis())
}

/// JSON value for a lifetime: `"forever"` or a number of seconds.
pub fn lifetime_json(lifetime: Lifetime) -> serde_json::Value {
    match lifetime {
        Lifetime::Infinite => serde_json::json!("forever"),
        Lifetime::Seconds(s) => serde_json::json!(s),
    }
}
