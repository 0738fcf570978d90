//! Shared utilities for ndisc.

pub mod addr;
pub mod random;

pub use addr::{format_prefix, parse_addr, parse_mac, parse_prefix};
pub use random::random_delay;
