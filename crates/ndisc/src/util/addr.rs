//! Address parsing and formatting utilities.

use std::net::Ipv6Addr;

/// Error type for address parsing.
#[derive(Debug, thiserror::Error)]
pub enum AddrError {
    #[error("invalid IPv6 address: {0}")]
    InvalidAddress(String),

    #[error("invalid prefix length: {0}")]
    InvalidPrefix(String),

    #[error("invalid MAC address: {0}")]
    InvalidMac(String),
}

pub type Result<T> = std::result::Result<T, AddrError>;

/// Parse an IPv6 address from string.
pub fn parse_addr(s: &str) -> Result<Ipv6Addr> {
    s.parse()
        .map_err(|_| AddrError::InvalidAddress(s.to_string()))
}

/// Parse an IPv6 address with prefix length (CIDR notation).
/// Returns (address, prefix_length). A bare address yields /128.
pub fn parse_prefix(s: &str) -> Result<(Ipv6Addr, u8)> {
    let Some((addr_str, prefix_str)) = s.split_once('/') else {
        return Ok((parse_addr(s)?, 128));
    };

    let addr = parse_addr(addr_str)?;
    let prefix: u8 = prefix_str
        .parse()
        .map_err(|_| AddrError::InvalidPrefix(prefix_str.to_string()))?;

    if prefix > 128 {
        return Err(AddrError::InvalidPrefix(format!(
            "{} exceeds maximum 128",
            prefix
        )));
    }

    Ok((addr, prefix))
}

/// Format an IPv6 address with prefix.
pub fn format_prefix(addr: &Ipv6Addr, prefix: u8) -> String {
    format!("{}/{}", addr, prefix)
}

/// Parse a MAC address from string.
pub fn parse_mac(s: &str) -> Result<[u8; 6]> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 6 {
        return Err(AddrError::InvalidMac(s.to_string()));
    }

    let mut mac = [0u8; 6];
    for (i, part) in parts.iter().enumerate() {
        mac[i] = u8::from_str_radix(part, 16).map_err(|_| AddrError::InvalidMac(s.to_string()))?;
    }

    Ok(mac)
}
