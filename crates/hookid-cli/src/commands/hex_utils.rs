//! Hex address parsing and formatting utilities.

use anyhow::{Result, bail};

/// Parse a hex address string (with or without 0x prefix).
pub fn parse_hex_address(s: &str) -> Result<u64> {
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(s, 16).map_err(|e| anyhow::anyhow!("Invalid hex address: {}", e))
}

/// Parse a hex address that must fit a 32-bit address space.
pub fn parse_hex_u32(s: &str) -> Result<u32> {
    let addr = parse_hex_address(s)?;
    match u32::try_from(addr) {
        Ok(addr) => Ok(addr),
        Err(_) => bail!("Address 0x{:X} does not fit in 32 bits", addr),
    }
}

/// Space-separated upper-case hex bytes, e.g. `E9 40 2C 11 00`.
pub fn format_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
