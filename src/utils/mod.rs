// Fri Oct 16 2026 - Alex

pub mod logging;

pub use logging::{init_logger, level_from_verbosity, ScopedTimer};

/// Parses `0x`-prefixed hex or plain decimal, with an optional leading `-`.
pub fn parse_int(s: &str) -> Result<i64, String> {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let value = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => digits.parse::<u64>(),
    }
    .map_err(|e| format!("invalid number '{}': {}", s, e))?;

    if negative {
        0i64.checked_sub_unsigned(value).ok_or_else(|| format!("'{}' is out of range", s))
    } else {
        Ok(value as i64)
    }
}

/// Parses an address in hex or decimal.
pub fn parse_address(s: &str) -> Result<u64, String> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    }
    .map_err(|e| format!("invalid address '{}': {}", s, e))
}
