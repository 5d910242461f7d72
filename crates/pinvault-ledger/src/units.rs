//! Wei / Gwei / ether conversions and JSON-RPC quantity encoding.

use pinvault_core::{PinvaultError, PinvaultResult};

pub const WEI_PER_GWEI: u128 = 1_000_000_000;
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// Gwei (possibly fractional) to wei, rounded to the nearest wei.
pub fn gwei_to_wei(gwei: f64) -> u128 {
    if !gwei.is_finite() || gwei <= 0.0 {
        return 0;
    }
    (gwei * WEI_PER_GWEI as f64).round() as u128
}

pub fn wei_to_gwei(wei: u128) -> f64 {
    wei as f64 / WEI_PER_GWEI as f64
}

/// Render wei as an ether amount with six decimals, e.g. `0.012345`.
pub fn format_ether(wei: u128) -> String {
    let whole = wei / WEI_PER_ETHER;
    let micro = (wei % WEI_PER_ETHER) / 1_000_000_000_000;
    format!("{whole}.{micro:06}")
}

/// Decode a JSON-RPC hex quantity (`"0x1a"`).
pub fn parse_quantity(s: &str) -> PinvaultResult<u128> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| PinvaultError::ledger(format!("quantity missing 0x prefix: {s}")))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| PinvaultError::ledger(format!("bad quantity {s}: {e}")))
}

pub fn parse_quantity_u64(s: &str) -> PinvaultResult<u64> {
    let v = parse_quantity(s)?;
    u64::try_from(v).map_err(|_| PinvaultError::ledger(format!("quantity {s} exceeds u64")))
}

/// Encode an integer as a JSON-RPC quantity (no leading zeros).
pub fn to_quantity(v: u128) -> String {
    format!("{v:#x}")
}
