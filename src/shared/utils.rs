//! Utility functions and helpers

use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Largest precision any registered asset may declare; 10^19 is the largest power of ten in u64.
pub const MAX_DECIMALS: u8 = 19;

/// Convert a human-readable decimal string into raw units using integer arithmetic only.
///
/// Rejects empty input, signs, non-digits, more fractional digits than `decimals`,
/// zero, and values that do not fit in `u64`.
pub fn parse_ui_amount(input: &str, decimals: u8) -> Result<u64, String> {
    let text = input.trim();
    if text.is_empty() {
        return Err("amount is empty".to_string());
    }
    if decimals > MAX_DECIMALS {
        return Err(format!("unsupported precision: {} decimals", decimals));
    }

    let (whole, fraction) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(format!("not a number: {}", text));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("not a non-negative decimal number: {}", text));
    }

    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals as usize {
        return Err(format!(
            "{} has more than {} fractional digits",
            text, decimals
        ));
    }

    let scale = 10u64.pow(decimals as u32);
    let whole_value: u64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| format!("amount too large: {}", text))?
    };
    let fraction_value: u64 = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", fraction, width = decimals as usize);
        padded
            .parse()
            .map_err(|_| format!("amount too large: {}", text))?
    };

    let raw = whole_value
        .checked_mul(scale)
        .and_then(|v| v.checked_add(fraction_value))
        .ok_or_else(|| format!("amount too large: {}", text))?;

    if raw == 0 {
        return Err("amount must be positive".to_string());
    }
    Ok(raw)
}

/// Format raw units as a decimal string without going through floating point.
pub fn format_amount(raw: u64, decimals: u8) -> String {
    if decimals == 0 {
        return raw.to_string();
    }
    let scale = 10u128.pow(decimals as u32);
    let raw = raw as u128;
    let whole = raw / scale;
    let fraction = raw % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let fraction = format!("{:0>width$}", fraction, width = decimals as usize);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

/// Parse a base58 address
pub fn parse_address(address: &str) -> Result<Pubkey, String> {
    Pubkey::from_str(address.trim()).map_err(|e| format!("{}: {}", address, e))
}

pub fn format_address(address: &Pubkey) -> String {
    let s = address.to_string();
    if s.len() <= 16 {
        return s;
    }
    format!("{}...{}", &s[..8], &s[s.len() - 8..])
}

pub fn explorer_url(signature: &str) -> String {
    format!("https://solscan.io/tx/{}", signature)
}

/// Generate unique ID
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
