use crate::error::{PersonaError, PersonaResult};

/// Validates and lowercases an account address. All cache keys and address
/// comparisons use the normalized form.
pub fn normalize_address(address: &str) -> PersonaResult<String> {
    let trimmed = address.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"));

    match hex_part {
        Some(digits) if digits.len() == 40 && digits.chars().all(|c| c.is_ascii_hexdigit()) => {
            Ok(format!("0x{}", digits.to_ascii_lowercase()))
        }
        _ => Err(PersonaError::InvalidAddress(trimmed.to_string())),
    }
}

/// Parses a 0x-prefixed hex quantity. Values beyond `u128` are rejected
/// rather than truncated.
pub fn parse_hex_quantity(raw: &str) -> Option<u128> {
    let digits = raw.trim().strip_prefix("0x").unwrap_or(raw.trim());
    if digits.is_empty() {
        return Some(0);
    }
    u128::from_str_radix(digits, 16).ok()
}

/// Formats a raw token amount as a decimal string adjusted for `decimals`,
/// trailing zeros trimmed but always at least one fractional digit
/// (ethers `formatUnits` convention).
pub fn format_units(raw: u128, decimals: u8) -> String {
    if decimals == 0 {
        return raw.to_string();
    }

    let divisor = match 10u128.checked_pow(decimals as u32) {
        Some(divisor) => divisor,
        // decimals > 38 exceeds u128 range; leave the raw units alone
        None => return raw.to_string(),
    };

    let whole = raw / divisor;
    let frac = raw % divisor;
    let mut frac_str = format!("{:0width$}", frac, width = decimals as usize);
    while frac_str.len() > 1 && frac_str.ends_with('0') {
        frac_str.pop();
    }
    format!("{}.{}", whole, frac_str)
}
