use alloy::primitives::Address;

const HEX_DIGITS: usize = 40;

fn strip_prefix(input: &str) -> &str {
    input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input)
}

/// Parse an account address: an optional `0x` prefix followed by exactly 40
/// hex digits, surrounding whitespace ignored. Single-case input is taken as
/// is; mixed-case input must carry a valid EIP-55 checksum.
pub fn parse(input: &str) -> Option<Address> {
    let body = strip_prefix(input.trim());
    if body.len() != HEX_DIGITS || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let has_lower = body.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = body.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper {
        Address::parse_checksummed(format!("0x{body}"), None).ok()
    } else {
        body.parse().ok()
    }
}

pub fn is_well_formed(input: &str) -> bool {
    parse(input).is_some()
}

/// Checksummed `0x` form of a valid address.
pub fn normalize(input: &str) -> Option<String> {
    parse(input).map(|address| address.to_checksum(None))
}

/// Case-insensitive address comparison.
pub fn same_address(a: &str, b: &str) -> bool {
    strip_prefix(a.trim()).eq_ignore_ascii_case(strip_prefix(b.trim()))
}
