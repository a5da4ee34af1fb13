//! Display helpers for hashes and token amounts.

use alloy_primitives::U256;

/// Shortens a hash or id for log lines: first 8 characters followed by "..".
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(8) {
		Some((split, _)) => format!("{}..", &id[..split]),
		None => id.to_string(),
	}
}

/// Strips a leading `0x`/`0X`.
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}

/// Renders a base-unit amount as a plain decimal string without trailing zeros.
pub fn format_base_units(value: U256, decimals: u8) -> String {
	let places = decimals as usize;
	let digits = format!("{:0>width$}", value.to_string(), width = places + 1);
	let (integer, fraction) = digits.split_at(digits.len() - places);
	let fraction = fraction.trim_end_matches('0');
	if fraction.is_empty() {
		integer.to_string()
	} else {
		format!("{}.{}", integer, fraction)
	}
}
