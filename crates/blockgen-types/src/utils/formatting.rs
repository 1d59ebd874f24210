//! String formatting utilities.
//!
//! Hex prefix management and truncation of long identifiers for log output.

/// Truncates a hex string for display purposes.
///
/// Shows only the first 10 characters followed by ".." for longer strings,
/// enough to keep the `0x` prefix and eight digits.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(10) {
		Some((end, _)) => format!("{}..", &id[..end]),
		None => id.to_string(),
	}
}

/// Adds "0x" prefix to a hex string if it doesn't already have one.
pub fn with_0x_prefix(hex_str: &str) -> String {
	if hex_str.starts_with("0x") || hex_str.starts_with("0X") {
		hex_str.to_string()
	} else {
		format!("0x{}", hex_str)
	}
}

/// Removes "0x" or "0X" prefix from a hex string if present.
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}
