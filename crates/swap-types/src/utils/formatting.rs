//! String formatting utilities.

/// Shortens a hash or id for log lines: first 10 characters then "..".
pub fn truncate_id(id: &str) -> String {
	if id.chars().count() <= 10 {
		id.to_string()
	} else {
		format!("{}..", id.chars().take(10).collect::<String>())
	}
}

/// Adds "0x" prefix to a hex string if it doesn't already have one.
pub fn with_0x_prefix(hex_str: &str) -> String {
	if hex_str.to_lowercase().starts_with("0x") {
		hex_str.to_string()
	} else {
		format!("0x{}", hex_str)
	}
}

/// Link to a transaction on a block explorer, e.g. `https://polygonscan.com/tx/0x..`.
pub fn explorer_tx_url(explorer_url: &str, tx_hash: &str) -> String {
	format!(
		"{}/tx/{}",
		explorer_url.trim_end_matches('/'),
		with_0x_prefix(tx_hash)
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_prefix_helpers() {
		assert_eq!(with_0x_prefix("abcd"), "0xabcd");
		assert_eq!(with_0x_prefix("0Xabcd"), "0Xabcd");
	}

	#[test]
	fn test_explorer_link() {
		assert_eq!(
			explorer_tx_url("https://polygonscan.com/", "ab12"),
			"https://polygonscan.com/tx/0xab12"
		);
	}

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("0x12345678"), "0x12345678");
		assert_eq!(truncate_id("0x1234567890abcdef"), "0x12345678..");
		// Multi-byte characters are counted whole, never split.
		assert_eq!(truncate_id("ñññññññññññ"), "ññññññññññ..");
		assert_eq!(truncate_id("ññññññññññ"), "ññññññññññ");
	}
}
