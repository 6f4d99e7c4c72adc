//! Network configuration types.
//!
//! Each configured chain carries an RPC endpoint for the wallet provider and
//! a block explorer used to build transaction links.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Configuration for a single blockchain network.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetworkConfig {
	/// Display name, e.g. "Polygon PoS".
	pub name: String,
	/// HTTP(S) RPC endpoint.
	pub rpc_url: String,
	/// Block explorer base URL, e.g. "https://polygonscan.com".
	pub explorer_url: String,
}

/// Networks configuration mapping chain IDs to their configurations.
pub type NetworksConfig = HashMap<u64, NetworkConfig>;

/// Deserializes networks keyed by chain id strings (TOML has no integer keys).
pub fn deserialize_networks<'de, D>(deserializer: D) -> Result<NetworksConfig, D::Error>
where
	D: Deserializer<'de>,
{
	let string_map: HashMap<String, NetworkConfig> = HashMap::deserialize(deserializer)?;
	string_map
		.into_iter()
		.map(|(key, value)| {
			key.parse::<u64>()
				.map(|chain_id| (chain_id, value))
				.map_err(|e| serde::de::Error::custom(format!("Invalid chain_id '{}': {}", key, e)))
		})
		.collect()
}
