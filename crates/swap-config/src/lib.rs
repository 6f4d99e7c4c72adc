//! Configuration for the swap gateway and the headless swap client.
//!
//! Configuration is read from TOML. `${VAR}` and `${VAR:-default}` references
//! are resolved from the environment before parsing, and a file may pull in
//! others with `include = ["networks.toml"]`. Every top-level section must be
//! defined exactly once across the included files.

mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use swap_types::{
	deserialize_networks,
	utils::constants::{AFFILIATE_FEE_BPS, FEE_RECIPIENT, POLYGON_CHAIN_ID},
	Address, NetworkConfig, NetworksConfig, Token, TokenRegistry,
};
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// The default rendering dumps the whole input.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub app: AppConfig,
	#[serde(deserialize_with = "deserialize_networks")]
	pub networks: NetworksConfig,
	pub pricing: PricingConfig,
	#[serde(default)]
	pub fees: FeeConfig,
	pub siwe: SiweConfig,
	/// Only the headless client signs; the server never holds a key.
	pub account: Option<AccountConfig>,
	/// Overrides the built-in Polygon token list when non-empty.
	#[serde(default)]
	pub tokens: Vec<Token>,
	#[serde(default)]
	pub delivery: DeliveryConfig,
	pub api: Option<ApiConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
	/// Instance name used in logs.
	pub id: String,
	/// Chain every swap action is gated on.
	#[serde(default = "default_required_chain_id")]
	pub required_chain_id: u64,
}

fn default_required_chain_id() -> u64 {
	POLYGON_CHAIN_ID
}

/// Pricing backends, keyed by implementation name.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
}

/// Integrator fee attached to every price and quote request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeeConfig {
	#[serde(default = "default_fee_recipient")]
	pub recipient: Address,
	#[serde(default = "default_fee_bps")]
	pub bps: u16,
}

impl Default for FeeConfig {
	fn default() -> Self {
		Self {
			recipient: default_fee_recipient(),
			bps: default_fee_bps(),
		}
	}
}

fn default_fee_recipient() -> Address {
	FEE_RECIPIENT
}

fn default_fee_bps() -> u16 {
	AFFILIATE_FEE_BPS
}

/// Fields of the sign-in message the server expects.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiweConfig {
	pub domain: String,
	pub uri: String,
	#[serde(default)]
	pub statement: Option<String>,
	#[serde(default = "default_nonce_ttl")]
	pub nonce_ttl_seconds: u64,
}

fn default_nonce_ttl() -> u64 {
	300
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
}

/// Confirmation tracking for submitted transactions.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryConfig {
	#[serde(default = "default_confirmations")]
	pub min_confirmations: u64,
	#[serde(default = "default_poll_interval")]
	pub poll_interval_seconds: u64,
	#[serde(default = "default_confirmation_timeout")]
	pub confirmation_timeout_seconds: u64,
}

impl Default for DeliveryConfig {
	fn default() -> Self {
		Self {
			min_confirmations: default_confirmations(),
			poll_interval_seconds: default_poll_interval(),
			confirmation_timeout_seconds: default_confirmation_timeout(),
		}
	}
}

fn default_confirmations() -> u64 {
	1
}

fn default_poll_interval() -> u64 {
	3
}

fn default_confirmation_timeout() -> u64 {
	600
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// Lifetime of a signed-in session.
	#[serde(default = "default_session_ttl")]
	pub session_ttl_seconds: u64,
	#[serde(default = "default_cookie_name")]
	pub cookie_name: String,
	pub cors: Option<CorsConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	pub allowed_origins: Vec<String>,
	#[serde(default)]
	pub allowed_headers: Vec<String>,
	#[serde(default)]
	pub allowed_methods: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	1024 * 1024
}

fn default_session_ttl() -> u64 {
	86_400
}

fn default_cookie_name() -> String {
	"swap_session".to_string()
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of `VAR_NAME`, or with the fallback
/// in `${VAR_NAME:-fallback}` when the variable is unset. Inputs over 1MB are
/// rejected before matching.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut output = String::with_capacity(input.len());
	let mut last = 0;
	for cap in re.captures_iter(input) {
		let (Some(full), Some(name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match (std::env::var(name.as_str()), cap.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					name.as_str()
				)))
			},
		};
		output.push_str(&input[last..full.start()]);
		output.push_str(&value);
		last = full.end();
	}
	output.push_str(&input[last..]);

	Ok(output)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Tokens known to this deployment.
	pub fn token_registry(&self) -> TokenRegistry {
		if self.tokens.is_empty() {
			TokenRegistry::polygon()
		} else {
			TokenRegistry::new(self.tokens.clone())
		}
	}

	/// Network settings for the chain swaps must run on.
	pub fn required_network(&self) -> Option<&NetworkConfig> {
		self.networks.get(&self.app.required_chain_id)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.app.id.is_empty() {
			return Err(ConfigError::Validation("App ID cannot be empty".into()));
		}

		if !self.networks.contains_key(&self.app.required_chain_id) {
			return Err(ConfigError::Validation(format!(
				"Required chain {} has no entry in [networks]",
				self.app.required_chain_id
			)));
		}
		for (chain_id, network) in &self.networks {
			if network.rpc_url.is_empty() {
				return Err(ConfigError::Validation(format!(
					"Network {} must have rpc_url",
					chain_id
				)));
			}
		}

		if self.pricing.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Pricing primary implementation cannot be empty".into(),
			));
		}
		if !self
			.pricing
			.implementations
			.contains_key(&self.pricing.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary pricing '{}' not found in implementations",
				self.pricing.primary
			)));
		}

		if self.fees.bps > 10_000 {
			return Err(ConfigError::Validation(
				"fees.bps cannot exceed 10000".into(),
			));
		}

		if self.siwe.domain.is_empty() || self.siwe.uri.is_empty() {
			return Err(ConfigError::Validation(
				"siwe.domain and siwe.uri must be set".into(),
			));
		}
		if self.siwe.nonce_ttl_seconds == 0 {
			return Err(ConfigError::Validation(
				"siwe.nonce_ttl_seconds must be greater than 0".into(),
			));
		}

		if let Some(account) = &self.account {
			if !account.implementations.contains_key(&account.primary) {
				return Err(ConfigError::Validation(format!(
					"Primary account '{}' not found in implementations",
					account.primary
				)));
			}
		}

		for token in &self.tokens {
			if token.symbol.is_empty() {
				return Err(ConfigError::Validation(format!(
					"Token {} must have a symbol",
					token.address
				)));
			}
		}

		if self.delivery.min_confirmations == 0 {
			return Err(ConfigError::Validation(
				"min_confirmations must be at least 1".into(),
			));
		}
		if self.delivery.poll_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"poll_interval_seconds must be greater than 0".into(),
			));
		}

		if let Some(api) = &self.api {
			if api.enabled && api.cookie_name.is_empty() {
				return Err(ConfigError::Validation(
					"api.cookie_name cannot be empty".into(),
				));
			}
		}

		Ok(())
	}
}

/// Parses and validates a configuration string, resolving environment
/// variables first.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	pub(crate) const MINIMAL: &str = r#"
[app]
id = "swap-gateway"

[networks.137]
name = "Polygon PoS"
rpc_url = "https://polygon-rpc.com"
explorer_url = "https://polygonscan.com"

[siwe]
domain = "localhost:3000"
uri = "http://localhost:3000"

[pricing]
primary = "zeroex"
[pricing.implementations.zeroex]
base_url = "https://api.0x.org"
api_key = "test-key"
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("SWAP_TEST_HOST", "localhost");
		std::env::set_var("SWAP_TEST_PORT", "5432");

		let result = resolve_env_vars("host = \"${SWAP_TEST_HOST}:${SWAP_TEST_PORT}\"").unwrap();
		assert_eq!(result, "host = \"localhost:5432\"");

		std::env::remove_var("SWAP_TEST_HOST");
		std::env::remove_var("SWAP_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let result = resolve_env_vars("value = \"${SWAP_MISSING_VAR:-fallback}\"").unwrap();
		assert_eq!(result, "value = \"fallback\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let result = resolve_env_vars("value = \"${SWAP_MISSING_VAR}\"");
		assert!(result.unwrap_err().to_string().contains("SWAP_MISSING_VAR"));
	}

	#[test]
	fn test_minimal_config_defaults() {
		let config: Config = MINIMAL.parse().unwrap();
		assert_eq!(config.app.required_chain_id, 137);
		assert_eq!(config.fees.bps, 100);
		assert_eq!(config.fees.recipient, FEE_RECIPIENT);
		assert_eq!(config.siwe.nonce_ttl_seconds, 300);
		assert_eq!(config.delivery.min_confirmations, 1);
		assert!(config.api.is_none());
		assert_eq!(config.token_registry().all().len(), 3);
		assert_eq!(
			config.required_network().unwrap().explorer_url,
			"https://polygonscan.com"
		);
	}

	#[test]
	fn test_api_defaults() {
		let config: Config = format!("{}\n[api]\nenabled = true\n", MINIMAL).parse().unwrap();
		let api = config.api.unwrap();
		assert_eq!(api.port, 3000);
		assert_eq!(api.cookie_name, "swap_session");
		assert_eq!(api.session_ttl_seconds, 86_400);
	}

	#[test]
	fn test_custom_tokens_replace_builtin_list() {
		let text = format!(
			r#"{}
[[tokens]]
name = "Wrapped Ether"
address = "0x7ceb23fd6bc0add59e62ac25578270cff1b9f619"
symbol = "WETH"
decimals = 18
chainId = 137
logoURI = "https://example.com/weth.svg"
"#,
			MINIMAL
		);
		let config: Config = text.parse().unwrap();
		let registry = config.token_registry();
		assert_eq!(registry.all().len(), 1);
		assert!(registry.by_symbol("weth").is_some());
	}

	#[test]
	fn test_missing_required_network_is_rejected() {
		let text = MINIMAL.replace("[networks.137]", "[networks.1]");
		let err = text.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Required chain 137"));
	}

	#[test]
	fn test_unknown_primary_pricing_is_rejected() {
		let text = MINIMAL.replace("primary = \"zeroex\"", "primary = \"other\"");
		assert!(matches!(
			text.parse::<Config>(),
			Err(ConfigError::Validation(_))
		));
	}

	#[test]
	fn test_fee_bps_upper_bound() {
		let text = format!("{}\n[fees]\nbps = 10001\n", MINIMAL);
		assert!(text.parse::<Config>().is_err());
	}
}
