//! Static token metadata and lookups.
//!
//! The registry is loaded once from configuration (or the built-in Polygon
//! list) and never mutated. Symbol lookups ignore case, as do address lookups
//! since addresses compare as bytes.

use crate::utils::constants::POLYGON_CHAIN_ID;
use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};

/// Metadata for one ERC-20 token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
	pub name: String,
	pub address: Address,
	pub symbol: String,
	pub decimals: u8,
	pub chain_id: u64,
	#[serde(rename = "logoURI", alias = "logo_uri", default)]
	pub logo_uri: String,
}

/// Immutable list of known tokens.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
	tokens: Vec<Token>,
}

impl TokenRegistry {
	pub fn new(tokens: Vec<Token>) -> Self {
		Self { tokens }
	}

	/// The tokens tradable on Polygon PoS out of the box.
	pub fn polygon() -> Self {
		const ASSETS: &str =
			"https://raw.githubusercontent.com/maticnetwork/polygon-token-assets/main/assets/tokenAssets";
		let token = |name: &str, symbol: &str, decimals: u8, address: Address, logo: &str| Token {
			name: name.to_string(),
			address,
			symbol: symbol.to_string(),
			decimals,
			chain_id: POLYGON_CHAIN_ID,
			logo_uri: format!("{}/{}", ASSETS, logo),
		};

		Self::new(vec![
			token(
				"Wrapped Polygon Ecosystem Token",
				"WMATIC",
				18,
				address!("0x0d500b1d8e8ef31e21c99d1db9a6444d3adf1270"),
				"matic.svg",
			),
			token(
				"USD Coin",
				"USDC",
				6,
				address!("0x3c499c542cef5e3811e1192ce70d8cc03d5c3359"),
				"usdc.svg",
			),
			token(
				"Dai - PoS",
				"DAI",
				18,
				address!("0x8f3cf7ad23cd3cadbd9735aff958023239c6a063"),
				"dai.svg",
			),
		])
	}

	pub fn all(&self) -> &[Token] {
		&self.tokens
	}

	pub fn by_symbol(&self, symbol: &str) -> Option<&Token> {
		self.tokens
			.iter()
			.find(|token| token.symbol.eq_ignore_ascii_case(symbol))
	}

	pub fn by_address(&self, address: &Address) -> Option<&Token> {
		self.tokens.iter().find(|token| &token.address == address)
	}

	/// Tokens deployed on `chain_id`.
	pub fn for_chain(&self, chain_id: u64) -> impl Iterator<Item = &Token> {
		self.tokens
			.iter()
			.filter(move |token| token.chain_id == chain_id)
	}

	pub fn is_empty(&self) -> bool {
		self.tokens.is_empty()
	}
}
