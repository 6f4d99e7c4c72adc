//! Indicative pricing.
//!
//! A [`PriceRequest`] is built from what the user typed: a token pair and
//! exactly one of a sell or buy amount. Amounts are parsed against the
//! token's decimals before anything leaves the process, so malformed input
//! never reaches the pricing service.

use crate::SwapError;
use alloy::primitives::utils::{format_units, parse_units};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use swap_pricing::{PricingService, QueryParams};
use swap_types::{Address, PriceOutcome, Token, U256};

/// Which side of the trade the user fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SwapAmount {
	Sell(U256),
	Buy(U256),
}

/// Affiliate fee attached to every price and quote request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeParams {
	pub recipient: Address,
	pub bps: u16,
}

/// Parameters of one price request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRequest {
	pub chain_id: u64,
	pub sell_token: Token,
	pub buy_token: Token,
	pub amount: SwapAmount,
	pub taker: Option<Address>,
	pub fees: FeeParams,
}

impl PriceRequest {
	/// Validates user input. Exactly one of `sell_amount` and `buy_amount`
	/// must be given; it is parsed with the decimals of its own token.
	pub fn new(
		sell_token: &Token,
		buy_token: &Token,
		sell_amount: Option<&str>,
		buy_amount: Option<&str>,
		taker: Option<Address>,
		fees: FeeParams,
	) -> Result<Self, SwapError> {
		if sell_token.address == buy_token.address {
			return Err(SwapError::InvalidRequest(
				"sell and buy token must differ".to_string(),
			));
		}
		if sell_token.chain_id != buy_token.chain_id {
			return Err(SwapError::InvalidRequest(format!(
				"{} and {} are on different chains",
				sell_token.symbol, buy_token.symbol
			)));
		}

		let amount = match (non_empty(sell_amount), non_empty(buy_amount)) {
			(Some(sell), None) => SwapAmount::Sell(parse_amount(sell, sell_token.decimals)?),
			(None, Some(buy)) => SwapAmount::Buy(parse_amount(buy, buy_token.decimals)?),
			(Some(_), Some(_)) => {
				return Err(SwapError::InvalidAmount(
					"give either a sell or a buy amount, not both".to_string(),
				))
			},
			(None, None) => return Err(SwapError::InvalidAmount("amount is required".to_string())),
		};

		Ok(Self {
			chain_id: sell_token.chain_id,
			sell_token: sell_token.clone(),
			buy_token: buy_token.clone(),
			amount,
			taker,
			fees,
		})
	}

	/// Same trade for a different taker.
	pub fn with_taker(&self, taker: Address) -> Self {
		Self {
			taker: Some(taker),
			..self.clone()
		}
	}

	/// Query string understood by the price and quote endpoints. The fee is
	/// always taken in the buy token.
	pub fn to_params(&self) -> QueryParams {
		let mut params = vec![
			("chainId".to_string(), self.chain_id.to_string()),
			("sellToken".to_string(), self.sell_token.address.to_string()),
			("buyToken".to_string(), self.buy_token.address.to_string()),
		];
		match self.amount {
			SwapAmount::Sell(amount) => params.push(("sellAmount".to_string(), amount.to_string())),
			SwapAmount::Buy(amount) => params.push(("buyAmount".to_string(), amount.to_string())),
		}
		if let Some(taker) = self.taker {
			params.push(("taker".to_string(), taker.to_string()));
		}
		params.extend([
			("swapFeeRecipient".to_string(), self.fees.recipient.to_string()),
			("swapFeeBps".to_string(), self.fees.bps.to_string()),
			("swapFeeToken".to_string(), self.buy_token.address.to_string()),
			("tradeSurplusRecipient".to_string(), self.fees.recipient.to_string()),
		]);
		params
	}

	/// Whether `other` prices the same trade, ignoring the taker.
	pub fn same_trade(&self, other: &PriceRequest) -> bool {
		self.chain_id == other.chain_id
			&& self.sell_token.address == other.sell_token.address
			&& self.buy_token.address == other.buy_token.address
			&& self.amount == other.amount
	}
}

fn non_empty(value: Option<&str>) -> Option<&str> {
	value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parses a decimal amount such as `"1.5"` into base units.
///
/// Rejects empty, negative, non-numeric and zero input, and input with more
/// fractional digits than the token supports.
pub fn parse_amount(input: &str, decimals: u8) -> Result<U256, SwapError> {
	let input = input.trim();
	if input.is_empty() {
		return Err(SwapError::InvalidAmount("amount is required".to_string()));
	}
	if input.starts_with('-') {
		return Err(SwapError::InvalidAmount(format!("'{}' is negative", input)));
	}
	let (whole, fraction) = input.split_once('.').unwrap_or((input, ""));
	let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
	if (whole.is_empty() && fraction.is_empty()) || !digits_only(whole) || !digits_only(fraction) {
		return Err(SwapError::InvalidAmount(format!("'{}' is not a number", input)));
	}
	if fraction.len() > decimals as usize {
		return Err(SwapError::InvalidAmount(format!(
			"'{}' has more than {} decimal places",
			input, decimals
		)));
	}

	let amount = parse_units(input, decimals)
		.map_err(|e| SwapError::InvalidAmount(format!("'{}': {}", input, e)))?
		.get_absolute();
	if amount.is_zero() {
		return Err(SwapError::InvalidAmount("amount must be greater than zero".to_string()));
	}
	Ok(amount)
}

/// Renders base units as a decimal string without trailing zeros.
pub fn format_amount(amount: U256, decimals: u8) -> String {
	let Ok(text) = format_units(amount, decimals) else {
		return amount.to_string();
	};
	if text.contains('.') {
		text.trim_end_matches('0').trim_end_matches('.').to_string()
	} else {
		text
	}
}

/// Fetches indicative prices.
#[derive(Clone)]
pub struct PriceFetcher {
	pricing: Arc<PricingService>,
}

impl PriceFetcher {
	pub fn new(pricing: Arc<PricingService>) -> Self {
		Self { pricing }
	}

	/// Prices `request`. Validation failures come back as
	/// [`PriceOutcome::Rejected`]; transport and service failures as errors.
	pub async fn fetch(&self, request: &PriceRequest) -> Result<PriceOutcome, SwapError> {
		let body = self.pricing.price(&request.to_params()).await?;
		Ok(PriceOutcome::from_upstream(body)?)
	}
}

/// Orders concurrent price requests for one form.
///
/// Every new request takes the next generation; a response is only applied
/// if its generation is still the latest, so the last request issued wins
/// regardless of arrival order.
#[derive(Debug, Default, Clone)]
pub struct PriceTracker {
	generation: u64,
}

impl PriceTracker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Starts a request and returns its generation.
	pub fn begin(&mut self) -> u64 {
		self.generation += 1;
		self.generation
	}

	/// Whether a response for `generation` may still be applied.
	pub fn accept(&self, generation: u64) -> bool {
		generation == self.generation
	}

	/// Drops every request in flight.
	pub fn invalidate(&mut self) {
		self.generation += 1;
	}
}
