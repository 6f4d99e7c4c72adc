//! Price and quote payloads returned by the pricing service.
//!
//! The upstream permit2 swap API answers `/price` with an indicative price and
//! `/quote` with an executable transaction plus an optional permit message.
//! Both are parsed leniently: unknown fields are ignored and optional blocks
//! may be absent or null.

use crate::api::{option_u256_serde, u256_serde};
use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised when an upstream body cannot be turned into a quote.
#[derive(Debug, Error)]
pub enum QuoteParseError {
	/// The body is an error object from the service or the gateway.
	#[error("Upstream error: {0}")]
	Upstream(String),
	/// The body is not a price or quote.
	#[error("Malformed response: {0}")]
	Malformed(String),
}

/// Spender that needs an ERC-20 allowance before the swap can settle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceIssue {
	#[serde(with = "u256_serde")]
	pub actual: U256,
	pub spender: Address,
}

/// Reported when the taker holds less than the sell amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceIssue {
	pub token: Address,
	#[serde(with = "u256_serde")]
	pub actual: U256,
	#[serde(with = "u256_serde")]
	pub expected: U256,
}

/// Issues the service found while simulating the trade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceIssues {
	#[serde(default)]
	pub allowance: Option<AllowanceIssue>,
	#[serde(default)]
	pub balance: Option<BalanceIssue>,
	#[serde(default)]
	pub simulation_incomplete: bool,
	#[serde(default, deserialize_with = "null_as_default")]
	pub invalid_sources_passed: Vec<String>,
}

/// A single fee line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
	#[serde(with = "u256_serde")]
	pub amount: U256,
	pub token: Address,
	#[serde(rename = "type", default)]
	pub kind: String,
}

/// Fees charged on the trade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
	/// Affiliate fee taken for the configured recipient.
	#[serde(default)]
	pub integrator_fee: Option<Fee>,
	#[serde(default)]
	pub zero_ex_fee: Option<Fee>,
	#[serde(default)]
	pub gas_fee: Option<Fee>,
}

/// Buy/sell tax of a fee-on-transfer token, in basis points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTax {
	#[serde(default)]
	pub buy_tax_bps: String,
	#[serde(default)]
	pub sell_tax_bps: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
	#[serde(default)]
	pub buy_token: TokenTax,
	#[serde(default)]
	pub sell_token: TokenTax,
}

/// Indicative price for a token pair and amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
	pub sell_token: Address,
	pub buy_token: Address,
	#[serde(with = "u256_serde")]
	pub sell_amount: U256,
	#[serde(with = "u256_serde")]
	pub buy_amount: U256,
	#[serde(default, with = "option_u256_serde")]
	pub min_buy_amount: Option<U256>,
	#[serde(default, deserialize_with = "null_as_default")]
	pub issues: PriceIssues,
	#[serde(default, deserialize_with = "null_as_default")]
	pub fees: FeeBreakdown,
	#[serde(default)]
	pub token_metadata: Option<TokenMetadata>,
	#[serde(default = "default_true")]
	pub liquidity_available: bool,
}

impl PriceQuote {
	/// The contract that must be approved to spend the sell token, if any.
	pub fn allowance_target(&self) -> Option<Address> {
		self.issues.allowance.as_ref().map(|issue| issue.spender)
	}
}

/// One rejected request parameter, e.g. a sell amount below the minimum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
	#[serde(default)]
	pub field: String,
	#[serde(default)]
	pub code: Option<i64>,
	#[serde(default, alias = "description")]
	pub reason: String,
}

/// Result of a price request that reached the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceOutcome {
	/// A usable price.
	Priced(PriceQuote),
	/// The parameters were rejected; nothing about the pair is known.
	Rejected(Vec<ValidationIssue>),
}

impl PriceOutcome {
	/// Interprets a price body from the service.
	///
	/// Validation errors in either the legacy `validationErrors` array or the
	/// `data.details` list take precedence over any amounts in the body, so a
	/// rejected request never yields a price.
	pub fn from_upstream(body: Value) -> Result<Self, QuoteParseError> {
		let issues = validation_issues(&body);
		if !issues.is_empty() {
			return Ok(PriceOutcome::Rejected(issues));
		}

		if body.get("liquidityAvailable") == Some(&Value::Bool(false)) {
			return Ok(PriceOutcome::Rejected(vec![ValidationIssue {
				field: "buyToken".to_string(),
				code: None,
				reason: "INSUFFICIENT_LIQUIDITY".to_string(),
			}]));
		}

		if body.get("buyAmount").is_none() {
			return Err(upstream_error(&body));
		}

		serde_json::from_value(body)
			.map(PriceOutcome::Priced)
			.map_err(|e| QuoteParseError::Malformed(e.to_string()))
	}
}

/// Transaction part of an executable quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteTransaction {
	pub to: Address,
	#[serde(default)]
	pub data: Option<Bytes>,
	#[serde(default, with = "option_u256_serde")]
	pub gas: Option<U256>,
	#[serde(default, with = "option_u256_serde")]
	pub gas_price: Option<U256>,
	#[serde(default, with = "option_u256_serde")]
	pub value: Option<U256>,
}

/// Off-chain permit the taker signs instead of an approval transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermitPayload {
	#[serde(rename = "type", default)]
	pub kind: String,
	#[serde(default)]
	pub hash: Option<B256>,
	pub eip712: TypedData,
}

/// Executable quote for a confirmed price.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutableQuote {
	pub sell_token: Address,
	pub buy_token: Address,
	#[serde(with = "u256_serde")]
	pub sell_amount: U256,
	#[serde(with = "u256_serde")]
	pub buy_amount: U256,
	pub transaction: QuoteTransaction,
	#[serde(default)]
	pub permit2: Option<PermitPayload>,
	#[serde(default, deserialize_with = "null_as_default")]
	pub issues: PriceIssues,
}

impl ExecutableQuote {
	/// Interprets a quote body from the service.
	pub fn from_upstream(body: Value) -> Result<Self, QuoteParseError> {
		if body.get("transaction").is_none() {
			return Err(upstream_error(&body));
		}
		serde_json::from_value(body).map_err(|e| QuoteParseError::Malformed(e.to_string()))
	}

	/// The typed-data message that must be signed before submission.
	pub fn permit_message(&self) -> Option<&TypedData> {
		self.permit2.as_ref().map(|permit| &permit.eip712)
	}
}

fn validation_issues(body: &Value) -> Vec<ValidationIssue> {
	let list = body
		.get("validationErrors")
		.and_then(Value::as_array)
		.or_else(|| body.pointer("/data/details").and_then(Value::as_array));

	list.map(|items| {
		items
			.iter()
			.filter_map(|item| serde_json::from_value(item.clone()).ok())
			.collect()
	})
	.unwrap_or_default()
}

fn upstream_error(body: &Value) -> QuoteParseError {
	let message = body
		.get("error")
		.or_else(|| body.get("message"))
		.or_else(|| body.get("reason"))
		.and_then(Value::as_str);
	match message {
		Some(message) => QuoteParseError::Upstream(message.to_string()),
		None => QuoteParseError::Malformed("unrecognised response body".to_string()),
	}
}

fn default_true() -> bool {
	true
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Default + Deserialize<'de>,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
