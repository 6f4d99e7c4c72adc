//! Swap pipeline for a connected wallet.
//!
//! A swap runs through a fixed sequence: price the pair, make sure the router
//! may spend the sell token, fetch the executable quote, sign the permit and
//! splice the signature into the calldata, then broadcast and watch the
//! transaction. Each stage lives in its own module; [`engine`] wires them to
//! a [`state::SwapForm`] per open form.

pub mod allowance;
pub mod builder;
pub mod context;
pub mod engine;
pub mod gate;
pub mod price;
pub mod quote;
pub mod signature;
pub mod state;
pub mod submit;

pub use allowance::{AllowanceGate, AllowanceStatus};
pub use builder::{BuilderError, SwapEngineBuilder};
pub use context::{SessionStatus, SignInSettings, WalletContext, WalletState};
pub use engine::{event_bus::EventBus, SwapEngine, SwapPipeline};
pub use gate::SwapView;
pub use price::{format_amount, parse_amount, FeeParams, PriceFetcher, PriceRequest, PriceTracker, SwapAmount};
pub use quote::QuoteFetcher;
pub use signature::{append_signature, SignatureAppender};
pub use state::{FormSnapshot, FormStateError, FormStatus, PriceApplied, SwapForm};
pub use submit::{PendingSwap, TransactionSubmitter};

use swap_delivery::DeliveryError;
use swap_pricing::PricingError;
use swap_types::{QuoteParseError, TransactionHash};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwapError {
	#[error("Invalid amount: {0}")]
	InvalidAmount(String),
	#[error("Invalid request: {0}")]
	InvalidRequest(String),
	#[error("Unknown token: {0}")]
	UnknownToken(String),
	#[error("Wallet not connected")]
	NotConnected,
	#[error("Not authenticated")]
	NotAuthenticated,
	#[error("Wrong chain: connected to {current}, swaps require {required}")]
	WrongChain { current: u64, required: u64 },
	/// Transport or service failure; reported, never retried.
	#[error("Pricing failed: {0}")]
	Pricing(String),
	#[error("Upstream error: {0}")]
	Upstream(String),
	#[error("Permit must be signed but the quote has no calldata")]
	MissingCalldata,
	#[error("Signing failed: {0}")]
	Signing(String),
	#[error("Delivery failed: {0}")]
	Delivery(#[from] DeliveryError),
	#[error("Transaction {0} reverted")]
	Reverted(TransactionHash),
	#[error(transparent)]
	State(#[from] FormStateError),
}

impl From<PricingError> for SwapError {
	fn from(err: PricingError) -> Self {
		match err {
			PricingError::Unauthenticated => SwapError::NotAuthenticated,
			PricingError::Upstream { message, .. } => SwapError::Upstream(message),
			other => SwapError::Pricing(other.to_string()),
		}
	}
}

impl From<QuoteParseError> for SwapError {
	fn from(err: QuoteParseError) -> Self {
		match err {
			QuoteParseError::Upstream(message) => SwapError::Upstream(message),
			QuoteParseError::Malformed(message) => SwapError::Pricing(message),
		}
	}
}

#[cfg(test)]
pub(crate) mod test_support;
