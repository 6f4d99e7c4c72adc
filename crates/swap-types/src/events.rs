//! Event types emitted by the swap pipeline.
//!
//! Each open swap form is identified by a form id; every event carries it so
//! subscribers rendering a single form can filter the stream.

use crate::{PriceQuote, TransactionHash, TransactionReceipt, ValidationIssue};
use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Main event type encompassing all pipeline events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SwapEvent {
	/// Events from the wallet context.
	Wallet(WalletEvent),
	/// Events from price and quote fetching.
	Pricing(PricingEvent),
	/// Events from the allowance gate.
	Allowance(AllowanceEvent),
	/// Events from transaction submission.
	Delivery(DeliveryEvent),
}

/// Events related to the connected wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalletEvent {
	Connected { address: Address, chain_id: u64 },
	Disconnected,
	ChainChanged { chain_id: u64, required_chain_id: u64 },
	SignedIn { address: Address, chain_id: u64 },
	SignedOut,
}

/// Events related to pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PricingEvent {
	/// A current price was applied to the form.
	PriceUpdated { form_id: String, price: PriceQuote },
	/// The pricing service rejected the request parameters.
	PriceRejected {
		form_id: String,
		issues: Vec<ValidationIssue>,
	},
	/// A response for superseded parameters arrived and was dropped.
	StalePriceDiscarded { form_id: String, generation: u64 },
	/// The executable quote for a finalized price is ready.
	QuoteReady { form_id: String },
}

/// Events related to ERC-20 allowance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AllowanceEvent {
	Insufficient {
		form_id: String,
		spender: Address,
		allowance: String,
		required: String,
	},
	ApprovalSubmitted {
		form_id: String,
		tx_hash: TransactionHash,
	},
	ApprovalConfirmed {
		form_id: String,
		allowance: String,
	},
}

/// Events related to transaction delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeliveryEvent {
	/// The wallet accepted the transaction.
	TransactionPending {
		form_id: String,
		tx_hash: TransactionHash,
		explorer_url: String,
	},
	/// The transaction was included successfully.
	TransactionConfirmed {
		form_id: String,
		receipt: TransactionReceipt,
	},
	/// Signing, broadcast or execution failed.
	TransactionFailed { form_id: String, error: String },
}

impl AllowanceEvent {
	pub fn insufficient(form_id: &str, spender: Address, allowance: U256, required: U256) -> Self {
		AllowanceEvent::Insufficient {
			form_id: form_id.to_string(),
			spender,
			allowance: allowance.to_string(),
			required: required.to_string(),
		}
	}
}
