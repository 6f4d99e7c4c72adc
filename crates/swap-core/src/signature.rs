//! Permit signatures.
//!
//! When a quote carries a permit2 message the taker signs it, and the router
//! expects the signature appended to the quoted calldata as
//! `calldata ‖ uint256(len(signature)) ‖ signature`, the length written as a
//! 32-byte big-endian word.

use crate::SwapError;
use std::sync::Arc;
use swap_account::AccountService;
use swap_types::{
	utils::constants::SIGNATURE_LENGTH_WORD, Address, Bytes, ExecutableQuote, SwapTransaction,
	U256,
};

/// Appends a length-prefixed signature to `calldata`.
pub fn append_signature(calldata: &[u8], signature: &[u8]) -> Bytes {
	let mut data = Vec::with_capacity(calldata.len() + SIGNATURE_LENGTH_WORD + signature.len());
	data.extend_from_slice(calldata);
	data.extend_from_slice(&U256::from(signature.len()).to_be_bytes::<32>());
	data.extend_from_slice(signature);
	data.into()
}

/// Turns an executable quote into the transaction the wallet sends.
#[derive(Clone)]
pub struct SignatureAppender {
	account: Arc<AccountService>,
}

impl SignatureAppender {
	pub fn new(account: Arc<AccountService>) -> Self {
		Self { account }
	}

	/// Signs the quote's permit, if it has one, and builds the transaction.
	///
	/// A quote without calldata cannot be sent; this is reported as
	/// [`SwapError::MissingCalldata`] rather than sending an empty call.
	pub async fn apply(
		&self,
		quote: &ExecutableQuote,
		from: Address,
		chain_id: u64,
	) -> Result<SwapTransaction, SwapError> {
		let calldata = quote
			.transaction
			.data
			.as_ref()
			.filter(|data| !data.is_empty())
			.ok_or(SwapError::MissingCalldata)?;

		let data = match quote.permit_message() {
			Some(typed_data) => {
				let signature = self
					.account
					.sign_typed_data(typed_data)
					.await
					.map_err(|e| SwapError::Signing(e.to_string()))?;
				append_signature(calldata, &signature.as_bytes())
			},
			None => calldata.clone(),
		};

		Ok(SwapTransaction {
			from: Some(from),
			to: quote.transaction.to,
			data,
			value: quote.transaction.value.unwrap_or_default(),
			gas: quote.transaction.gas.map(|gas| gas.saturating_to::<u64>()),
			chain_id,
		})
	}
}
