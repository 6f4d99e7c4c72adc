//! ERC-20 allowance gate.
//!
//! The price response names the spender that must be approved, if any. The
//! gate reads the on-chain allowance for that spender and, when it is below
//! the sell amount, sends an unlimited approval and re-reads it afterwards.

use crate::SwapError;
use serde::Serialize;
use std::sync::Arc;
use swap_delivery::DeliveryService;
use swap_types::{utils::constants::MAX_ALLOWANCE, Address, TransactionHash, U256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum AllowanceStatus {
	/// The price named no spender; nothing to approve.
	NotRequired,
	Sufficient { spender: Address, allowance: U256 },
	Insufficient {
		spender: Address,
		allowance: U256,
		required: U256,
	},
}

impl AllowanceStatus {
	/// Whether the swap may proceed without an approval.
	pub fn is_satisfied(&self) -> bool {
		!matches!(self, AllowanceStatus::Insufficient { .. })
	}

	pub fn spender(&self) -> Option<Address> {
		match self {
			AllowanceStatus::NotRequired => None,
			AllowanceStatus::Sufficient { spender, .. }
			| AllowanceStatus::Insufficient { spender, .. } => Some(*spender),
		}
	}
}

#[derive(Clone)]
pub struct AllowanceGate {
	delivery: Arc<DeliveryService>,
}

impl AllowanceGate {
	pub fn new(delivery: Arc<DeliveryService>) -> Self {
		Self { delivery }
	}

	pub async fn check(
		&self,
		owner: Address,
		token: Address,
		spender: Option<Address>,
		required: U256,
	) -> Result<AllowanceStatus, SwapError> {
		let Some(spender) = spender else {
			return Ok(AllowanceStatus::NotRequired);
		};
		let allowance = self.delivery.get_allowance(owner, spender, token).await?;
		tracing::debug!(
			owner = %owner,
			token = %token,
			spender = %spender,
			allowance = %allowance,
			required = %required,
			"Checked allowance"
		);
		Ok(if allowance >= required {
			AllowanceStatus::Sufficient { spender, allowance }
		} else {
			AllowanceStatus::Insufficient {
				spender,
				allowance,
				required,
			}
		})
	}

	/// Sends `approve(spender, MAX)` and returns as soon as it is accepted.
	pub async fn request_approval(
		&self,
		owner: Address,
		token: Address,
		spender: Address,
	) -> Result<TransactionHash, SwapError> {
		Ok(self
			.delivery
			.approve(owner, token, spender, MAX_ALLOWANCE)
			.await?)
	}

	/// Waits for an approval to be mined and re-reads the allowance.
	pub async fn await_approval(
		&self,
		hash: &TransactionHash,
		owner: Address,
		token: Address,
		spender: Address,
		required: U256,
	) -> Result<AllowanceStatus, SwapError> {
		let receipt = self.delivery.confirm(hash).await?;
		if !receipt.success {
			tracing::warn!(tx_hash = %hash, "Approval reverted");
			return Err(SwapError::Reverted(*hash));
		}
		self.check(owner, token, Some(spender), required).await
	}

	pub async fn approve(
		&self,
		owner: Address,
		token: Address,
		spender: Address,
		required: U256,
	) -> Result<AllowanceStatus, SwapError> {
		let hash = self.request_approval(owner, token, spender).await?;
		self.await_approval(&hash, owner, token, spender, required)
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{delivery, StubChain};
	use std::sync::atomic::Ordering;

	const OWNER: Address = Address::repeat_byte(0x01);
	const TOKEN: Address = Address::repeat_byte(0x02);
	const SPENDER: Address = Address::repeat_byte(0x03);

	#[tokio::test]
	async fn test_no_spender_needs_no_approval() {
		let gate = AllowanceGate::new(delivery(StubChain::new()));
		let status = gate.check(OWNER, TOKEN, None, U256::from(10)).await.unwrap();
		assert_eq!(status, AllowanceStatus::NotRequired);
		assert!(status.is_satisfied());
	}

	#[tokio::test]
	async fn test_check_compares_against_required() {
		let chain = StubChain::new();
		chain.set_allowance(U256::from(10));
		let gate = AllowanceGate::new(delivery(chain));

		assert!(gate
			.check(OWNER, TOKEN, Some(SPENDER), U256::from(10))
			.await
			.unwrap()
			.is_satisfied());
		assert_eq!(
			gate.check(OWNER, TOKEN, Some(SPENDER), U256::from(11))
				.await
				.unwrap(),
			AllowanceStatus::Insufficient {
				spender: SPENDER,
				allowance: U256::from(10),
				required: U256::from(11)
			}
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_approve_then_reread() {
		let chain = StubChain::new();
		let gate = AllowanceGate::new(delivery(chain.clone()));

		let status = gate
			.approve(OWNER, TOKEN, SPENDER, U256::from(1_000))
			.await
			.unwrap();
		assert!(matches!(status, AllowanceStatus::Sufficient { allowance, .. } if allowance == U256::MAX));

		let sent = chain.submitted();
		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].to, TOKEN);
		assert_eq!(
			sent[0].data.as_ref(),
			swap_delivery::approve_calldata(SPENDER, U256::MAX).as_slice()
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_confirmed_approval_is_read_back() {
		let chain = StubChain::new();
		chain.ignore_approvals.store(true, Ordering::SeqCst);
		chain.set_allowance(U256::from(5));
		let gate = AllowanceGate::new(delivery(chain.clone()));

		let status = gate
			.approve(OWNER, TOKEN, SPENDER, U256::from(1_000))
			.await
			.unwrap();
		assert_eq!(
			status,
			AllowanceStatus::Insufficient {
				spender: SPENDER,
				allowance: U256::from(5),
				required: U256::from(1_000)
			}
		);
		assert_eq!(chain.submitted().len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_reverted_approval_is_an_error() {
		let chain = StubChain::new();
		chain.revert.store(true, Ordering::SeqCst);
		let gate = AllowanceGate::new(delivery(chain));
		let result = gate.approve(OWNER, TOKEN, SPENDER, U256::from(1)).await;
		assert!(matches!(result, Err(SwapError::Reverted(_))));
	}
}
