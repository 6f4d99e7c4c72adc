//! Transaction delivery for the swap client.
//!
//! The delivery layer is the wallet's view of the chain: which network it is
//! connected to, balances and allowances, broadcasting transactions and
//! watching for their receipts. [`DeliveryService`] adds confirmation polling
//! and ERC-20 approval on top of a raw [`DeliveryInterface`].

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use swap_types::{
	utils::constants::APPROVE_SELECTOR, Address, SwapTransaction, TransactionHash,
	TransactionReceipt, U256,
};
use thiserror::Error;

pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

#[derive(Debug, Error)]
pub enum DeliveryError {
	#[error("Network error: {0}")]
	Network(String),
	#[error("Transaction failed: {0}")]
	TransactionFailed(String),
	#[error("Chain {0} is not configured")]
	UnsupportedChain(u64),
	#[error("Wallet is on chain {actual}, transaction targets chain {expected}")]
	ChainMismatch { expected: u64, actual: u64 },
	#[error("Timed out: {0}")]
	Timeout(String),
}

/// Chain access through the connected wallet. All reads and writes go to the
/// chain the wallet is currently on.
#[async_trait]
pub trait DeliveryInterface: Send + Sync {
	/// Chain the wallet is connected to.
	fn chain_id(&self) -> u64;

	/// Moves the wallet to another configured chain.
	async fn switch_chain(&self, chain_id: u64) -> Result<(), DeliveryError>;

	/// Signs and broadcasts; returns as soon as the node accepts it.
	async fn submit(&self, tx: SwapTransaction) -> Result<TransactionHash, DeliveryError>;

	/// Receipt if the transaction has been included.
	async fn get_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, DeliveryError>;

	/// Native balance when `token` is `None`, ERC-20 balance otherwise.
	async fn get_balance(
		&self,
		owner: Address,
		token: Option<Address>,
	) -> Result<U256, DeliveryError>;

	async fn get_allowance(
		&self,
		owner: Address,
		spender: Address,
		token: Address,
	) -> Result<U256, DeliveryError>;

	async fn get_block_number(&self) -> Result<u64, DeliveryError>;
}

/// How long and how often to wait for inclusion.
#[derive(Debug, Clone)]
pub struct ConfirmationPolicy {
	pub min_confirmations: u64,
	pub poll_interval: Duration,
	pub timeout: Duration,
}

impl Default for ConfirmationPolicy {
	fn default() -> Self {
		Self {
			min_confirmations: 1,
			poll_interval: Duration::from_secs(3),
			timeout: Duration::from_secs(600),
		}
	}
}

/// Calldata for `approve(spender, amount)`.
pub fn approve_calldata(spender: Address, amount: U256) -> Vec<u8> {
	let mut call_data = Vec::with_capacity(4 + 64);
	call_data.extend_from_slice(&APPROVE_SELECTOR);
	call_data.extend_from_slice(&[0; 12]);
	call_data.extend_from_slice(spender.as_slice());
	call_data.extend_from_slice(&amount.to_be_bytes::<32>());
	call_data
}

pub struct DeliveryService {
	implementation: Arc<dyn DeliveryInterface>,
	policy: ConfirmationPolicy,
}

impl DeliveryService {
	pub fn new(implementation: Arc<dyn DeliveryInterface>, policy: ConfirmationPolicy) -> Self {
		Self {
			implementation,
			policy,
		}
	}

	pub fn chain_id(&self) -> u64 {
		self.implementation.chain_id()
	}

	pub async fn switch_chain(&self, chain_id: u64) -> Result<(), DeliveryError> {
		self.implementation.switch_chain(chain_id).await
	}

	/// Broadcasts `tx`, refusing if the wallet sits on a different chain.
	pub async fn deliver(&self, tx: SwapTransaction) -> Result<TransactionHash, DeliveryError> {
		let actual = self.implementation.chain_id();
		if tx.chain_id != actual {
			return Err(DeliveryError::ChainMismatch {
				expected: tx.chain_id,
				actual,
			});
		}
		self.implementation.submit(tx).await
	}

	/// Polls until the transaction has the configured number of confirmations.
	///
	/// A reverted transaction is returned as a receipt with `success == false`;
	/// only transport problems and the timeout are errors.
	pub async fn confirm(&self, hash: &TransactionHash) -> Result<TransactionReceipt, DeliveryError> {
		let started = tokio::time::Instant::now();
		tracing::debug!(
			tx_hash = %hash,
			confirmations = self.policy.min_confirmations,
			"Waiting for confirmation"
		);

		loop {
			if let Some(receipt) = self.implementation.get_receipt(hash).await? {
				if !receipt.success {
					return Ok(receipt);
				}
				let head = self.implementation.get_block_number().await?;
				let confirmations = head.saturating_sub(receipt.block_number) + 1;
				if confirmations >= self.policy.min_confirmations {
					return Ok(receipt);
				}
			}

			if started.elapsed() >= self.policy.timeout {
				return Err(DeliveryError::Timeout(format!(
					"transaction {} not confirmed after {}s",
					hash,
					self.policy.timeout.as_secs()
				)));
			}
			tokio::time::sleep(self.policy.poll_interval).await;
		}
	}

	pub async fn get_balance(
		&self,
		owner: Address,
		token: Option<Address>,
	) -> Result<U256, DeliveryError> {
		self.implementation.get_balance(owner, token).await
	}

	pub async fn get_allowance(
		&self,
		owner: Address,
		spender: Address,
		token: Address,
	) -> Result<U256, DeliveryError> {
		self.implementation.get_allowance(owner, spender, token).await
	}

	/// Sends `approve(spender, amount)` on `token` from `owner`.
	pub async fn approve(
		&self,
		owner: Address,
		token: Address,
		spender: Address,
		amount: U256,
	) -> Result<TransactionHash, DeliveryError> {
		let tx = SwapTransaction {
			from: Some(owner),
			to: token,
			data: approve_calldata(spender, amount).into(),
			value: U256::ZERO,
			gas: None,
			chain_id: self.implementation.chain_id(),
		};
		let hash = self.implementation.submit(tx).await?;
		tracing::info!(tx_hash = %hash, token = %token, spender = %spender, "Submitted approval");
		Ok(hash)
	}
}
