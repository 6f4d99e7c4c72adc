//! Transaction delivery types for the swap pipeline.
//!
//! This module defines the transaction handed to the wallet for broadcast,
//! the hash returned on acceptance and the receipt observed on inclusion.

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A transaction ready for the wallet to broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapTransaction {
	/// Sender; the wallet fills its own address when absent.
	pub from: Option<Address>,
	/// Target contract.
	pub to: Address,
	/// Calldata.
	pub data: Bytes,
	/// Native value in wei.
	pub value: U256,
	/// Gas limit estimate, if the quote provided one.
	pub gas: Option<u64>,
	/// Chain the transaction must be sent on.
	pub chain_id: u64,
}

/// Blockchain transaction hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionHash(pub B256);

impl fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<B256> for TransactionHash {
	fn from(hash: B256) -> Self {
		Self(hash)
	}
}

/// Transaction receipt containing execution details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
	/// The hash of the transaction.
	pub hash: TransactionHash,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Whether the transaction executed successfully.
	pub success: bool,
}

/// Lifecycle of a broadcast transaction as seen by the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
	/// Accepted by the wallet, not yet observed in a block.
	Pending,
	/// Included and executed successfully.
	Confirmed(TransactionReceipt),
	/// Reverted, dropped, or never observed before the timeout.
	Failed(String),
}

