//! Broadcasting and watching swap transactions.

use crate::SwapError;
use serde::Serialize;
use std::sync::Arc;
use swap_delivery::{DeliveryError, DeliveryService};
use swap_types::{explorer_tx_url, SwapTransaction, TransactionHash, TransactionStatus};
use tracing::instrument;

/// A transaction the wallet accepted, with a link to follow it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSwap {
	pub tx_hash: TransactionHash,
	pub explorer_url: String,
}

#[derive(Clone)]
pub struct TransactionSubmitter {
	delivery: Arc<DeliveryService>,
	explorer_url: String,
}

impl TransactionSubmitter {
	pub fn new(delivery: Arc<DeliveryService>, explorer_url: impl Into<String>) -> Self {
		Self {
			delivery,
			explorer_url: explorer_url.into(),
		}
	}

	/// Hands `tx` to the wallet. Returns once it is accepted, before any
	/// confirmation.
	pub async fn submit(&self, tx: SwapTransaction) -> Result<PendingSwap, SwapError> {
		let tx_hash = self.delivery.deliver(tx).await?;
		let explorer_url = explorer_tx_url(&self.explorer_url, &tx_hash.to_string());
		tracing::info!(tx_hash = %tx_hash, explorer = %explorer_url, "Swap submitted");
		Ok(PendingSwap {
			tx_hash,
			explorer_url,
		})
	}

	/// Waits for the outcome of a submitted transaction. Only `Confirmed`
	/// and `Failed` are returned; `Pending` is what callers hold meanwhile.
	#[instrument(skip_all, fields(tx_hash = %tx_hash))]
	pub async fn watch(&self, tx_hash: &TransactionHash) -> TransactionStatus {
		match self.delivery.confirm(tx_hash).await {
			Ok(receipt) if receipt.success => {
				tracing::info!(block = receipt.block_number, "Swap confirmed");
				TransactionStatus::Confirmed(receipt)
			},
			Ok(receipt) => {
				tracing::warn!(block = receipt.block_number, "Swap reverted");
				TransactionStatus::Failed("transaction reverted".to_string())
			},
			Err(DeliveryError::Timeout(message)) => {
				tracing::warn!(%message, "Swap not confirmed in time");
				TransactionStatus::Failed(message)
			},
			Err(e) => {
				tracing::error!(error = %e, "Lost track of swap");
				TransactionStatus::Failed(e.to_string())
			},
		}
	}
}
