//! Wallet delivery over JSON-RPC using alloy.
//!
//! One HTTP provider is built per configured network, all sharing the same
//! signer. Switching chains selects a different provider; the wallet keeps a
//! single "current chain" like a browser wallet does.

use crate::{DeliveryError, DeliveryInterface};
use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use swap_types::{
	utils::constants::{ALLOWANCE_SELECTOR, BALANCE_OF_SELECTOR},
	NetworksConfig, SecretString, SwapTransaction, TransactionHash, TransactionReceipt,
};

pub struct AlloyDelivery {
	providers: HashMap<u64, DynProvider>,
	current_chain: AtomicU64,
}

impl AlloyDelivery {
	/// Builds a provider for every network and starts on `initial_chain`.
	pub fn new(
		networks: &NetworksConfig,
		signer: PrivateKeySigner,
		initial_chain: u64,
	) -> Result<Self, DeliveryError> {
		if !networks.contains_key(&initial_chain) {
			return Err(DeliveryError::UnsupportedChain(initial_chain));
		}

		let mut providers = HashMap::new();
		for (chain_id, network) in networks {
			let url: reqwest::Url = network.rpc_url.parse().map_err(|e| {
				DeliveryError::Network(format!("Invalid RPC URL for network {}: {}", chain_id, e))
			})?;
			let wallet = EthereumWallet::from(signer.clone());
			let provider = ProviderBuilder::new()
				.wallet(wallet)
				.connect_http(url)
				.erased();
			providers.insert(*chain_id, provider);
		}

		Ok(Self {
			providers,
			current_chain: AtomicU64::new(initial_chain),
		})
	}

	fn provider(&self) -> Result<&DynProvider, DeliveryError> {
		let chain_id = self.chain_id();
		self.providers
			.get(&chain_id)
			.ok_or(DeliveryError::UnsupportedChain(chain_id))
	}

	async fn call_uint(&self, to: Address, call_data: Vec<u8>, what: &str) -> Result<U256, DeliveryError> {
		let request = TransactionRequest::default().to(to).input(call_data.into());
		let result: Bytes = self
			.provider()?
			.call(request)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to call {}: {}", what, e)))?;

		if result.len() < 32 {
			return Err(DeliveryError::Network(format!("Invalid {} response", what)));
		}
		Ok(U256::from_be_slice(&result[..32]))
	}
}

fn pad_address(call_data: &mut Vec<u8>, address: Address) {
	call_data.extend_from_slice(&[0; 12]);
	call_data.extend_from_slice(address.as_slice());
}

fn into_request(tx: SwapTransaction) -> TransactionRequest {
	let mut request = TransactionRequest::default()
		.to(tx.to)
		.value(tx.value)
		.input(tx.data.into());
	if let Some(from) = tx.from {
		request = request.from(from);
	}
	if let Some(gas) = tx.gas {
		request = request.gas_limit(gas);
	}
	request.chain_id = Some(tx.chain_id);
	request
}

#[async_trait]
impl DeliveryInterface for AlloyDelivery {
	fn chain_id(&self) -> u64 {
		self.current_chain.load(Ordering::SeqCst)
	}

	async fn switch_chain(&self, chain_id: u64) -> Result<(), DeliveryError> {
		if !self.providers.contains_key(&chain_id) {
			return Err(DeliveryError::UnsupportedChain(chain_id));
		}
		let previous = self.current_chain.swap(chain_id, Ordering::SeqCst);
		tracing::info!(from = previous, to = chain_id, "Switched chain");
		Ok(())
	}

	async fn submit(&self, tx: SwapTransaction) -> Result<TransactionHash, DeliveryError> {
		let chain_id = tx.chain_id;
		let pending = self
			.provider()?
			.send_transaction(into_request(tx))
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to send transaction: {}", e)))?;

		let hash = TransactionHash(*pending.tx_hash());
		tracing::info!(tx_hash = %hash, chain_id, "Submitted transaction");
		Ok(hash)
	}

	async fn get_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, DeliveryError> {
		let receipt = self
			.provider()?
			.get_transaction_receipt(hash.0)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get receipt: {}", e)))?;

		Ok(receipt.map(|receipt| TransactionReceipt {
			hash: TransactionHash(receipt.transaction_hash),
			block_number: receipt.block_number.unwrap_or(0),
			success: receipt.status(),
		}))
	}

	async fn get_balance(
		&self,
		owner: Address,
		token: Option<Address>,
	) -> Result<U256, DeliveryError> {
		match token {
			None => self
				.provider()?
				.get_balance(owner)
				.await
				.map_err(|e| DeliveryError::Network(format!("Failed to get balance: {}", e))),
			Some(token) => {
				let mut call_data = BALANCE_OF_SELECTOR.to_vec();
				pad_address(&mut call_data, owner);
				self.call_uint(token, call_data, "balanceOf").await
			},
		}
	}

	async fn get_allowance(
		&self,
		owner: Address,
		spender: Address,
		token: Address,
	) -> Result<U256, DeliveryError> {
		let mut call_data = ALLOWANCE_SELECTOR.to_vec();
		pad_address(&mut call_data, owner);
		pad_address(&mut call_data, spender);
		self.call_uint(token, call_data, "allowance").await
	}

	async fn get_block_number(&self) -> Result<u64, DeliveryError> {
		self.provider()?
			.get_block_number()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get block number: {}", e)))
	}
}

/// Builds a wallet over HTTP from a hex private key.
pub fn create_http_delivery(
	networks: &NetworksConfig,
	private_key: &SecretString,
	initial_chain: u64,
) -> Result<AlloyDelivery, DeliveryError> {
	let signer = private_key
		.with_exposed(|key| key.parse::<PrivateKeySigner>())
		.map_err(|e| DeliveryError::Network(format!("Invalid private key: {}", e)))?;
	AlloyDelivery::new(networks, signer, initial_chain)
}

#[cfg(test)]
mod tests {
	use super::*;
	use swap_types::NetworkConfig;

	fn networks() -> NetworksConfig {
		let network = |name: &str, rpc: &str| NetworkConfig {
			name: name.to_string(),
			rpc_url: rpc.to_string(),
			explorer_url: "https://polygonscan.com".to_string(),
		};
		NetworksConfig::from([
			(137, network("Polygon PoS", "http://localhost:8545")),
			(1, network("Ethereum", "http://localhost:8546")),
		])
	}

	const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	#[tokio::test]
	async fn test_switch_between_configured_chains() {
		let delivery = create_http_delivery(&networks(), &DEV_KEY.into(), 137).unwrap();
		assert_eq!(delivery.chain_id(), 137);
		delivery.switch_chain(1).await.unwrap();
		assert_eq!(delivery.chain_id(), 1);
		assert!(matches!(
			delivery.switch_chain(10).await,
			Err(DeliveryError::UnsupportedChain(10))
		));
		assert_eq!(delivery.chain_id(), 1);
	}

	#[test]
	fn test_initial_chain_must_be_configured() {
		assert!(matches!(
			create_http_delivery(&networks(), &DEV_KEY.into(), 10),
			Err(DeliveryError::UnsupportedChain(10))
		));
	}

	#[test]
	fn test_request_carries_chain_and_gas() {
		let request = into_request(SwapTransaction {
			from: None,
			to: Address::repeat_byte(0x01),
			data: Bytes::from(vec![1, 2, 3]),
			value: U256::from(5),
			gas: Some(21_000),
			chain_id: 137,
		});
		assert_eq!(request.chain_id, Some(137));
		assert_eq!(request.gas, Some(21_000));
		assert_eq!(request.value, Some(U256::from(5)));
	}
}
