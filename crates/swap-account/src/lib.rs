//! Wallet signing for the swap client.
//!
//! An account knows its address and can sign two kinds of payloads: personal
//! messages (sign-in) and EIP-712 typed data (permit2 approvals). Sending
//! transactions belongs to the delivery crate, which receives the key through
//! [`AccountService::get_private_key`].

use alloy::dyn_abi::TypedData;
use alloy::primitives::Signature;
use async_trait::async_trait;
use swap_types::{Address, ConfigSchema, ImplementationRegistry, SecretString};
use thiserror::Error;

pub mod implementations {
	pub mod local;
}

#[derive(Debug, Error)]
pub enum AccountError {
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	#[error("Implementation error: {0}")]
	Implementation(String),
}

#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Schema for this implementation's `[account.implementations.<name>]` table.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	async fn address(&self) -> Result<Address, AccountError>;

	/// Signs an EIP-191 personal message.
	async fn sign_message(&self, message: &[u8]) -> Result<Signature, AccountError>;

	/// Signs the EIP-712 hash of `typed_data`.
	async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<Signature, AccountError>;

	/// Private key with 0x prefix, for building the transaction wallet.
	fn get_private_key(&self) -> SecretString;
}

pub type AccountFactory = fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>;

pub trait AccountRegistry: ImplementationRegistry<Factory = AccountFactory> {}

pub fn get_all_implementations() -> Vec<(&'static str, AccountFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// Builds the configured primary account.
pub fn create_account_service(
	primary: &str,
	implementations: &std::collections::HashMap<String, toml::Value>,
) -> Result<AccountService, AccountError> {
	let config = implementations.get(primary).ok_or_else(|| {
		AccountError::Implementation(format!("Account '{}' is not configured", primary))
	})?;
	let (_, factory) = get_all_implementations()
		.into_iter()
		.find(|(name, _)| *name == primary)
		.ok_or_else(|| {
			AccountError::Implementation(format!("Unknown account implementation '{}'", primary))
		})?;
	Ok(AccountService::new(factory(config)?))
}

pub struct AccountService {
	implementation: Box<dyn AccountInterface>,
}

impl AccountService {
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self { implementation }
	}

	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.implementation.address().await
	}

	pub async fn sign_message(&self, message: &[u8]) -> Result<Signature, AccountError> {
		self.implementation.sign_message(message).await
	}

	pub async fn sign_typed_data(
		&self,
		typed_data: &TypedData,
	) -> Result<Signature, AccountError> {
		self.implementation.sign_typed_data(typed_data).await
	}

	pub fn get_private_key(&self) -> SecretString {
		self.implementation.get_private_key()
	}
}
