//! Account backed by a private key held in process memory.

use crate::{AccountError, AccountFactory, AccountInterface, AccountRegistry};
use alloy::dyn_abi::TypedData;
use alloy::primitives::Signature;
use alloy::signers::{local::PrivateKeySigner, Signer};
use async_trait::async_trait;
use swap_types::{
	with_0x_prefix, Address, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema,
	SecretString, ValidationError,
};

pub struct LocalWallet {
	signer: PrivateKeySigner,
}

impl LocalWallet {
	pub fn new(private_key: &SecretString) -> Result<Self, AccountError> {
		let signer = private_key
			.with_exposed(|key| key.parse::<PrivateKeySigner>())
			.map_err(|e| AccountError::InvalidKey(e.to_string()))?;
		Ok(Self { signer })
	}
}

pub struct LocalWalletSchema;

impl ConfigSchema for LocalWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![Field::new("private_key", FieldType::String).with_validator(|value| {
				let key = value.as_str().unwrap_or_default();
				let hex = key.strip_prefix("0x").unwrap_or(key);
				if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
					return Err("must be 32 bytes of hex".to_string());
				}
				Ok(())
			})],
			vec![],
		)
		.validate(config)
	}
}

#[async_trait]
impl AccountInterface for LocalWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalWalletSchema)
	}

	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.signer.address())
	}

	async fn sign_message(&self, message: &[u8]) -> Result<Signature, AccountError> {
		self.signer
			.sign_message(message)
			.await
			.map_err(|e| AccountError::SigningFailed(e.to_string()))
	}

	async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<Signature, AccountError> {
		let hash = typed_data
			.eip712_signing_hash()
			.map_err(|e| AccountError::SigningFailed(format!("Invalid typed data: {}", e)))?;
		self.signer
			.sign_hash(&hash)
			.await
			.map_err(|e| AccountError::SigningFailed(e.to_string()))
	}

	fn get_private_key(&self) -> SecretString {
		SecretString::from(with_0x_prefix(&hex::encode(self.signer.to_bytes())))
	}
}

/// Factory for `[account.implementations.local]`.
///
/// Configuration parameters:
/// - `private_key`: hex-encoded secp256k1 key, with or without 0x
pub fn create_account(config: &toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> {
	LocalWalletSchema
		.validate(config)
		.map_err(|e| AccountError::InvalidKey(e.to_string()))?;
	let key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.map(SecretString::from)
		.ok_or_else(|| AccountError::InvalidKey("private_key is required".to_string()))?;
	Ok(Box::new(LocalWallet::new(&key)?))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = AccountFactory;

	fn factory() -> Self::Factory {
		create_account
	}
}

impl AccountRegistry for Registry {}
