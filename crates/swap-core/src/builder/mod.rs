//! Builds a [`SwapEngine`] from configuration.
//!
//! The client pipeline talks to the gateway for prices, quotes and sign-in
//! through a single cookie-holding client, signs with the configured
//! account, and sends through an HTTP wallet on the configured networks.

use crate::context::{SignInSettings, WalletContext};
use crate::engine::{event_bus::EventBus, SwapEngine};
use crate::price::FeeParams;
use std::sync::Arc;
use std::time::Duration;
use swap_account::create_account_service;
use swap_config::Config;
use swap_delivery::implementations::evm::alloy::create_http_delivery;
use swap_delivery::{ConfirmationPolicy, DeliveryService};
use swap_pricing::implementations::gateway::{self, GatewayClient};
use swap_pricing::PricingService;
use swap_types::ImplementationRegistry;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

const EVENT_BUS_CAPACITY: usize = 256;

pub struct SwapEngineBuilder {
	config: Config,
}

impl SwapEngineBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	pub fn build(self) -> Result<SwapEngine, BuilderError> {
		let config = self.config;
		let required_chain_id = config.app.required_chain_id;

		let account_config = config
			.account
			.as_ref()
			.ok_or_else(|| BuilderError::MissingComponent("[account]".to_string()))?;
		let account = create_account_service(&account_config.primary, &account_config.implementations)
			.map_err(|e| {
				tracing::error!(component = "account", error = %e, "Failed to create account");
				BuilderError::Config(format!(
					"Failed to create account '{}': {}",
					account_config.primary, e
				))
			})?;
		tracing::info!(component = "account", implementation = %account_config.primary, "Loaded");

		let network = config.required_network().ok_or_else(|| {
			BuilderError::Config(format!(
				"Required chain {} has no entry in [networks]",
				required_chain_id
			))
		})?;

		let wallet_delivery =
			create_http_delivery(&config.networks, &account.get_private_key(), required_chain_id)
				.map_err(|e| BuilderError::Config(format!("Failed to create delivery: {}", e)))?;
		let delivery = Arc::new(DeliveryService::new(
			Arc::new(wallet_delivery),
			ConfirmationPolicy {
				min_confirmations: config.delivery.min_confirmations,
				poll_interval: Duration::from_secs(config.delivery.poll_interval_seconds),
				timeout: Duration::from_secs(config.delivery.confirmation_timeout_seconds),
			},
		));
		tracing::info!(
			component = "delivery",
			networks = config.networks.len(),
			chain_id = required_chain_id,
			"Loaded"
		);

		let gateway_config = config
			.pricing
			.implementations
			.get(gateway::Registry::NAME)
			.ok_or_else(|| {
				BuilderError::MissingComponent(format!(
					"[pricing.implementations.{}]",
					gateway::Registry::NAME
				))
			})?;
		let gateway = Arc::new(
			GatewayClient::from_config(gateway_config)
				.map_err(|e| BuilderError::Config(format!("Failed to create gateway client: {}", e)))?,
		);
		let pricing = Arc::new(PricingService::new(gateway.clone(), gateway::Registry::NAME));
		tracing::info!(component = "pricing", implementation = gateway::Registry::NAME, "Loaded");

		let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
		let wallet = Arc::new(WalletContext::new(
			Arc::new(account),
			delivery,
			gateway,
			SignInSettings {
				domain: config.siwe.domain.clone(),
				uri: config.siwe.uri.clone(),
				statement: config.siwe.statement.clone(),
			},
			required_chain_id,
			event_bus.clone(),
		));

		Ok(SwapEngine::new(
			wallet,
			pricing,
			config.token_registry(),
			FeeParams {
				recipient: config.fees.recipient,
				bps: config.fees.bps,
			},
			network.explorer_url.clone(),
			event_bus,
		))
	}
}
