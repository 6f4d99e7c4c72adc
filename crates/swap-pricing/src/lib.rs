//! Price and quote sources for token swaps.
//!
//! Two implementations speak the same interface. `zeroex` calls the 0x Swap
//! API directly with the integrator key and runs on the server. `proxy` calls
//! the gateway's authenticated `/api/price` and `/api/quote` routes and runs
//! in the swap client, which never sees the upstream key.
//!
//! Both return the upstream JSON body untouched; interpretation happens in
//! [`swap_types::PriceOutcome`] and [`swap_types::ExecutableQuote`].

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use swap_types::{ConfigSchema, ImplementationRegistry, SessionResponse};
use thiserror::Error;

pub mod implementations {
	pub mod gateway;
	pub mod zeroex;
}

/// Query string forwarded as-is to the pricing source.
pub type QueryParams = Vec<(String, String)>;

#[derive(Debug, Error)]
pub enum PricingError {
	#[error("Not authenticated")]
	Unauthenticated,
	#[error("Network error: {0}")]
	Network(String),
	#[error("Upstream error ({status}): {message}")]
	Upstream { status: u16, message: String },
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

impl From<reqwest::Error> for PricingError {
	fn from(err: reqwest::Error) -> Self {
		if err.is_decode() {
			PricingError::InvalidResponse(err.to_string())
		} else {
			PricingError::Network(err.to_string())
		}
	}
}

#[async_trait]
pub trait PricingInterface: Send + Sync {
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Indicative price; no transaction payload.
	async fn price(&self, query: &QueryParams) -> Result<Value, PricingError>;

	/// Executable quote for the same parameters.
	async fn quote(&self, query: &QueryParams) -> Result<Value, PricingError>;
}

/// Sign-in calls a client makes against the gateway's `/api/siwe` route.
#[async_trait]
pub trait SessionInterface: Send + Sync {
	/// Fresh nonce bound to this client's session.
	async fn nonce(&self) -> Result<String, PricingError>;

	/// Submits a signed message; `true` when the gateway accepted it.
	async fn verify(&self, message: &str, signature: &str) -> Result<bool, PricingError>;

	/// Current session, `None` when anonymous.
	async fn session(&self) -> Result<Option<SessionResponse>, PricingError>;

	async fn sign_out(&self) -> Result<bool, PricingError>;
}

pub type PricingFactory = fn(&toml::Value) -> Result<Box<dyn PricingInterface>, PricingError>;

pub trait PricingRegistry: ImplementationRegistry<Factory = PricingFactory> {}

pub fn get_all_implementations() -> Vec<(&'static str, PricingFactory)> {
	use implementations::{gateway, zeroex};

	vec![
		(zeroex::Registry::NAME, zeroex::Registry::factory()),
		(gateway::Registry::NAME, gateway::Registry::factory()),
	]
}

/// Dispatches to the primary pricing implementation and logs timings.
pub struct PricingService {
	implementation: Arc<dyn PricingInterface>,
	name: String,
}

impl PricingService {
	pub fn new(implementation: Arc<dyn PricingInterface>, name: impl Into<String>) -> Self {
		Self {
			implementation,
			name: name.into(),
		}
	}

	/// Builds the `primary` implementation from its configuration table.
	pub fn from_config(
		primary: &str,
		implementations: &HashMap<String, toml::Value>,
	) -> Result<Self, PricingError> {
		let config = implementations.get(primary).ok_or_else(|| {
			PricingError::Configuration(format!("Pricing '{}' is not configured", primary))
		})?;
		let (name, factory) = get_all_implementations()
			.into_iter()
			.find(|(name, _)| *name == primary)
			.ok_or_else(|| {
				PricingError::Configuration(format!("Unknown pricing implementation '{}'", primary))
			})?;
		Ok(Self::new(Arc::from(factory(config)?), name))
	}

	pub async fn price(&self, query: &QueryParams) -> Result<Value, PricingError> {
		let started = Instant::now();
		let result = self.implementation.price(query).await;
		tracing::debug!(
			source = %self.name,
			elapsed_ms = started.elapsed().as_millis() as u64,
			ok = result.is_ok(),
			"Price request"
		);
		result
	}

	pub async fn quote(&self, query: &QueryParams) -> Result<Value, PricingError> {
		let started = Instant::now();
		let result = self.implementation.quote(query).await;
		tracing::debug!(
			source = %self.name,
			elapsed_ms = started.elapsed().as_millis() as u64,
			ok = result.is_ok(),
			"Quote request"
		);
		result
	}
}

#[cfg(test)]
pub(crate) mod test_support {
	use axum::Router;
	use tokio::net::TcpListener;

	/// Serves `router` on an ephemeral local port and returns its base URL.
	pub(crate) async fn serve(router: Router) -> String {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, router).await.unwrap();
		});
		format!("http://{}", addr)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn table(entries: &[(&str, &str)]) -> toml::Value {
		toml::Value::Table(
			entries
				.iter()
				.map(|(k, v)| (k.to_string(), toml::Value::String(v.to_string())))
				.collect(),
		)
	}

	#[test]
	fn test_from_config_picks_primary() {
		let implementations = HashMap::from([
			(
				"zeroex".to_string(),
				table(&[("base_url", "https://api.0x.org"), ("api_key", "k")]),
			),
			("proxy".to_string(), table(&[("base_url", "http://localhost:3000")])),
		]);
		let service = PricingService::from_config("proxy", &implementations).unwrap();
		assert_eq!(service.name, "proxy");
	}

	#[test]
	fn test_from_config_rejects_unknown_and_invalid() {
		let implementations =
			HashMap::from([("zeroex".to_string(), table(&[("base_url", "https://api.0x.org")]))]);
		// api_key missing
		assert!(matches!(
			PricingService::from_config("zeroex", &implementations),
			Err(PricingError::Configuration(_))
		));
		assert!(matches!(
			PricingService::from_config("other", &implementations),
			Err(PricingError::Configuration(_))
		));
	}
}
