//! Client for the swap gateway's authenticated routes.
//!
//! The gateway keeps sign-in state in a server-side session keyed by a cookie,
//! so the client holds a cookie jar and must use the same instance for the
//! sign-in calls and the price/quote calls.

use crate::{
	PricingError, PricingFactory, PricingInterface, PricingRegistry, QueryParams,
	SessionInterface,
};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use swap_types::{
	http_url, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, SessionResponse,
	ValidationError, VerifyRequest,
};

pub struct GatewayClient {
	client: reqwest::Client,
	base_url: String,
}

impl GatewayClient {
	pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PricingError> {
		let client = reqwest::Client::builder()
			.cookie_store(true)
			.timeout(timeout)
			.build()
			.map_err(|e| PricingError::Configuration(e.to_string()))?;
		Ok(Self {
			client,
			base_url: base_url.into().trim_end_matches('/').to_string(),
		})
	}

	/// Builds a client from a `[pricing.implementations.proxy]` table.
	pub fn from_config(config: &toml::Value) -> Result<Self, PricingError> {
		GatewaySchema
			.validate(config)
			.map_err(|e| PricingError::Configuration(e.to_string()))?;
		let base_url = config
			.get("base_url")
			.and_then(|v| v.as_str())
			.ok_or_else(|| PricingError::Configuration("base_url is required".to_string()))?;
		let timeout = config
			.get("timeout_seconds")
			.and_then(|v| v.as_integer())
			.unwrap_or(30) as u64;
		Self::new(base_url, Duration::from_secs(timeout))
	}

	fn url(&self, path: &str) -> String {
		format!("{}/api{}", self.base_url, path)
	}

	async fn proxied(&self, path: &str, query: &QueryParams) -> Result<Value, PricingError> {
		let response = self.client.get(self.url(path)).query(query).send().await?;
		json_or_error(response).await
	}
}

/// Maps gateway status codes onto pricing errors.
async fn json_or_error(response: Response) -> Result<Value, PricingError> {
	let status = response.status();
	if status == StatusCode::UNAUTHORIZED {
		return Err(PricingError::Unauthenticated);
	}
	let body: Value = response.json().await?;
	if !status.is_success() {
		let message = body
			.get("error")
			.and_then(|e| e.as_str())
			.unwrap_or("request failed")
			.to_string();
		return Err(PricingError::Upstream {
			status: status.as_u16(),
			message,
		});
	}
	Ok(body)
}

pub struct GatewaySchema;

impl ConfigSchema for GatewaySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![Field::new("base_url", FieldType::String).with_validator(http_url)],
			vec![Field::new(
				"timeout_seconds",
				FieldType::Integer {
					min: Some(1),
					max: Some(120),
				},
			)],
		)
		.validate(config)
	}
}

#[async_trait]
impl PricingInterface for GatewayClient {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(GatewaySchema)
	}

	async fn price(&self, query: &QueryParams) -> Result<Value, PricingError> {
		self.proxied("/price", query).await
	}

	async fn quote(&self, query: &QueryParams) -> Result<Value, PricingError> {
		self.proxied("/quote", query).await
	}
}

#[async_trait]
impl SessionInterface for GatewayClient {
	async fn nonce(&self) -> Result<String, PricingError> {
		let response = self.client.put(self.url("/siwe")).send().await?;
		let status = response.status();
		if !status.is_success() {
			return Err(PricingError::Upstream {
				status: status.as_u16(),
				message: "Failed to fetch SIWE nonce".to_string(),
			});
		}
		Ok(response.text().await?)
	}

	async fn verify(&self, message: &str, signature: &str) -> Result<bool, PricingError> {
		let body = VerifyRequest {
			message: message.to_string(),
			signature: signature.to_string(),
		};
		let response = self.client.post(self.url("/siwe")).json(&body).send().await?;
		Ok(response.status().is_success())
	}

	async fn session(&self) -> Result<Option<SessionResponse>, PricingError> {
		let response = self.client.get(self.url("/siwe")).send().await?;
		let body = json_or_error(response).await?;
		if body.get("address").is_none_or(Value::is_null) {
			return Ok(None);
		}
		serde_json::from_value(body)
			.map(Some)
			.map_err(|e| PricingError::InvalidResponse(e.to_string()))
	}

	async fn sign_out(&self) -> Result<bool, PricingError> {
		let response = self.client.delete(self.url("/siwe")).send().await?;
		Ok(response.status().is_success())
	}
}

/// Factory for `[pricing.implementations.proxy]`.
///
/// Configuration parameters:
/// - `base_url`: gateway origin, e.g. http://localhost:3000
/// - `timeout_seconds`: defaults to 30
pub fn create_pricing(config: &toml::Value) -> Result<Box<dyn PricingInterface>, PricingError> {
	Ok(Box::new(GatewayClient::from_config(config)?))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "proxy";
	type Factory = PricingFactory;

	fn factory() -> Self::Factory {
		create_pricing
	}
}

impl PricingRegistry for Registry {}
