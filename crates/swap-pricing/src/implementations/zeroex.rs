//! 0x Swap API (permit2 flavour) client.
//!
//! Every request carries the integrator key in `0x-api-key` and pins the API
//! version with `0x-version`. The response body is returned whatever the HTTP
//! status, because validation failures arrive as JSON the caller must show.

use crate::{PricingError, PricingFactory, PricingInterface, PricingRegistry, QueryParams};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use swap_types::{
	http_url, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, SecretString,
	ValidationError,
};

const PRICE_PATH: &str = "/swap/permit2/price";
const QUOTE_PATH: &str = "/swap/permit2/quote";
const DEFAULT_BASE_URL: &str = "https://api.0x.org";
const DEFAULT_VERSION: &str = "v2";

pub struct ZeroExPricing {
	client: reqwest::Client,
	base_url: String,
	api_key: SecretString,
	version: String,
}

impl ZeroExPricing {
	pub fn new(
		base_url: impl Into<String>,
		api_key: SecretString,
		version: impl Into<String>,
		timeout: Duration,
	) -> Result<Self, PricingError> {
		let client = reqwest::Client::builder()
			.pool_idle_timeout(Duration::from_secs(90))
			.timeout(timeout)
			.build()
			.map_err(|e| PricingError::Configuration(e.to_string()))?;
		Ok(Self {
			client,
			base_url: base_url.into().trim_end_matches('/').to_string(),
			api_key,
			version: version.into(),
		})
	}

	async fn get(&self, path: &str, query: &QueryParams) -> Result<Value, PricingError> {
		let url = format!("{}{}", self.base_url, path);
		let response = self
			.client
			.get(&url)
			.header("0x-api-key", self.api_key.expose_secret())
			.header("0x-version", &self.version)
			.query(query)
			.send()
			.await?;

		let status = response.status();
		let body: Value = response.json().await?;
		if !status.is_success() {
			tracing::debug!(%status, path, "0x returned an error body");
		}
		Ok(body)
	}
}

pub struct ZeroExSchema;

impl ConfigSchema for ZeroExSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![Field::new("api_key", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(key) if !key.is_empty() => Ok(()),
					_ => Err("api_key cannot be empty".to_string()),
				}
			})],
			vec![
				Field::new("base_url", FieldType::String).with_validator(http_url),
				Field::new("version", FieldType::String),
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(120),
					},
				),
			],
		)
		.validate(config)
	}
}

#[async_trait]
impl PricingInterface for ZeroExPricing {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(ZeroExSchema)
	}

	async fn price(&self, query: &QueryParams) -> Result<Value, PricingError> {
		self.get(PRICE_PATH, query).await
	}

	async fn quote(&self, query: &QueryParams) -> Result<Value, PricingError> {
		self.get(QUOTE_PATH, query).await
	}
}

/// Factory for `[pricing.implementations.zeroex]`.
///
/// Configuration parameters:
/// - `api_key`: integrator key (required)
/// - `base_url`: defaults to https://api.0x.org
/// - `version`: defaults to v2
/// - `timeout_seconds`: defaults to 30
pub fn create_pricing(config: &toml::Value) -> Result<Box<dyn PricingInterface>, PricingError> {
	ZeroExSchema
		.validate(config)
		.map_err(|e| PricingError::Configuration(e.to_string()))?;

	let string = |key: &str| config.get(key).and_then(|v| v.as_str());
	let api_key = string("api_key")
		.map(SecretString::from)
		.ok_or_else(|| PricingError::Configuration("api_key is required".to_string()))?;
	let timeout = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.unwrap_or(30) as u64;

	Ok(Box::new(ZeroExPricing::new(
		string("base_url").unwrap_or(DEFAULT_BASE_URL),
		api_key,
		string("version").unwrap_or(DEFAULT_VERSION),
		Duration::from_secs(timeout),
	)?))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "zeroex";
	type Factory = PricingFactory;

	fn factory() -> Self::Factory {
		create_pricing
	}
}

impl PricingRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::serve;
	use axum::{extract::Query, http::HeaderMap, http::StatusCode, routing::get, Json, Router};
	use serde_json::json;
	use std::collections::HashMap;

	async fn upstream() -> String {
		let price = |headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
			let key = headers.get("0x-api-key").and_then(|v| v.to_str().ok());
			let version = headers.get("0x-version").and_then(|v| v.to_str().ok());
			if key != Some("secret") || version != Some("v2") {
				return (StatusCode::UNAUTHORIZED, Json(json!({"name": "UNAUTHORIZED"})));
			}
			if q.get("sellAmount").map(String::as_str) == Some("1") {
				return (
					StatusCode::BAD_REQUEST,
					Json(json!({
						"name": "INPUT_INVALID",
						"data": {"details": [{"field": "sellAmount", "reason": "too small"}]}
					})),
				);
			}
			(
				StatusCode::OK,
				Json(json!({"buyAmount": "100", "sellToken": q.get("sellToken")})),
			)
		};
		let quote = || async { Json(json!({"transaction": {"to": "0x01"}})) };
		serve(
			Router::new()
				.route("/swap/permit2/price", get(price))
				.route("/swap/permit2/quote", get(quote)),
		)
		.await
	}

	fn client(base_url: &str) -> ZeroExPricing {
		ZeroExPricing::new(base_url, "secret".into(), "v2", Duration::from_secs(5)).unwrap()
	}

	fn query(sell_amount: &str) -> QueryParams {
		vec![
			("sellToken".to_string(), "0xabc".to_string()),
			("sellAmount".to_string(), sell_amount.to_string()),
		]
	}

	#[tokio::test]
	async fn test_price_sends_key_and_query() {
		let base = upstream().await;
		let body = client(&base).price(&query("1000")).await.unwrap();
		assert_eq!(body["buyAmount"], "100");
		assert_eq!(body["sellToken"], "0xabc");
	}

	#[tokio::test]
	async fn test_validation_body_passes_through() {
		let base = upstream().await;
		let body = client(&base).price(&query("1")).await.unwrap();
		assert_eq!(body["data"]["details"][0]["field"], "sellAmount");
	}

	#[tokio::test]
	async fn test_quote_uses_quote_path() {
		let base = upstream().await;
		let body = client(&base).quote(&query("1000")).await.unwrap();
		assert_eq!(body["transaction"]["to"], "0x01");
	}

	#[tokio::test]
	async fn test_unreachable_upstream_is_a_network_error() {
		let result = client("http://127.0.0.1:1").price(&query("1000")).await;
		assert!(matches!(result, Err(PricingError::Network(_))));
	}

	#[test]
	fn test_factory_requires_api_key() {
		let config: toml::Value = toml::from_str("base_url = \"https://api.0x.org\"").unwrap();
		assert!(create_pricing(&config).is_err());
		let config: toml::Value = toml::from_str("api_key = \"k\"").unwrap();
		assert!(create_pricing(&config).is_ok());
	}
}
