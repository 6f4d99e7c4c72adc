//! API types for the swap gateway HTTP API.
//!
//! This module defines the request and response bodies of the `/api/siwe`
//! endpoints and the error type every handler renders. Price and quote bodies
//! are passed through from the upstream service untouched.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `POST /api/siwe`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
	/// The prepared EIP-4361 message exactly as the wallet signed it.
	pub message: String,
	/// 65-byte signature, hex encoded with 0x prefix.
	pub signature: String,
}

/// Body of `GET /api/siwe` for an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResponse {
	pub address: Address,
	#[serde(rename = "chainId")]
	pub chain_id: u64,
}

/// API error response.
///
/// The proxy endpoints only ever fill `error`, which keeps the body shape
/// `{ "error": "..." }` that browser clients already expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type or short description
	pub error: String,
	/// Human-readable description
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	/// Additional error context
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// No authenticated session (401)
	Unauthorized { message: String },
	/// Request was well formed but could not be processed (422)
	UnprocessableEntity {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Internal server error (500)
	InternalServerError { message: String },
}

impl APIError {
	/// The canonical rejection for proxy calls made without a session.
	pub fn not_authenticated() -> Self {
		APIError::Unauthorized {
			message: "Not authenticated".to_string(),
		}
	}

	/// The canonical generic failure for proxy calls.
	pub fn internal() -> Self {
		APIError::InternalServerError {
			message: "Internal Server Error".to_string(),
		}
	}

	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::Unauthorized { .. } => 401,
			APIError::UnprocessableEntity { .. } => 422,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		match self {
			APIError::UnprocessableEntity {
				error_type,
				message,
				details,
			} => ErrorResponse {
				error: error_type.clone(),
				message: Some(message.clone()),
				details: details.clone(),
			},
			APIError::Unauthorized { message } | APIError::InternalServerError { message } => {
				ErrorResponse {
					error: message.clone(),
					message: None,
					details: None,
				}
			},
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::Unauthorized { message } => write!(f, "Unauthorized: {}", message),
			APIError::UnprocessableEntity { message, .. } => {
				write!(f, "Unprocessable Entity: {}", message)
			},
			APIError::InternalServerError { message } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}

/// Parses a base-unit amount as the pricing service writes it: a decimal
/// string, or a 0x-prefixed hex string.
pub fn parse_u256(value: &str) -> Result<U256, String> {
	let trimmed = value.trim();
	let parsed = match trimmed
		.strip_prefix("0x")
		.or_else(|| trimmed.strip_prefix("0X"))
	{
		Some(hex) => U256::from_str_radix(hex, 16),
		None => U256::from_str_radix(trimmed, 10),
	};
	parsed.map_err(|e| format!("invalid amount '{}': {}", value, e))
}

/// Serde module for U256 amounts encoded as decimal strings.
pub mod u256_serde {
	use alloy::primitives::U256;
	use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		value.to_string().serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		super::parse_u256(&s).map_err(D::Error::custom)
	}
}

/// Same as [`u256_serde`] for optional or null amounts.
pub mod option_u256_serde {
	use alloy::primitives::U256;
	use serde::{de::Error, Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match value {
			Some(v) => serializer.serialize_str(&v.to_string()),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<U256>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s: Option<String> = Option::deserialize(deserializer)?;
		match s {
			Some(s) if !s.is_empty() => super::parse_u256(&s).map(Some).map_err(D::Error::custom),
			_ => Ok(None),
		}
	}
}
