//! Authenticated pass-through to the pricing service.
//!
//! The query string is forwarded unchanged and the upstream body comes back
//! unchanged with status 200, including bodies that carry validation errors.
//! Anything that keeps the call from completing is reported as a generic
//! 500 so upstream details never reach the browser.

use crate::apis::session;
use crate::server::AppState;
use axum::{
	extract::{Query, State},
	http::HeaderMap,
	response::Json,
};
use serde_json::Value;
use swap_pricing::{PricingError, QueryParams};
use swap_types::{truncate_id, APIError};

#[derive(Debug, Clone, Copy)]
enum Endpoint {
	Price,
	Quote,
}

impl Endpoint {
	fn as_str(&self) -> &'static str {
		match self {
			Endpoint::Price => "price",
			Endpoint::Quote => "quote",
		}
	}
}

/// Handles GET /api/price.
pub async fn price(
	State(state): State<AppState>,
	headers: HeaderMap,
	Query(query): Query<QueryParams>,
) -> Result<Json<Value>, APIError> {
	forward(&state, &headers, Endpoint::Price, query).await
}

/// Handles GET /api/quote.
pub async fn quote(
	State(state): State<AppState>,
	headers: HeaderMap,
	Query(query): Query<QueryParams>,
) -> Result<Json<Value>, APIError> {
	forward(&state, &headers, Endpoint::Quote, query).await
}

async fn forward(
	state: &AppState,
	headers: &HeaderMap,
	endpoint: Endpoint,
	query: QueryParams,
) -> Result<Json<Value>, APIError> {
	let session_id = session::session_id(headers, &state.cookie.name);
	let session = state
		.sessions
		.require_authenticated(session_id.as_deref())
		.await?;

	let call = async {
		match endpoint {
			Endpoint::Price => state.pricing.price(&query).await,
			Endpoint::Quote => state.pricing.quote(&query).await,
		}
	};
	let result = match tokio::time::timeout(state.upstream_timeout, call).await {
		Ok(result) => result,
		Err(_) => Err(PricingError::Network(format!(
			"no response after {}s",
			state.upstream_timeout.as_secs()
		))),
	};

	match result {
		Ok(body) => Ok(Json(body)),
		Err(e) => {
			tracing::warn!(
				endpoint = endpoint.as_str(),
				address = %session.address,
				session = %session_id.as_deref().map(truncate_id).unwrap_or_default(),
				error = %e,
				"Upstream request failed"
			);
			Err(APIError::internal())
		},
	}
}
