//! Token list endpoint.

use crate::server::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use swap_types::Token;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokensResponse {
	pub chain_id: u64,
	pub tokens: Vec<Token>,
}

/// Handles GET /api/tokens: the tradable tokens on the required chain.
pub async fn get_tokens(State(state): State<AppState>) -> Json<TokensResponse> {
	Json(TokensResponse {
		chain_id: state.required_chain_id,
		tokens: state
			.tokens
			.for_chain(state.required_chain_id)
			.cloned()
			.collect(),
	})
}
