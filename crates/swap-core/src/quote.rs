//! Executable quotes.

use crate::price::PriceRequest;
use crate::SwapError;
use std::sync::Arc;
use swap_pricing::PricingService;
use swap_types::{Address, ExecutableQuote};

/// Fetches the firm quote for a price the user has accepted.
#[derive(Clone)]
pub struct QuoteFetcher {
	pricing: Arc<PricingService>,
}

impl QuoteFetcher {
	pub fn new(pricing: Arc<PricingService>) -> Self {
		Self { pricing }
	}

	/// Requests a quote for the same trade as `request`, filled by `taker`.
	pub async fn fetch(
		&self,
		request: &PriceRequest,
		taker: Address,
	) -> Result<ExecutableQuote, SwapError> {
		let params = request.with_taker(taker).to_params();
		let body = self.pricing.quote(&params).await?;
		let quote = ExecutableQuote::from_upstream(body)?;
		tracing::debug!(
			sell_amount = %quote.sell_amount,
			buy_amount = %quote.buy_amount,
			permit = quote.permit2.is_some(),
			"Quote received"
		);
		Ok(quote)
	}
}
