//! Swap engine: one set of shared services, any number of open forms.
//!
//! Every [`SwapPipeline`] owns a [`SwapForm`] behind a mutex. The lock is
//! held only to read or apply a step and is always released before a
//! network call; whatever comes back is checked against the form again
//! before it is applied, so closing or editing a form while a request is in
//! flight simply makes the late result a no-op.

pub mod event_bus;

use crate::allowance::{AllowanceGate, AllowanceStatus};
use crate::context::WalletContext;
use crate::gate::SwapView;
use crate::price::{FeeParams, PriceFetcher, PriceRequest};
use crate::quote::QuoteFetcher;
use crate::signature::SignatureAppender;
use crate::state::{FormSnapshot, FormStateError, PriceApplied, SwapForm};
use crate::submit::{PendingSwap, TransactionSubmitter};
use crate::SwapError;
use std::sync::Arc;
use swap_pricing::PricingService;
use swap_types::{
	AllowanceEvent, DeliveryEvent, ExecutableQuote, PriceOutcome, PricingEvent, SwapEvent,
	TokenRegistry, TransactionStatus,
};
use tokio::sync::Mutex;

/// Shared services for every form.
#[derive(Clone)]
pub struct SwapEngine {
	wallet: Arc<WalletContext>,
	tokens: Arc<TokenRegistry>,
	fees: FeeParams,
	prices: PriceFetcher,
	allowance: AllowanceGate,
	quotes: QuoteFetcher,
	signer: SignatureAppender,
	submitter: TransactionSubmitter,
	event_bus: event_bus::EventBus,
}

impl SwapEngine {
	pub fn new(
		wallet: Arc<WalletContext>,
		pricing: Arc<PricingService>,
		tokens: TokenRegistry,
		fees: FeeParams,
		explorer_url: impl Into<String>,
		event_bus: event_bus::EventBus,
	) -> Self {
		let delivery = wallet.delivery().clone();
		let account = wallet.account().clone();
		Self {
			prices: PriceFetcher::new(pricing.clone()),
			quotes: QuoteFetcher::new(pricing),
			allowance: AllowanceGate::new(delivery.clone()),
			signer: SignatureAppender::new(account),
			submitter: TransactionSubmitter::new(delivery, explorer_url),
			wallet,
			tokens: Arc::new(tokens),
			fees,
			event_bus,
		}
	}

	pub fn wallet(&self) -> &Arc<WalletContext> {
		&self.wallet
	}

	pub fn tokens(&self) -> &TokenRegistry {
		&self.tokens
	}

	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	/// Opens a new, empty form.
	pub fn open_form(&self) -> SwapPipeline {
		let id = uuid::Uuid::new_v4().to_string();
		tracing::debug!(form_id = %id, "Opened swap form");
		SwapPipeline {
			form: Arc::new(Mutex::new(SwapForm::new(id.clone()))),
			id,
			engine: self.clone(),
		}
	}

	fn publish(&self, event: SwapEvent) {
		self.event_bus.publish(event).ok();
	}
}

/// Drives one form through price, approval, quote and submission.
#[derive(Clone)]
pub struct SwapPipeline {
	id: String,
	form: Arc<Mutex<SwapForm>>,
	engine: SwapEngine,
}

impl SwapPipeline {
	pub fn id(&self) -> &str {
		&self.id
	}

	pub async fn snapshot(&self) -> FormSnapshot {
		self.form.lock().await.snapshot()
	}

	/// Current chain gate; the form is updated with the result.
	pub async fn view(&self) -> Result<SwapView, SwapError> {
		let view = self.engine.wallet.view().await?;
		self.form.lock().await.chain_changed(view.is_ready());
		Ok(view)
	}

	async fn require_ready_chain(&self) -> Result<(), SwapError> {
		match self.view().await? {
			SwapView::Ready { .. } => Ok(()),
			SwapView::WrongChain { current, required } => {
				Err(SwapError::WrongChain { current, required })
			},
		}
	}

	/// Prices the trade the user entered. Inputs are validated locally;
	/// when a newer call overtakes this one its result is discarded.
	pub async fn update_price(
		&self,
		sell_symbol: &str,
		buy_symbol: &str,
		sell_amount: Option<&str>,
		buy_amount: Option<&str>,
	) -> Result<PriceApplied, SwapError> {
		let engine = &self.engine;
		let sell_token = engine
			.tokens
			.by_symbol(sell_symbol)
			.ok_or_else(|| SwapError::UnknownToken(sell_symbol.to_string()))?;
		let buy_token = engine
			.tokens
			.by_symbol(buy_symbol)
			.ok_or_else(|| SwapError::UnknownToken(buy_symbol.to_string()))?;
		self.require_ready_chain().await?;
		let (taker, _) = engine.wallet.connected().await?;

		let request = PriceRequest::new(
			sell_token,
			buy_token,
			sell_amount,
			buy_amount,
			Some(taker),
			engine.fees,
		)?;

		let generation = {
			let mut form = self.form.lock().await;
			form.set_input(request.clone())?;
			form.price_started()?
		};

		let result = engine.prices.fetch(&request).await;

		let applied = {
			let mut form = self.form.lock().await;
			match result {
				Ok(outcome) => {
					let event = match &outcome {
						PriceOutcome::Priced(price) => PricingEvent::PriceUpdated {
							form_id: self.id.clone(),
							price: price.clone(),
						},
						PriceOutcome::Rejected(issues) => PricingEvent::PriceRejected {
							form_id: self.id.clone(),
							issues: issues.clone(),
						},
					};
					let applied = form.price_received(generation, outcome)?;
					if applied != PriceApplied::Stale {
						engine.publish(SwapEvent::Pricing(event));
					}
					applied
				},
				Err(e) => {
					if form.price_failed(generation, e.to_string())? != PriceApplied::Stale {
						tracing::warn!(form_id = %self.id, error = %e, "Price request failed");
						return Err(e);
					}
					PriceApplied::Stale
				},
			}
		};

		match applied {
			PriceApplied::Stale => {
				tracing::debug!(form_id = %self.id, generation, "Discarded stale price");
				engine.publish(SwapEvent::Pricing(PricingEvent::StalePriceDiscarded {
					form_id: self.id.clone(),
					generation,
				}));
			},
			PriceApplied::Updated | PriceApplied::Refreshed => {
				self.check_funds(generation, &request).await?;
			},
			PriceApplied::Rejected | PriceApplied::Failed => {},
		}
		Ok(applied)
	}

	/// Reads allowance and balance for the price just applied.
	async fn check_funds(&self, generation: u64, request: &PriceRequest) -> Result<(), SwapError> {
		let engine = &self.engine;
		let (taker, _) = engine.wallet.connected().await?;
		let (spender, required) = {
			let form = self.form.lock().await;
			match form.price() {
				Some(price) if form.is_current(generation) => {
					(price.allowance_target(), price.sell_amount)
				},
				_ => return Ok(()),
			}
		};
		let token = request.sell_token.address;

		let status = engine
			.allowance
			.check(taker, token, spender, required)
			.await?;
		let balance = engine
			.wallet
			.delivery()
			.get_balance(taker, Some(token))
			.await?;

		let mut form = self.form.lock().await;
		if form.allowance_checked(generation, status.clone()) {
			form.balance_checked(generation, balance);
			if let AllowanceStatus::Insufficient {
				spender,
				allowance,
				required,
			} = status
			{
				engine.publish(SwapEvent::Allowance(AllowanceEvent::insufficient(
					&self.id, spender, allowance, required,
				)));
			}
		}
		Ok(())
	}

	/// Approves the spender named by the current price and waits for it.
	pub async fn approve(&self) -> Result<AllowanceStatus, SwapError> {
		let engine = &self.engine;
		self.require_ready_chain().await?;
		let (owner, _) = engine.wallet.connected().await?;

		let (token, spender, required) = {
			let mut form = self.form.lock().await;
			let token = form
				.request()
				.map(|r| r.sell_token.address)
				.ok_or(FormStateError::NoRequest)?;
			let (spender, required) = form.approval_started()?;
			(token, spender, required)
		};

		let result = async {
			let hash = engine
				.allowance
				.request_approval(owner, token, spender)
				.await?;
			engine.publish(SwapEvent::Allowance(AllowanceEvent::ApprovalSubmitted {
				form_id: self.id.clone(),
				tx_hash: hash,
			}));
			engine
				.allowance
				.await_approval(&hash, owner, token, spender, required)
				.await
		}
		.await;

		let mut form = self.form.lock().await;
		match result {
			Ok(status) => {
				form.approval_confirmed(status.clone())?;
				if let AllowanceStatus::Sufficient { allowance, .. } = &status {
					engine.publish(SwapEvent::Allowance(AllowanceEvent::ApprovalConfirmed {
						form_id: self.id.clone(),
						allowance: allowance.to_string(),
					}));
				}
				Ok(status)
			},
			Err(e) => {
				if !form.is_closed() {
					form.approval_failed(e.to_string())?;
				}
				Err(e)
			},
		}
	}

	/// Locks in the reviewed price and fetches the executable quote.
	pub async fn finalize(&self) -> Result<ExecutableQuote, SwapError> {
		let engine = &self.engine;
		self.require_ready_chain().await?;
		let (taker, _) = engine.wallet.connected().await?;

		let (request, generation) = self.form.lock().await.finalize()?;
		let result = engine.quotes.fetch(&request, taker).await;

		let mut form = self.form.lock().await;
		if form.is_closed() {
			return Err(FormStateError::Closed.into());
		}
		let applied = match &result {
			Ok(quote) => form.quote_received(generation, quote.clone())?,
			Err(e) => form.quote_failed(generation, e.to_string())?,
		};
		if applied == PriceApplied::Stale {
			tracing::debug!(form_id = %self.id, generation, "Discarded quote from an earlier finalize");
			return Err(FormStateError::Superseded.into());
		}
		let quote = result?;
		engine.publish(SwapEvent::Pricing(PricingEvent::QuoteReady {
			form_id: self.id.clone(),
		}));
		Ok(quote)
	}

	/// Signs the permit, if any, and hands the transaction to the wallet.
	pub async fn submit(&self) -> Result<PendingSwap, SwapError> {
		let engine = &self.engine;
		self.require_ready_chain().await?;
		let (from, chain_id) = engine.wallet.connected().await?;

		let quote = self.form.lock().await.submitting()?;

		let result = async {
			let tx = engine.signer.apply(&quote, from, chain_id).await?;
			engine.submitter.submit(tx).await
		}
		.await;

		let mut form = self.form.lock().await;
		match result {
			Ok(pending) => {
				if !form.is_closed() {
					form.submitted(pending.tx_hash)?;
				}
				engine.publish(SwapEvent::Delivery(DeliveryEvent::TransactionPending {
					form_id: self.id.clone(),
					tx_hash: pending.tx_hash,
					explorer_url: pending.explorer_url.clone(),
				}));
				Ok(pending)
			},
			Err(e) => {
				tracing::warn!(form_id = %self.id, error = %e, "Swap not submitted");
				if !form.is_closed() {
					form.submission_failed(e.to_string())?;
				}
				engine.publish(SwapEvent::Delivery(DeliveryEvent::TransactionFailed {
					form_id: self.id.clone(),
					error: e.to_string(),
				}));
				Err(e)
			},
		}
	}

	/// Waits for the submitted transaction to confirm or fail.
	pub async fn watch(&self) -> Result<TransactionStatus, SwapError> {
		let engine = &self.engine;
		let tx_hash = self
			.form
			.lock()
			.await
			.tx_hash()
			.ok_or_else(|| FormStateError::NotReady("nothing was submitted".to_string()))?;

		let status = engine.submitter.watch(&tx_hash).await;

		let mut form = self.form.lock().await;
		if form.is_closed() {
			return Ok(status);
		}
		match &status {
			TransactionStatus::Confirmed(receipt) => {
				form.confirmed(receipt.clone())?;
				engine.publish(SwapEvent::Delivery(DeliveryEvent::TransactionConfirmed {
					form_id: self.id.clone(),
					receipt: receipt.clone(),
				}));
			},
			TransactionStatus::Failed(reason) => {
				form.failed(reason.clone())?;
				engine.publish(SwapEvent::Delivery(DeliveryEvent::TransactionFailed {
					form_id: self.id.clone(),
					error: reason.clone(),
				}));
			},
			TransactionStatus::Pending => {},
		}
		Ok(status)
	}

	/// Returns from the confirmation step to the reviewed price.
	pub async fn modify(&self) -> Result<(), SwapError> {
		Ok(self.form.lock().await.modify()?)
	}

	pub async fn close(&self) {
		self.form.lock().await.close();
		tracing::debug!(form_id = %self.id, "Closed swap form");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::state::FormStatus;
	use crate::test_support::{engine, price_body, quote_body, FakePricing};
	use std::sync::atomic::Ordering;
	use std::time::Duration;
	use swap_types::U256;

	#[tokio::test]
	async fn test_price_then_review() {
		let (engine, chain, _) = engine(FakePricing::new(price_body(false), quote_body(true))).await;
		chain.set_balance(U256::MAX);
		let pipeline = engine.open_form();

		let applied = pipeline
			.update_price("WMATIC", "USDC", Some("10"), None)
			.await
			.unwrap();
		assert_eq!(applied, PriceApplied::Updated);
		let snapshot = pipeline.snapshot().await;
		assert_eq!(snapshot.status, FormStatus::Reviewing);
		assert!(snapshot.can_review, "blocked by {:?}", snapshot.blocked_by);
	}

	#[tokio::test]
	async fn test_unknown_token_and_bad_amount() {
		let (engine, _, _) = engine(FakePricing::new(price_body(false), quote_body(true))).await;
		let pipeline = engine.open_form();
		assert!(matches!(
			pipeline.update_price("DOGE", "USDC", Some("1"), None).await,
			Err(SwapError::UnknownToken(_))
		));
		assert!(matches!(
			pipeline.update_price("WMATIC", "USDC", Some("-1"), None).await,
			Err(SwapError::InvalidAmount(_))
		));
	}

	#[tokio::test]
	async fn test_insufficient_balance_blocks_review() {
		let (engine, _, _) = engine(FakePricing::new(price_body(false), quote_body(true))).await;
		let pipeline = engine.open_form();
		pipeline
			.update_price("WMATIC", "USDC", Some("10"), None)
			.await
			.unwrap();
		assert!(matches!(
			pipeline.finalize().await,
			Err(SwapError::State(FormStateError::NotReady(_)))
		));
	}

	#[tokio::test]
	async fn test_later_input_wins_over_slow_response() {
		let fake = FakePricing::new(price_body(false), quote_body(true));
		let (engine, chain, _) = engine(fake.clone()).await;
		chain.set_balance(U256::MAX);
		let pipeline = engine.open_form();

		fake.delay_next_price(Duration::from_millis(200));
		let slow = {
			let pipeline = pipeline.clone();
			tokio::spawn(async move {
				pipeline
					.update_price("WMATIC", "USDC", Some("10"), None)
					.await
			})
		};
		tokio::time::sleep(Duration::from_millis(20)).await;
		let fast = pipeline
			.update_price("WMATIC", "USDC", Some("20"), None)
			.await
			.unwrap();

		assert_eq!(fast, PriceApplied::Updated);
		assert_eq!(slow.await.unwrap().unwrap(), PriceApplied::Stale);
		let snapshot = pipeline.snapshot().await;
		assert_eq!(snapshot.status, FormStatus::Reviewing);
		assert_eq!(fake.price_calls(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_full_swap_with_approval() {
		let fake = FakePricing::new(price_body(true), quote_body(true));
		let (engine, chain, bus) = engine(fake).await;
		chain.set_balance(U256::MAX);
		let mut events = bus.subscribe();
		let pipeline = engine.open_form();

		pipeline
			.update_price("WMATIC", "USDC", Some("10"), None)
			.await
			.unwrap();
		let snapshot = pipeline.snapshot().await;
		assert!(matches!(
			snapshot.allowance,
			Some(AllowanceStatus::Insufficient { .. })
		));

		let status = pipeline.approve().await.unwrap();
		assert!(status.is_satisfied());
		assert!(pipeline.snapshot().await.can_review);

		let quote = pipeline.finalize().await.unwrap();
		let pending = pipeline.submit().await.unwrap();
		assert!(pending.explorer_url.ends_with(&pending.tx_hash.to_string()));

		let sent = chain.submitted();
		assert_eq!(sent.len(), 2, "approval then swap");
		let calldata = quote.transaction.data.unwrap();
		assert_eq!(sent[1].data.len(), calldata.len() + 32 + 65);

		assert!(matches!(
			pipeline.watch().await.unwrap(),
			TransactionStatus::Confirmed(_)
		));
		assert_eq!(pipeline.snapshot().await.status, FormStatus::Submitted);

		let mut seen_pending = false;
		while let Ok(event) = events.try_recv() {
			if matches!(event, SwapEvent::Delivery(DeliveryEvent::TransactionPending { .. })) {
				seen_pending = true;
			}
		}
		assert!(seen_pending);
	}

	#[tokio::test(start_paused = true)]
	async fn test_approval_that_did_not_take_keeps_review_blocked() {
		let fake = FakePricing::new(price_body(true), quote_body(true));
		let (engine, chain, _) = engine(fake).await;
		chain.set_balance(U256::MAX);
		chain.ignore_approvals.store(true, Ordering::SeqCst);
		let pipeline = engine.open_form();

		pipeline
			.update_price("WMATIC", "USDC", Some("10"), None)
			.await
			.unwrap();
		let ten = U256::from(10u64) * U256::from(10u64).pow(U256::from(18u64));
		assert!(matches!(
			pipeline.snapshot().await.allowance,
			Some(AllowanceStatus::Insufficient { required, .. }) if required == ten
		));

		let status = pipeline.approve().await.unwrap();
		assert!(matches!(
			status,
			AllowanceStatus::Insufficient { allowance, required, .. }
				if allowance == U256::ZERO && required == ten
		));
		assert_eq!(chain.submitted().len(), 1);

		let snapshot = pipeline.snapshot().await;
		assert_eq!(snapshot.status, FormStatus::Reviewing);
		assert!(!snapshot.can_review);
		assert!(matches!(
			pipeline.finalize().await,
			Err(SwapError::State(FormStateError::NotReady(_)))
		));
	}

	#[tokio::test]
	async fn test_wrong_chain_disables_submission() {
		let (engine, chain, _) = engine(FakePricing::new(price_body(false), quote_body(true))).await;
		chain.set_balance(U256::MAX);
		let pipeline = engine.open_form();
		pipeline
			.update_price("WMATIC", "USDC", Some("10"), None)
			.await
			.unwrap();
		pipeline.finalize().await.unwrap();

		engine.wallet().switch_chain(1).await.unwrap();
		assert!(matches!(
			pipeline.submit().await,
			Err(SwapError::WrongChain {
				current: 1,
				required: 137
			})
		));
		assert!(pipeline.view().await.unwrap().prompt().is_some());
		assert!(chain.submitted().is_empty());
	}

	#[tokio::test]
	async fn test_upstream_failure_keeps_form() {
		let fake = FakePricing::new(price_body(false), quote_body(true));
		let (engine, _, _) = engine(fake.clone()).await;
		let pipeline = engine.open_form();
		fake.fail_prices.store(true, Ordering::SeqCst);

		assert!(matches!(
			pipeline
				.update_price("WMATIC", "USDC", Some("10"), None)
				.await,
			Err(SwapError::Upstream(_))
		));
		let snapshot = pipeline.snapshot().await;
		assert_eq!(snapshot.status, FormStatus::Editing);
		assert_eq!(snapshot.sell_token.as_deref(), Some("WMATIC"));
		assert!(snapshot.error.is_some());
	}

	#[tokio::test]
	async fn test_closed_form_ignores_quote() {
		let fake = FakePricing::new(price_body(false), quote_body(true));
		let (engine, chain, _) = engine(fake.clone()).await;
		chain.set_balance(U256::MAX);
		let pipeline = engine.open_form();
		pipeline
			.update_price("WMATIC", "USDC", Some("10"), None)
			.await
			.unwrap();

		fake.delay_next_quote(Duration::from_millis(100));
		let finalize = {
			let pipeline = pipeline.clone();
			tokio::spawn(async move { pipeline.finalize().await })
		};
		tokio::time::sleep(Duration::from_millis(20)).await;
		pipeline.close().await;

		assert!(matches!(
			finalize.await.unwrap(),
			Err(SwapError::State(FormStateError::Closed))
		));
		assert_eq!(pipeline.snapshot().await.status, FormStatus::Closed);
		assert!(chain.submitted().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn test_quote_from_modified_finalize_is_discarded() {
		let fake = FakePricing::new(price_body(false), quote_body(true));
		let (engine, chain, _) = engine(fake.clone()).await;
		chain.set_balance(U256::MAX);
		let pipeline = engine.open_form();
		pipeline
			.update_price("WMATIC", "USDC", Some("10"), None)
			.await
			.unwrap();

		fake.delay_next_quote(Duration::from_millis(200));
		let first = {
			let pipeline = pipeline.clone();
			tokio::spawn(async move { pipeline.finalize().await })
		};
		tokio::time::sleep(Duration::from_millis(20)).await;

		pipeline.modify().await.unwrap();
		pipeline
			.update_price("WMATIC", "USDC", Some("20"), None)
			.await
			.unwrap();
		fake.delay_next_quote(Duration::from_millis(500));
		let second = {
			let pipeline = pipeline.clone();
			tokio::spawn(async move { pipeline.finalize().await })
		};

		assert!(matches!(
			first.await.unwrap(),
			Err(SwapError::State(FormStateError::Superseded))
		));
		let quote = second.await.unwrap().unwrap();
		let twenty = U256::from(20u64) * U256::from(10u64).pow(U256::from(18u64));
		assert_eq!(quote.sell_amount, twenty);

		let form = pipeline.form.lock().await;
		assert_eq!(form.status(), FormStatus::Confirming);
		assert_eq!(form.quote().map(|q| q.sell_amount), Some(twenty));
	}
}
