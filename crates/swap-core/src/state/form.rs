//! Swap form state machine.
//!
//! A form moves Editing -> Pricing -> Reviewing -> (Approving ->) Confirming
//! -> Submitted, ending in Failed when the transaction does not make it. It
//! can be closed from any state. The form is plain data; the engine drives it
//! and releases it across every network call, so each method re-checks that
//! the step it applies is still current.

use crate::allowance::AllowanceStatus;
use crate::price::{PriceRequest, PriceTracker};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use swap_types::{
	Address, ExecutableQuote, PriceOutcome, PriceQuote, TransactionHash, TransactionReceipt,
	TransactionStatus, ValidationIssue, U256,
};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FormStatus {
	/// Inputs are being edited; no usable price.
	Editing,
	/// A price request is in flight.
	Pricing,
	/// A current price is shown.
	Reviewing,
	/// An approval transaction is pending.
	Approving,
	/// Finalized; the executable quote is shown for confirmation.
	Confirming,
	/// The swap transaction was accepted by the wallet.
	Submitted,
	/// The swap transaction reverted or was never confirmed.
	Failed,
	Closed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormStateError {
	#[error("Invalid state transition from {from:?} to {to:?}")]
	InvalidTransition { from: FormStatus, to: FormStatus },
	#[error("Form is closed")]
	Closed,
	#[error("No price request has been entered")]
	NoRequest,
	#[error("Not ready: {0}")]
	NotReady(String),
	#[error("Quote was already fetched for this review")]
	QuoteAlreadyFetched,
	#[error("No quote to submit")]
	NoQuote,
	#[error("Superseded by a newer request")]
	Superseded,
}

/// What happened to a price response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceApplied {
	/// New parameters were priced.
	Updated,
	/// Same parameters re-priced; only the amounts changed.
	Refreshed,
	Rejected,
	Failed,
	/// Superseded by a newer request and dropped.
	Stale,
}

static TRANSITIONS: Lazy<HashMap<FormStatus, HashSet<FormStatus>>> = Lazy::new(|| {
	use FormStatus::*;
	let mut m = HashMap::new();
	m.insert(Editing, HashSet::from([Pricing]));
	m.insert(Pricing, HashSet::from([Editing, Reviewing]));
	m.insert(
		Reviewing,
		HashSet::from([Editing, Pricing, Approving, Confirming]),
	);
	m.insert(Approving, HashSet::from([Reviewing]));
	m.insert(Confirming, HashSet::from([Reviewing, Submitted]));
	m.insert(Submitted, HashSet::from([Failed]));
	m.insert(Failed, HashSet::from([Reviewing]));
	m.insert(Closed, HashSet::new());
	m
});

/// Serializable view of a form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSnapshot {
	pub id: String,
	pub status: FormStatus,
	pub sell_token: Option<String>,
	pub buy_token: Option<String>,
	pub price: Option<PriceQuote>,
	pub issues: Vec<ValidationIssue>,
	pub allowance: Option<AllowanceStatus>,
	pub can_review: bool,
	pub blocked_by: Option<String>,
	pub tx_hash: Option<TransactionHash>,
	pub tx_status: Option<TransactionStatus>,
	pub error: Option<String>,
}

#[derive(Debug)]
pub struct SwapForm {
	id: String,
	status: FormStatus,
	request: Option<PriceRequest>,
	tracker: PriceTracker,
	price: Option<PriceQuote>,
	issues: Vec<ValidationIssue>,
	allowance: Option<AllowanceStatus>,
	balance: Option<U256>,
	chain_ready: bool,
	quote: Option<ExecutableQuote>,
	/// Bumped on every finalize and on anything that leaves the confirmation
	/// step, so a quote only lands on the finalize that asked for it.
	quote_generation: u64,
	submitting: bool,
	tx_hash: Option<TransactionHash>,
	tx_status: Option<TransactionStatus>,
	error: Option<String>,
}

impl SwapForm {
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			status: FormStatus::Editing,
			request: None,
			tracker: PriceTracker::new(),
			price: None,
			issues: Vec::new(),
			allowance: None,
			balance: None,
			chain_ready: true,
			quote: None,
			quote_generation: 0,
			submitting: false,
			tx_hash: None,
			tx_status: None,
			error: None,
		}
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn status(&self) -> FormStatus {
		self.status
	}

	pub fn request(&self) -> Option<&PriceRequest> {
		self.request.as_ref()
	}

	pub fn price(&self) -> Option<&PriceQuote> {
		self.price.as_ref()
	}

	pub fn issues(&self) -> &[ValidationIssue] {
		&self.issues
	}

	pub fn allowance(&self) -> Option<&AllowanceStatus> {
		self.allowance.as_ref()
	}

	pub fn quote(&self) -> Option<&ExecutableQuote> {
		self.quote.as_ref()
	}

	pub fn tx_hash(&self) -> Option<TransactionHash> {
		self.tx_hash
	}

	pub fn tx_status(&self) -> Option<&TransactionStatus> {
		self.tx_status.as_ref()
	}

	pub fn error(&self) -> Option<&str> {
		self.error.as_deref()
	}

	pub fn is_closed(&self) -> bool {
		self.status == FormStatus::Closed
	}

	/// Whether results tagged with `generation` still belong to this form.
	pub fn is_current(&self, generation: u64) -> bool {
		!self.is_closed() && self.tracker.accept(generation)
	}

	fn transition(&mut self, to: FormStatus) -> Result<(), FormStateError> {
		let from = self.status;
		if from == FormStatus::Closed {
			return Err(FormStateError::Closed);
		}
		if from == to {
			return Ok(());
		}
		let allowed = TRANSITIONS
			.get(&from)
			.is_some_and(|targets| targets.contains(&to));
		if !allowed {
			return Err(FormStateError::InvalidTransition { from, to });
		}
		self.status = to;
		Ok(())
	}

	fn ensure_open(&self) -> Result<(), FormStateError> {
		if self.is_closed() {
			Err(FormStateError::Closed)
		} else {
			Ok(())
		}
	}

	/// Records new input. Returns `false` when it prices the same trade as
	/// the current request, in which case nothing is reset.
	pub fn set_input(&mut self, request: PriceRequest) -> Result<bool, FormStateError> {
		self.ensure_open()?;
		if let Some(current) = &self.request {
			if current.same_trade(&request) && current.taker == request.taker {
				if !matches!(self.status, FormStatus::Editing | FormStatus::Pricing | FormStatus::Reviewing) {
					return Err(FormStateError::InvalidTransition {
						from: self.status,
						to: FormStatus::Editing,
					});
				}
				return Ok(false);
			}
		}
		self.transition(FormStatus::Editing)?;
		self.tracker.invalidate();
		self.quote_generation += 1;
		self.request = Some(request);
		self.price = None;
		self.issues.clear();
		self.allowance = None;
		self.balance = None;
		self.error = None;
		Ok(true)
	}

	/// Starts a price request for the current input and returns its
	/// generation. Re-pricing a reviewed trade keeps it reviewable.
	pub fn price_started(&mut self) -> Result<u64, FormStateError> {
		self.ensure_open()?;
		if self.request.is_none() {
			return Err(FormStateError::NoRequest);
		}
		let refreshing = self.status == FormStatus::Reviewing && self.price.is_some();
		if !refreshing {
			self.transition(FormStatus::Pricing)?;
		}
		self.error = None;
		Ok(self.tracker.begin())
	}

	pub fn price_received(
		&mut self,
		generation: u64,
		outcome: PriceOutcome,
	) -> Result<PriceApplied, FormStateError> {
		self.ensure_open()?;
		if !self.tracker.accept(generation) {
			return Ok(PriceApplied::Stale);
		}
		match outcome {
			PriceOutcome::Priced(price) => {
				let refreshed = self.status == FormStatus::Reviewing;
				let same_spender = self
					.price
					.as_ref()
					.is_some_and(|old| old.allowance_target() == price.allowance_target());
				self.transition(FormStatus::Reviewing)?;
				if !(refreshed && same_spender) {
					self.allowance = None;
					self.balance = None;
				}
				self.price = Some(price);
				self.issues.clear();
				Ok(if refreshed {
					PriceApplied::Refreshed
				} else {
					PriceApplied::Updated
				})
			},
			PriceOutcome::Rejected(issues) => {
				self.transition(FormStatus::Editing)?;
				self.price = None;
				self.allowance = None;
				self.balance = None;
				self.issues = issues;
				Ok(PriceApplied::Rejected)
			},
		}
	}

	/// A price request failed in transport. A pending first price falls back
	/// to editing; a refresh keeps the price already shown.
	pub fn price_failed(
		&mut self,
		generation: u64,
		message: impl Into<String>,
	) -> Result<PriceApplied, FormStateError> {
		self.ensure_open()?;
		if !self.tracker.accept(generation) {
			return Ok(PriceApplied::Stale);
		}
		if self.status == FormStatus::Pricing {
			self.transition(FormStatus::Editing)?;
		}
		self.error = Some(message.into());
		Ok(PriceApplied::Failed)
	}

	/// Records an allowance read made for `generation`; ignored when stale.
	pub fn allowance_checked(&mut self, generation: u64, status: AllowanceStatus) -> bool {
		if !self.is_current(generation) {
			return false;
		}
		self.allowance = Some(status);
		true
	}

	/// Records the taker's sell-token balance read for `generation`.
	pub fn balance_checked(&mut self, generation: u64, balance: U256) -> bool {
		if !self.is_current(generation) {
			return false;
		}
		self.balance = Some(balance);
		true
	}

	pub fn chain_changed(&mut self, ready: bool) {
		self.chain_ready = ready;
	}

	/// Why the current price cannot be reviewed, if anything blocks it.
	pub fn blocked_by(&self) -> Option<String> {
		if self.status != FormStatus::Reviewing {
			return Some(format!("form is {:?}", self.status));
		}
		let Some(price) = &self.price else {
			return Some("no price".to_string());
		};
		if !self.chain_ready {
			return Some("wallet is on the wrong chain".to_string());
		}
		if !price.liquidity_available {
			return Some("insufficient liquidity".to_string());
		}
		match &self.allowance {
			None => return Some("allowance not checked".to_string()),
			Some(status) if !status.is_satisfied() => {
				return Some("sell token allowance is too low".to_string())
			},
			_ => {},
		}
		match self.balance {
			None => Some("balance not checked".to_string()),
			Some(balance) if balance < price.sell_amount => {
				Some("insufficient sell token balance".to_string())
			},
			_ => None,
		}
	}

	pub fn can_review(&self) -> bool {
		self.blocked_by().is_none()
	}

	/// Moves to Approving; returns the spender to approve and the amount
	/// the allowance must cover.
	pub fn approval_started(&mut self) -> Result<(Address, U256), FormStateError> {
		self.ensure_open()?;
		let Some(AllowanceStatus::Insufficient {
			spender, required, ..
		}) = self.allowance
		else {
			return Err(FormStateError::NotReady("no approval is needed".to_string()));
		};
		self.transition(FormStatus::Approving)?;
		self.error = None;
		Ok((spender, required))
	}

	pub fn approval_confirmed(&mut self, status: AllowanceStatus) -> Result<(), FormStateError> {
		self.transition(FormStatus::Reviewing)?;
		self.allowance = Some(status);
		Ok(())
	}

	pub fn approval_failed(&mut self, message: impl Into<String>) -> Result<(), FormStateError> {
		self.transition(FormStatus::Reviewing)?;
		self.error = Some(message.into());
		Ok(())
	}

	/// Locks in the reviewed price. Returns the request the quote must be
	/// fetched for and the generation to hand back with it.
	pub fn finalize(&mut self) -> Result<(PriceRequest, u64), FormStateError> {
		self.ensure_open()?;
		if let Some(reason) = self.blocked_by() {
			return Err(FormStateError::NotReady(reason));
		}
		let request = self.request.clone().ok_or(FormStateError::NoRequest)?;
		self.transition(FormStatus::Confirming)?;
		self.tracker.invalidate();
		self.quote_generation += 1;
		self.quote = None;
		self.error = None;
		Ok((request, self.quote_generation))
	}

	/// Stores the quote fetched for `generation`. A finalized form takes
	/// exactly one quote; one from an earlier finalize is `Stale`.
	pub fn quote_received(
		&mut self,
		generation: u64,
		quote: ExecutableQuote,
	) -> Result<PriceApplied, FormStateError> {
		self.ensure_open()?;
		if generation != self.quote_generation {
			return Ok(PriceApplied::Stale);
		}
		if self.status != FormStatus::Confirming {
			return Err(FormStateError::NotReady(format!("form is {:?}", self.status)));
		}
		if self.quote.is_some() {
			return Err(FormStateError::QuoteAlreadyFetched);
		}
		self.quote = Some(quote);
		Ok(PriceApplied::Updated)
	}

	/// The quote could not be fetched; back to the reviewed price unless a
	/// newer finalize or edit has taken over.
	pub fn quote_failed(
		&mut self,
		generation: u64,
		message: impl Into<String>,
	) -> Result<PriceApplied, FormStateError> {
		self.ensure_open()?;
		if generation != self.quote_generation {
			return Ok(PriceApplied::Stale);
		}
		self.transition(FormStatus::Reviewing)?;
		self.quote = None;
		self.error = Some(message.into());
		Ok(PriceApplied::Failed)
	}

	/// Claims the quote for signing and broadcast.
	pub fn submitting(&mut self) -> Result<ExecutableQuote, FormStateError> {
		self.ensure_open()?;
		if self.status != FormStatus::Confirming {
			return Err(FormStateError::NotReady(format!("form is {:?}", self.status)));
		}
		if !self.chain_ready {
			return Err(FormStateError::NotReady(
				"wallet is on the wrong chain".to_string(),
			));
		}
		if self.submitting {
			return Err(FormStateError::NotReady("submission in progress".to_string()));
		}
		let quote = self.quote.clone().ok_or(FormStateError::NoQuote)?;
		self.submitting = true;
		self.error = None;
		Ok(quote)
	}

	/// Signing or broadcast failed. The form stays on the confirmation
	/// step with its quote so the user can retry or modify.
	pub fn submission_failed(&mut self, message: impl Into<String>) -> Result<(), FormStateError> {
		self.ensure_open()?;
		self.submitting = false;
		self.error = Some(message.into());
		Ok(())
	}

	pub fn submitted(&mut self, tx_hash: TransactionHash) -> Result<(), FormStateError> {
		self.transition(FormStatus::Submitted)?;
		self.submitting = false;
		self.quote = None;
		self.tx_hash = Some(tx_hash);
		self.tx_status = Some(TransactionStatus::Pending);
		Ok(())
	}

	pub fn confirmed(&mut self, receipt: TransactionReceipt) -> Result<(), FormStateError> {
		self.ensure_open()?;
		if self.status != FormStatus::Submitted {
			return Err(FormStateError::NotReady(format!("form is {:?}", self.status)));
		}
		self.tx_status = Some(TransactionStatus::Confirmed(receipt));
		Ok(())
	}

	pub fn failed(&mut self, reason: impl Into<String>) -> Result<(), FormStateError> {
		let reason = reason.into();
		self.transition(FormStatus::Failed)?;
		self.tx_status = Some(TransactionStatus::Failed(reason.clone()));
		self.error = Some(reason);
		Ok(())
	}

	/// Leaves the confirmation step. The quote is discarded; a new one is
	/// fetched on the next finalize.
	pub fn modify(&mut self) -> Result<(), FormStateError> {
		self.transition(FormStatus::Reviewing)?;
		self.quote_generation += 1;
		self.quote = None;
		self.submitting = false;
		self.tx_hash = None;
		self.tx_status = None;
		self.error = None;
		Ok(())
	}

	/// Closes the form. Responses still in flight are dropped on arrival.
	pub fn close(&mut self) {
		self.tracker.invalidate();
		self.quote_generation += 1;
		self.status = FormStatus::Closed;
		self.quote = None;
		self.submitting = false;
	}

	pub fn snapshot(&self) -> FormSnapshot {
		FormSnapshot {
			id: self.id.clone(),
			status: self.status,
			sell_token: self.request.as_ref().map(|r| r.sell_token.symbol.clone()),
			buy_token: self.request.as_ref().map(|r| r.buy_token.symbol.clone()),
			price: self.price.clone(),
			issues: self.issues.clone(),
			allowance: self.allowance.clone(),
			can_review: self.can_review(),
			blocked_by: self.blocked_by(),
			tx_hash: self.tx_hash,
			tx_status: self.tx_status.clone(),
			error: self.error.clone(),
		}
	}
}
