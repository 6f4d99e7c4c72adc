//! Wallet connection and sign-in state.
//!
//! [`WalletContext`] is the single owner of "who is connected, on which chain,
//! and whether the gateway has a session for them". Everything that needs the
//! taker address or the chain reads a snapshot from here.

use crate::engine::event_bus::EventBus;
use crate::gate::SwapView;
use crate::SwapError;
use alloy::hex;
use serde::Serialize;
use std::sync::Arc;
use swap_account::AccountService;
use swap_delivery::DeliveryService;
use swap_pricing::SessionInterface;
use swap_types::{Address, SessionResponse, SiweMessage, SwapEvent, WalletEvent};
use tokio::sync::RwLock;

/// What goes into the sign-in message besides address, chain and nonce.
#[derive(Debug, Clone)]
pub struct SignInSettings {
	pub domain: String,
	pub uri: String,
	pub statement: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SessionStatus {
	Anonymous,
	Authenticated(SessionResponse),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
	pub address: Option<Address>,
	pub chain_id: Option<u64>,
	pub session: SessionStatus,
}

impl Default for WalletState {
	fn default() -> Self {
		Self {
			address: None,
			chain_id: None,
			session: SessionStatus::Anonymous,
		}
	}
}

pub struct WalletContext {
	account: Arc<AccountService>,
	delivery: Arc<DeliveryService>,
	sessions: Arc<dyn SessionInterface>,
	sign_in: SignInSettings,
	required_chain_id: u64,
	state: RwLock<WalletState>,
	event_bus: EventBus,
}

impl WalletContext {
	pub fn new(
		account: Arc<AccountService>,
		delivery: Arc<DeliveryService>,
		sessions: Arc<dyn SessionInterface>,
		sign_in: SignInSettings,
		required_chain_id: u64,
		event_bus: EventBus,
	) -> Self {
		Self {
			account,
			delivery,
			sessions,
			sign_in,
			required_chain_id,
			state: RwLock::new(WalletState::default()),
			event_bus,
		}
	}

	pub fn required_chain_id(&self) -> u64 {
		self.required_chain_id
	}

	pub fn delivery(&self) -> &Arc<DeliveryService> {
		&self.delivery
	}

	pub fn account(&self) -> &Arc<AccountService> {
		&self.account
	}

	/// Connects the wallet and picks up an existing gateway session for the
	/// same address, if any.
	pub async fn connect(&self) -> Result<WalletState, SwapError> {
		let address = self
			.account
			.get_address()
			.await
			.map_err(|e| SwapError::Signing(e.to_string()))?;
		let chain_id = self.delivery.chain_id();

		let session = match self.sessions.session().await? {
			Some(session) if session.address == address => SessionStatus::Authenticated(session),
			_ => SessionStatus::Anonymous,
		};

		let snapshot = {
			let mut state = self.state.write().await;
			*state = WalletState {
				address: Some(address),
				chain_id: Some(chain_id),
				session,
			};
			state.clone()
		};

		tracing::info!(address = %address, chain_id, "Wallet connected");
		self.event_bus
			.publish(SwapEvent::Wallet(WalletEvent::Connected { address, chain_id }))
			.ok();
		Ok(snapshot)
	}

	/// Disconnects; an authenticated session is signed out first.
	pub async fn disconnect(&self) -> Result<(), SwapError> {
		if self.is_authenticated().await {
			self.sign_out().await?;
		}
		*self.state.write().await = WalletState::default();
		tracing::info!("Wallet disconnected");
		self.event_bus
			.publish(SwapEvent::Wallet(WalletEvent::Disconnected))
			.ok();
		Ok(())
	}

	/// Runs the sign-in handshake: fetch a nonce, sign the prepared message,
	/// submit it for verification, then read back the session.
	pub async fn sign_in(&self) -> Result<SessionResponse, SwapError> {
		let (address, chain_id) = self.connected().await?;

		let nonce = self.sessions.nonce().await?;
		let message = SiweMessage::new(
			self.sign_in.domain.clone(),
			address,
			self.sign_in.statement.clone(),
			self.sign_in.uri.clone(),
			chain_id,
			nonce,
		)
		.to_string();

		let signature = self
			.account
			.sign_message(message.as_bytes())
			.await
			.map_err(|e| SwapError::Signing(e.to_string()))?;
		let signature = hex::encode_prefixed(signature.as_bytes());

		if !self.sessions.verify(&message, &signature).await? {
			tracing::warn!(address = %address, "Sign-in rejected");
			return Err(SwapError::NotAuthenticated);
		}
		let session = self
			.sessions
			.session()
			.await?
			.ok_or(SwapError::NotAuthenticated)?;

		self.state.write().await.session = SessionStatus::Authenticated(session.clone());
		tracing::info!(address = %session.address, chain_id = session.chain_id, "Signed in");
		self.event_bus
			.publish(SwapEvent::Wallet(WalletEvent::SignedIn {
				address: session.address,
				chain_id: session.chain_id,
			}))
			.ok();
		Ok(session)
	}

	pub async fn sign_out(&self) -> Result<(), SwapError> {
		self.sessions.sign_out().await?;
		self.state.write().await.session = SessionStatus::Anonymous;
		self.event_bus
			.publish(SwapEvent::Wallet(WalletEvent::SignedOut))
			.ok();
		Ok(())
	}

	/// Asks the wallet to move to `chain_id`.
	pub async fn switch_chain(&self, chain_id: u64) -> Result<SwapView, SwapError> {
		self.connected().await?;
		self.delivery.switch_chain(chain_id).await?;
		self.state.write().await.chain_id = Some(chain_id);

		let view = SwapView::for_chain(chain_id, self.required_chain_id);
		if !view.is_ready() {
			tracing::warn!(chain_id, required = self.required_chain_id, "Wallet left the swap chain");
		}
		self.event_bus
			.publish(SwapEvent::Wallet(WalletEvent::ChainChanged {
				chain_id,
				required_chain_id: self.required_chain_id,
			}))
			.ok();
		Ok(view)
	}

	/// Swap view for the chain the wallet is on now.
	pub async fn view(&self) -> Result<SwapView, SwapError> {
		let (_, chain_id) = self.connected().await?;
		Ok(SwapView::for_chain(chain_id, self.required_chain_id))
	}

	pub async fn snapshot(&self) -> WalletState {
		self.state.read().await.clone()
	}

	pub async fn is_authenticated(&self) -> bool {
		matches!(self.state.read().await.session, SessionStatus::Authenticated(_))
	}

	/// Address and chain of the connected wallet.
	pub async fn connected(&self) -> Result<(Address, u64), SwapError> {
		let state = self.state.read().await;
		match (state.address, state.chain_id) {
			(Some(address), Some(chain_id)) => Ok((address, chain_id)),
			_ => Err(SwapError::NotConnected),
		}
	}
}
