//! In-memory stand-ins for the gateway, the wallet and the chain.

use crate::context::{SignInSettings, WalletContext};
use crate::engine::{event_bus::EventBus, SwapEngine};
use crate::price::FeeParams;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use swap_account::implementations::local::LocalWallet;
use swap_account::AccountService;
use swap_delivery::{ConfirmationPolicy, DeliveryError, DeliveryInterface, DeliveryService};
use swap_pricing::{PricingError, PricingInterface, PricingService, QueryParams, SessionInterface};
use swap_types::utils::constants::{APPROVE_SELECTOR, FEE_RECIPIENT};
use swap_types::{
	Address, ConfigSchema, SessionResponse, SiweMessage, SwapTransaction, TokenRegistry,
	TransactionHash, TransactionReceipt, ValidationError, B256, U256,
};

pub(crate) const DEV_KEY: &str =
	"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub(crate) fn fees() -> FeeParams {
	FeeParams {
		recipient: FEE_RECIPIENT,
		bps: 100,
	}
}

pub(crate) fn price_body(with_allowance: bool) -> Value {
	let allowance = if with_allowance {
		json!({ "actual": "0", "spender": "0x000000000022d473030f116ddee9f6b43ac78ba3" })
	} else {
		Value::Null
	};
	json!({
		"buyAmount": "5213402",
		"buyToken": "0x3c499c542cef5e3811e1192ce70d8cc03d5c3359",
		"sellAmount": "10000000000000000000",
		"sellToken": "0x0d500b1d8e8ef31e21c99d1db9a6444d3adf1270",
		"liquidityAvailable": true,
		"issues": { "allowance": allowance, "balance": null }
	})
}

pub(crate) fn quote_body(with_permit: bool) -> Value {
	let permit = with_permit.then(|| {
		json!({
			"type": "Permit2",
			"eip712": {
				"types": {
					"EIP712Domain": [
						{ "name": "name", "type": "string" },
						{ "name": "chainId", "type": "uint256" },
						{ "name": "verifyingContract", "type": "address" }
					],
					"PermitTransferFrom": [
						{ "name": "permitted", "type": "TokenPermissions" },
						{ "name": "spender", "type": "address" },
						{ "name": "nonce", "type": "uint256" },
						{ "name": "deadline", "type": "uint256" }
					],
					"TokenPermissions": [
						{ "name": "token", "type": "address" },
						{ "name": "amount", "type": "uint256" }
					]
				},
				"domain": {
					"name": "Permit2",
					"chainId": 137,
					"verifyingContract": "0x000000000022d473030f116ddee9f6b43ac78ba3"
				},
				"message": {
					"permitted": {
						"token": "0x0d500b1d8e8ef31e21c99d1db9a6444d3adf1270",
						"amount": "10000000000000000000"
					},
					"spender": "0xdef1c0ded9bec7f1a1670819833240f027b25eff",
					"nonce": "2241959297937691820908574931991575",
					"deadline": "1718669420"
				},
				"primaryType": "PermitTransferFrom"
			}
		})
	});
	json!({
		"sellToken": "0x0d500b1d8e8ef31e21c99d1db9a6444d3adf1270",
		"buyToken": "0x3c499c542cef5e3811e1192ce70d8cc03d5c3359",
		"sellAmount": "10000000000000000000",
		"buyAmount": "5213402",
		"transaction": {
			"to": "0xdef1c0ded9bec7f1a1670819833240f027b25eff",
			"data": "0x1fff991f000000000000000000000000000000000000000000000000000000000000002a",
			"gas": "210000",
			"gasPrice": "30000000000",
			"value": "0"
		},
		"permit2": permit
	})
}

struct AnySchema;

impl ConfigSchema for AnySchema {
	fn validate(&self, _config: &toml::Value) -> Result<(), ValidationError> {
		Ok(())
	}
}

/// Gateway stand-in answering every price and quote with fixed bodies.
pub(crate) struct FakePricing {
	price: Value,
	quote: Value,
	price_calls: AtomicUsize,
	quote_params: Mutex<Option<QueryParams>>,
	price_delay: Mutex<Option<Duration>>,
	quote_delay: Mutex<Option<Duration>>,
	pub fail_prices: AtomicBool,
	unauthenticated: bool,
}

impl FakePricing {
	pub(crate) fn new(price: Value, quote: Value) -> Arc<Self> {
		Arc::new(Self {
			price,
			quote,
			price_calls: AtomicUsize::new(0),
			quote_params: Mutex::new(None),
			price_delay: Mutex::new(None),
			quote_delay: Mutex::new(None),
			fail_prices: AtomicBool::new(false),
			unauthenticated: false,
		})
	}

	pub(crate) fn with_price(price: Value) -> Arc<Self> {
		Self::new(price, Value::Null)
	}

	pub(crate) fn with_quote(quote: Value) -> Arc<Self> {
		Self::new(Value::Null, quote)
	}

	pub(crate) fn unauthenticated() -> Arc<Self> {
		let mut fake = Self::new(Value::Null, Value::Null);
		if let Some(inner) = Arc::get_mut(&mut fake) {
			inner.unauthenticated = true;
		}
		fake
	}

	pub(crate) fn price_calls(&self) -> usize {
		self.price_calls.load(Ordering::SeqCst)
	}

	pub(crate) fn last_quote_params(&self) -> Option<QueryParams> {
		self.quote_params.lock().unwrap().clone()
	}

	pub(crate) fn delay_next_price(&self, delay: Duration) {
		*self.price_delay.lock().unwrap() = Some(delay);
	}

	pub(crate) fn delay_next_quote(&self, delay: Duration) {
		*self.quote_delay.lock().unwrap() = Some(delay);
	}
}

#[async_trait]
impl PricingInterface for FakePricing {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(AnySchema)
	}

	async fn price(&self, _query: &QueryParams) -> Result<Value, PricingError> {
		self.price_calls.fetch_add(1, Ordering::SeqCst);
		let delay = self.price_delay.lock().unwrap().take();
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		if self.unauthenticated {
			return Err(PricingError::Unauthenticated);
		}
		if self.fail_prices.load(Ordering::SeqCst) {
			return Err(PricingError::Upstream {
				status: 500,
				message: "Internal Server Error".to_string(),
			});
		}
		Ok(self.price.clone())
	}

	async fn quote(&self, query: &QueryParams) -> Result<Value, PricingError> {
		*self.quote_params.lock().unwrap() = Some(query.clone());
		let delay = self.quote_delay.lock().unwrap().take();
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		if self.unauthenticated {
			return Err(PricingError::Unauthenticated);
		}
		// Quotes echo the requested sell amount so a test can tell them apart.
		let mut body = self.quote.clone();
		let requested = query.iter().find(|(k, _)| k == "sellAmount");
		if let (Some(fields), Some((_, amount))) = (body.as_object_mut(), requested) {
			if fields.contains_key("sellAmount") {
				fields.insert("sellAmount".to_string(), json!(amount));
			}
		}
		Ok(body)
	}
}

pub(crate) fn pricing(fake: Arc<FakePricing>) -> Arc<PricingService> {
	Arc::new(PricingService::new(fake, "fake"))
}

#[derive(Default)]
struct SessionsInner {
	reject: bool,
	verified: Mutex<Option<(String, String)>>,
	session: Mutex<Option<SessionResponse>>,
	sign_outs: AtomicUsize,
}

/// `/api/siwe` stand-in. Accepts any signed message unless built rejecting.
#[derive(Clone, Default)]
pub(crate) struct FakeSessions {
	inner: Arc<SessionsInner>,
}

impl FakeSessions {
	pub(crate) fn rejecting() -> Self {
		Self {
			inner: Arc::new(SessionsInner {
				reject: true,
				..Default::default()
			}),
		}
	}

	pub(crate) fn issued_nonce(&self) -> String {
		"Nx7pQ2rT9wLk".to_string()
	}

	pub(crate) fn last_verified(&self) -> Option<(String, String)> {
		self.inner.verified.lock().unwrap().clone()
	}

	pub(crate) fn sign_outs(&self) -> usize {
		self.inner.sign_outs.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl SessionInterface for FakeSessions {
	async fn nonce(&self) -> Result<String, PricingError> {
		Ok(self.issued_nonce())
	}

	async fn verify(&self, message: &str, signature: &str) -> Result<bool, PricingError> {
		*self.inner.verified.lock().unwrap() = Some((message.to_string(), signature.to_string()));
		if self.inner.reject {
			return Ok(false);
		}
		let parsed: SiweMessage = message
			.parse()
			.map_err(|e: swap_types::SiweError| PricingError::InvalidResponse(e.to_string()))?;
		*self.inner.session.lock().unwrap() = Some(SessionResponse {
			address: parsed.address,
			chain_id: parsed.chain_id,
		});
		Ok(true)
	}

	async fn session(&self) -> Result<Option<SessionResponse>, PricingError> {
		Ok(self.inner.session.lock().unwrap().clone())
	}

	async fn sign_out(&self) -> Result<bool, PricingError> {
		self.inner.sign_outs.fetch_add(1, Ordering::SeqCst);
		*self.inner.session.lock().unwrap() = None;
		Ok(true)
	}
}

/// Chain stand-in: every transaction is mined in block 100 on first poll.
pub(crate) struct StubChain {
	pub chain: AtomicU64,
	pub revert: AtomicBool,
	pub never_mine: AtomicBool,
	/// Approvals are mined without changing the allowance.
	pub ignore_approvals: AtomicBool,
	allowance: Mutex<U256>,
	balance: Mutex<U256>,
	sent: Mutex<Vec<SwapTransaction>>,
}

impl StubChain {
	pub(crate) fn new() -> Arc<Self> {
		Arc::new(Self {
			chain: AtomicU64::new(137),
			revert: AtomicBool::new(false),
			never_mine: AtomicBool::new(false),
			ignore_approvals: AtomicBool::new(false),
			allowance: Mutex::new(U256::ZERO),
			balance: Mutex::new(U256::ZERO),
			sent: Mutex::new(Vec::new()),
		})
	}

	pub(crate) fn set_allowance(&self, allowance: U256) {
		*self.allowance.lock().unwrap() = allowance;
	}

	pub(crate) fn set_balance(&self, balance: U256) {
		*self.balance.lock().unwrap() = balance;
	}

	pub(crate) fn submitted(&self) -> Vec<SwapTransaction> {
		self.sent.lock().unwrap().clone()
	}
}

#[async_trait]
impl DeliveryInterface for StubChain {
	fn chain_id(&self) -> u64 {
		self.chain.load(Ordering::SeqCst)
	}

	async fn switch_chain(&self, chain_id: u64) -> Result<(), DeliveryError> {
		self.chain.store(chain_id, Ordering::SeqCst);
		Ok(())
	}

	async fn submit(&self, tx: SwapTransaction) -> Result<TransactionHash, DeliveryError> {
		// Approvals take effect when sent.
		if tx.data.len() == 68
			&& tx.data[..4] == APPROVE_SELECTOR
			&& !self.revert.load(Ordering::SeqCst)
			&& !self.ignore_approvals.load(Ordering::SeqCst)
		{
			self.set_allowance(U256::from_be_slice(&tx.data[36..68]));
		}
		let mut sent = self.sent.lock().unwrap();
		sent.push(tx);
		Ok(TransactionHash(B256::repeat_byte(sent.len() as u8)))
	}

	async fn get_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, DeliveryError> {
		if self.never_mine.load(Ordering::SeqCst) {
			return Ok(None);
		}
		Ok(Some(TransactionReceipt {
			hash: *hash,
			block_number: 100,
			success: !self.revert.load(Ordering::SeqCst),
		}))
	}

	async fn get_balance(
		&self,
		_owner: Address,
		_token: Option<Address>,
	) -> Result<U256, DeliveryError> {
		Ok(*self.balance.lock().unwrap())
	}

	async fn get_allowance(
		&self,
		_owner: Address,
		_spender: Address,
		_token: Address,
	) -> Result<U256, DeliveryError> {
		Ok(*self.allowance.lock().unwrap())
	}

	async fn get_block_number(&self) -> Result<u64, DeliveryError> {
		Ok(100)
	}
}

pub(crate) fn delivery(chain: Arc<StubChain>) -> Arc<DeliveryService> {
	Arc::new(DeliveryService::new(
		chain,
		ConfirmationPolicy {
			min_confirmations: 1,
			poll_interval: Duration::from_secs(1),
			timeout: Duration::from_secs(30),
		},
	))
}

pub(crate) fn account() -> Arc<AccountService> {
	let wallet = LocalWallet::new(&DEV_KEY.into()).unwrap();
	Arc::new(AccountService::new(Box::new(wallet)))
}

pub(crate) fn wallet_context(sessions: FakeSessions) -> (WalletContext, Arc<StubChain>, EventBus) {
	let chain = StubChain::new();
	let bus = EventBus::new(64);
	let context = WalletContext::new(
		account(),
		delivery(chain.clone()),
		Arc::new(sessions),
		SignInSettings {
			domain: "localhost:3000".to_string(),
			uri: "http://localhost:3000".to_string(),
			statement: Some("Sign in to swap on Polygon.".to_string()),
		},
		137,
		bus.clone(),
	);
	(context, chain, bus)
}

/// Engine over a connected wallet.
pub(crate) async fn engine(fake: Arc<FakePricing>) -> (SwapEngine, Arc<StubChain>, EventBus) {
	let (context, chain, bus) = wallet_context(FakeSessions::default());
	context.connect().await.unwrap();
	let engine = SwapEngine::new(
		Arc::new(context),
		pricing(fake),
		TokenRegistry::polygon(),
		fees(),
		"https://polygonscan.com",
		bus.clone(),
	);
	(engine, chain, bus)
}
