//! Sign-in-with-Ethereum session gate.
//!
//! A session id (carried in a cookie by the HTTP layer) moves through three
//! states: anonymous, holding an issued nonce, and authenticated. A nonce is
//! removed from storage the moment a verification attempt reads it, so each
//! nonce backs at most one attempt whether that attempt succeeds or not.

use alloy::primitives::Signature;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use swap_storage::{StorageError, StorageService};
use swap_types::{truncate_id, APIError, Address, SessionResponse, SiweError, SiweMessage};
use thiserror::Error;

const NONCE_NAMESPACE: &str = "siwe_nonce";
const SESSION_NAMESPACE: &str = "siwe_session";

#[derive(Debug, Error)]
pub enum AuthError {
	#[error("Not authenticated")]
	NotAuthenticated,
	#[error("No nonce was issued for this session")]
	NonceMissing,
	#[error("Nonce does not match the one issued")]
	NonceMismatch,
	#[error("Message domain '{actual}' does not match '{expected}'")]
	DomainMismatch { expected: String, actual: String },
	#[error("Message is outside its validity window")]
	MessageExpired,
	#[error("Invalid message: {0}")]
	InvalidMessage(#[from] SiweError),
	#[error("Invalid signature: {0}")]
	InvalidSignature(String),
	#[error("Signature was made by {recovered}, message names {expected}")]
	SignerMismatch { expected: Address, recovered: Address },
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

/// Rejected sign-ins are 422, a missing session is 401, storage faults
/// are a generic 500.
impl From<AuthError> for APIError {
	fn from(err: AuthError) -> Self {
		match err {
			AuthError::NotAuthenticated => APIError::not_authenticated(),
			AuthError::Storage(e) => {
				tracing::error!(error = %e, "Session storage failed");
				APIError::internal()
			},
			other => APIError::UnprocessableEntity {
				error_type: "SIGN_IN_REJECTED".to_string(),
				message: other.to_string(),
				details: None,
			},
		}
	}
}

/// What the server expects of sign-in messages and how long state lives.
#[derive(Debug, Clone)]
pub struct SessionSettings {
	pub domain: String,
	pub nonce_ttl: Duration,
	pub session_ttl: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
struct NonceRecord {
	nonce: String,
	issued_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
	address: Address,
	chain_id: u64,
	signed_in_at: DateTime<Utc>,
}

impl From<SessionRecord> for SessionResponse {
	fn from(record: SessionRecord) -> Self {
		SessionResponse {
			address: record.address,
			chain_id: record.chain_id,
		}
	}
}

pub struct SessionManager {
	storage: Arc<StorageService>,
	settings: SessionSettings,
}

impl SessionManager {
	pub fn new(storage: Arc<StorageService>, settings: SessionSettings) -> Self {
		Self { storage, settings }
	}

	/// Creates an opaque session id for a new client.
	pub fn new_session_id() -> String {
		uuid::Uuid::new_v4().to_string()
	}

	/// Issues a fresh nonce for `session_id`, replacing any earlier one.
	pub async fn issue_nonce(&self, session_id: &str) -> Result<String, AuthError> {
		let nonce = uuid::Uuid::new_v4().simple().to_string();
		let record = NonceRecord {
			nonce: nonce.clone(),
			issued_at: Utc::now(),
		};
		self.storage
			.store_with_ttl(NONCE_NAMESPACE, session_id, &record, Some(self.settings.nonce_ttl))
			.await?;
		tracing::debug!(session = %truncate_id(session_id), "Issued sign-in nonce");
		Ok(nonce)
	}

	/// Checks a signed sign-in message and authenticates the session.
	///
	/// The pending nonce is consumed before any check runs, so a failed
	/// attempt also requires a new nonce.
	pub async fn verify(
		&self,
		session_id: &str,
		message: &str,
		signature: &str,
	) -> Result<SessionResponse, AuthError> {
		let issued: NonceRecord = self
			.storage
			.take(NONCE_NAMESPACE, session_id)
			.await
			.map_err(|e| match e {
				StorageError::NotFound => AuthError::NonceMissing,
				other => AuthError::Storage(other),
			})?;

		let parsed: SiweMessage = message.parse()?;
		if parsed.nonce != issued.nonce {
			return Err(AuthError::NonceMismatch);
		}
		if parsed.domain != self.settings.domain {
			return Err(AuthError::DomainMismatch {
				expected: self.settings.domain.clone(),
				actual: parsed.domain,
			});
		}
		if !parsed.is_valid_at(Utc::now()) {
			return Err(AuthError::MessageExpired);
		}

		let signature = signature
			.parse::<Signature>()
			.map_err(|e| AuthError::InvalidSignature(e.to_string()))?;
		let recovered = signature
			.recover_address_from_msg(message.as_bytes())
			.map_err(|e| AuthError::InvalidSignature(e.to_string()))?;
		if recovered != parsed.address {
			return Err(AuthError::SignerMismatch {
				expected: parsed.address,
				recovered,
			});
		}

		let record = SessionRecord {
			address: parsed.address,
			chain_id: parsed.chain_id,
			signed_in_at: Utc::now(),
		};
		self.storage
			.store_with_ttl(
				SESSION_NAMESPACE,
				session_id,
				&record,
				Some(self.settings.session_ttl),
			)
			.await?;
		tracing::info!(
			address = %record.address,
			chain_id = record.chain_id,
			"Wallet signed in"
		);
		Ok(record.into())
	}

	/// Current session, `None` while anonymous.
	pub async fn session(&self, session_id: &str) -> Result<Option<SessionResponse>, AuthError> {
		let record: Option<SessionRecord> = self.storage.find(SESSION_NAMESPACE, session_id).await?;
		Ok(record.map(Into::into))
	}

	/// Drops the session and any pending nonce.
	pub async fn sign_out(&self, session_id: &str) -> Result<(), AuthError> {
		self.storage.remove(SESSION_NAMESPACE, session_id).await?;
		self.storage.remove(NONCE_NAMESPACE, session_id).await?;
		tracing::debug!(session = %truncate_id(session_id), "Signed out");
		Ok(())
	}

	/// Gate for authenticated routes. A missing cookie counts as anonymous.
	pub async fn require_authenticated(
		&self,
		session_id: Option<&str>,
	) -> Result<SessionResponse, AuthError> {
		let session_id = session_id.ok_or(AuthError::NotAuthenticated)?;
		self.session(session_id)
			.await?
			.ok_or(AuthError::NotAuthenticated)
	}

	pub async fn cleanup_expired(&self) -> Result<usize, AuthError> {
		Ok(self.storage.cleanup_expired().await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::signers::{local::PrivateKeySigner, SignerSync};
	use swap_storage::implementations::memory::MemoryStorage;

	const DOMAIN: &str = "localhost:3000";

	fn manager() -> SessionManager {
		SessionManager::new(
			Arc::new(StorageService::new(Box::new(MemoryStorage::new()))),
			SessionSettings {
				domain: DOMAIN.to_string(),
				nonce_ttl: Duration::from_secs(300),
				session_ttl: Duration::from_secs(86_400),
			},
		)
	}

	fn signed(signer: &PrivateKeySigner, nonce: &str, domain: &str) -> (String, String) {
		let message = SiweMessage::new(
			domain,
			signer.address(),
			Some("Sign in to swap.".to_string()),
			"http://localhost:3000",
			137,
			nonce,
		)
		.to_string();
		let signature = signer.sign_message_sync(message.as_bytes()).unwrap();
		(message, format!("0x{}", alloy::hex::encode(signature.as_bytes())))
	}

	#[tokio::test]
	async fn test_full_lifecycle() {
		let auth = manager();
		let signer = PrivateKeySigner::random();
		let sid = SessionManager::new_session_id();

		assert!(auth.session(&sid).await.unwrap().is_none());
		let nonce = auth.issue_nonce(&sid).await.unwrap();
		assert!(swap_types::siwe::is_valid_nonce(&nonce));

		let (message, signature) = signed(&signer, &nonce, DOMAIN);
		let session = auth.verify(&sid, &message, &signature).await.unwrap();
		assert_eq!(session.address, signer.address());
		assert_eq!(session.chain_id, 137);
		assert_eq!(
			auth.require_authenticated(Some(&sid)).await.unwrap().address,
			signer.address()
		);

		auth.sign_out(&sid).await.unwrap();
		assert!(matches!(
			auth.require_authenticated(Some(&sid)).await,
			Err(AuthError::NotAuthenticated)
		));
	}

	#[tokio::test]
	async fn test_nonce_is_single_use() {
		let auth = manager();
		let signer = PrivateKeySigner::random();
		let sid = SessionManager::new_session_id();
		let nonce = auth.issue_nonce(&sid).await.unwrap();
		let (message, signature) = signed(&signer, &nonce, DOMAIN);

		auth.verify(&sid, &message, &signature).await.unwrap();
		assert!(matches!(
			auth.verify(&sid, &message, &signature).await,
			Err(AuthError::NonceMissing)
		));
	}

	#[tokio::test]
	async fn test_nonce_bound_to_its_session() {
		let auth = manager();
		let signer = PrivateKeySigner::random();
		let nonce = auth.issue_nonce("session-a").await.unwrap();
		auth.issue_nonce("session-b").await.unwrap();
		let (message, signature) = signed(&signer, &nonce, DOMAIN);

		assert!(matches!(
			auth.verify("session-b", &message, &signature).await,
			Err(AuthError::NonceMismatch)
		));
		assert!(auth.session("session-b").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_stale_nonce_after_reissue() {
		let auth = manager();
		let signer = PrivateKeySigner::random();
		let old = auth.issue_nonce("sid").await.unwrap();
		auth.issue_nonce("sid").await.unwrap();
		let (message, signature) = signed(&signer, &old, DOMAIN);
		assert!(matches!(
			auth.verify("sid", &message, &signature).await,
			Err(AuthError::NonceMismatch)
		));
	}

	#[tokio::test]
	async fn test_rejects_foreign_domain_and_wrong_signer() {
		let auth = manager();
		let signer = PrivateKeySigner::random();

		let nonce = auth.issue_nonce("sid").await.unwrap();
		let (message, signature) = signed(&signer, &nonce, "evil.example");
		assert!(matches!(
			auth.verify("sid", &message, &signature).await,
			Err(AuthError::DomainMismatch { .. })
		));

		let nonce = auth.issue_nonce("sid").await.unwrap();
		let (message, _) = signed(&signer, &nonce, DOMAIN);
		let (_, other_signature) = signed(&PrivateKeySigner::random(), &nonce, DOMAIN);
		assert!(matches!(
			auth.verify("sid", &message, &other_signature).await,
			Err(AuthError::SignerMismatch { .. })
		));

		let nonce = auth.issue_nonce("sid").await.unwrap();
		let (message, _) = signed(&signer, &nonce, DOMAIN);
		assert!(matches!(
			auth.verify("sid", &message, "0x1234").await,
			Err(AuthError::InvalidSignature(_))
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_expired_nonce_is_missing() {
		let auth = manager();
		let signer = PrivateKeySigner::random();
		let nonce = auth.issue_nonce("sid").await.unwrap();
		tokio::time::advance(Duration::from_secs(301)).await;

		let (message, signature) = signed(&signer, &nonce, DOMAIN);
		assert!(matches!(
			auth.verify("sid", &message, &signature).await,
			Err(AuthError::NonceMissing)
		));
	}

	#[tokio::test]
	async fn test_missing_cookie_is_anonymous() {
		assert!(matches!(
			manager().require_authenticated(None).await,
			Err(AuthError::NotAuthenticated)
		));
	}

	#[test]
	fn test_api_error_status() {
		assert_eq!(APIError::from(AuthError::NotAuthenticated).status_code(), 401);
		assert_eq!(APIError::from(AuthError::NonceMismatch).status_code(), 422);
		assert_eq!(
			APIError::from(AuthError::Storage(StorageError::Backend("down".into()))).status_code(),
			500
		);
	}
}
