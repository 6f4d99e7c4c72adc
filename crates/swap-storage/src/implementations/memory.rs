//! In-memory storage backend.
//!
//! Entries carry an optional deadline. Expired entries are invisible to reads
//! immediately and are physically dropped by `cleanup_expired`.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct Entry {
	value: Vec<u8>,
	expires_at: Option<Instant>,
}

impl Entry {
	fn is_live(&self, now: Instant) -> bool {
		self.expires_at.is_none_or(|deadline| now < deadline)
	}
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
	store: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let store = self.store.read().await;
		store
			.get(key)
			.filter(|entry| entry.is_live(Instant::now()))
			.map(|entry| entry.value.clone())
			.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let expires_at = ttl.map(|ttl| Instant::now() + ttl);
		let mut store = self.store.write().await;
		store.insert(key.to_string(), Entry { value, expires_at });
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		store.remove(key);
		Ok(())
	}

	async fn take_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let mut store = self.store.write().await;
		store
			.remove(key)
			.filter(|entry| entry.is_live(Instant::now()))
			.map(|entry| entry.value)
			.ok_or(StorageError::NotFound)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		let now = Instant::now();
		let mut store = self.store.write().await;
		let before = store.len();
		store.retain(|_, entry| entry.is_live(now));
		let removed = before - store.len();
		if removed > 0 {
			tracing::debug!(removed, "Dropped expired storage entries");
		}
		Ok(removed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_basic_operations() {
		let storage = MemoryStorage::new();
		let value = b"test_value".to_vec();
		storage.set_bytes("key", value.clone(), None).await.unwrap();

		assert_eq!(storage.get_bytes("key").await.unwrap(), value);

		storage.delete("key").await.unwrap();
		assert!(matches!(
			storage.get_bytes("key").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_entries_expire() {
		let storage = MemoryStorage::new();
		storage
			.set_bytes("nonce", b"abc".to_vec(), Some(Duration::from_secs(300)))
			.await
			.unwrap();
		storage.set_bytes("session", b"def".to_vec(), None).await.unwrap();

		tokio::time::advance(Duration::from_secs(299)).await;
		assert_eq!(storage.get_bytes("nonce").await.unwrap(), b"abc");

		tokio::time::advance(Duration::from_secs(2)).await;
		assert!(matches!(
			storage.get_bytes("nonce").await,
			Err(StorageError::NotFound)
		));
		assert!(matches!(
			storage.take_bytes("nonce").await,
			Err(StorageError::NotFound)
		));
		assert_eq!(storage.cleanup_expired().await.unwrap(), 0);
		assert_eq!(storage.get_bytes("session").await.unwrap(), b"def");
	}

	#[tokio::test(start_paused = true)]
	async fn test_cleanup_counts_removed_entries() {
		let storage = MemoryStorage::new();
		for key in ["a", "b"] {
			storage
				.set_bytes(key, vec![1], Some(Duration::from_secs(1)))
				.await
				.unwrap();
		}
		tokio::time::advance(Duration::from_secs(5)).await;
		assert_eq!(storage.cleanup_expired().await.unwrap(), 2);
	}
}
