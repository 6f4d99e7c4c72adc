//! Broadcast channel for pipeline events.

use swap_types::SwapEvent;
use tokio::sync::broadcast;

/// Fan-out of [`SwapEvent`]s to any number of subscribers.
///
/// Publishing with no subscriber is not an error worth handling; callers
/// typically discard the result with `.ok()`.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<SwapEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<SwapEvent> {
		self.sender.subscribe()
	}

	/// Returns the number of subscribers that received the event.
	pub fn publish(
		&self,
		event: SwapEvent,
	) -> Result<usize, broadcast::error::SendError<SwapEvent>> {
		self.sender.send(event)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use swap_types::WalletEvent;

	#[tokio::test]
	async fn test_subscribers_receive_published_events() {
		let bus = EventBus::new(8);
		assert!(bus.publish(SwapEvent::Wallet(WalletEvent::SignedOut)).is_err());

		let mut rx = bus.subscribe();
		bus.publish(SwapEvent::Wallet(WalletEvent::Disconnected)).unwrap();
		assert!(matches!(
			rx.recv().await.unwrap(),
			SwapEvent::Wallet(WalletEvent::Disconnected)
		));
	}
}
