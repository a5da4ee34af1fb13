//! Event bus for wallet-wide notifications.
//!
//! A thin wrapper over a tokio broadcast channel. Publishing never blocks and
//! fails only when nobody is listening, which callers ignore.

use honee_types::WalletEvent;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<WalletEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
		self.sender.subscribe()
	}

	/// Returns the number of receivers the event reached.
	pub fn publish(
		&self,
		event: WalletEvent,
	) -> Result<usize, broadcast::error::SendError<WalletEvent>> {
		self.sender.send(event)
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1000)
	}
}
