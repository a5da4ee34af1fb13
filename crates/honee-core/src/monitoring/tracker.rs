//! Polling confirmation tracker.
//!
//! A subscription walks `PendingInBlock -> Mined -> [Confirming] -> Confirmed`.
//! It ends in `Failed` when the receipt reports a revert and in
//! `Unsubscribed` when the caller cancels. Cancellation is checked after
//! every RPC answer and interrupts a sleeping wait immediately; requests
//! already on the wire are left to complete.

use honee_chain::{ChainError, ChainHandle, ChainRegistry};
use honee_types::{truncate_id, ChainTransaction, TransactionReceipt, B256};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::instrument;

/// Confirmations required when the caller does not say otherwise.
pub const DEFAULT_CONFIRMATION_COUNT: u64 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackerError {
	#[error("Unsubscribed")]
	Unsubscribed,
	#[error("Transaction failed: {0}")]
	TransactionFailed(B256),
	#[error("Transaction {0} is already tracked on chain {1}")]
	AlreadyTracked(B256, u64),
	#[error("Chain error: {0}")]
	Chain(#[from] ChainError),
	#[error("Internal error: {0}")]
	Internal(String),
}

/// What to wait for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackOptions {
	pub confirmation_count: u64,
	/// Fetch the receipt and fail on a reverted status.
	pub need_receipt: bool,
	/// Count confirmations against the chain head; otherwise one is assumed.
	pub need_exact_confirmation_count: bool,
	/// Take the timestamp from the block instead of the wall clock.
	pub need_exact_timestamp: bool,
	pub poll_interval: Duration,
}

impl TrackOptions {
	/// Exact counting follows the requested count, so a single confirmation
	/// is accepted once mined without reading the chain head.
	pub fn with_confirmations(confirmation_count: u64) -> Self {
		Self {
			confirmation_count,
			need_receipt: true,
			need_exact_confirmation_count: confirmation_count > 1,
			need_exact_timestamp: true,
			poll_interval: Duration::from_secs(10),
		}
	}

	pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
		self.poll_interval = poll_interval;
		self
	}
}

impl Default for TrackOptions {
	fn default() -> Self {
		Self::with_confirmations(DEFAULT_CONFIRMATION_COUNT)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
	PendingInBlock,
	Mined,
	Confirming,
	Confirmed,
	Failed,
	Unsubscribed,
}

impl TrackerState {
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			TrackerState::Confirmed | TrackerState::Failed | TrackerState::Unsubscribed
		)
	}
}

/// Transaction merged with its receipt and confirmation data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedTransaction {
	pub transaction: ChainTransaction,
	pub receipt: Option<TransactionReceipt>,
	pub confirmations: u64,
	/// Milliseconds since the epoch.
	pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionEvent {
	/// The node returned the transaction, mined or not.
	Seen(ChainTransaction),
	/// Confirmation count changed.
	Confirmation(TrackedTransaction),
	/// Threshold reached; no event follows.
	Confirmed(TrackedTransaction),
}

/// Event side of a running watch.
///
/// Dropping it keeps the watch running without a way to cancel it.
pub struct TransactionSubscription {
	hash: B256,
	chain_id: u64,
	events: mpsc::UnboundedReceiver<TransactionEvent>,
	state: watch::Receiver<TrackerState>,
	cancel: watch::Sender<bool>,
}

impl TransactionSubscription {
	pub fn hash(&self) -> B256 {
		self.hash
	}

	pub fn chain_id(&self) -> u64 {
		self.chain_id
	}

	pub fn state(&self) -> TrackerState {
		*self.state.borrow()
	}

	/// Next event, or `None` once the watch has settled and every event was read.
	pub async fn next_event(&mut self) -> Option<TransactionEvent> {
		self.events.recv().await
	}

	/// Stops the watch; the pending result rejects with `Unsubscribed`.
	pub fn unsubscribe(&self) {
		self.cancel.send_replace(true);
	}
}

/// Result side of a running watch.
pub struct PendingConfirmation {
	handle: JoinHandle<Result<TrackedTransaction, TrackerError>>,
}

impl PendingConfirmation {
	pub async fn wait(self) -> Result<TrackedTransaction, TrackerError> {
		self.handle
			.await
			.map_err(|e| TrackerError::Internal(format!("Tracker task failed: {}", e)))?
	}
}

/// Spawns confirmation watches.
pub struct TransactionTracker {
	registry: Arc<ChainRegistry>,
	active: Arc<Mutex<HashSet<(u64, B256)>>>,
}

impl TransactionTracker {
	pub fn new(registry: Arc<ChainRegistry>) -> Self {
		Self {
			registry,
			active: Arc::new(Mutex::new(HashSet::new())),
		}
	}

	/// Starts watching `hash`; absent chain id selects the default chain.
	///
	/// Must be called from within a tokio runtime.
	pub fn subscribe(
		&self,
		hash: B256,
		chain_id: Option<u64>,
		options: TrackOptions,
	) -> Result<(TransactionSubscription, PendingConfirmation), TrackerError> {
		let chain = self.registry.resolve(chain_id)?;
		let key = (chain.chain_id, hash);

		{
			let mut active = self.active.lock().unwrap_or_else(|p| p.into_inner());
			if !active.insert(key) {
				return Err(TrackerError::AlreadyTracked(hash, chain.chain_id));
			}
		}
		let slot = ActiveSlot {
			active: Arc::clone(&self.active),
			key,
		};

		let (events_tx, events_rx) = mpsc::unbounded_channel();
		let (state_tx, state_rx) = watch::channel(TrackerState::PendingInBlock);
		let (cancel_tx, cancel_rx) = watch::channel(false);

		let watch = Watch {
			hash,
			chain: Arc::clone(&chain),
			registry: Arc::clone(&self.registry),
			options,
			events: events_tx,
			state: state_tx,
			cancel: cancel_rx,
		};

		let handle = tokio::spawn(async move {
			let _slot = slot;
			watch.run().await
		});

		Ok((
			TransactionSubscription {
				hash,
				chain_id: chain.chain_id,
				events: events_rx,
				state: state_rx,
				cancel: cancel_tx,
			},
			PendingConfirmation { handle },
		))
	}

	/// Whether `hash` is being watched on `chain_id`.
	pub fn is_tracked(&self, chain_id: u64, hash: B256) -> bool {
		self.active
			.lock()
			.unwrap_or_else(|p| p.into_inner())
			.contains(&(chain_id, hash))
	}
}

/// Releases the `(chain, hash)` slot when the watch ends.
struct ActiveSlot {
	active: Arc<Mutex<HashSet<(u64, B256)>>>,
	key: (u64, B256),
}

impl Drop for ActiveSlot {
	fn drop(&mut self) {
		self.active
			.lock()
			.unwrap_or_else(|p| p.into_inner())
			.remove(&self.key);
	}
}

struct Watch {
	hash: B256,
	chain: Arc<ChainHandle>,
	registry: Arc<ChainRegistry>,
	options: TrackOptions,
	events: mpsc::UnboundedSender<TransactionEvent>,
	state: watch::Sender<TrackerState>,
	cancel: watch::Receiver<bool>,
}

impl Watch {
	#[instrument(skip_all, fields(chain_id = self.chain.chain_id, tx_hash = %truncate_id(&self.hash.to_string())))]
	async fn run(mut self) -> Result<TrackedTransaction, TrackerError> {
		let result = self.track().await;
		let final_state = match &result {
			Ok(_) => TrackerState::Confirmed,
			Err(TrackerError::Unsubscribed) => TrackerState::Unsubscribed,
			Err(_) => TrackerState::Failed,
		};
		self.state.send_replace(final_state);

		match &result {
			Ok(tx) => tracing::info!(confirmations = tx.confirmations, "Transaction confirmed"),
			Err(TrackerError::Unsubscribed) => tracing::debug!("Stopped tracking transaction"),
			Err(e) => tracing::warn!(error = %e, "Transaction tracking failed"),
		}
		result
	}

	async fn track(&mut self) -> Result<TrackedTransaction, TrackerError> {
		let transaction = self.wait_in_block().await?;
		self.state.send_replace(TrackerState::Mined);

		let block_number = transaction.block_number.ok_or_else(|| {
			TrackerError::Chain(ChainError::InvalidResponse(
				"Mined transaction without block number".to_string(),
			))
		})?;

		let rpc = self.chain.rpc();
		let (receipt, block, confirmations) = tokio::try_join!(
			async {
				if self.options.need_receipt {
					rpc.get_transaction_receipt(self.hash)
						.await
						.map_err(TrackerError::from)
				} else {
					Ok(None)
				}
			},
			async {
				if self.options.need_exact_timestamp {
					rpc.get_block(block_number).await.map_err(TrackerError::from)
				} else {
					Ok(None)
				}
			},
			async {
				if self.options.need_exact_confirmation_count {
					self.confirmations(block_number).await
				} else {
					Ok(1)
				}
			},
		)?;
		self.ensure_subscribed()?;

		let timestamp = match block {
			Some(block) => block.timestamp.saturating_mul(1000),
			None => wall_clock_ms(),
		};
		let mut tracked = TrackedTransaction {
			transaction,
			receipt,
			confirmations,
			timestamp,
		};
		self.emit(TransactionEvent::Confirmation(tracked.clone()));

		if self.options.need_receipt {
			let succeeded = tracked
				.receipt
				.as_ref()
				.map(|receipt| receipt.status)
				.unwrap_or(false);
			if !succeeded {
				return Err(TrackerError::TransactionFailed(self.hash));
			}
		}

		if tracked.confirmations < self.options.confirmation_count
			&& self.options.need_exact_confirmation_count
		{
			self.state.send_replace(TrackerState::Confirming);
			while tracked.confirmations < self.options.confirmation_count {
				self.sleep(self.options.poll_interval).await?;
				let confirmations = self.confirmations(block_number).await?;
				self.ensure_subscribed()?;
				tracked.confirmations = confirmations;
				tracing::debug!(confirmations, "Waiting for confirmations");
				self.emit(TransactionEvent::Confirmation(tracked.clone()));
			}
		}

		self.emit(TransactionEvent::Confirmed(tracked.clone()));
		Ok(tracked)
	}

	async fn wait_in_block(&mut self) -> Result<ChainTransaction, TrackerError> {
		let rpc = self.chain.rpc();
		loop {
			let fetched = rpc.get_transaction(self.hash).await?;
			self.ensure_subscribed()?;

			if let Some(transaction) = fetched {
				self.emit(TransactionEvent::Seen(transaction.clone()));
				if transaction.is_mined() {
					return Ok(transaction);
				}
			}
			self.sleep(self.options.poll_interval).await?;
		}
	}

	async fn confirmations(&self, block_number: u64) -> Result<u64, TrackerError> {
		let current = self.registry.get_block_number(&self.chain).await?;
		Ok(current.saturating_sub(block_number) + 1)
	}

	/// Sleeps for `duration` unless the subscriber cancels first.
	async fn sleep(&mut self, duration: Duration) -> Result<(), TrackerError> {
		let sleep = tokio::time::sleep(duration);
		tokio::pin!(sleep);

		loop {
			tokio::select! {
				_ = &mut sleep => return self.ensure_subscribed(),
				changed = self.cancel.changed() => {
					if changed.is_err() {
						// No subscription handle left to cancel from.
						(&mut sleep).await;
						return Ok(());
					}
					self.ensure_subscribed()?;
				}
			}
		}
	}

	fn ensure_subscribed(&self) -> Result<(), TrackerError> {
		if *self.cancel.borrow() {
			Err(TrackerError::Unsubscribed)
		} else {
			Ok(())
		}
	}

	fn emit(&self, event: TransactionEvent) {
		if self.ensure_subscribed().is_ok() {
			self.events.send(event).ok();
		}
	}
}

fn wall_clock_ms() -> u64 {
	u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
