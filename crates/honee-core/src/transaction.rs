//! Sends wallet transactions and waits for their confirmation.
//!
//! Nonces come from the shared sequencer, which is reset whenever a
//! submission or its confirmation fails so the next allocation starts from
//! the chain again. Lifecycle transitions are published on the event bus.

use crate::event_bus::EventBus;
use crate::monitoring::{TrackOptions, TrackedTransaction, TrackerError, TransactionTracker};
use honee_chain::{ChainHandle, NonceSequencer, TransactionSenderInterface};
use honee_types::{
	truncate_id, Address, Bytes, EvmTransactionRequest, SubmittedTransaction,
	TransactionLifecycleEvent, WalletEvent, U256,
};
use std::sync::Arc;
use tokio::time::Duration;

/// Transaction fields chosen by the caller; the nonce is assigned on send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
	pub to: Address,
	pub data: Bytes,
	pub value: U256,
	/// Gas price in wei.
	pub gas_price: u128,
	pub gas_limit: u64,
}

#[derive(Debug, Clone)]
pub struct ConfirmedTransaction {
	pub submitted: SubmittedTransaction,
	pub tracked: TrackedTransaction,
}

pub struct TransactionService {
	sender: Arc<dyn TransactionSenderInterface>,
	nonces: NonceSequencer,
	tracker: Arc<TransactionTracker>,
	event_bus: EventBus,
	confirmation_count: u64,
	poll_interval: Duration,
}

impl TransactionService {
	pub fn new(
		sender: Arc<dyn TransactionSenderInterface>,
		nonces: NonceSequencer,
		tracker: Arc<TransactionTracker>,
		event_bus: EventBus,
		confirmation_count: u64,
		poll_interval: Duration,
	) -> Self {
		Self {
			sender,
			nonces,
			tracker,
			event_bus,
			confirmation_count,
			poll_interval,
		}
	}

	/// Address every transaction is sent from.
	pub fn account(&self) -> Address {
		self.sender.address()
	}

	/// Signs, sends and tracks `draft` until it has enough confirmations.
	pub async fn send_and_confirm(
		&self,
		chain: &ChainHandle,
		draft: TransactionDraft,
	) -> Result<ConfirmedTransaction, TrackerError> {
		let account = self.sender.address();
		let nonce = self.nonces.next_nonce(chain, account).await?;

		let request = EvmTransactionRequest {
			chain_id: chain.chain_id,
			to: draft.to,
			data: draft.data,
			value: draft.value,
			nonce,
			gas_price: draft.gas_price,
			gas_limit: draft.gas_limit,
		};

		let submitted = match self.sender.send(request).await {
			Ok(submitted) => submitted,
			Err(e) => {
				tracing::warn!(chain_id = chain.chain_id, nonce, error = %e, "Failed to submit transaction");
				self.nonces.reset(chain.chain_id, account);
				return Err(e.into());
			},
		};

		let tx_hash = submitted.transaction_hash;
		self.publish(TransactionLifecycleEvent::Submitted {
			chain_id: chain.chain_id,
			tx_hash,
			nonce,
		});

		let options = TrackOptions::with_confirmations(self.confirmation_count)
			.poll_interval(self.poll_interval);
		let result = match self.tracker.subscribe(tx_hash, Some(chain.chain_id), options) {
			Ok((_subscription, pending)) => pending.wait().await,
			Err(e) => Err(e),
		};

		match result {
			Ok(tracked) => {
				tracing::info!(
					tx_hash = %truncate_id(&tx_hash.to_string()),
					confirmations = tracked.confirmations,
					"Transaction confirmed"
				);
				self.publish(TransactionLifecycleEvent::Confirmed {
					chain_id: chain.chain_id,
					tx_hash,
					confirmations: tracked.confirmations,
				});
				Ok(ConfirmedTransaction { submitted, tracked })
			},
			Err(e) => {
				self.nonces.reset(chain.chain_id, account);
				self.publish(TransactionLifecycleEvent::Failed {
					chain_id: chain.chain_id,
					tx_hash,
					reason: e.to_string(),
				});
				Err(e)
			},
		}
	}

	fn publish(&self, event: TransactionLifecycleEvent) {
		self.event_bus.publish(WalletEvent::Transaction(event)).ok();
	}
}
