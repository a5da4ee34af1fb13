//! Nonce sequencing per account and chain.
//!
//! Every transaction the wallet sends takes its nonce from here, so dependent
//! transactions can be pipelined without asking the node in between.

use crate::{ChainError, ChainHandle};
use dashmap::DashMap;
use honee_types::Address;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Sentinel for an account whose nonce has not been fetched yet.
const UNSET: u64 = u64::MAX;

/// Single sequencing authority for `(chain id, address)` nonces.
///
/// Each allocation re-reads the on-chain transaction count and takes the max
/// with the locally tracked next nonce, which absorbs transactions sent from
/// the same account by other clients.
#[derive(Clone, Debug, Default)]
pub struct NonceSequencer {
	#[allow(clippy::type_complexity)]
	nonces: Arc<DashMap<(u64, Address), Arc<Mutex<u64>>>>,
}

impl NonceSequencer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Allocates the next nonce for `address` on `chain`.
	pub async fn next_nonce(&self, chain: &ChainHandle, address: Address) -> Result<u64, ChainError> {
		// Clone the `Arc` so the dashmap shard is not locked across the await below.
		let slot = {
			let entry = self
				.nonces
				.entry((chain.chain_id, address))
				.or_insert_with(|| Arc::new(Mutex::new(UNSET)));
			Arc::clone(entry.value())
		};

		let mut last = slot.lock().await;
		let on_chain = chain.rpc().get_transaction_count(address).await?;
		let next = if *last == UNSET {
			on_chain
		} else {
			on_chain.max(*last + 1)
		};
		*last = next;

		tracing::debug!(chain_id = chain.chain_id, %address, nonce = next, "Allocated nonce");
		Ok(next)
	}

	/// Forgets the tracked nonce so the next allocation starts from the chain.
	///
	/// Called after a failed submission, whose nonce was never consumed.
	pub fn reset(&self, chain_id: u64, address: Address) {
		self.nonces.remove(&(chain_id, address));
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::FakeChainRpc;
	use honee_types::HubNetwork;

	fn chain(rpc: Arc<FakeChainRpc>) -> ChainHandle {
		ChainHandle::new(
			1,
			"Ethereum",
			"http://localhost:8545",
			HubNetwork::Ethereum,
			Address::repeat_byte(0x11),
			Address::repeat_byte(0x22),
			rpc,
		)
	}

	#[tokio::test]
	async fn test_sequential_allocations() {
		let rpc = Arc::new(FakeChainRpc::new());
		let account = Address::repeat_byte(0xaa);
		rpc.set_transaction_count(account, 7);
		let chain = chain(rpc.clone());
		let sequencer = NonceSequencer::new();

		assert_eq!(sequencer.next_nonce(&chain, account).await.unwrap(), 7);
		assert_eq!(sequencer.next_nonce(&chain, account).await.unwrap(), 8);
		assert_eq!(sequencer.next_nonce(&chain, account).await.unwrap(), 9);
	}

	#[tokio::test]
	async fn test_external_transactions_move_sequence_forward() {
		let rpc = Arc::new(FakeChainRpc::new());
		let account = Address::repeat_byte(0xaa);
		rpc.set_transaction_count(account, 3);
		let chain = chain(rpc.clone());
		let sequencer = NonceSequencer::new();

		assert_eq!(sequencer.next_nonce(&chain, account).await.unwrap(), 3);
		rpc.set_transaction_count(account, 10);
		assert_eq!(sequencer.next_nonce(&chain, account).await.unwrap(), 10);
	}

	#[tokio::test]
	async fn test_reset_restarts_from_chain() {
		let rpc = Arc::new(FakeChainRpc::new());
		let account = Address::repeat_byte(0xaa);
		rpc.set_transaction_count(account, 5);
		let chain = chain(rpc.clone());
		let sequencer = NonceSequencer::new();

		assert_eq!(sequencer.next_nonce(&chain, account).await.unwrap(), 5);
		sequencer.reset(1, account);
		assert_eq!(sequencer.next_nonce(&chain, account).await.unwrap(), 5);
	}

	#[tokio::test]
	async fn test_accounts_are_independent() {
		let rpc = Arc::new(FakeChainRpc::new());
		let first = Address::repeat_byte(0xaa);
		let second = Address::repeat_byte(0xbb);
		rpc.set_transaction_count(first, 2);
		rpc.set_transaction_count(second, 40);
		let chain = chain(rpc.clone());
		let sequencer = NonceSequencer::new();

		assert_eq!(sequencer.next_nonce(&chain, first).await.unwrap(), 2);
		assert_eq!(sequencer.next_nonce(&chain, second).await.unwrap(), 40);
		assert_eq!(sequencer.next_nonce(&chain, first).await.unwrap(), 3);
	}
}
