//! Throttled current-block-number cache.
//!
//! One slot per RPC endpoint. Concurrent readers of an endpoint share the
//! in-flight request, and a resolved value is reused until it is older than
//! the configured TTL.

use crate::{ChainError, ChainRpcInterface};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::{Duration, Instant};

type SharedBlockNumber = Shared<BoxFuture<'static, Result<u64, ChainError>>>;

#[derive(Default)]
struct Slot {
	is_loading: bool,
	fetched_at: Option<Instant>,
	/// Identifies the request that owns `pending`, so a settled stale request
	/// never clears the state of a newer one.
	request_id: u64,
	pending: Option<SharedBlockNumber>,
}

type Slots = Arc<Mutex<HashMap<String, Slot>>>;

/// Read-through block number cache shared by every component of the process.
pub struct BlockNumberCache {
	ttl: Duration,
	slots: Slots,
	next_request_id: AtomicU64,
}

impl BlockNumberCache {
	pub fn new(ttl: Duration) -> Self {
		Self {
			ttl,
			slots: Arc::new(Mutex::new(HashMap::new())),
			next_request_id: AtomicU64::new(1),
		}
	}

	/// Returns the current block number of `endpoint`.
	///
	/// Errors propagate to every caller sharing the request; the slot is left
	/// idle and stale so the next call retries.
	pub async fn get_block_number(
		&self,
		endpoint: &str,
		rpc: Arc<dyn ChainRpcInterface>,
	) -> Result<u64, ChainError> {
		let pending = {
			let mut slots = lock(&self.slots);
			let slot = slots.entry(endpoint.to_string()).or_default();
			let fresh = slot
				.fetched_at
				.is_some_and(|fetched_at| fetched_at.elapsed() < self.ttl);

			match &slot.pending {
				Some(pending) if slot.is_loading || fresh => pending.clone(),
				_ => {
					let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
					let pending = fetch(self.slots.clone(), endpoint.to_string(), request_id, rpc)
						.boxed()
						.shared();
					slot.is_loading = true;
					slot.request_id = request_id;
					slot.pending = Some(pending.clone());
					pending
				},
			}
		};

		pending.await
	}
}

async fn fetch(
	slots: Slots,
	endpoint: String,
	request_id: u64,
	rpc: Arc<dyn ChainRpcInterface>,
) -> Result<u64, ChainError> {
	let result = rpc.get_block_number().await;

	{
		let mut slots = lock(&slots);
		if let Some(slot) = slots.get_mut(&endpoint) {
			if slot.request_id == request_id {
				slot.is_loading = false;
				match &result {
					Ok(_) => slot.fetched_at = Some(Instant::now()),
					Err(e) => {
						tracing::debug!(endpoint = %endpoint, error = %e, "Block number request failed");
						slot.fetched_at = None;
						slot.pending = None;
					},
				}
			}
		}
	}

	result
}

fn lock(slots: &Slots) -> MutexGuard<'_, HashMap<String, Slot>> {
	slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::FakeChainRpc;

	#[tokio::test(start_paused = true)]
	async fn test_concurrent_reads_share_one_request() {
		let rpc = Arc::new(FakeChainRpc::new());
		rpc.set_block_number(100);
		rpc.set_block_number_delay(Duration::from_millis(200));
		let cache = BlockNumberCache::new(Duration::from_millis(5000));

		let (a, b) = tokio::join!(
			cache.get_block_number("http://node-a", rpc.clone()),
			cache.get_block_number("http://node-a", rpc.clone()),
		);

		assert_eq!(a.unwrap(), 100);
		assert_eq!(b.unwrap(), 100);
		assert_eq!(rpc.block_number_calls(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_fresh_value_reused_until_ttl() {
		let rpc = Arc::new(FakeChainRpc::new());
		rpc.set_block_number(100);
		let cache = BlockNumberCache::new(Duration::from_millis(5000));

		assert_eq!(cache.get_block_number("http://node-a", rpc.clone()).await.unwrap(), 100);
		rpc.set_block_number(101);

		tokio::time::advance(Duration::from_millis(4000)).await;
		assert_eq!(cache.get_block_number("http://node-a", rpc.clone()).await.unwrap(), 100);
		assert_eq!(rpc.block_number_calls(), 1);

		tokio::time::advance(Duration::from_millis(1500)).await;
		assert_eq!(cache.get_block_number("http://node-a", rpc.clone()).await.unwrap(), 101);
		assert_eq!(rpc.block_number_calls(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_endpoints_cached_separately() {
		let rpc = Arc::new(FakeChainRpc::new());
		rpc.set_block_number(7);
		let cache = BlockNumberCache::new(Duration::from_millis(5000));

		cache.get_block_number("http://node-a", rpc.clone()).await.unwrap();
		cache.get_block_number("http://node-b", rpc.clone()).await.unwrap();

		assert_eq!(rpc.block_number_calls(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_failure_propagates_and_next_call_retries() {
		let rpc = Arc::new(FakeChainRpc::new());
		rpc.fail_block_number(true);
		let cache = BlockNumberCache::new(Duration::from_millis(5000));

		let result = cache.get_block_number("http://node-a", rpc.clone()).await;
		assert!(matches!(result, Err(ChainError::Network(_))));

		rpc.fail_block_number(false);
		rpc.set_block_number(42);
		assert_eq!(cache.get_block_number("http://node-a", rpc.clone()).await.unwrap(), 42);
		assert_eq!(rpc.block_number_calls(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_stale_settlement_keeps_newer_request() {
		let rpc = Arc::new(FakeChainRpc::new());
		rpc.fail_block_number(true);
		let cache = BlockNumberCache::new(Duration::from_millis(5000));
		let endpoint = "http://node-a";

		// request 1 is still running when request 2 takes over the slot
		let stale = fetch(cache.slots.clone(), endpoint.to_string(), 1, rpc.clone());
		let newer: SharedBlockNumber = futures::future::ready(Ok::<u64, ChainError>(9))
			.boxed()
			.shared();
		{
			let mut slots = lock(&cache.slots);
			let slot = slots.entry(endpoint.to_string()).or_default();
			slot.is_loading = true;
			slot.request_id = 2;
			slot.pending = Some(newer);
		}

		assert!(matches!(stale.await, Err(ChainError::Network(_))));
		{
			let slots = lock(&cache.slots);
			let slot = &slots[endpoint];
			assert!(slot.is_loading);
			assert_eq!(slot.request_id, 2);
			assert!(slot.pending.is_some());
		}

		assert_eq!(cache.get_block_number(endpoint, rpc.clone()).await.unwrap(), 9);
		assert_eq!(rpc.block_number_calls(), 1);
	}
}
