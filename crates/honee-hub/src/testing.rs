//! In-memory doubles of the hub-side services.

use crate::{
	ExplorerInterface, HubError, HubInterface, RelayRewardTxs, SmartWalletInterface,
	SmartWalletTx, SwapProxyInterface, SwapQuote, SwapToHubParams,
};
use async_trait::async_trait;
use honee_types::{HubTransfer, MinterTransaction, TransferStatus};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|p| p.into_inner())
}

/// Bridge status double answering scripted readings per hash.
#[derive(Default)]
pub struct FakeHub {
	transfers: Mutex<HashMap<String, VecDeque<HubTransfer>>>,
	calls: AtomicUsize,
}

impl FakeHub {
	pub fn new() -> Self {
		Self::default()
	}

	/// Scripts successive readings of `hash`; the last one repeats.
	pub fn script(&self, hash: &str, readings: Vec<HubTransfer>) {
		lock(&self.transfers).insert(hash.to_string(), readings.into());
	}

	/// Scripts a transfer going through `statuses` and ending with `out_tx_hash`.
	pub fn script_statuses(&self, hash: &str, statuses: &[TransferStatus], out_tx_hash: &str) {
		let readings = statuses
			.iter()
			.map(|status| HubTransfer {
				status: *status,
				out_tx_hash: status.is_terminal().then(|| out_tx_hash.to_string()),
			})
			.collect();
		self.script(hash, readings);
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl HubInterface for FakeHub {
	async fn get_transfer(&self, hash: &str) -> Result<HubTransfer, HubError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		let mut transfers = lock(&self.transfers);
		let reading = transfers.get_mut(hash).and_then(|queue| {
			if queue.len() > 1 {
				queue.pop_front()
			} else {
				queue.front().cloned()
			}
		});
		Ok(reading.unwrap_or(HubTransfer {
			status: TransferStatus::NotFound,
			out_tx_hash: None,
		}))
	}
}

/// Explorer double serving fixed transactions.
#[derive(Default)]
pub struct FakeExplorer {
	transactions: Mutex<HashMap<String, MinterTransaction>>,
	requested: Mutex<Vec<String>>,
}

impl FakeExplorer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, tx: MinterTransaction) {
		lock(&self.transactions).insert(tx.hash.clone(), tx);
	}

	pub fn requested(&self) -> Vec<String> {
		lock(&self.requested).clone()
	}
}

#[async_trait]
impl ExplorerInterface for FakeExplorer {
	async fn get_transaction(&self, hash: &str) -> Result<MinterTransaction, HubError> {
		lock(&self.requested).push(hash.to_string());
		lock(&self.transactions)
			.get(hash)
			.cloned()
			.ok_or_else(|| HubError::Network(format!("Explorer returned status 404 for {}", hash)))
	}
}

/// Swap proxy double returning one fixed quote.
pub struct FakeSwapProxy {
	quote: Mutex<Result<SwapQuote, HubError>>,
	requests: Mutex<Vec<(u64, SwapToHubParams)>>,
}

impl FakeSwapProxy {
	pub fn new(quote: SwapQuote) -> Self {
		Self {
			quote: Mutex::new(Ok(quote)),
			requests: Mutex::new(Vec::new()),
		}
	}

	pub fn fail_with(&self, error: HubError) {
		*lock(&self.quote) = Err(error);
	}

	pub fn requests(&self) -> Vec<(u64, SwapToHubParams)> {
		lock(&self.requests).clone()
	}
}

#[async_trait]
impl SwapProxyInterface for FakeSwapProxy {
	async fn build_tx_for_swap(
		&self,
		chain_id: u64,
		params: &SwapToHubParams,
	) -> Result<SwapQuote, HubError> {
		lock(&self.requests).push((chain_id, params.clone()));
		lock(&self.quote).clone()
	}
}

/// Smart-wallet relay double recording batched calls.
pub struct FakeSmartWallet {
	reward: Mutex<Result<RelayRewardTxs, HubError>>,
	calls: Mutex<Vec<Vec<SmartWalletTx>>>,
}

impl FakeSmartWallet {
	pub fn new(reward: RelayRewardTxs) -> Self {
		Self {
			reward: Mutex::new(Ok(reward)),
			calls: Mutex::new(Vec::new()),
		}
	}

	pub fn fail_reward(&self, error: HubError) {
		*lock(&self.reward) = Err(error);
	}

	/// Every `call_smart_wallet` batch, in order.
	pub fn calls(&self) -> Vec<Vec<SmartWalletTx>> {
		lock(&self.calls).clone()
	}
}

#[async_trait]
impl SmartWalletInterface for FakeSmartWallet {
	async fn build_tx_for_relay_reward(&self) -> Result<RelayRewardTxs, HubError> {
		lock(&self.reward).clone()
	}

	async fn call_smart_wallet(&self, tx_list: Vec<SmartWalletTx>) -> Result<String, HubError> {
		let mut calls = lock(&self.calls);
		calls.push(tx_list);
		Ok(format!("0x{:064x}", calls.len()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tokio::time::{Duration, Instant};

	#[tokio::test(start_paused = true)]
	async fn test_subscribe_transfer_polls_until_terminal() {
		let hub = FakeHub::new();
		hub.script_statuses(
			"0xabc",
			&[
				TransferStatus::NotFound,
				TransferStatus::DepositReceived,
				TransferStatus::BatchCreated,
				TransferStatus::BatchExecuted,
			],
			"Mt01",
		);

		let start = Instant::now();
		let transfer = hub
			.subscribe_transfer("0xabc", Duration::from_secs(5))
			.await
			.unwrap();

		assert_eq!(transfer.status, TransferStatus::BatchExecuted);
		assert_eq!(transfer.out_tx_hash.as_deref(), Some("Mt01"));
		assert_eq!(hub.calls(), 4);
		assert_eq!(start.elapsed(), Duration::from_secs(15));
	}

	#[tokio::test(start_paused = true)]
	async fn test_subscribe_transfer_stops_on_refund() {
		let hub = FakeHub::new();
		hub.script_statuses(
			"0xabc",
			&[TransferStatus::DepositReceived, TransferStatus::Refunded],
			"",
		);

		let transfer = hub
			.subscribe_transfer("0xabc", Duration::from_secs(5))
			.await
			.unwrap();
		assert_eq!(transfer.status, TransferStatus::Refunded);
		assert_eq!(hub.calls(), 2);
	}
}
