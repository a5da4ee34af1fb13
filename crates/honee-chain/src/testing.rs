//! In-memory chain doubles for tests.
//!
//! `FakeChainRpc` answers from scripted state and counts calls;
//! `FakeSender` records requests and mines them into a linked `FakeChainRpc`.

use crate::{ChainError, ChainRpcInterface, TransactionSenderInterface};
use async_trait::async_trait;
use honee_types::{
	Address, BlockInfo, Bytes, ChainTransaction, EvmTransactionRequest, SubmittedTransaction,
	TransactionReceipt, B256, U256,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Duration;

#[derive(Default)]
struct State {
	transactions: HashMap<B256, VecDeque<Option<ChainTransaction>>>,
	receipts: HashMap<B256, TransactionReceipt>,
	blocks: HashMap<u64, BlockInfo>,
	block_numbers: VecDeque<u64>,
	transaction_counts: HashMap<Address, u64>,
	balances: HashMap<Address, U256>,
	call_results: HashMap<(Address, [u8; 4]), Result<Bytes, ChainError>>,
	block_number_delay: Duration,
	call_delay: Duration,
}

/// Scriptable chain RPC double.
#[derive(Default)]
pub struct FakeChainRpc {
	state: Mutex<State>,
	fail_block_number: AtomicBool,
	transaction_calls: AtomicUsize,
	receipt_calls: AtomicUsize,
	block_calls: AtomicUsize,
	block_number_calls: AtomicUsize,
	contract_calls: AtomicUsize,
}

impl FakeChainRpc {
	pub fn new() -> Self {
		Self::default()
	}

	fn state(&self) -> std::sync::MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(|p| p.into_inner())
	}

	/// Scripts successive `get_transaction` answers; the last one repeats.
	pub fn script_transaction(&self, hash: B256, answers: Vec<Option<ChainTransaction>>) {
		self.state().transactions.insert(hash, answers.into());
	}

	pub fn set_receipt(&self, receipt: TransactionReceipt) {
		self.state()
			.receipts
			.insert(receipt.transaction_hash, receipt);
	}

	pub fn set_block(&self, block: BlockInfo) {
		self.state().blocks.insert(block.number, block);
	}

	pub fn set_block_number(&self, number: u64) {
		self.state().block_numbers = VecDeque::from(vec![number]);
	}

	/// Scripts successive block numbers; the last one repeats.
	pub fn script_block_numbers(&self, numbers: Vec<u64>) {
		self.state().block_numbers = numbers.into();
	}

	pub fn set_block_number_delay(&self, delay: Duration) {
		self.state().block_number_delay = delay;
	}

	pub fn fail_block_number(&self, fail: bool) {
		self.fail_block_number.store(fail, Ordering::SeqCst);
	}

	pub fn set_transaction_count(&self, address: Address, count: u64) {
		self.state().transaction_counts.insert(address, count);
	}

	pub fn set_balance(&self, address: Address, balance: U256) {
		self.state().balances.insert(address, balance);
	}

	/// Sets the result of calls to `to` whose data starts with `selector`.
	pub fn set_call_result(
		&self,
		to: Address,
		selector: [u8; 4],
		result: Result<Bytes, ChainError>,
	) {
		self.state().call_results.insert((to, selector), result);
	}

	pub fn set_call_delay(&self, delay: Duration) {
		self.state().call_delay = delay;
	}

	/// Makes `tx` visible as mined in `block_number` with the given receipt status.
	pub fn insert_mined(&self, mut tx: ChainTransaction, block_number: u64, status: bool) {
		tx.block_number = Some(block_number);
		tx.block_hash = Some(B256::left_padding_from(&block_number.to_be_bytes()));
		let receipt = TransactionReceipt {
			transaction_hash: tx.hash,
			block_number: Some(block_number),
			status,
			gas_used: 21_000,
		};
		let mut state = self.state();
		state.receipts.insert(tx.hash, receipt);
		state.blocks.insert(
			block_number,
			BlockInfo {
				number: block_number,
				hash: B256::left_padding_from(&block_number.to_be_bytes()),
				timestamp: 1_700_000_000 + block_number,
			},
		);
		state
			.transactions
			.insert(tx.hash, VecDeque::from(vec![Some(tx)]));
	}

	pub fn transaction_calls(&self) -> usize {
		self.transaction_calls.load(Ordering::SeqCst)
	}

	pub fn receipt_calls(&self) -> usize {
		self.receipt_calls.load(Ordering::SeqCst)
	}

	pub fn block_calls(&self) -> usize {
		self.block_calls.load(Ordering::SeqCst)
	}

	pub fn block_number_calls(&self) -> usize {
		self.block_number_calls.load(Ordering::SeqCst)
	}

	pub fn contract_calls(&self) -> usize {
		self.contract_calls.load(Ordering::SeqCst)
	}
}

fn next_scripted<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
	if queue.len() > 1 {
		queue.pop_front()
	} else {
		queue.front().cloned()
	}
}

#[async_trait]
impl ChainRpcInterface for FakeChainRpc {
	async fn get_transaction(&self, hash: B256) -> Result<Option<ChainTransaction>, ChainError> {
		self.transaction_calls.fetch_add(1, Ordering::SeqCst);
		let mut state = self.state();
		Ok(state
			.transactions
			.get_mut(&hash)
			.and_then(next_scripted)
			.flatten())
	}

	async fn get_transaction_receipt(
		&self,
		hash: B256,
	) -> Result<Option<TransactionReceipt>, ChainError> {
		self.receipt_calls.fetch_add(1, Ordering::SeqCst);
		Ok(self.state().receipts.get(&hash).cloned())
	}

	async fn get_block(&self, number: u64) -> Result<Option<BlockInfo>, ChainError> {
		self.block_calls.fetch_add(1, Ordering::SeqCst);
		Ok(self.state().blocks.get(&number).cloned())
	}

	async fn get_transaction_count(&self, address: Address) -> Result<u64, ChainError> {
		Ok(self
			.state()
			.transaction_counts
			.get(&address)
			.copied()
			.unwrap_or(0))
	}

	async fn get_block_number(&self) -> Result<u64, ChainError> {
		self.block_number_calls.fetch_add(1, Ordering::SeqCst);
		let delay = self.state().block_number_delay;
		if !delay.is_zero() {
			tokio::time::sleep(delay).await;
		}
		if self.fail_block_number.load(Ordering::SeqCst) {
			return Err(ChainError::Network("connection refused".to_string()));
		}
		let mut state = self.state();
		Ok(next_scripted(&mut state.block_numbers).unwrap_or(0))
	}

	async fn get_balance(&self, address: Address) -> Result<U256, ChainError> {
		Ok(self
			.state()
			.balances
			.get(&address)
			.copied()
			.unwrap_or(U256::ZERO))
	}

	async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
		self.contract_calls.fetch_add(1, Ordering::SeqCst);
		let delay = self.state().call_delay;
		if !delay.is_zero() {
			tokio::time::sleep(delay).await;
		}
		let mut selector = [0u8; 4];
		if data.len() >= 4 {
			selector.copy_from_slice(&data[..4]);
		}
		self.state()
			.call_results
			.get(&(to, selector))
			.cloned()
			.unwrap_or_else(|| Err(ChainError::Network("execution reverted".to_string())))
	}
}

/// Sender double that mines every request into a linked `FakeChainRpc`.
pub struct FakeSender {
	address: Address,
	rpc: Arc<FakeChainRpc>,
	sent: Mutex<Vec<EvmTransactionRequest>>,
	next_block: AtomicU64,
	fail_sends: AtomicBool,
	revert_sends: AtomicBool,
}

impl FakeSender {
	pub fn new(address: Address, rpc: Arc<FakeChainRpc>) -> Self {
		Self {
			address,
			rpc,
			sent: Mutex::new(Vec::new()),
			next_block: AtomicU64::new(1000),
			fail_sends: AtomicBool::new(false),
			revert_sends: AtomicBool::new(false),
		}
	}

	/// Rejects every following send at broadcast time.
	pub fn fail_sends(&self, fail: bool) {
		self.fail_sends.store(fail, Ordering::SeqCst);
	}

	/// Mines every following send with a failed receipt.
	pub fn revert_sends(&self, revert: bool) {
		self.revert_sends.store(revert, Ordering::SeqCst);
	}

	pub fn sent(&self) -> Vec<EvmTransactionRequest> {
		self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
	}
}

#[async_trait]
impl TransactionSenderInterface for FakeSender {
	fn address(&self) -> Address {
		self.address
	}

	async fn send(
		&self,
		request: EvmTransactionRequest,
	) -> Result<SubmittedTransaction, ChainError> {
		if self.fail_sends.load(Ordering::SeqCst) {
			return Err(ChainError::Network("nonce too low".to_string()));
		}

		let block_number = self.next_block.fetch_add(1, Ordering::SeqCst);
		let mut hash_seed = [0u8; 16];
		hash_seed[..8].copy_from_slice(&request.chain_id.to_be_bytes());
		hash_seed[8..].copy_from_slice(&request.nonce.to_be_bytes());
		let hash = B256::left_padding_from(&hash_seed);

		let tx = ChainTransaction {
			hash,
			from: self.address,
			to: Some(request.to),
			value: request.value,
			input: request.data.clone(),
			nonce: request.nonce,
			block_hash: None,
			block_number: None,
		};
		self.rpc
			.insert_mined(tx, block_number, !self.revert_sends.load(Ordering::SeqCst));
		self.rpc.set_block_number(block_number + 100);
		self.rpc
			.set_transaction_count(self.address, request.nonce + 1);

		let nonce = request.nonce;
		let chain_id = request.chain_id;
		self.sent
			.lock()
			.unwrap_or_else(|p| p.into_inner())
			.push(request);

		Ok(SubmittedTransaction {
			chain_id,
			transaction_hash: hash,
			nonce,
		})
	}
}
