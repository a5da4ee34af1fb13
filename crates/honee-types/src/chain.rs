//! EVM chain record types.
//!
//! These types are the chain-agnostic view of what an EVM node returns for a
//! transaction, its receipt and its block, plus the request shape handed to
//! the wallet sending collaborator.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// A transaction as fetched by hash from an EVM node.
///
/// `block_hash` stays `None` while the transaction waits in the mempool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTransaction {
	pub hash: B256,
	pub from: Address,
	pub to: Option<Address>,
	pub value: U256,
	pub input: Bytes,
	pub nonce: u64,
	pub block_hash: Option<B256>,
	pub block_number: Option<u64>,
}

impl ChainTransaction {
	/// Returns true once the transaction has been included in a block.
	pub fn is_mined(&self) -> bool {
		self.block_hash.is_some()
	}
}

/// Transaction receipt containing execution details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
	/// The hash of the transaction.
	pub transaction_hash: B256,
	/// The block number where the transaction was included.
	pub block_number: Option<u64>,
	/// Whether the transaction executed successfully.
	pub status: bool,
	pub gas_used: u64,
}

/// Block header fields needed for timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
	pub number: u64,
	pub hash: B256,
	/// Unix timestamp in seconds.
	pub timestamp: u64,
}

/// A fully specified transaction ready to be signed and sent.
///
/// Nonce, gas price and gas limit are always explicit so dependent
/// transactions can be pipelined before their predecessors confirm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmTransactionRequest {
	pub chain_id: u64,
	pub to: Address,
	pub data: Bytes,
	pub value: U256,
	pub nonce: u64,
	/// Gas price in wei.
	pub gas_price: u128,
	pub gas_limit: u64,
}

/// Handle returned by the sending collaborator once a transaction is broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedTransaction {
	pub chain_id: u64,
	pub transaction_hash: B256,
	pub nonce: u64,
}
