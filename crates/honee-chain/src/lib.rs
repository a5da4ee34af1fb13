//! EVM chain access for the Honee bridge core.
//!
//! This crate resolves chain ids to connection handles, caches the current
//! block number per endpoint, hands out explicit nonces per account, builds
//! call data for the hub bridge, wrapped-native and ERC20 contracts, and
//! provides the Alloy-backed RPC client and wallet sender.

use async_trait::async_trait;
use honee_types::{
	Address, BlockInfo, Bytes, ChainTransaction, EvmTransactionRequest, SubmittedTransaction,
	TransactionReceipt, B256, U256,
};
use thiserror::Error;

pub mod block_cache;
pub mod contracts;
pub mod nonce;
pub mod registry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// RPC client and wallet sender backed by Alloy.
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

pub use block_cache::BlockNumberCache;
pub use nonce::NonceSequencer;
pub use registry::{evm_network_name, ChainHandle, ChainRegistry};

/// Errors that can occur while talking to a chain.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
	/// A caller passed a malformed chain id or similar argument.
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	/// The chain id matches no configured chain.
	#[error("Unsupported chain: {0}")]
	UnsupportedChain(u64),
	/// Transport or node failure.
	#[error("Network error: {0}")]
	Network(String),
	/// The node answered with data that could not be decoded.
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
}

/// Read access to one EVM chain.
#[async_trait]
pub trait ChainRpcInterface: Send + Sync {
	/// Fetches a transaction by hash; `None` if the node does not know it yet.
	async fn get_transaction(&self, hash: B256) -> Result<Option<ChainTransaction>, ChainError>;

	async fn get_transaction_receipt(
		&self,
		hash: B256,
	) -> Result<Option<TransactionReceipt>, ChainError>;

	async fn get_block(&self, number: u64) -> Result<Option<BlockInfo>, ChainError>;

	/// Number of transactions mined from `address`, i.e. its next nonce.
	async fn get_transaction_count(&self, address: Address) -> Result<u64, ChainError>;

	async fn get_block_number(&self) -> Result<u64, ChainError>;

	async fn get_balance(&self, address: Address) -> Result<U256, ChainError>;

	/// Executes a read-only contract call.
	async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError>;
}

/// Signs and broadcasts fully specified transactions.
#[async_trait]
pub trait TransactionSenderInterface: Send + Sync {
	/// Address the sender signs for.
	fn address(&self) -> Address;

	async fn send(
		&self,
		request: EvmTransactionRequest,
	) -> Result<SubmittedTransaction, ChainError>;
}
