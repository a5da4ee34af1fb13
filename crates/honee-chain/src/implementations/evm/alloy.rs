//! Alloy-backed chain RPC and wallet sender.
//!
//! `AlloyChainRpc` reads one chain over HTTP. `AlloySender` signs with a local
//! private key and broadcasts on every configured chain, leaving nonce, gas
//! price and gas limit exactly as requested.

use crate::{ChainError, ChainRpcInterface, TransactionSenderInterface};
use alloy_consensus::Transaction as _;
use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_provider::{Provider, ProviderBuilder, RootProvider};
use alloy_rpc_types::{BlockNumberOrTag, BlockTransactionsKind, TransactionRequest};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport_http::Http;
use async_trait::async_trait;
use honee_config::ChainConfig;
use honee_types::{
	truncate_id, Address, BlockInfo, Bytes, ChainTransaction,
	EvmTransactionRequest, SecretString, SubmittedTransaction, TransactionReceipt, B256, U256,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Read-only RPC client for one chain.
pub struct AlloyChainRpc {
	provider: RootProvider<Http<reqwest::Client>>,
}

impl AlloyChainRpc {
	pub fn new(rpc_url: &str) -> Result<Self, ChainError> {
		let url = rpc_url
			.parse()
			.map_err(|e| ChainError::InvalidArgument(format!("Invalid RPC URL {}: {}", rpc_url, e)))?;
		Ok(Self {
			provider: RootProvider::new_http(url),
		})
	}
}

#[async_trait]
impl ChainRpcInterface for AlloyChainRpc {
	async fn get_transaction(&self, hash: B256) -> Result<Option<ChainTransaction>, ChainError> {
		let tx = self
			.provider
			.get_transaction_by_hash(hash)
			.await
			.map_err(|e| ChainError::Network(format!("Failed to get transaction: {}", e)))?;

		Ok(tx.map(|tx| ChainTransaction {
			hash,
			from: tx.from,
			to: tx.to(),
			value: tx.value(),
			input: tx.input().clone(),
			nonce: tx.nonce(),
			block_hash: tx.block_hash,
			block_number: tx.block_number,
		}))
	}

	async fn get_transaction_receipt(
		&self,
		hash: B256,
	) -> Result<Option<TransactionReceipt>, ChainError> {
		let receipt = self
			.provider
			.get_transaction_receipt(hash)
			.await
			.map_err(|e| ChainError::Network(format!("Failed to get receipt: {}", e)))?;

		Ok(receipt.map(|receipt| TransactionReceipt {
			transaction_hash: receipt.transaction_hash,
			block_number: receipt.block_number,
			status: receipt.status(),
			gas_used: u64::try_from(receipt.gas_used).unwrap_or(u64::MAX),
		}))
	}

	async fn get_block(&self, number: u64) -> Result<Option<BlockInfo>, ChainError> {
		let block = self
			.provider
			.get_block_by_number(BlockNumberOrTag::Number(number), BlockTransactionsKind::Hashes)
			.await
			.map_err(|e| ChainError::Network(format!("Failed to get block: {}", e)))?;

		Ok(block.map(|block| BlockInfo {
			number: block.header.number,
			hash: block.header.hash,
			timestamp: block.header.timestamp,
		}))
	}

	async fn get_transaction_count(&self, address: Address) -> Result<u64, ChainError> {
		self.provider
			.get_transaction_count(address)
			.await
			.map_err(|e| ChainError::Network(format!("Failed to get nonce: {}", e)))
	}

	async fn get_block_number(&self) -> Result<u64, ChainError> {
		self.provider
			.get_block_number()
			.await
			.map_err(|e| ChainError::Network(format!("Failed to get block number: {}", e)))
	}

	async fn get_balance(&self, address: Address) -> Result<U256, ChainError> {
		self.provider
			.get_balance(address)
			.await
			.map_err(|e| ChainError::Network(format!("Failed to get balance: {}", e)))
	}

	async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
		let request = TransactionRequest::default().to(to).input(data.into());
		self.provider
			.call(&request)
			.await
			.map_err(|e| ChainError::Network(format!("Failed to call {}: {}", to, e)))
	}
}

/// Wallet sender signing with a local private key.
pub struct AlloySender {
	address: Address,
	providers: HashMap<u64, Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>>,
}

impl AlloySender {
	/// Creates one signing provider per chain.
	pub fn new(
		signer: PrivateKeySigner,
		chains: &HashMap<u64, ChainConfig>,
	) -> Result<Self, ChainError> {
		if chains.is_empty() {
			return Err(ChainError::InvalidArgument(
				"At least one chain must be configured".to_string(),
			));
		}

		let address = signer.address();
		let mut providers = HashMap::new();

		for (chain_id, chain) in chains {
			let url = chain.rpc_url.parse().map_err(|e| {
				ChainError::InvalidArgument(format!("Invalid RPC URL for chain {}: {}", chain_id, e))
			})?;

			let wallet = EthereumWallet::from(signer.clone().with_chain_id(Some(*chain_id)));
			let provider = ProviderBuilder::new()
				.with_recommended_fillers()
				.wallet(wallet)
				.on_http(url);

			providers.insert(
				*chain_id,
				Arc::new(provider) as Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
			);
		}

		Ok(Self { address, providers })
	}

	fn get_provider(
		&self,
		chain_id: u64,
	) -> Result<&Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>, ChainError> {
		self.providers
			.get(&chain_id)
			.ok_or(ChainError::UnsupportedChain(chain_id))
	}
}

#[async_trait]
impl TransactionSenderInterface for AlloySender {
	fn address(&self) -> Address {
		self.address
	}

	async fn send(
		&self,
		request: EvmTransactionRequest,
	) -> Result<SubmittedTransaction, ChainError> {
		let provider = self.get_provider(request.chain_id)?;

		let tx = TransactionRequest::default()
			.with_from(self.address)
			.with_to(request.to)
			.with_input(request.data)
			.with_value(request.value)
			.with_nonce(request.nonce)
			.with_gas_price(request.gas_price)
			.with_gas_limit(request.gas_limit)
			.with_chain_id(request.chain_id);

		let pending_tx = provider
			.send_transaction(tx)
			.await
			.map_err(|e| ChainError::Network(format!("Failed to send transaction: {}", e)))?;

		let tx_hash = *pending_tx.tx_hash();
		tracing::info!(
			tx_hash = %truncate_id(&tx_hash.to_string()),
			chain_id = request.chain_id,
			nonce = request.nonce,
			"Submitted transaction"
		);

		Ok(SubmittedTransaction {
			chain_id: request.chain_id,
			transaction_hash: tx_hash,
			nonce: request.nonce,
		})
	}
}

/// Creates the RPC client for a chain endpoint.
pub fn create_chain_rpc(rpc_url: &str) -> Result<Arc<dyn ChainRpcInterface>, ChainError> {
	Ok(Arc::new(AlloyChainRpc::new(rpc_url)?))
}

/// Creates the wallet sender from a private key.
pub fn create_sender(
	private_key: &SecretString,
	chains: &HashMap<u64, ChainConfig>,
) -> Result<Arc<dyn TransactionSenderInterface>, ChainError> {
	let signer: PrivateKeySigner = private_key.with_exposed(|key| {
		key.parse()
			.map_err(|_| ChainError::InvalidArgument("Invalid private key format".to_string()))
	})?;

	Ok(Arc::new(AlloySender::new(signer, chains)?))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_invalid_rpc_url_rejected() {
		assert!(matches!(
			AlloyChainRpc::new("not a url"),
			Err(ChainError::InvalidArgument(_))
		));
	}

	#[test]
	fn test_create_sender_rejects_bad_key() {
		let result = create_sender(&SecretString::from("0x1234"), &HashMap::new());
		assert!(matches!(result, Err(ChainError::InvalidArgument(_))));
	}

	#[tokio::test]
	async fn test_sender_address_from_key() {
		let mut chains = HashMap::new();
		chains.insert(
			1,
			ChainConfig {
				name: "Ethereum".to_string(),
				rpc_url: "http://localhost:8545".to_string(),
				hub_network: honee_types::HubNetwork::Ethereum,
				hub_contract_address: "0x897c27fa372aa730d4c75b1243e7ea38879194e2".to_string(),
				wrapped_native_contract_address: "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"
					.to_string(),
			},
		);
		let sender = create_sender(
			&SecretString::from("0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"),
			&chains,
		)
		.unwrap();
		assert_eq!(
			sender.address(),
			"0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
				.parse::<Address>()
				.unwrap()
		);
	}
}
