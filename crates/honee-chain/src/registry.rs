//! Chain provider registry.
//!
//! Maps chain ids to immutable connection handles built once at startup and
//! owns the process-wide block number cache.

use crate::implementations::evm::alloy::create_chain_rpc;
use crate::{BlockNumberCache, ChainError, ChainRpcInterface};
use honee_config::Config;
use honee_types::{Address, HubNetwork};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::Duration;

/// One EVM chain connection.
pub struct ChainHandle {
	pub chain_id: u64,
	pub name: String,
	pub rpc_url: String,
	pub hub_network: HubNetwork,
	pub hub_contract_address: Address,
	pub wrapped_native_contract_address: Address,
	rpc: Arc<dyn ChainRpcInterface>,
}

impl ChainHandle {
	pub fn new(
		chain_id: u64,
		name: impl Into<String>,
		rpc_url: impl Into<String>,
		hub_network: HubNetwork,
		hub_contract_address: Address,
		wrapped_native_contract_address: Address,
		rpc: Arc<dyn ChainRpcInterface>,
	) -> Self {
		Self {
			chain_id,
			name: name.into(),
			rpc_url: rpc_url.into(),
			hub_network,
			hub_contract_address,
			wrapped_native_contract_address,
			rpc,
		}
	}

	pub fn rpc(&self) -> Arc<dyn ChainRpcInterface> {
		Arc::clone(&self.rpc)
	}

	/// The native coin is bridged under the wrapped-native token address.
	pub fn is_native_token(&self, token: &Address) -> bool {
		*token == self.wrapped_native_contract_address
	}
}

impl std::fmt::Debug for ChainHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ChainHandle")
			.field("chain_id", &self.chain_id)
			.field("name", &self.name)
			.field("rpc_url", &self.rpc_url)
			.field("hub_network", &self.hub_network)
			.finish()
	}
}

/// Resolves chain ids to handles.
pub struct ChainRegistry {
	chains: HashMap<u64, Arc<ChainHandle>>,
	default_chain_id: u64,
	block_numbers: BlockNumberCache,
}

impl ChainRegistry {
	pub fn new(
		handles: Vec<ChainHandle>,
		default_chain_id: u64,
		block_cache_ttl: Duration,
	) -> Result<Self, ChainError> {
		let chains: HashMap<u64, Arc<ChainHandle>> = handles
			.into_iter()
			.map(|handle| (handle.chain_id, Arc::new(handle)))
			.collect();

		if !chains.contains_key(&default_chain_id) {
			return Err(ChainError::UnsupportedChain(default_chain_id));
		}

		Ok(Self {
			chains,
			default_chain_id,
			block_numbers: BlockNumberCache::new(block_cache_ttl),
		})
	}

	/// Builds Alloy-backed handles for every configured chain.
	pub fn from_config(config: &Config) -> Result<Self, ChainError> {
		let mut handles = Vec::with_capacity(config.chains.len());
		for (chain_id, chain) in &config.chains {
			let hub_contract_address = parse_address(&chain.hub_contract_address)?;
			let wrapped_native_contract_address =
				parse_address(&chain.wrapped_native_contract_address)?;
			let rpc = create_chain_rpc(&chain.rpc_url)?;
			handles.push(ChainHandle::new(
				*chain_id,
				chain.name.clone(),
				chain.rpc_url.clone(),
				chain.hub_network,
				hub_contract_address,
				wrapped_native_contract_address,
				rpc,
			));
		}

		Self::new(
			handles,
			config.wallet.default_chain_id,
			Duration::from_millis(config.tracker.block_cache_ttl_ms),
		)
	}

	/// Resolves a chain id; absent or zero selects the default chain.
	pub fn resolve(&self, chain_id: Option<u64>) -> Result<Arc<ChainHandle>, ChainError> {
		let chain_id = match chain_id {
			None | Some(0) => self.default_chain_id,
			Some(chain_id) => chain_id,
		};
		self.chains
			.get(&chain_id)
			.cloned()
			.ok_or(ChainError::UnsupportedChain(chain_id))
	}

	/// Resolves an untyped chain id as it arrives from a UI payload.
	///
	/// Only numbers and falsy values are accepted.
	pub fn resolve_value(&self, chain_id: &serde_json::Value) -> Result<Arc<ChainHandle>, ChainError> {
		match chain_id {
			serde_json::Value::Null | serde_json::Value::Bool(false) => self.resolve(None),
			serde_json::Value::Number(number) => {
				let chain_id = number.as_u64().ok_or_else(|| {
					ChainError::InvalidArgument(format!("chainId should be a chain number, got {}", number))
				})?;
				self.resolve(Some(chain_id))
			},
			other => Err(ChainError::InvalidArgument(format!(
				"chainId should be a number, got {}",
				other
			))),
		}
	}

	/// Current block number of the chain, through the shared cache.
	pub async fn get_block_number(&self, chain: &ChainHandle) -> Result<u64, ChainError> {
		self.block_numbers
			.get_block_number(&chain.rpc_url, chain.rpc())
			.await
	}

	pub fn default_chain_id(&self) -> u64 {
		self.default_chain_id
	}

	pub fn chain_ids(&self) -> Vec<u64> {
		let mut ids: Vec<u64> = self.chains.keys().copied().collect();
		ids.sort_unstable();
		ids
	}
}

fn parse_address(value: &str) -> Result<Address, ChainError> {
	Address::from_str(value)
		.map_err(|e| ChainError::InvalidArgument(format!("Invalid address {}: {}", value, e)))
}

/// Human name of a well-known EVM chain id.
pub fn evm_network_name(chain_id: u64) -> Option<&'static str> {
	match chain_id {
		1 => Some("Ethereum"),
		3 => Some("Ropsten"),
		4 => Some("Rinkeby"),
		42 => Some("Kovan"),
		56 => Some("BSC"),
		97 => Some("BSC Testnet"),
		_ => None,
	}
}
