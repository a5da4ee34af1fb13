//! ERC20 decimals resolution.
//!
//! Decimals come from the hub coin list when the token is bridged there and
//! from an on-chain `decimals()` call otherwise. On-chain answers are kept for
//! the lifetime of the resolver; concurrent lookups of the same token share
//! one call.

use futures::future::{BoxFuture, FutureExt, Shared};
use honee_chain::contracts::{decode_decimals, encode_decimals};
use honee_chain::{ChainError, ChainHandle, ChainRegistry};
use honee_types::{Address, ExternalToken, HubCoinItem};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Decimals assumed when a token does not answer `decimals()`.
pub const DEFAULT_DECIMALS: u8 = 18;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
	#[error("Chain id not specified")]
	MissingChainId,
	#[error("Chain error: {0}")]
	Chain(#[from] ChainError),
}

type DecimalsLookup = Shared<BoxFuture<'static, u8>>;
type DecimalsCache = Arc<Mutex<HashMap<(u64, Address), DecimalsLookup>>>;

/// Resolves and memoizes token decimals per chain.
pub struct TokenDecimalsResolver {
	registry: Arc<ChainRegistry>,
	cache: DecimalsCache,
}

impl TokenDecimalsResolver {
	pub fn new(registry: Arc<ChainRegistry>) -> Self {
		Self {
			registry,
			cache: Arc::new(Mutex::new(HashMap::new())),
		}
	}

	pub async fn get_decimals(
		&self,
		token: Address,
		chain_id: Option<u64>,
		known_coins: &[HubCoinItem],
	) -> Result<u8, TokenError> {
		let chain_id = match chain_id {
			Some(chain_id) if chain_id != 0 => chain_id,
			_ => return Err(TokenError::MissingChainId),
		};

		let cached = self.lock().get(&(chain_id, token)).cloned();
		if let Some(pending) = cached {
			return Ok(pending.await);
		}

		let chain = self.registry.resolve(Some(chain_id))?;
		if let Some(decimals) = known_decimals(&chain, token, known_coins) {
			return Ok(decimals);
		}

		let lookup = {
			let mut cache = self.lock();
			cache
				.entry((chain_id, token))
				.or_insert_with(|| self.on_chain_lookup(chain, token))
				.clone()
		};
		Ok(lookup.await)
	}

	fn on_chain_lookup(&self, chain: Arc<ChainHandle>, token: Address) -> DecimalsLookup {
		let cache = Arc::clone(&self.cache);
		async move {
			let result = chain
				.rpc()
				.call(token, encode_decimals())
				.await
				.and_then(|data| decode_decimals(&data));

			match result {
				Ok(decimals) => decimals,
				Err(e) => {
					tracing::warn!(
						chain_id = chain.chain_id,
						%token,
						error = %e,
						"Failed to read token decimals, assuming {}",
						DEFAULT_DECIMALS
					);
					cache
						.lock()
						.unwrap_or_else(|p| p.into_inner())
						.remove(&(chain.chain_id, token));
					DEFAULT_DECIMALS
				},
			}
		}
		.boxed()
		.shared()
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(u64, Address), DecimalsLookup>> {
		self.cache.lock().unwrap_or_else(|p| p.into_inner())
	}
}

/// Hub coin list entry of `token` on `chain`'s network.
pub fn find_external_token<'a>(
	chain: &ChainHandle,
	token: Address,
	known_coins: &'a [HubCoinItem],
) -> Option<&'a ExternalToken> {
	known_coins
		.iter()
		.filter_map(|coin| coin.token_on(chain.hub_network))
		.find(|external| {
			Address::from_str(&external.external_token_id)
				.map(|address| address == token)
				.unwrap_or(false)
		})
}

fn known_decimals(chain: &ChainHandle, token: Address, known_coins: &[HubCoinItem]) -> Option<u8> {
	find_external_token(chain, token, known_coins).map(|external| external.external_decimals)
}

#[cfg(test)]
mod tests {
	use super::*;
	use honee_chain::contracts::decimals_selector;
	use honee_chain::testing::FakeChainRpc;
	use honee_types::{Bytes, HubNetwork, U256};
	use tokio::time::Duration;

	const USDT: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";

	fn resolver(rpc: Arc<FakeChainRpc>) -> TokenDecimalsResolver {
		let handle = ChainHandle::new(
			1,
			"Ethereum",
			"http://eth",
			HubNetwork::Ethereum,
			Address::repeat_byte(0x11),
			Address::repeat_byte(0x12),
			rpc,
		);
		let registry = ChainRegistry::new(vec![handle], 1, Duration::from_millis(5000)).unwrap();
		TokenDecimalsResolver::new(Arc::new(registry))
	}

	fn decimals_word(decimals: u8) -> Result<Bytes, ChainError> {
		Ok(Bytes::from(U256::from(decimals).to_be_bytes::<32>().to_vec()))
	}

	fn coin_list() -> Vec<HubCoinItem> {
		vec![HubCoinItem {
			symbol: "USDT".to_string(),
			minter_id: 1993,
			commission: None,
			// lowercase on purpose, the list is not checksummed
			ethereum: Some(ExternalToken {
				external_token_id: USDT.to_lowercase(),
				external_decimals: 6,
				denom: "usdt".to_string(),
			}),
			bsc: None,
		}]
	}

	#[tokio::test]
	async fn test_known_coin_skips_rpc() {
		let rpc = Arc::new(FakeChainRpc::new());
		let resolver = resolver(rpc.clone());
		let token = Address::from_str(USDT).unwrap();

		let decimals = resolver
			.get_decimals(token, Some(1), &coin_list())
			.await
			.unwrap();
		assert_eq!(decimals, 6);
		assert_eq!(rpc.contract_calls(), 0);
	}

	#[tokio::test]
	async fn test_on_chain_decimals_are_cached() {
		let rpc = Arc::new(FakeChainRpc::new());
		let token = Address::repeat_byte(0x33);
		rpc.set_call_result(token, decimals_selector(), decimals_word(8));
		let resolver = resolver(rpc.clone());

		assert_eq!(resolver.get_decimals(token, Some(1), &[]).await.unwrap(), 8);
		assert_eq!(resolver.get_decimals(token, Some(1), &[]).await.unwrap(), 8);
		assert_eq!(rpc.contract_calls(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_concurrent_lookups_share_one_call() {
		let rpc = Arc::new(FakeChainRpc::new());
		let token = Address::repeat_byte(0x33);
		rpc.set_call_result(token, decimals_selector(), decimals_word(9));
		rpc.set_call_delay(Duration::from_millis(200));
		let resolver = resolver(rpc.clone());

		let (first, second) = tokio::join!(
			resolver.get_decimals(token, Some(1), &[]),
			resolver.get_decimals(token, Some(1), &[])
		);
		assert_eq!(first.unwrap(), 9);
		assert_eq!(second.unwrap(), 9);
		assert_eq!(rpc.contract_calls(), 1);
	}

	#[tokio::test]
	async fn test_failed_lookup_defaults_and_retries() {
		let rpc = Arc::new(FakeChainRpc::new());
		let token = Address::repeat_byte(0x44);
		let resolver = resolver(rpc.clone());

		assert_eq!(
			resolver.get_decimals(token, Some(1), &[]).await.unwrap(),
			DEFAULT_DECIMALS
		);

		rpc.set_call_result(token, decimals_selector(), decimals_word(6));
		assert_eq!(resolver.get_decimals(token, Some(1), &[]).await.unwrap(), 6);
		assert_eq!(rpc.contract_calls(), 2);
	}

	#[tokio::test]
	async fn test_chain_id_is_required() {
		let resolver = resolver(Arc::new(FakeChainRpc::new()));
		let token = Address::repeat_byte(0x33);
		assert_eq!(
			resolver.get_decimals(token, None, &[]).await,
			Err(TokenError::MissingChainId)
		);
		assert_eq!(
			resolver.get_decimals(token, Some(0), &[]).await,
			Err(TokenError::MissingChainId)
		);
		assert_eq!(
			resolver.get_decimals(token, Some(137), &[]).await,
			Err(TokenError::Chain(ChainError::UnsupportedChain(137)))
		);
	}
}
