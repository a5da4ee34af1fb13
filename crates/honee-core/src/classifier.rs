//! Recognizes bridge-related transactions of a deposit account.
//!
//! Transactions are sorted by their argument count and target contract, then
//! described with the token they move and the amount in token units.

use crate::tokens::{find_external_token, TokenDecimalsResolver, TokenError};
use honee_chain::ChainHandle;
use honee_types::{
	from_base_units, Address, ChainTransaction, ConversionError, Decimal, HubCoinItem, U256,
};
use std::fmt;
use thiserror::Error;

const SELECTOR_LEN: usize = 4;
const WORD_LEN: usize = 32;
const NATIVE_DECIMALS: u8 = 18;
const ADDRESS_LEN: usize = 20;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassifierError {
	#[error("Token error: {0}")]
	Token(#[from] TokenError),
	#[error("Conversion error: {0}")]
	Conversion(#[from] ConversionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepositTxKind {
	/// ERC20 approve of the hub contract.
	Unlock,
	/// Bridge deposit to the hub contract.
	Send,
	/// Wrapped-native `withdraw(uint256)`.
	Unwrap,
	/// Wrapped-native `deposit()`.
	Wrap,
	Other,
}

impl fmt::Display for DepositTxKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			DepositTxKind::Unlock => "unlock",
			DepositTxKind::Send => "send",
			DepositTxKind::Unwrap => "unwrap",
			DepositTxKind::Wrap => "wrap",
			DepositTxKind::Other => "other",
		};
		f.write_str(name)
	}
}

/// What a deposit-related transaction moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositTxInfo {
	pub kind: DepositTxKind,
	/// Token the transaction acts on; the wrapped-native address for native sends.
	pub token_contract: Option<Address>,
	/// Uppercased hub denom of the token, when the hub lists it.
	pub token_name: Option<String>,
	/// Amount in token units.
	pub amount: Decimal,
}

impl DepositTxInfo {
	fn other() -> Self {
		Self {
			kind: DepositTxKind::Other,
			token_contract: None,
			token_name: None,
			amount: Decimal::ZERO,
		}
	}
}

/// Where the amount of a classified transaction is read from.
enum AmountSource {
	Word(usize),
	Value,
}

/// Number of 32-byte argument words after the function selector.
fn calldata_words(tx: &ChainTransaction) -> usize {
	tx.input.len().saturating_sub(SELECTOR_LEN) / WORD_LEN
}

fn calldata_word(tx: &ChainTransaction, index: usize) -> Option<&[u8]> {
	let start = SELECTOR_LEN + index * WORD_LEN;
	tx.input.get(start..start + WORD_LEN)
}

fn word_as_address(word: &[u8]) -> Address {
	Address::from_slice(&word[WORD_LEN - ADDRESS_LEN..])
}

/// Kind, token and amount location of `tx` on `chain`.
fn inspect(tx: &ChainTransaction, chain: &ChainHandle) -> Option<(DepositTxKind, Address, AmountSource)> {
	let to = tx.to?;
	let to_hub = to == chain.hub_contract_address;
	let to_wrapped = to == chain.wrapped_native_contract_address;

	match calldata_words(tx) {
		2 => {
			let spender = word_as_address(calldata_word(tx, 0)?);
			(spender == chain.hub_contract_address)
				.then_some((DepositTxKind::Unlock, to, AmountSource::Word(1)))
		},
		5 if to_hub => {
			let token = word_as_address(calldata_word(tx, 0)?);
			Some((DepositTxKind::Send, token, AmountSource::Word(3)))
		},
		3 if to_hub => Some((
			DepositTxKind::Send,
			chain.wrapped_native_contract_address,
			AmountSource::Value,
		)),
		1 if to_wrapped => Some((DepositTxKind::Unwrap, to, AmountSource::Word(0))),
		0 if to_wrapped => Some((DepositTxKind::Wrap, to, AmountSource::Value)),
		_ => None,
	}
}

/// Classifies `tx` by its argument count and target contract on `chain`.
pub fn classify_deposit_tx(tx: &ChainTransaction, chain: &ChainHandle) -> DepositTxKind {
	inspect(tx, chain)
		.map(|(kind, _, _)| kind)
		.unwrap_or(DepositTxKind::Other)
}

/// Describes `tx` with its token and amount.
///
/// Calldata amounts are scaled by the token's decimals; value-carrying calls
/// are read in native units.
pub async fn deposit_tx_info(
	tx: &ChainTransaction,
	chain: &ChainHandle,
	resolver: &TokenDecimalsResolver,
	hub_coin_list: &[HubCoinItem],
) -> Result<DepositTxInfo, ClassifierError> {
	let Some((kind, token, source)) = inspect(tx, chain) else {
		return Ok(DepositTxInfo::other());
	};

	let amount = match source {
		AmountSource::Value => from_base_units(tx.value, NATIVE_DECIMALS)?,
		AmountSource::Word(index) => {
			let raw = calldata_word(tx, index).map(U256::from_be_slice).unwrap_or_default();
			let decimals = resolver
				.get_decimals(token, Some(chain.chain_id), hub_coin_list)
				.await?;
			// unlimited approvals exceed the decimal range
			from_base_units(raw, decimals).unwrap_or(Decimal::MAX)
		},
	};

	let token_name = find_external_token(chain, token, hub_coin_list)
		.map(|external| external.denom.to_uppercase());

	Ok(DepositTxInfo {
		kind,
		token_contract: Some(token),
		token_name,
		amount,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use honee_chain::contracts::{
		decimals_selector, encode_approve_max, encode_transfer_eth_to_chain,
		encode_transfer_to_chain, encode_unwrap, encode_wrap,
	};
	use honee_chain::testing::FakeChainRpc;
	use honee_chain::ChainRegistry;
	use honee_types::{Bytes, ExternalToken, HubNetwork, B256};
	use std::str::FromStr;
	use std::sync::Arc;
	use tokio::time::Duration;

	const HUB: Address = Address::repeat_byte(0x11);
	const WRAPPED: Address = Address::repeat_byte(0x12);
	const USDT: Address = Address::repeat_byte(0x55);

	fn dec(value: &str) -> Decimal {
		Decimal::from_str(value).unwrap()
	}

	fn registry(rpc: Arc<FakeChainRpc>) -> Arc<ChainRegistry> {
		let handle = ChainHandle::new(
			1,
			"Ethereum",
			"http://eth",
			HubNetwork::Ethereum,
			HUB,
			WRAPPED,
			rpc,
		);
		Arc::new(ChainRegistry::new(vec![handle], 1, Duration::from_millis(5000)).unwrap())
	}

	fn coin_list() -> Vec<HubCoinItem> {
		vec![
			HubCoinItem {
				symbol: "USDTE".to_string(),
				minter_id: 1993,
				commission: None,
				ethereum: Some(ExternalToken {
					external_token_id: USDT.to_string(),
					external_decimals: 6,
					denom: "usdt".to_string(),
				}),
				bsc: None,
			},
			HubCoinItem {
				symbol: "ETH".to_string(),
				minter_id: 2024,
				commission: None,
				ethereum: Some(ExternalToken {
					external_token_id: WRAPPED.to_string(),
					external_decimals: 18,
					denom: "eth".to_string(),
				}),
				bsc: None,
			},
		]
	}

	fn tx(to: Address, input: Bytes, value: U256) -> ChainTransaction {
		ChainTransaction {
			hash: B256::repeat_byte(0x01),
			from: Address::repeat_byte(0xaa),
			to: Some(to),
			value,
			input,
			nonce: 0,
			block_hash: None,
			block_number: None,
		}
	}

	fn call(to: Address, input: Bytes) -> ChainTransaction {
		tx(to, input, U256::ZERO)
	}

	#[test]
	fn test_bridge_calls_are_classified() {
		let registry = registry(Arc::new(FakeChainRpc::new()));
		let chain = registry.resolve(None).unwrap();
		let destination = B256::repeat_byte(0x02);

		let cases = [
			(call(USDT, encode_approve_max(HUB)), DepositTxKind::Unlock),
			(
				call(HUB, encode_transfer_to_chain(USDT, destination, U256::from(1u64))),
				DepositTxKind::Send,
			),
			(call(HUB, encode_transfer_eth_to_chain(destination)), DepositTxKind::Send),
			(call(WRAPPED, encode_unwrap(U256::from(1u64))), DepositTxKind::Unwrap),
			(call(WRAPPED, encode_wrap()), DepositTxKind::Wrap),
		];
		for (tx, kind) in cases {
			assert_eq!(classify_deposit_tx(&tx, &chain), kind);
		}
	}

	#[test]
	fn test_wrong_target_is_other() {
		let registry = registry(Arc::new(FakeChainRpc::new()));
		let chain = registry.resolve(None).unwrap();
		let stranger = Address::repeat_byte(0x77);
		assert_eq!(
			classify_deposit_tx(&call(stranger, encode_unwrap(U256::from(1u64))), &chain),
			DepositTxKind::Other
		);
		assert_eq!(
			classify_deposit_tx(&call(stranger, encode_transfer_eth_to_chain(B256::ZERO)), &chain),
			DepositTxKind::Other
		);
		assert_eq!(
			classify_deposit_tx(&call(HUB, Bytes::new()), &chain),
			DepositTxKind::Other
		);
	}

	#[test]
	fn test_approve_of_other_spender_is_not_unlock() {
		let registry = registry(Arc::new(FakeChainRpc::new()));
		let chain = registry.resolve(None).unwrap();
		let approve = call(USDT, encode_approve_max(Address::repeat_byte(0x99)));
		assert_eq!(classify_deposit_tx(&approve, &chain), DepositTxKind::Other);
	}

	#[tokio::test]
	async fn test_token_send_info_uses_hub_decimals() {
		let rpc = Arc::new(FakeChainRpc::new());
		let registry = registry(rpc.clone());
		let chain = registry.resolve(None).unwrap();
		let resolver = TokenDecimalsResolver::new(Arc::clone(&registry));
		let send = call(
			HUB,
			encode_transfer_to_chain(USDT, B256::repeat_byte(0x02), U256::from(12_500_000u64)),
		);

		let info = deposit_tx_info(&send, &chain, &resolver, &coin_list()).await.unwrap();
		assert_eq!(info.kind, DepositTxKind::Send);
		assert_eq!(info.token_contract, Some(USDT));
		assert_eq!(info.token_name.as_deref(), Some("USDT"));
		assert_eq!(info.amount, dec("12.5"));
		assert_eq!(rpc.contract_calls(), 0);
	}

	#[tokio::test]
	async fn test_unlock_info_reads_amount_word() {
		let registry = registry(Arc::new(FakeChainRpc::new()));
		let chain = registry.resolve(None).unwrap();
		let resolver = TokenDecimalsResolver::new(Arc::clone(&registry));

		let info = deposit_tx_info(&call(USDT, encode_approve_max(HUB)), &chain, &resolver, &coin_list())
			.await
			.unwrap();
		assert_eq!(info.kind, DepositTxKind::Unlock);
		assert_eq!(info.token_contract, Some(USDT));
		assert_eq!(info.amount, Decimal::MAX);

		let limited = call(USDT, honee_chain::contracts::encode_approve(HUB, U256::from(2_000_000u64)));
		let info = deposit_tx_info(&limited, &chain, &resolver, &coin_list()).await.unwrap();
		assert_eq!(info.kind, DepositTxKind::Unlock);
		assert_eq!(info.amount, dec("2"));
	}

	#[tokio::test]
	async fn test_unwrap_info_reads_on_chain_decimals() {
		let rpc = Arc::new(FakeChainRpc::new());
		let token = Address::repeat_byte(0x66);
		let mut word = [0u8; 32];
		word[31] = 8;
		rpc.set_call_result(token, decimals_selector(), Ok(Bytes::from(word.to_vec())));
		let handle = ChainHandle::new(56, "BSC", "http://bsc", HubNetwork::Bsc, HUB, token, rpc.clone());
		let registry =
			Arc::new(ChainRegistry::new(vec![handle], 56, Duration::from_millis(5000)).unwrap());
		let chain = registry.resolve(None).unwrap();
		let resolver = TokenDecimalsResolver::new(Arc::clone(&registry));

		let unwrap = call(token, encode_unwrap(U256::from(150_000_000u64)));
		let info = deposit_tx_info(&unwrap, &chain, &resolver, &[]).await.unwrap();
		assert_eq!(info.kind, DepositTxKind::Unwrap);
		assert_eq!(info.token_contract, Some(token));
		assert_eq!(info.token_name, None);
		assert_eq!(info.amount, dec("1.5"));
		assert_eq!(rpc.contract_calls(), 1);
	}

	#[tokio::test]
	async fn test_value_carrying_calls_use_native_units() {
		let registry = registry(Arc::new(FakeChainRpc::new()));
		let chain = registry.resolve(None).unwrap();
		let resolver = TokenDecimalsResolver::new(Arc::clone(&registry));
		let value = U256::from(250_000_000_000_000_000u64);

		let native_send = tx(HUB, encode_transfer_eth_to_chain(B256::repeat_byte(0x02)), value);
		let info = deposit_tx_info(&native_send, &chain, &resolver, &coin_list())
			.await
			.unwrap();
		assert_eq!(info.kind, DepositTxKind::Send);
		assert_eq!(info.token_contract, Some(WRAPPED));
		assert_eq!(info.token_name.as_deref(), Some("ETH"));
		assert_eq!(info.amount, dec("0.25"));

		let wrap = tx(WRAPPED, encode_wrap(), value);
		let info = deposit_tx_info(&wrap, &chain, &resolver, &coin_list()).await.unwrap();
		assert_eq!(info.kind, DepositTxKind::Wrap);
		assert_eq!(info.amount, dec("0.25"));
	}

	#[tokio::test]
	async fn test_unrelated_tx_info_is_other() {
		let registry = registry(Arc::new(FakeChainRpc::new()));
		let chain = registry.resolve(None).unwrap();
		let resolver = TokenDecimalsResolver::new(Arc::clone(&registry));

		let approve = call(USDT, encode_approve_max(Address::repeat_byte(0x99)));
		let info = deposit_tx_info(&approve, &chain, &resolver, &coin_list()).await.unwrap();
		assert_eq!(info, DepositTxInfo::other());
	}
}
