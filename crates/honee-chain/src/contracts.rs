//! Call data for the contracts a bridge deposit touches.

use crate::{ChainError, ChainRpcInterface};
use alloy_sol_types::{sol, SolCall};
use honee_types::{Address, Bytes, B256, U256};

sol! {
	/// Hub bridge contract on the EVM side.
	interface IHubBridge {
		function transferToChain(address token, bytes32 destinationChain, bytes32 destination, uint256 amount, uint256 fee) external;
		function transferETHToChain(bytes32 destinationChain, bytes32 destination, uint256 fee) external payable;
	}

	/// WETH-style wrapped native coin.
	interface IWrappedNative {
		function deposit() external payable;
		function withdraw(uint256 amount) external;
	}

	interface IERC20 {
		function decimals() external view returns (uint8);
		function approve(address spender, uint256 amount) external returns (bool);
		function transfer(address recipient, uint256 amount) external returns (bool);
		function allowance(address owner, address spender) external view returns (uint256);
	}
}

/// A contract call ready to be sent: target, calldata and attached value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
	pub to: Address,
	pub data: Bytes,
	pub value: U256,
}

/// Hub identifier of the wallet chain, right-padded to bytes32.
pub fn minter_chain_id() -> B256 {
	B256::right_padding_from(b"minter")
}

/// `withdraw(amount)` on the wrapped-native contract.
pub fn encode_unwrap(amount: U256) -> Bytes {
	IWrappedNative::withdrawCall { amount }.abi_encode().into()
}

/// `deposit()` on the wrapped-native contract.
pub fn encode_wrap() -> Bytes {
	IWrappedNative::depositCall {}.abi_encode().into()
}

/// Bridges the native coin; the amount travels as the transaction value.
pub fn encode_transfer_eth_to_chain(destination: B256) -> Bytes {
	IHubBridge::transferETHToChainCall {
		destinationChain: minter_chain_id(),
		destination,
		fee: U256::ZERO,
	}
	.abi_encode()
	.into()
}

/// Bridges an ERC20 token already approved to the hub contract.
pub fn encode_transfer_to_chain(token: Address, destination: B256, amount: U256) -> Bytes {
	IHubBridge::transferToChainCall {
		token,
		destinationChain: minter_chain_id(),
		destination,
		amount,
		fee: U256::ZERO,
	}
	.abi_encode()
	.into()
}

pub fn encode_approve(spender: Address, amount: U256) -> Bytes {
	IERC20::approveCall { spender, amount }.abi_encode().into()
}

/// Unlimited approval of `spender`.
pub fn encode_approve_max(spender: Address) -> Bytes {
	encode_approve(spender, U256::MAX)
}

pub fn encode_transfer(recipient: Address, amount: U256) -> Bytes {
	IERC20::transferCall { recipient, amount }.abi_encode().into()
}

/// Unlimited approval of `spender` on `token`.
pub fn build_approve_tx(token: Address, spender: Address) -> ContractCall {
	ContractCall {
		to: token,
		data: encode_approve_max(spender),
		value: U256::ZERO,
	}
}

/// ERC20 transfer of `amount` base units of `token` to `recipient`.
pub fn build_transfer_tx(token: Address, recipient: Address, amount: U256) -> ContractCall {
	ContractCall {
		to: token,
		data: encode_transfer(recipient, amount),
		value: U256::ZERO,
	}
}

pub fn encode_allowance(owner: Address, spender: Address) -> Bytes {
	IERC20::allowanceCall { owner, spender }.abi_encode().into()
}

pub fn decode_allowance(data: &[u8]) -> Result<U256, ChainError> {
	IERC20::allowanceCall::abi_decode_returns(data, true)
		.map(|ret| ret._0)
		.map_err(|e| ChainError::InvalidResponse(format!("Invalid allowance response: {}", e)))
}

/// Amount of `token` that `spender` may still move on behalf of `owner`.
pub async fn get_allowance(
	rpc: &dyn ChainRpcInterface,
	token: Address,
	owner: Address,
	spender: Address,
) -> Result<U256, ChainError> {
	let data = rpc.call(token, encode_allowance(owner, spender)).await?;
	decode_allowance(&data)
}

pub fn encode_decimals() -> Bytes {
	IERC20::decimalsCall {}.abi_encode().into()
}

pub fn decode_decimals(data: &[u8]) -> Result<u8, ChainError> {
	IERC20::decimalsCall::abi_decode_returns(data, true)
		.map(|ret| ret._0)
		.map_err(|e| ChainError::InvalidResponse(format!("Invalid decimals response: {}", e)))
}

pub fn decimals_selector() -> [u8; 4] {
	IERC20::decimalsCall::SELECTOR
}

pub fn allowance_selector() -> [u8; 4] {
	IERC20::allowanceCall::SELECTOR
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::FakeChainRpc;

	#[test]
	fn test_minter_chain_id_is_right_padded() {
		let id = minter_chain_id();
		assert_eq!(&id[..6], b"minter");
		assert!(id[6..].iter().all(|b| *b == 0));
	}

	#[test]
	fn test_call_word_counts() {
		let destination = B256::repeat_byte(0x01);
		assert_eq!(encode_unwrap(U256::from(1u64)).len(), 4 + 32);
		assert_eq!(encode_wrap().len(), 4);
		assert_eq!(encode_transfer_eth_to_chain(destination).len(), 4 + 3 * 32);
		assert_eq!(
			encode_transfer_to_chain(Address::repeat_byte(0x02), destination, U256::from(5u64)).len(),
			4 + 5 * 32
		);
		assert_eq!(encode_approve_max(Address::repeat_byte(0x03)).len(), 4 + 2 * 32);
	}

	#[test]
	fn test_decimals_round_trip_through_abi() {
		let mut word = [0u8; 32];
		word[31] = 6;
		assert_eq!(decode_decimals(&word).unwrap(), 6);
		assert!(decode_decimals(&[0u8; 3]).is_err());
		assert_eq!(&encode_decimals()[..], &decimals_selector()[..]);
	}

	#[test]
	fn test_approve_and_transfer_txs() {
		let token = Address::repeat_byte(0x55);
		let spender = Address::repeat_byte(0x11);

		let approve = build_approve_tx(token, spender);
		assert_eq!(approve.to, token);
		assert_eq!(approve.value, U256::ZERO);
		assert_eq!(&approve.data[..4], &IERC20::approveCall::SELECTOR[..]);
		assert_eq!(&approve.data[4 + 12..4 + 32], spender.as_slice());
		assert_eq!(&approve.data[4 + 32..], &[0xffu8; 32][..]);

		let transfer = build_transfer_tx(token, spender, U256::from(7u64));
		assert_eq!(transfer.to, token);
		assert_eq!(&transfer.data[..4], &IERC20::transferCall::SELECTOR[..]);
		assert_eq!(transfer.data[4 + 63], 7);
	}

	#[tokio::test]
	async fn test_get_allowance_reads_token_contract() {
		let rpc = FakeChainRpc::new();
		let token = Address::repeat_byte(0x55);
		let mut word = [0u8; 32];
		word[30] = 0x01;
		rpc.set_call_result(token, allowance_selector(), Ok(Bytes::from(word.to_vec())));

		let allowance = get_allowance(
			&rpc,
			token,
			Address::repeat_byte(0xaa),
			Address::repeat_byte(0x11),
		)
		.await
		.unwrap();
		assert_eq!(allowance, U256::from(256u64));
		assert_eq!(rpc.contract_calls(), 1);
	}

	#[tokio::test]
	async fn test_get_allowance_rejects_short_answer() {
		let rpc = FakeChainRpc::new();
		let token = Address::repeat_byte(0x55);
		rpc.set_call_result(token, allowance_selector(), Ok(Bytes::from(vec![0u8; 4])));

		let result = get_allowance(&rpc, token, Address::ZERO, Address::ZERO).await;
		assert!(matches!(result, Err(ChainError::InvalidResponse(_))));
	}
}
