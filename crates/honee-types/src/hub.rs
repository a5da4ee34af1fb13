//! Hub bridge types.
//!
//! The hub moves coins between the native wallet chain and external EVM
//! networks. Each hub coin carries its external token address and decimals
//! per network, which doubles as the known-coin list for decimals lookups.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// External network served by the hub bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HubNetwork {
	Ethereum,
	Bsc,
}

impl HubNetwork {
	/// Slug used in price feed keys and withdraw payload types.
	pub fn as_str(&self) -> &'static str {
		match self {
			HubNetwork::Ethereum => "ethereum",
			HubNetwork::Bsc => "bsc",
		}
	}
}

impl fmt::Display for HubNetwork {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Whether the wallet runs against production networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletNetwork {
	#[default]
	Mainnet,
	Testnet,
}

impl WalletNetwork {
	pub fn is_mainnet(&self) -> bool {
		matches!(self, WalletNetwork::Mainnet)
	}
}

/// Token details of a hub coin on one external network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalToken {
	/// Token contract address on the external network.
	pub external_token_id: String,
	pub external_decimals: u8,
	#[serde(default)]
	pub denom: String,
}

/// One coin of the hub coin list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubCoinItem {
	pub symbol: String,
	/// Coin id on the native chain.
	pub minter_id: u64,
	/// Bridge fee rate as a fraction.
	#[serde(default)]
	pub commission: Option<Decimal>,
	#[serde(default)]
	pub ethereum: Option<ExternalToken>,
	#[serde(default)]
	pub bsc: Option<ExternalToken>,
}

impl HubCoinItem {
	/// Returns the coin's token details on the given network, if it is bridged there.
	pub fn token_on(&self, network: HubNetwork) -> Option<&ExternalToken> {
		match network {
			HubNetwork::Ethereum => self.ethereum.as_ref(),
			HubNetwork::Bsc => self.bsc.as_ref(),
		}
	}
}

/// Finds a hub coin by symbol.
pub fn find_hub_coin<'a>(list: &'a [HubCoinItem], symbol: &str) -> Option<&'a HubCoinItem> {
	list.iter().find(|item| item.symbol == symbol)
}

/// Status of a bridge transfer as reported by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
	NotFound,
	DepositReceived,
	BatchCreated,
	BatchExecuted,
	Refunded,
}

impl TransferStatus {
	/// Terminal statuses end the transfer subscription.
	pub fn is_terminal(&self) -> bool {
		matches!(self, TransferStatus::BatchExecuted | TransferStatus::Refunded)
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			TransferStatus::NotFound => "not_found",
			TransferStatus::DepositReceived => "deposit_received",
			TransferStatus::BatchCreated => "batch_created",
			TransferStatus::BatchExecuted => "batch_executed",
			TransferStatus::Refunded => "refunded",
		}
	}
}

impl fmt::Display for TransferStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One reading of a bridge transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubTransfer {
	pub status: TransferStatus,
	/// Hash of the transaction the hub produced on the other side.
	#[serde(default, alias = "outTxHash")]
	pub out_tx_hash: Option<String>,
}

/// Withdraw delivery speed, selecting an entry of the destination fee map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawSpeed {
	Min,
	#[default]
	Fast,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_hub_coin_item_deserializes_camel_case() {
		let json = r#"{
			"symbol": "USDT",
			"minterId": 1993,
			"commission": "0.02",
			"ethereum": {"externalTokenId": "0xdac17f958d2ee523a2206206994597c13d831ec7", "externalDecimals": 6, "denom": "usdt"}
		}"#;
		let item: HubCoinItem = serde_json::from_str(json).unwrap();
		assert_eq!(item.minter_id, 1993);
		assert_eq!(item.commission, Some(Decimal::new(2, 2)));
		assert_eq!(item.token_on(HubNetwork::Ethereum).unwrap().external_decimals, 6);
		assert!(item.token_on(HubNetwork::Bsc).is_none());
	}

	#[test]
	fn test_transfer_status_terminal() {
		let transfer: HubTransfer =
			serde_json::from_str(r#"{"status": "batch_executed", "outTxHash": "Mt01"}"#).unwrap();
		assert!(transfer.status.is_terminal());
		assert_eq!(transfer.out_tx_hash.as_deref(), Some("Mt01"));
		assert!(!TransferStatus::BatchCreated.is_terminal());
		assert!(TransferStatus::Refunded.is_terminal());
		assert_eq!(TransferStatus::DepositReceived.to_string(), "deposit_received");
	}
}
