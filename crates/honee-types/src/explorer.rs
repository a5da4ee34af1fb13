//! Explorer transaction types for the native wallet chain.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outcome of a native chain transaction, derived from the explorer's HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplorerTxStatus {
	Success,
	Failure,
}

/// Coin reference inside an explorer transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinRef {
	pub id: u64,
	pub symbol: String,
}

/// One line of a multisend transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisendItem {
	pub to: String,
	pub value: Decimal,
	pub coin: CoinRef,
}

/// Type-specific transaction data.
///
/// Only multisend lines are interpreted; hub batch payouts are multisends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinterTxData {
	#[serde(default)]
	pub list: Option<Vec<MultisendItem>>,
}

/// A native chain transaction as returned by the explorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinterTransaction {
	pub hash: String,
	#[serde(default)]
	pub data: MinterTxData,
	pub status: ExplorerTxStatus,
}

impl MinterTransaction {
	/// Finds the line paying `symbol` to `recipient`.
	pub fn find_transfer(&self, recipient: &str, symbol: &str) -> Option<&MultisendItem> {
		self.data
			.list
			.as_ref()?
			.iter()
			.find(|item| item.to == recipient && item.coin.symbol == symbol)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn transaction(list: Option<Vec<MultisendItem>>) -> MinterTransaction {
		MinterTransaction {
			hash: "Mt01".to_string(),
			data: MinterTxData { list },
			status: ExplorerTxStatus::Success,
		}
	}

	#[test]
	fn test_find_transfer_matches_recipient_and_symbol() {
		let tx = transaction(Some(vec![
			MultisendItem {
				to: "Mxaa".to_string(),
				value: Decimal::new(5, 0),
				coin: CoinRef { id: 1, symbol: "USDT".to_string() },
			},
			MultisendItem {
				to: "Mxbb".to_string(),
				value: Decimal::new(7, 0),
				coin: CoinRef { id: 1, symbol: "USDT".to_string() },
			},
		]));

		assert_eq!(tx.find_transfer("Mxbb", "USDT").unwrap().value, Decimal::new(7, 0));
		assert!(tx.find_transfer("Mxbb", "ETH").is_none());
	}

	#[test]
	fn test_find_transfer_without_list() {
		assert!(transaction(None).find_transfer("Mxaa", "USDT").is_none());
	}
}
