//! Withdraw quote and transaction parameters.
//!
//! A withdraw is a plain wallet chain `SEND` to the hub multisig whose payload
//! tells the hub where to deliver and how much destination fee is covered.

use crate::fees::{self, FeeError};
use honee_types::{to_pip, ConversionError, Decimal, HubCoinItem, HubNetwork, WithdrawSpeed};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WithdrawError {
	#[error("Coin {0} is not bridged by the hub")]
	UnknownCoin(String),
	#[error("Fee error: {0}")]
	Fee(#[from] FeeError),
	#[error("Conversion error: {0}")]
	Conversion(#[from] ConversionError),
	#[error("Payload error: {0}")]
	Payload(String),
}

/// Inputs of one withdraw form.
#[derive(Debug, Clone)]
pub struct WithdrawSession {
	pub network: HubNetwork,
	pub coin_symbol: String,
	pub amount_to_send: Decimal,
	/// EVM address receiving the coins.
	pub destination_address: String,
	pub speed: WithdrawSpeed,
	/// Destination network fee per speed, in USD.
	pub destination_fee: HashMap<WithdrawSpeed, Decimal>,
	/// Coin price in USD.
	pub coin_price: Decimal,
	/// Fee discount as a fraction.
	pub discount: Decimal,
	pub hub_coin: Option<HubCoinItem>,
	/// Relay hash of a smart-wallet call to run after delivery.
	pub smart_wallet_tx: Option<String>,
	pub default_fee_rate: Decimal,
}

impl WithdrawSession {
	pub fn new(network: HubNetwork, coin_symbol: impl Into<String>) -> Self {
		Self {
			network,
			coin_symbol: coin_symbol.into(),
			amount_to_send: Decimal::ZERO,
			destination_address: String::new(),
			speed: WithdrawSpeed::default(),
			destination_fee: HashMap::new(),
			coin_price: Decimal::ZERO,
			discount: Decimal::ZERO,
			hub_coin: None,
			smart_wallet_tx: None,
			default_fee_rate: fees::DEFAULT_HUB_FEE_RATE,
		}
	}

	pub fn destination_fee_in_coin(&self) -> Decimal {
		let fee = self
			.destination_fee
			.get(&self.speed)
			.copied()
			.unwrap_or(Decimal::ZERO);
		fees::destination_fee_in_coin(self.coin_price, fee)
	}

	/// Derives every fee figure from the current inputs.
	pub fn quote(&self) -> Result<WithdrawQuote, WithdrawError> {
		let destination_fee_in_coin = self.destination_fee_in_coin();
		let hub_fee_base_rate = fees::base_fee_rate(
			self.hub_coin.as_ref().and_then(|coin| coin.commission),
			self.default_fee_rate,
		);
		let hub_fee_rate = fees::hub_fee_rate(hub_fee_base_rate, self.discount);
		let hub_fee = fees::hub_fee(hub_fee_rate, self.amount_to_send);

		Ok(WithdrawQuote {
			destination_fee_in_coin,
			hub_fee_base_rate,
			hub_fee_rate,
			hub_fee_rate_percent: fees::hub_fee_rate_percent(hub_fee_rate),
			hub_fee,
			amount_to_receive: fees::amount_to_receive(
				self.amount_to_send,
				destination_fee_in_coin,
				hub_fee,
			),
			min_amount_to_send: fees::minimum_send_amount(
				destination_fee_in_coin,
				hub_fee_base_rate,
			),
			min_amount_to_receive: fees::minimum_receive_amount(
				destination_fee_in_coin,
				hub_fee_rate,
				hub_fee_base_rate,
			)?,
		})
	}

	/// The `SEND` transaction handing the coins to the hub.
	pub fn tx_params(&self, multisig_address: &str) -> Result<WithdrawTxParams, WithdrawError> {
		let coin = self
			.hub_coin
			.as_ref()
			.ok_or_else(|| WithdrawError::UnknownCoin(self.coin_symbol.clone()))?;

		let payload = WithdrawPayload {
			recipient: &self.destination_address,
			kind: format!("send_to_{}", self.network),
			fee: to_pip(self.destination_fee_in_coin())?.to_string(),
			smart_wallet_tx: self.smart_wallet_tx.as_deref(),
		};
		let payload = serde_json::to_string(&payload)
			.map_err(|e| WithdrawError::Payload(e.to_string()))?;

		Ok(WithdrawTxParams {
			tx_type: MinterTxType::Send,
			data: SendTxData {
				to: multisig_address.to_string(),
				value: self.amount_to_send,
				coin: coin.minter_id,
			},
			payload,
		})
	}

	/// Same transaction with a zero value, for fee estimation.
	pub fn fee_tx_params(&self, multisig_address: &str) -> Result<WithdrawTxParams, WithdrawError> {
		let mut params = self.tx_params(multisig_address)?;
		params.data.value = Decimal::ZERO;
		Ok(params)
	}
}

/// Fee figures of a withdraw, in coin units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithdrawQuote {
	pub destination_fee_in_coin: Decimal,
	pub hub_fee_base_rate: Decimal,
	pub hub_fee_rate: Decimal,
	pub hub_fee_rate_percent: Decimal,
	pub hub_fee: Decimal,
	pub amount_to_receive: Decimal,
	pub min_amount_to_send: Decimal,
	pub min_amount_to_receive: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MinterTxType {
	#[serde(rename = "0x01")]
	Send,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendTxData {
	pub to: String,
	pub value: Decimal,
	/// Coin id on the wallet chain.
	pub coin: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithdrawTxParams {
	#[serde(rename = "type")]
	pub tx_type: MinterTxType,
	pub data: SendTxData,
	pub payload: String,
}

#[derive(Serialize)]
struct WithdrawPayload<'a> {
	recipient: &'a str,
	#[serde(rename = "type")]
	kind: String,
	/// Destination fee in pips.
	fee: String,
	#[serde(rename = "smartWalletTx", skip_serializing_if = "Option::is_none")]
	smart_wallet_tx: Option<&'a str>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::str::FromStr;

	fn dec(value: &str) -> Decimal {
		Decimal::from_str(value).unwrap()
	}

	fn session() -> WithdrawSession {
		let mut session = WithdrawSession::new(HubNetwork::Ethereum, "USDT");
		session.amount_to_send = dec("1000");
		session.destination_address = "0x4b0897b0513fdc7c541b6d9d7e929c4e5364d2db".to_string();
		session.destination_fee.insert(WithdrawSpeed::Fast, dec("10"));
		session.destination_fee.insert(WithdrawSpeed::Min, dec("4"));
		session.coin_price = dec("2");
		session.hub_coin = Some(HubCoinItem {
			symbol: "USDT".to_string(),
			minter_id: 1993,
			commission: None,
			ethereum: None,
			bsc: None,
		});
		session
	}

	#[test]
	fn test_quote_without_discount() {
		let quote = session().quote().unwrap();
		assert_eq!(quote.destination_fee_in_coin, dec("5"));
		assert_eq!(quote.hub_fee, dec("10"));
		assert_eq!(quote.amount_to_receive, dec("985"));
		assert_eq!(quote.min_amount_to_send, dec("5.050000000000000001"));
		assert_eq!(quote.min_amount_to_receive, honee_types::PIP);
	}

	#[test]
	fn test_quote_uses_speed_and_discount() {
		let mut session = session();
		session.speed = WithdrawSpeed::Min;
		session.discount = dec("0.6");
		let quote = session.quote().unwrap();

		assert_eq!(quote.destination_fee_in_coin, dec("2"));
		assert_eq!(quote.hub_fee_rate, dec("0.004"));
		assert_eq!(quote.hub_fee, dec("4"));
		assert_eq!(quote.amount_to_receive, dec("994"));
		// minimum send ignores the discount
		assert_eq!(quote.min_amount_to_send, dec("2.020000000000000001"));
		assert!(quote.min_amount_to_receive > honee_types::PIP);
	}

	#[test]
	fn test_zero_commission_uses_default_rate() {
		let mut session = session();
		if let Some(coin) = session.hub_coin.as_mut() {
			coin.commission = Some(Decimal::ZERO);
		}
		let quote = session.quote().unwrap();
		assert_eq!(quote.hub_fee_base_rate, dec("0.01"));
		assert_eq!(quote.hub_fee, dec("10"));
		assert_eq!(quote.min_amount_to_send, dec("5.050000000000000001"));
	}

	#[test]
	fn test_missing_speed_fee_is_free() {
		let mut session = session();
		session.destination_fee.clear();
		assert_eq!(session.destination_fee_in_coin(), Decimal::ZERO);
	}

	#[test]
	fn test_tx_params_payload() {
		let params = session()
			.tx_params("Mx68f4839d7f32831b9234f9575f3b95e1afe21a56")
			.unwrap();
		assert_eq!(params.data.coin, 1993);
		assert_eq!(params.data.value, dec("1000"));
		assert_eq!(
			params.payload,
			r#"{"recipient":"0x4b0897b0513fdc7c541b6d9d7e929c4e5364d2db","type":"send_to_ethereum","fee":"5000000000000000000"}"#
		);
	}

	#[test]
	fn test_smart_wallet_tx_in_payload() {
		let mut session = session();
		session.network = HubNetwork::Bsc;
		session.smart_wallet_tx = Some("0xfeed".to_string());
		let params = session.tx_params("Mx68f4839d7f32831b9234f9575f3b95e1afe21a56").unwrap();
		let payload: serde_json::Value = serde_json::from_str(&params.payload).unwrap();
		assert_eq!(payload["type"], "send_to_bsc");
		assert_eq!(payload["smartWalletTx"], "0xfeed");
	}

	#[test]
	fn test_fee_tx_params_zero_value() {
		let session = session();
		let params = session.tx_params("Mx01").unwrap();
		let fee_params = session.fee_tx_params("Mx01").unwrap();
		assert_eq!(fee_params.data.value, Decimal::ZERO);
		assert_eq!(fee_params.payload, params.payload);
	}

	#[test]
	fn test_tx_params_require_hub_coin() {
		let mut session = session();
		session.hub_coin = None;
		assert_eq!(
			session.tx_params("Mx01"),
			Err(WithdrawError::UnknownCoin("USDT".to_string()))
		);
	}
}
