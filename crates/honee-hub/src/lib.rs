//! External REST collaborators of the bridge core.
//!
//! This crate wraps the hub bridge status API, the wallet chain explorer, the
//! swap-to-hub proxy, and declares the smart-wallet relay seam. Each is an
//! async trait with an HTTP implementation under `implementations`.

use async_trait::async_trait;
use honee_types::{Address, Bytes, HubTransfer, MinterTransaction, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Duration;

pub mod implementations {
	pub mod explorer;
	pub mod hub;
	pub mod swap_proxy;
}

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use implementations::explorer::ExplorerClient;
pub use implementations::hub::HubApiClient;
pub use implementations::swap_proxy::SwapProxyClient;

/// Errors that can occur while calling hub-side services.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HubError {
	#[error("Network error: {0}")]
	Network(String),
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
}

impl From<reqwest::Error> for HubError {
	fn from(err: reqwest::Error) -> Self {
		HubError::Network(err.to_string())
	}
}

/// One EVM call of a smart-wallet batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartWalletTx {
	pub to: Address,
	#[serde(default)]
	pub data: Bytes,
	#[serde(default)]
	pub value: U256,
}

/// Parameters of a swap into the hub-bridged token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapToHubParams {
	pub from_token_address: Address,
	pub to_token_address: Address,
	/// Sell amount in base units of the sell token.
	pub amount: U256,
	pub from_address: Address,
	pub destination: Address,
	/// Defaults to `destination` when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refund_to: Option<Address>,
	pub slippage: u32,
	pub disable_estimate: bool,
	pub allow_partial_fill: bool,
}

/// Quote plus the transactions executing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapQuote {
	/// Buy amount in base units of the buy token.
	pub to_token_amount: U256,
	pub tx_list: Vec<SmartWalletTx>,
}

/// Relay reward payment for a smart-wallet call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRewardTxs {
	pub tx_list: Vec<SmartWalletTx>,
	/// Amount of the sell token consumed by the reward, in decimal units.
	pub swap_limit: honee_types::Decimal,
}

/// Bridge status API.
#[async_trait]
pub trait HubInterface: Send + Sync {
	/// One status reading of the transfer started by `hash`.
	async fn get_transfer(&self, hash: &str) -> Result<HubTransfer, HubError>;

	/// Polls until the transfer reaches a terminal status.
	async fn subscribe_transfer(
		&self,
		hash: &str,
		poll_interval: Duration,
	) -> Result<HubTransfer, HubError> {
		loop {
			let transfer = self.get_transfer(hash).await?;
			if transfer.status.is_terminal() {
				return Ok(transfer);
			}
			tracing::debug!(hash = %hash, status = %transfer.status, "Waiting for bridge transfer");
			tokio::time::sleep(poll_interval).await;
		}
	}
}

/// Wallet chain explorer API.
#[async_trait]
pub trait ExplorerInterface: Send + Sync {
	async fn get_transaction(&self, hash: &str) -> Result<MinterTransaction, HubError>;
}

/// Swap-to-hub proxy API.
#[async_trait]
pub trait SwapProxyInterface: Send + Sync {
	async fn build_tx_for_swap(
		&self,
		chain_id: u64,
		params: &SwapToHubParams,
	) -> Result<SwapQuote, HubError>;
}

/// Smart-wallet relay.
///
/// Signing the relayed call belongs to the wallet's key management, so only
/// the seam is declared here.
#[async_trait]
pub trait SmartWalletInterface: Send + Sync {
	/// Builds the transactions paying the relay and estimates their spend.
	async fn build_tx_for_relay_reward(&self) -> Result<RelayRewardTxs, HubError>;

	/// Submits `tx_list` as one smart-wallet call and returns its hash.
	async fn call_smart_wallet(&self, tx_list: Vec<SmartWalletTx>) -> Result<String, HubError>;
}
