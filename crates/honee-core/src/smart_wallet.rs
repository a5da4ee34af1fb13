//! Smart-wallet swap to hub.
//!
//! A relayed smart-wallet call pays the relay in the sell token, so the swap
//! can only sell what the relay reward leaves over. The coordinator keeps the
//! latest relay estimate and swap quote and batches both into one call.

use honee_hub::{
	HubError, SmartWalletInterface, SmartWalletTx, SwapProxyInterface, SwapQuote, SwapToHubParams,
};
use honee_types::{from_base_units, to_base_units, truncate_id, Address, ConversionError, Decimal};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::time::Duration;
use tracing::instrument;

const SWAP_SLIPPAGE: u32 = 1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SwapError {
	#[error("Hub error: {0}")]
	Hub(#[from] HubError),
	#[error("Conversion error: {0}")]
	Conversion(#[from] ConversionError),
}

/// What is swapped into the hub-bridged token, and by whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapSession {
	pub chain_id: u64,
	pub evm_account_address: Address,
	pub smart_wallet_address: Address,
	pub sell_token: Address,
	pub sell_decimals: u8,
	pub buy_token: Address,
	pub buy_decimals: u8,
	/// Total sell token budget, relay reward included.
	pub value_to_sell: Decimal,
}

/// Latest swap-to-hub quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapEstimate {
	pub amount_to_buy: Decimal,
	pub quote: SwapQuote,
}

pub struct SwapCoordinator {
	session: SwapSession,
	smart_wallet: Arc<dyn SmartWalletInterface>,
	swap_proxy: Arc<dyn SwapProxyInterface>,
	settle_delay: Duration,
	relay_estimate: Mutex<Option<Decimal>>,
	swap_estimate: Mutex<Option<SwapEstimate>>,
}

impl SwapCoordinator {
	pub fn new(
		session: SwapSession,
		smart_wallet: Arc<dyn SmartWalletInterface>,
		swap_proxy: Arc<dyn SwapProxyInterface>,
		settle_delay: Duration,
	) -> Self {
		Self {
			session,
			smart_wallet,
			swap_proxy,
			settle_delay,
			relay_estimate: Mutex::new(None),
			swap_estimate: Mutex::new(None),
		}
	}

	pub fn session(&self) -> &SwapSession {
		&self.session
	}

	pub fn relay_estimate(&self) -> Option<Decimal> {
		*self.relay_estimate.lock().unwrap_or_else(|p| p.into_inner())
	}

	fn set_relay_estimate(&self, estimate: Option<Decimal>) {
		*self.relay_estimate.lock().unwrap_or_else(|p| p.into_inner()) = estimate;
	}

	pub fn swap_estimate(&self) -> Option<SwapEstimate> {
		self.swap_estimate
			.lock()
			.unwrap_or_else(|p| p.into_inner())
			.clone()
	}

	/// Sell amount left after the relay reward; zero until a positive estimate exists.
	pub fn amount_to_sell_for_swap_to_hub(&self) -> Decimal {
		match self.relay_estimate() {
			Some(estimate) if estimate > Decimal::ZERO => self.session.value_to_sell - estimate,
			_ => Decimal::ZERO,
		}
	}

	pub fn swap_to_hub_params(&self) -> Result<SwapToHubParams, SwapError> {
		let amount = to_base_units(
			self.amount_to_sell_for_swap_to_hub(),
			self.session.sell_decimals,
		)?;
		Ok(SwapToHubParams {
			from_token_address: self.session.sell_token,
			to_token_address: self.session.buy_token,
			amount,
			from_address: self.session.smart_wallet_address,
			destination: self.session.evm_account_address,
			refund_to: Some(self.session.evm_account_address),
			slippage: SWAP_SLIPPAGE,
			disable_estimate: true,
			allow_partial_fill: false,
		})
	}

	/// Re-estimates the relay reward; a failed estimate clears the previous one.
	pub async fn refresh_relay_estimate(&self) -> Result<Decimal, SwapError> {
		match self.smart_wallet.build_tx_for_relay_reward().await {
			Ok(reward) => {
				self.set_relay_estimate(Some(reward.swap_limit));
				Ok(reward.swap_limit)
			},
			Err(e) => {
				self.set_relay_estimate(None);
				Err(e.into())
			},
		}
	}

	/// Quotes the swap for the current sell amount.
	pub async fn refresh_swap_estimate(&self) -> Result<SwapEstimate, SwapError> {
		let params = self.swap_to_hub_params()?;
		let quote = self
			.swap_proxy
			.build_tx_for_swap(self.session.chain_id, &params)
			.await?;
		let estimate = SwapEstimate {
			amount_to_buy: from_base_units(quote.to_token_amount, self.session.buy_decimals)?,
			quote,
		};
		*self.swap_estimate.lock().unwrap_or_else(|p| p.into_inner()) = Some(estimate.clone());
		Ok(estimate)
	}

	/// Pays the relay and swaps the rest in one smart-wallet call.
	///
	/// Returns the hash of the smart-wallet call.
	#[instrument(skip_all, fields(chain_id = self.session.chain_id))]
	pub async fn build_transaction_batch(&self) -> Result<String, SwapError> {
		let reward = self.smart_wallet.build_tx_for_relay_reward().await?;
		self.set_relay_estimate(Some(reward.swap_limit));

		tokio::time::sleep(self.settle_delay).await;

		let swap = self.refresh_swap_estimate().await?;
		tracing::debug!(
			relay_limit = %reward.swap_limit,
			amount_to_buy = %swap.amount_to_buy,
			"Built swap to hub"
		);

		let mut tx_list: Vec<SmartWalletTx> = reward.tx_list;
		tx_list.extend(swap.quote.tx_list);

		let hash = self.smart_wallet.call_smart_wallet(tx_list).await?;
		tracing::info!(hash = %truncate_id(&hash), "Smart wallet call sent");
		Ok(hash)
	}
}
