//! Bridge deposit orchestration.
//!
//! A deposit moves coins from an EVM chain to the wallet chain through the hub
//! bridge. Stages run strictly in order, and stages that do not apply are
//! skipped:
//!
//! `WaitSourceAsset -> UnwrapNative -> ApproveBridge -> SendBridge -> WaitBridge -> Finish`
//!
//! The native coin is bridged as the transaction value. When part of it is
//! still wrapped, the shortfall is unwrapped first. Approve and swap steps are
//! never required: ERC20 deposits rely on an allowance set up front, and swaps
//! go through the smart wallet.

use crate::event_bus::EventBus;
use crate::monitoring::TrackerError;
use crate::tokens::{TokenDecimalsResolver, TokenError};
use crate::transaction::{TransactionDraft, TransactionService};
use honee_chain::contracts::{encode_transfer_eth_to_chain, encode_transfer_to_chain, encode_unwrap};
use honee_chain::{ChainError, ChainHandle, ChainRegistry};
use honee_config::Config;
use honee_hub::{ExplorerInterface, HubError, HubInterface};
use honee_types::{
	find_hub_coin, find_price, from_base_units, gwei_to_wei, minter_address_to_bytes32,
	to_base_units, truncate_id, Address, ConversionError, Decimal, DepositEvent, DepositStage,
	HubCoinItem, HubNetwork, PriceItem, TransferStatus, WalletEvent, WalletNetwork, U256,
};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Duration;
use tracing::instrument;

/// Decimals of the native coin of every supported chain.
const NATIVE_DECIMALS: u8 = 18;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DepositError {
	#[error("Unsuccessful bridge transfer: {0}")]
	BridgeTransferFailed(TransferStatus),
	#[error("Invalid bridge output: {0}")]
	InvalidBridgeOutput(String),
	#[error("Token {0} is not bridged from this chain")]
	UnsupportedToken(String),
	#[error("Transaction error: {0}")]
	Tracker(#[from] TrackerError),
	#[error("Chain error: {0}")]
	Chain(#[from] ChainError),
	#[error("Token error: {0}")]
	Token(#[from] TokenError),
	#[error("Hub error: {0}")]
	Hub(#[from] HubError),
	#[error("Conversion error: {0}")]
	Conversion(#[from] ConversionError),
}

/// Gas budgeting and polling knobs.
#[derive(Debug, Clone)]
pub struct DepositSettings {
	pub wallet_network: WalletNetwork,
	pub fallback_gas_price_gwei: Decimal,
	pub testnet_gas_price_multiplier: Decimal,
	pub gas_limit_unwrap: u64,
	pub gas_limit_approve: u64,
	pub gas_limit_bridge: u64,
	pub gas_limit_swap: u64,
	pub transfer_poll_interval: Duration,
}

impl DepositSettings {
	pub fn from_config(config: &Config) -> Self {
		Self {
			wallet_network: config.wallet.network,
			fallback_gas_price_gwei: config.deposit.fallback_gas_price_gwei,
			testnet_gas_price_multiplier: config.deposit.testnet_gas_price_multiplier,
			gas_limit_unwrap: config.deposit.gas_limit_unwrap,
			gas_limit_approve: config.deposit.gas_limit_approve,
			gas_limit_bridge: config.deposit.gas_limit_bridge,
			gas_limit_swap: config.deposit.gas_limit_swap,
			transfer_poll_interval: Duration::from_secs(config.hub.transfer_poll_interval_seconds),
		}
	}
}

impl Default for DepositSettings {
	fn default() -> Self {
		Self {
			wallet_network: WalletNetwork::Mainnet,
			fallback_gas_price_gwei: Decimal::new(100, 0),
			testnet_gas_price_multiplier: Decimal::new(10, 0),
			gas_limit_unwrap: 50_000,
			gas_limit_approve: 75_000,
			gas_limit_bridge: 75_000,
			gas_limit_swap: 200_000,
			transfer_poll_interval: Duration::from_secs(5),
		}
	}
}

/// Progress of one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepData {
	pub amount: Option<Decimal>,
	pub coin: Option<String>,
	pub tx_hash: Option<String>,
	pub finished: bool,
}

/// Inputs and progress of one deposit.
#[derive(Debug, Clone)]
pub struct DepositSession {
	pub chain_id: Option<u64>,
	pub account_address: Address,
	/// Wallet chain (`Mx...`) address credited by the bridge.
	pub destination_minter_address: String,
	pub token_symbol: String,
	pub amount: Decimal,
	/// Unwrapped native balance; refreshed from the chain when the deposit starts.
	pub native_balance: Decimal,
	pub price_list: Vec<PriceItem>,
	pub hub_coin_list: Vec<HubCoinItem>,
	pub loading_stage: Option<DepositStage>,
	pub steps: BTreeMap<DepositStage, StepData>,
}

impl DepositSession {
	pub fn new(
		chain_id: Option<u64>,
		account_address: Address,
		destination_minter_address: impl Into<String>,
		token_symbol: impl Into<String>,
		amount: Decimal,
	) -> Self {
		Self {
			chain_id,
			account_address,
			destination_minter_address: destination_minter_address.into(),
			token_symbol: token_symbol.into(),
			amount,
			native_balance: Decimal::ZERO,
			price_list: Vec::new(),
			hub_coin_list: Vec::new(),
			loading_stage: None,
			steps: BTreeMap::new(),
		}
	}

	fn step(&mut self, stage: DepositStage) -> &mut StepData {
		self.steps.entry(stage).or_default()
	}
}

/// Derived figures of a deposit, recomputed from the session on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositPlan {
	pub token_address: Address,
	pub token_decimals: u8,
	pub is_native_token: bool,
	pub amount_to_unwrap: Decimal,
	pub is_unwrap_required: bool,
	pub is_approve_required: bool,
	pub is_swap_required: bool,
	pub gas_price_gwei: Decimal,
	pub gas_total_fee: Decimal,
	pub deposit_amount_after_gas: Decimal,
}

/// Native coins still wrapped that must be unwrapped to cover `amount`.
pub fn amount_to_unwrap(amount: Decimal, native_balance: Decimal) -> Decimal {
	(amount - native_balance).max(Decimal::ZERO)
}

/// Gas price from the `{network}/gas` feed item, inflated off mainnet.
pub fn gas_price_gwei(
	price_list: &[PriceItem],
	network: HubNetwork,
	settings: &DepositSettings,
) -> Decimal {
	let price = find_price(price_list, &format!("{}/gas", network))
		.unwrap_or(settings.fallback_gas_price_gwei);
	if settings.wallet_network.is_mainnet() {
		price
	} else {
		price * settings.testnet_gas_price_multiplier
	}
}

/// Native coin spent on gas for `gas_limit` at `gas_price_gwei`.
pub fn gas_total_fee(gas_price_gwei: Decimal, gas_limit: u64) -> Decimal {
	gas_price_gwei * Decimal::new(1, 9) * Decimal::from(gas_limit)
}

pub fn deposit_amount_after_gas(amount: Decimal, gas_total_fee: Decimal) -> Decimal {
	(amount - gas_total_fee).max(Decimal::ZERO)
}

pub struct DepositOrchestrator {
	registry: Arc<ChainRegistry>,
	tokens: Arc<TokenDecimalsResolver>,
	transactions: Arc<TransactionService>,
	hub: Arc<dyn HubInterface>,
	explorer: Arc<dyn ExplorerInterface>,
	event_bus: EventBus,
	settings: DepositSettings,
}

impl DepositOrchestrator {
	pub fn new(
		registry: Arc<ChainRegistry>,
		tokens: Arc<TokenDecimalsResolver>,
		transactions: Arc<TransactionService>,
		hub: Arc<dyn HubInterface>,
		explorer: Arc<dyn ExplorerInterface>,
		event_bus: EventBus,
		settings: DepositSettings,
	) -> Self {
		Self {
			registry,
			tokens,
			transactions,
			hub,
			explorer,
			event_bus,
			settings,
		}
	}

	/// Derives the deposit figures for the session's current inputs.
	pub async fn plan(&self, session: &DepositSession) -> Result<DepositPlan, DepositError> {
		let chain = self.registry.resolve(session.chain_id)?;
		self.plan_on(&chain, session).await
	}

	async fn plan_on(
		&self,
		chain: &ChainHandle,
		session: &DepositSession,
	) -> Result<DepositPlan, DepositError> {
		let external = find_hub_coin(&session.hub_coin_list, &session.token_symbol)
			.and_then(|coin| coin.token_on(chain.hub_network))
			.ok_or_else(|| DepositError::UnsupportedToken(session.token_symbol.clone()))?;
		let token_address = Address::from_str(&external.external_token_id)
			.map_err(|_| ConversionError::InvalidAddress(external.external_token_id.clone()))?;
		let token_decimals = self
			.tokens
			.get_decimals(token_address, Some(chain.chain_id), &session.hub_coin_list)
			.await?;

		let is_native_token = chain.is_native_token(&token_address);
		let amount_to_unwrap = amount_to_unwrap(session.amount, session.native_balance);
		let is_unwrap_required = is_native_token && amount_to_unwrap > Decimal::ZERO;
		let is_approve_required = false;
		let is_swap_required = false;

		let mut gas_limit = self.settings.gas_limit_bridge;
		if is_unwrap_required {
			gas_limit += self.settings.gas_limit_unwrap;
		}
		if is_approve_required {
			gas_limit += self.settings.gas_limit_approve;
		}
		if is_swap_required {
			gas_limit += self.settings.gas_limit_swap;
		}

		let gas_price_gwei = gas_price_gwei(&session.price_list, chain.hub_network, &self.settings);
		let gas_total_fee = gas_total_fee(gas_price_gwei, gas_limit);
		// gas is paid in the native coin, so token deposits keep the full amount
		let deposit_amount_after_gas = if is_native_token {
			deposit_amount_after_gas(session.amount, gas_total_fee)
		} else {
			session.amount
		};

		Ok(DepositPlan {
			token_address,
			token_decimals,
			is_native_token,
			amount_to_unwrap,
			is_unwrap_required,
			is_approve_required,
			is_swap_required,
			gas_price_gwei,
			gas_total_fee,
			deposit_amount_after_gas,
		})
	}

	/// Runs the deposit to completion and returns the amount credited on the wallet chain.
	#[instrument(skip_all, fields(chain_id = ?session.chain_id, coin = %session.token_symbol))]
	pub async fn deposit(&self, session: &mut DepositSession) -> Result<Decimal, DepositError> {
		match self.execute(session).await {
			Ok(amount) => Ok(amount),
			Err(e) => {
				let stage = session.loading_stage.unwrap_or(DepositStage::WaitSourceAsset);
				tracing::warn!(stage = %stage, error = %e, "Deposit failed");
				self.publish(DepositEvent::Failed {
					stage,
					reason: e.to_string(),
				});
				Err(e)
			},
		}
	}

	async fn execute(&self, session: &mut DepositSession) -> Result<Decimal, DepositError> {
		let chain = self.registry.resolve(session.chain_id)?;

		self.start_stage(session, DepositStage::WaitSourceAsset);
		let balance = chain.rpc().get_balance(session.account_address).await?;
		session.native_balance = from_base_units(balance, NATIVE_DECIMALS)?;
		self.finish_stage(session, DepositStage::WaitSourceAsset, None);

		let plan = self.plan_on(&chain, session).await?;
		let gas_price = gwei_to_wei(plan.gas_price_gwei)?;

		if plan.is_unwrap_required {
			self.start_stage(session, DepositStage::UnwrapNative);
			session.step(DepositStage::UnwrapNative).amount = Some(plan.amount_to_unwrap);

			let draft = TransactionDraft {
				to: chain.wrapped_native_contract_address,
				data: encode_unwrap(to_base_units(plan.amount_to_unwrap, plan.token_decimals)?),
				value: U256::ZERO,
				gas_price,
				gas_limit: self.settings.gas_limit_unwrap,
			};
			let confirmed = self.transactions.send_and_confirm(&chain, draft).await?;
			self.finish_stage(
				session,
				DepositStage::UnwrapNative,
				Some(confirmed.submitted.transaction_hash.to_string()),
			);
		}

		let symbol = session.token_symbol.clone();
		self.start_stage(session, DepositStage::SendBridge);
		{
			let step = session.step(DepositStage::SendBridge);
			step.coin = Some(symbol.clone());
			step.amount = Some(plan.deposit_amount_after_gas);
		}
		let destination = minter_address_to_bytes32(&session.destination_minter_address)?;
		let (data, value) = if plan.is_native_token {
			(
				encode_transfer_eth_to_chain(destination),
				to_base_units(plan.deposit_amount_after_gas, NATIVE_DECIMALS)?,
			)
		} else {
			(
				encode_transfer_to_chain(
					plan.token_address,
					destination,
					to_base_units(plan.deposit_amount_after_gas, plan.token_decimals)?,
				),
				U256::ZERO,
			)
		};
		let draft = TransactionDraft {
			to: chain.hub_contract_address,
			data,
			value,
			gas_price,
			gas_limit: self.settings.gas_limit_bridge,
		};
		let deposit_tx = self.transactions.send_and_confirm(&chain, draft).await?;
		let deposit_hash = deposit_tx.submitted.transaction_hash.to_string();
		self.finish_stage(session, DepositStage::SendBridge, Some(deposit_hash.clone()));

		self.start_stage(session, DepositStage::WaitBridge);
		session.step(DepositStage::WaitBridge).coin = Some(symbol);
		let (out_tx_hash, amount) = self.wait_bridge(session, &deposit_hash).await?;
		session.step(DepositStage::WaitBridge).amount = Some(amount);
		self.finish_stage(session, DepositStage::WaitBridge, Some(out_tx_hash));

		self.start_stage(session, DepositStage::Finish);
		self.finish_stage(session, DepositStage::Finish, None);
		self.publish(DepositEvent::Completed { amount });
		tracing::info!(amount = %amount, "Deposit completed");

		Ok(amount)
	}

	/// Waits for the hub to execute the transfer and checks what it paid out.
	async fn wait_bridge(
		&self,
		session: &DepositSession,
		deposit_hash: &str,
	) -> Result<(String, Decimal), DepositError> {
		let transfer = self
			.hub
			.subscribe_transfer(deposit_hash, self.settings.transfer_poll_interval)
			.await?;
		if transfer.status != TransferStatus::BatchExecuted {
			return Err(DepositError::BridgeTransferFailed(transfer.status));
		}

		let out_tx_hash = transfer.out_tx_hash.ok_or_else(|| {
			DepositError::InvalidBridgeOutput("Bridge transfer has no output transaction".to_string())
		})?;
		tracing::debug!(out_tx_hash = %truncate_id(&out_tx_hash), "Bridge transfer executed");

		let output = self.explorer.get_transaction(&out_tx_hash).await?;
		if output.data.list.is_none() {
			return Err(DepositError::InvalidBridgeOutput(
				"Output transaction has invalid data".to_string(),
			));
		}
		let item = output
			.find_transfer(&session.destination_minter_address, &session.token_symbol)
			.ok_or_else(|| {
				DepositError::InvalidBridgeOutput(format!(
					"Output transaction does not include {} deposit to {}",
					session.token_symbol, session.destination_minter_address
				))
			})?;

		Ok((out_tx_hash, item.value))
	}

	fn start_stage(&self, session: &mut DepositSession, stage: DepositStage) {
		session.loading_stage = Some(stage);
		session.step(stage);
		tracing::debug!(stage = %stage, "Deposit stage started");
		self.publish(DepositEvent::StageStarted { stage });
	}

	fn finish_stage(&self, session: &mut DepositSession, stage: DepositStage, tx_hash: Option<String>) {
		let step = session.step(stage);
		step.finished = true;
		step.tx_hash = tx_hash.clone();
		self.publish(DepositEvent::StageFinished { stage, tx_hash });
	}

	fn publish(&self, event: DepositEvent) {
		self.event_bus.publish(WalletEvent::Deposit(event)).ok();
	}
}
