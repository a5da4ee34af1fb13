//! Wires the bridge core from configuration.
//!
//! `WalletBuilder` creates the read-side services once. Components that sign
//! (the transaction service and the deposit orchestrator) are created per
//! sender from the resulting `WalletCore`.

use crate::deposit::{DepositOrchestrator, DepositSettings};
use crate::event_bus::EventBus;
use crate::monitoring::TransactionTracker;
use crate::smart_wallet::{SwapCoordinator, SwapSession};
use crate::tokens::TokenDecimalsResolver;
use crate::transaction::TransactionService;
use crate::withdraw::WithdrawSession;
use honee_chain::{ChainError, ChainRegistry, NonceSequencer, TransactionSenderInterface};
use honee_config::Config;
use honee_hub::{
	ExplorerClient, ExplorerInterface, HubApiClient, HubInterface, SmartWalletInterface,
	SwapProxyClient, SwapProxyInterface,
};
use honee_types::HubNetwork;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Duration;

const EVENT_BUS_CAPACITY: usize = 1000;

#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Chain error: {0}")]
	Chain(#[from] ChainError),
}

/// Shared services of one wallet.
pub struct WalletCore {
	config: Config,
	registry: Arc<ChainRegistry>,
	tokens: Arc<TokenDecimalsResolver>,
	tracker: Arc<TransactionTracker>,
	nonces: NonceSequencer,
	event_bus: EventBus,
	hub: Arc<dyn HubInterface>,
	explorer: Arc<dyn ExplorerInterface>,
	swap_proxy: Arc<dyn SwapProxyInterface>,
}

impl WalletCore {
	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn registry(&self) -> &Arc<ChainRegistry> {
		&self.registry
	}

	pub fn tokens(&self) -> &Arc<TokenDecimalsResolver> {
		&self.tokens
	}

	pub fn tracker(&self) -> &Arc<TransactionTracker> {
		&self.tracker
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn hub(&self) -> &Arc<dyn HubInterface> {
		&self.hub
	}

	pub fn explorer(&self) -> &Arc<dyn ExplorerInterface> {
		&self.explorer
	}

	/// Sends through `sender`, sequencing nonces with every other service of this core.
	pub fn transaction_service(
		&self,
		sender: Arc<dyn TransactionSenderInterface>,
	) -> Arc<TransactionService> {
		Arc::new(TransactionService::new(
			sender,
			self.nonces.clone(),
			self.tracker.clone(),
			self.event_bus.clone(),
			self.config.tracker.confirmation_count,
			Duration::from_secs(self.config.tracker.poll_interval_seconds),
		))
	}

	pub fn deposit_orchestrator(
		&self,
		sender: Arc<dyn TransactionSenderInterface>,
	) -> DepositOrchestrator {
		DepositOrchestrator::new(
			self.registry.clone(),
			self.tokens.clone(),
			self.transaction_service(sender),
			self.hub.clone(),
			self.explorer.clone(),
			self.event_bus.clone(),
			DepositSettings::from_config(&self.config),
		)
	}

	/// A withdraw session using the configured default hub fee rate.
	pub fn withdraw_session(&self, network: HubNetwork, coin_symbol: &str) -> WithdrawSession {
		let mut session = WithdrawSession::new(network, coin_symbol);
		session.default_fee_rate = self.config.hub.default_fee_rate;
		session
	}

	pub fn swap_coordinator(
		&self,
		session: SwapSession,
		smart_wallet: Arc<dyn SmartWalletInterface>,
	) -> SwapCoordinator {
		SwapCoordinator::new(
			session,
			smart_wallet,
			self.swap_proxy.clone(),
			Duration::from_millis(self.config.smart_wallet.settle_delay_ms),
		)
	}
}

pub struct WalletBuilder {
	config: Config,
}

impl WalletBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the core with HTTP clients for every configured endpoint.
	pub fn build(self) -> Result<WalletCore, BuilderError> {
		let registry = Arc::new(ChainRegistry::from_config(&self.config)?);
		let hub = Arc::new(HubApiClient::from_config(&self.config.hub));
		let explorer = Arc::new(ExplorerClient::from_config(&self.config.explorer));
		let swap_proxy = Arc::new(SwapProxyClient::from_config(&self.config.swap_proxy));
		self.build_with(registry, hub, explorer, swap_proxy)
	}

	/// Builds the core around caller-provided collaborators.
	pub fn build_with(
		self,
		registry: Arc<ChainRegistry>,
		hub: Arc<dyn HubInterface>,
		explorer: Arc<dyn ExplorerInterface>,
		swap_proxy: Arc<dyn SwapProxyInterface>,
	) -> Result<WalletCore, BuilderError> {
		if registry.resolve(Some(self.config.wallet.default_chain_id)).is_err() {
			return Err(BuilderError::Config(format!(
				"Default chain {} is not registered",
				self.config.wallet.default_chain_id
			)));
		}

		tracing::info!(
			chains = ?registry.chain_ids(),
			network = ?self.config.wallet.network,
			"Wallet core ready"
		);

		Ok(WalletCore {
			tokens: Arc::new(TokenDecimalsResolver::new(registry.clone())),
			tracker: Arc::new(TransactionTracker::new(registry.clone())),
			nonces: NonceSequencer::new(),
			event_bus: EventBus::new(EVENT_BUS_CAPACITY),
			registry,
			hub,
			explorer,
			swap_proxy,
			config: self.config,
		})
	}
}
