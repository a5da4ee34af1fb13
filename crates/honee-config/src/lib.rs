//! Configuration module for the Honee bridge core.
//!
//! This module provides structures and utilities for managing wallet bridge
//! configuration. It supports loading configuration from TOML files, resolving
//! `${VAR}` references from the environment, and validating that every chain,
//! endpoint and tuning value is usable before any component is built.
//!
//! A file may split sections out with `include = ["chains.toml"]`; see the
//! loader for the merge rules.

mod loader;

use alloy_primitives::Address;
use honee_types::{HubNetwork, WalletNetwork};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	/// A value parsed but is unusable.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the Honee bridge core.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub wallet: WalletConfig,
	/// EVM chains keyed by chain id.
	#[serde(deserialize_with = "deserialize_chains")]
	pub chains: HashMap<u64, ChainConfig>,
	pub hub: HubConfig,
	pub explorer: ExplorerConfig,
	pub swap_proxy: SwapProxyConfig,
	#[serde(default)]
	pub tracker: TrackerConfig,
	#[serde(default)]
	pub deposit: DepositConfig,
	#[serde(default)]
	pub smart_wallet: SmartWalletConfig,
}

/// Wallet-wide settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
	/// Mainnet or testnet; testnet inflates deposit gas prices.
	#[serde(default)]
	pub network: WalletNetwork,
	/// Chain used when a caller gives no chain id.
	pub default_chain_id: u64,
}

/// One EVM chain the bridge serves.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
	pub name: String,
	pub rpc_url: String,
	pub hub_network: HubNetwork,
	/// Hub bridge contract receiving deposits.
	pub hub_contract_address: String,
	/// WETH/WBNB contract, which also identifies the native coin.
	pub wrapped_native_contract_address: String,
}

/// Hub bridge service settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
	pub api_url: String,
	/// Wallet chain address that receives withdrawals.
	pub minter_multisig_address: String,
	/// Fee rate used when a coin declares no commission.
	#[serde(default = "default_fee_rate")]
	pub default_fee_rate: Decimal,
	#[serde(default = "default_transfer_poll_interval_seconds")]
	pub transfer_poll_interval_seconds: u64,
}

/// Returns the default bridge fee rate (1%).
fn default_fee_rate() -> Decimal {
	Decimal::new(1, 2)
}

/// Returns the default interval between bridge status polls.
fn default_transfer_poll_interval_seconds() -> u64 {
	5
}

/// Explorer API settings for the wallet chain.
#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerConfig {
	pub api_url: String,
}

/// Swap-to-hub proxy settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SwapProxyConfig {
	pub api_url: String,
}

/// Transaction confirmation tracking settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
	#[serde(default = "default_confirmation_count")]
	pub confirmation_count: u64,
	#[serde(default = "default_poll_interval_seconds")]
	pub poll_interval_seconds: u64,
	/// How long a fetched block number is reused.
	#[serde(default = "default_block_cache_ttl_ms")]
	pub block_cache_ttl_ms: u64,
}

impl Default for TrackerConfig {
	fn default() -> Self {
		Self {
			confirmation_count: default_confirmation_count(),
			poll_interval_seconds: default_poll_interval_seconds(),
			block_cache_ttl_ms: default_block_cache_ttl_ms(),
		}
	}
}

/// Returns the default number of confirmations required.
fn default_confirmation_count() -> u64 {
	5
}

fn default_poll_interval_seconds() -> u64 {
	10
}

fn default_block_cache_ttl_ms() -> u64 {
	5000
}

/// Deposit gas budgeting.
#[derive(Debug, Clone, Deserialize)]
pub struct DepositConfig {
	/// Gas price used when the price feed has no `{network}/gas` item.
	#[serde(default = "default_fallback_gas_price_gwei")]
	pub fallback_gas_price_gwei: Decimal,
	#[serde(default = "default_testnet_gas_price_multiplier")]
	pub testnet_gas_price_multiplier: Decimal,
	#[serde(default = "default_gas_limit_unwrap")]
	pub gas_limit_unwrap: u64,
	#[serde(default = "default_gas_limit_approve")]
	pub gas_limit_approve: u64,
	#[serde(default = "default_gas_limit_bridge")]
	pub gas_limit_bridge: u64,
	#[serde(default = "default_gas_limit_swap")]
	pub gas_limit_swap: u64,
}

impl Default for DepositConfig {
	fn default() -> Self {
		Self {
			fallback_gas_price_gwei: default_fallback_gas_price_gwei(),
			testnet_gas_price_multiplier: default_testnet_gas_price_multiplier(),
			gas_limit_unwrap: default_gas_limit_unwrap(),
			gas_limit_approve: default_gas_limit_approve(),
			gas_limit_bridge: default_gas_limit_bridge(),
			gas_limit_swap: default_gas_limit_swap(),
		}
	}
}

fn default_fallback_gas_price_gwei() -> Decimal {
	Decimal::new(100, 0)
}

fn default_testnet_gas_price_multiplier() -> Decimal {
	Decimal::new(10, 0)
}

fn default_gas_limit_unwrap() -> u64 {
	50_000
}

fn default_gas_limit_approve() -> u64 {
	75_000
}

fn default_gas_limit_bridge() -> u64 {
	75_000
}

fn default_gas_limit_swap() -> u64 {
	200_000
}

/// Smart-wallet swap coordination.
#[derive(Debug, Clone, Deserialize)]
pub struct SmartWalletConfig {
	/// Pause between storing the relay estimate and reading the derived sell amount.
	#[serde(default = "default_settle_delay_ms")]
	pub settle_delay_ms: u64,
}

impl Default for SmartWalletConfig {
	fn default() -> Self {
		Self {
			settle_delay_ms: default_settle_delay_ms(),
		}
	}
}

fn default_settle_delay_ms() -> u64 {
	50
}

/// Deserializes the chains table, whose TOML keys are chain id strings.
fn deserialize_chains<'de, D>(deserializer: D) -> Result<HashMap<u64, ChainConfig>, D::Error>
where
	D: Deserializer<'de>,
{
	let raw: HashMap<String, ChainConfig> = HashMap::deserialize(deserializer)?;
	raw.into_iter()
		.map(|(key, chain)| {
			key.parse::<u64>()
				.map(|chain_id| (chain_id, chain))
				.map_err(|_| serde::de::Error::custom(format!("Invalid chain id: {}", key)))
		})
		.collect()
}

/// Expands `${VAR}` and `${VAR:-default}` references from the environment.
///
/// Inputs above 1 MiB are rejected before matching.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_LEN: usize = 1 << 20;
	if input.len() > MAX_INPUT_LEN {
		return Err(ConfigError::Validation(format!(
			"Configuration is {} bytes, the limit is {}",
			input.len(),
			MAX_INPUT_LEN
		)));
	}

	let pattern = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Invalid variable pattern: {}", e)))?;

	let mut missing = None;
	let expanded = pattern.replace_all(input, |caps: &regex::Captures<'_>| {
		let name = &caps[1];
		match (std::env::var(name), caps.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				missing.get_or_insert_with(|| name.to_string());
				String::new()
			},
		}
	});

	match missing {
		Some(name) => Err(ConfigError::Validation(format!(
			"Environment variable '{}' is not set",
			name
		))),
		None => Ok(expanded.into_owned()),
	}
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration to ensure all required fields are properly set.
	///
	/// - At least one chain, and the default chain among them
	/// - Every configured address parses as an EVM address
	/// - Endpoint URLs are not empty
	/// - Polling intervals, TTLs and confirmation counts are positive
	/// - Fee rate is a fraction in [0, 1)
	fn validate(&self) -> Result<(), ConfigError> {
		if self.chains.is_empty() {
			return Err(ConfigError::Validation(
				"At least one chain must be configured".into(),
			));
		}
		if !self.chains.contains_key(&self.wallet.default_chain_id) {
			return Err(ConfigError::Validation(format!(
				"Default chain {} not found in chains",
				self.wallet.default_chain_id
			)));
		}

		for (chain_id, chain) in &self.chains {
			if *chain_id == 0 {
				return Err(ConfigError::Validation("Chain id 0 is not allowed".into()));
			}
			if chain.rpc_url.is_empty() {
				return Err(ConfigError::Validation(format!(
					"Chain {} must have rpc_url",
					chain_id
				)));
			}
			validate_address(
				&chain.hub_contract_address,
				&format!("chains.{}.hub_contract_address", chain_id),
			)?;
			validate_address(
				&chain.wrapped_native_contract_address,
				&format!("chains.{}.wrapped_native_contract_address", chain_id),
			)?;
		}

		if self.hub.api_url.is_empty() {
			return Err(ConfigError::Validation("hub.api_url cannot be empty".into()));
		}
		if !self.hub.minter_multisig_address.starts_with("Mx") {
			return Err(ConfigError::Validation(format!(
				"hub.minter_multisig_address must be a wallet chain address, got '{}'",
				self.hub.minter_multisig_address
			)));
		}
		if self.hub.default_fee_rate.is_sign_negative() || self.hub.default_fee_rate >= Decimal::ONE
		{
			return Err(ConfigError::Validation(
				"hub.default_fee_rate must be within [0, 1)".into(),
			));
		}
		if self.hub.transfer_poll_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"hub.transfer_poll_interval_seconds must be greater than 0".into(),
			));
		}

		if self.explorer.api_url.is_empty() {
			return Err(ConfigError::Validation(
				"explorer.api_url cannot be empty".into(),
			));
		}
		if self.swap_proxy.api_url.is_empty() {
			return Err(ConfigError::Validation(
				"swap_proxy.api_url cannot be empty".into(),
			));
		}

		if self.tracker.confirmation_count == 0 {
			return Err(ConfigError::Validation(
				"tracker.confirmation_count must be at least 1".into(),
			));
		}
		if self.tracker.poll_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"tracker.poll_interval_seconds must be greater than 0".into(),
			));
		}
		if self.tracker.block_cache_ttl_ms == 0 {
			return Err(ConfigError::Validation(
				"tracker.block_cache_ttl_ms must be greater than 0".into(),
			));
		}

		if self.deposit.fallback_gas_price_gwei <= Decimal::ZERO {
			return Err(ConfigError::Validation(
				"deposit.fallback_gas_price_gwei must be positive".into(),
			));
		}
		if self.deposit.testnet_gas_price_multiplier < Decimal::ONE {
			return Err(ConfigError::Validation(
				"deposit.testnet_gas_price_multiplier must be at least 1".into(),
			));
		}

		Ok(())
	}
}

fn validate_address(value: &str, field: &str) -> Result<(), ConfigError> {
	Address::from_str(value)
		.map(|_| ())
		.map_err(|e| ConfigError::Validation(format!("Invalid {}: {}", field, e)))
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved and the configuration is validated
/// after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
