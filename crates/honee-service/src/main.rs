//! Command-line driver for the Honee bridge core.
//!
//! Loads a TOML configuration, builds the wallet core and runs one bridge
//! operation: reading chain state, tracking a transaction, resolving token
//! decimals, quoting a withdraw or running a deposit.

use clap::{Parser, Subcommand, ValueEnum};
use honee_chain::implementations::evm::alloy::create_sender;
use honee_chain::TransactionSenderInterface;
use honee_config::Config;
use honee_core::monitoring::TransactionEvent;
use honee_core::{DepositSession, TrackOptions, WalletBuilder, WalletCore};
use honee_types::{
	Address, Decimal, HubCoinItem, HubNetwork, PriceItem, SecretString, WalletEvent,
	WithdrawSpeed, B256,
};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Duration;

/// Command-line arguments for the bridge service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config/example.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Prints the current block number of a chain
	BlockNumber {
		#[arg(long)]
		chain_id: Option<u64>,
	},
	/// Follows a transaction until it is confirmed
	Track {
		#[arg(long)]
		chain_id: Option<u64>,
		#[arg(long)]
		hash: B256,
		/// Defaults to the configured confirmation count
		#[arg(long)]
		confirmations: Option<u64>,
	},
	/// Resolves the decimals of an ERC20 token
	Decimals {
		#[arg(long)]
		chain_id: Option<u64>,
		#[arg(long)]
		token: Address,
	},
	/// Quotes the fees of a withdraw from the wallet chain
	WithdrawQuote {
		#[arg(long, value_enum)]
		network: NetworkArg,
		/// Amount to send, in coins
		#[arg(long)]
		amount: Decimal,
		/// Destination network fee in USD
		#[arg(long)]
		fee: Decimal,
		/// Coin price in USD
		#[arg(long)]
		price: Decimal,
		#[arg(long, default_value = "0")]
		discount: Decimal,
		/// Bridge commission of the coin; the configured default applies when absent
		#[arg(long)]
		commission: Option<Decimal>,
		#[arg(long, value_enum, default_value = "fast")]
		speed: SpeedArg,
	},
	/// Bridges coins from an EVM chain to the wallet chain
	Deposit {
		#[arg(long)]
		chain_id: Option<u64>,
		#[arg(long)]
		coin: String,
		#[arg(long)]
		amount: Decimal,
		/// Wallet chain (`Mx...`) address to credit
		#[arg(long)]
		destination: String,
		/// JSON file with the hub coin list
		#[arg(long)]
		coin_list: PathBuf,
		/// Gas price in gwei; the configured fallback applies when absent
		#[arg(long)]
		gas_price: Option<Decimal>,
		#[arg(long, env = "HONEE_PRIVATE_KEY", hide_env_values = true)]
		private_key: String,
	},
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum NetworkArg {
	Ethereum,
	Bsc,
}

impl From<NetworkArg> for HubNetwork {
	fn from(network: NetworkArg) -> Self {
		match network {
			NetworkArg::Ethereum => HubNetwork::Ethereum,
			NetworkArg::Bsc => HubNetwork::Bsc,
		}
	}
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SpeedArg {
	Min,
	Fast,
}

impl From<SpeedArg> for WithdrawSpeed {
	fn from(speed: SpeedArg) -> Self {
		match speed {
			SpeedArg::Min => WithdrawSpeed::Min,
			SpeedArg::Fast => WithdrawSpeed::Fast,
		}
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config_path = args.config.to_string_lossy();
	let config = Config::from_file(&config_path).await?;
	tracing::info!("Loaded configuration [{}]", config_path);

	let core = WalletBuilder::new(config).build()?;
	run(&core, args.command).await
}

async fn run(core: &WalletCore, command: Command) -> Result<(), Box<dyn std::error::Error>> {
	match command {
		Command::BlockNumber { chain_id } => {
			let chain = core.registry().resolve(chain_id)?;
			let number = core.registry().get_block_number(&chain).await?;
			println!("{}", number);
		},
		Command::Track {
			chain_id,
			hash,
			confirmations,
		} => {
			let tracker_config = &core.config().tracker;
			let options = TrackOptions::with_confirmations(
				confirmations.unwrap_or(tracker_config.confirmation_count),
			)
			.poll_interval(Duration::from_secs(tracker_config.poll_interval_seconds));

			let (mut subscription, pending) = core.tracker().subscribe(hash, chain_id, options)?;
			while let Some(event) = subscription.next_event().await {
				match event {
					TransactionEvent::Seen(tx) => {
						tracing::info!(pending = !tx.is_mined(), "Transaction seen")
					},
					TransactionEvent::Confirmation(tracked) => {
						tracing::info!(confirmations = tracked.confirmations, "Confirmation")
					},
					TransactionEvent::Confirmed(_) => break,
				}
			}
			let tracked = pending.wait().await?;
			println!("{}", serde_json::to_string_pretty(&tracked)?);
		},
		Command::Decimals { chain_id, token } => {
			let decimals = core.tokens().get_decimals(token, chain_id, &[]).await?;
			println!("{}", decimals);
		},
		Command::WithdrawQuote {
			network,
			amount,
			fee,
			price,
			discount,
			commission,
			speed,
		} => {
			let mut session = core.withdraw_session(network.into(), "");
			session.amount_to_send = amount;
			session.coin_price = price;
			session.discount = discount;
			session.speed = speed.into();
			session.destination_fee = HashMap::from([(session.speed, fee)]);
			session.hub_coin = commission.map(|commission| HubCoinItem {
				symbol: String::new(),
				minter_id: 0,
				commission: Some(commission),
				ethereum: None,
				bsc: None,
			});
			println!("{}", serde_json::to_string_pretty(&session.quote()?)?);
		},
		Command::Deposit {
			chain_id,
			coin,
			amount,
			destination,
			coin_list,
			gas_price,
			private_key,
		} => {
			let chain = core.registry().resolve(chain_id)?;
			let sender = create_sender(&SecretString::from(private_key), &core.config().chains)?;
			let orchestrator = core.deposit_orchestrator(sender.clone());

			let mut session = DepositSession::new(
				Some(chain.chain_id),
				sender.address(),
				destination,
				coin,
				amount,
			);
			session.hub_coin_list = serde_json::from_str(&tokio::fs::read_to_string(coin_list).await?)?;
			if let Some(gas_price) = gas_price {
				session.price_list.push(PriceItem {
					name: format!("{}/gas", chain.hub_network),
					value: gas_price,
				});
			}

			let progress = tokio::spawn(log_deposit_progress(core.event_bus().subscribe()));

			let received = orchestrator.deposit(&mut session).await;
			progress.abort();
			println!("{}", received?);
		},
	}

	Ok(())
}

/// Logs deposit events until the bus closes and returns how many were logged.
async fn log_deposit_progress(mut events: broadcast::Receiver<WalletEvent>) -> usize {
	let mut logged = 0;
	loop {
		match events.recv().await {
			Ok(WalletEvent::Deposit(event)) => {
				tracing::info!(?event, "Deposit progress");
				logged += 1;
			},
			Ok(_) => {},
			Err(RecvError::Lagged(skipped)) => {
				tracing::warn!(skipped, "Deposit progress lagged");
			},
			Err(RecvError::Closed) => return logged,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use honee_types::{DepositEvent, DepositStage};

	fn started(stage: DepositStage) -> WalletEvent {
		WalletEvent::Deposit(DepositEvent::StageStarted { stage })
	}

	#[tokio::test]
	async fn test_progress_survives_lag() {
		let (tx, rx) = broadcast::channel(1);
		tx.send(started(DepositStage::WaitSourceAsset)).unwrap();
		tx.send(started(DepositStage::UnwrapNative)).unwrap();
		tx.send(started(DepositStage::SendBridge)).unwrap();
		drop(tx);

		assert_eq!(log_deposit_progress(rx).await, 1);
	}
}
