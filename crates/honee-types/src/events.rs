//! Event types for inter-component communication.
//!
//! Orchestrators publish these on the wallet event bus so observers can
//! follow multi-step flows without holding a reference to the session.

use alloy_primitives::B256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Main event type encompassing all wallet events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalletEvent {
	/// Events from the deposit orchestrator.
	Deposit(DepositEvent),
	/// Events from the transaction service.
	Transaction(TransactionLifecycleEvent),
}

/// Named stages of a bridge deposit, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DepositStage {
	WaitSourceAsset,
	UnwrapNative,
	ApproveBridge,
	SendBridge,
	WaitBridge,
	Finish,
}

impl fmt::Display for DepositStage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			DepositStage::WaitSourceAsset => "wait_source_asset",
			DepositStage::UnwrapNative => "unwrap_native",
			DepositStage::ApproveBridge => "approve_bridge",
			DepositStage::SendBridge => "send_bridge",
			DepositStage::WaitBridge => "wait_bridge",
			DepositStage::Finish => "finish",
		};
		f.write_str(name)
	}
}

/// Events related to deposit sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DepositEvent {
	/// A stage started executing.
	StageStarted { stage: DepositStage },
	/// A stage finished; `tx_hash` is set for on-chain stages.
	StageFinished {
		stage: DepositStage,
		tx_hash: Option<String>,
	},
	/// The deposit arrived on the wallet chain.
	Completed { amount: Decimal },
	/// The session stopped at a stage.
	Failed { stage: DepositStage, reason: String },
}

/// Events related to submitted EVM transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TransactionLifecycleEvent {
	Submitted {
		chain_id: u64,
		tx_hash: B256,
		nonce: u64,
	},
	Confirmed {
		chain_id: u64,
		tx_hash: B256,
		confirmations: u64,
	},
	Failed {
		chain_id: u64,
		tx_hash: B256,
		reason: String,
	},
}
