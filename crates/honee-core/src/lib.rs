//! Core bridge engine of the Honee wallet.
//!
//! This crate holds the logic behind cross-chain bridge deposits and
//! withdrawals: token decimals resolution, transaction confirmation tracking,
//! fee reconciliation, the staged deposit flow and the smart-wallet swap to
//! hub. Network access goes through the interfaces of `honee-chain` and
//! `honee-hub`, so every component runs the same against fakes.

pub mod builder;
pub mod classifier;
pub mod deposit;
pub mod event_bus;
pub mod fees;
pub mod monitoring;
pub mod smart_wallet;
pub mod tokens;
pub mod transaction;
pub mod withdraw;

pub use builder::{BuilderError, WalletBuilder, WalletCore};
pub use classifier::{classify_deposit_tx, deposit_tx_info, ClassifierError, DepositTxInfo, DepositTxKind};
pub use deposit::{DepositError, DepositOrchestrator, DepositPlan, DepositSession, DepositSettings};
pub use event_bus::EventBus;
pub use monitoring::{TrackOptions, TrackerError, TransactionTracker};
pub use smart_wallet::{SwapCoordinator, SwapError, SwapSession};
pub use tokens::{TokenDecimalsResolver, TokenError};
pub use transaction::{ConfirmedTransaction, TransactionDraft, TransactionService};
pub use withdraw::{WithdrawError, WithdrawQuote, WithdrawSession};
