//! Common types module for the Honee bridge core.
//!
//! This module defines the data types shared by the chain, hub and core
//! crates: EVM transaction records, the hub coin list, bridge transfer
//! statuses, explorer transactions, price feed items and lifecycle events.

/// EVM chain records: transactions, receipts, blocks and outbound requests.
pub mod chain;
/// Event types published on the wallet event bus.
pub mod events;
/// Explorer (native chain) transaction types.
pub mod explorer;
/// Hub bridge types: networks, coin list, transfer status.
pub mod hub;
/// Price feed items.
pub mod price;
/// Secure string type for private keys.
pub mod secret_string;
/// Utility functions for amount conversion and formatting.
pub mod utils;

pub use chain::*;
pub use events::*;
pub use explorer::*;
pub use hub::*;
pub use price::*;
pub use secret_string::SecretString;
pub use utils::{
	format_base_units, from_base_units, gwei_to_wei, minter_address_to_bytes32, to_base_units,
	to_pip, truncate_id, without_0x_prefix, ConversionError, PIP,
};

pub use alloy_primitives::{Address, Bytes, B256, U256};
pub use rust_decimal::Decimal;
