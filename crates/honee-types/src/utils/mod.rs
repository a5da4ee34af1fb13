//! Utility functions for amount conversion and string formatting.

pub mod conversion;
pub mod formatting;

pub use conversion::{
	from_base_units, gwei_to_wei, minter_address_to_bytes32, to_base_units, to_pip,
	ConversionError, PIP,
};
pub use formatting::{format_base_units, truncate_id, without_0x_prefix};
