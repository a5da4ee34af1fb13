//! Conversion between human decimal amounts and on-chain base units.

use super::formatting::{format_base_units, without_0x_prefix};
use alloy_primitives::{Address, B256, U256};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use thiserror::Error;

/// One pip, the smallest indivisible amount of the wallet chain (10^-18).
pub const PIP: Decimal = Decimal::from_parts(1, 0, 0, false, 18);

/// Decimals of the wallet chain's coins.
const PIP_DECIMALS: u8 = 18;

/// Errors that can occur while converting amounts or addresses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
	#[error("Negative amount: {0}")]
	NegativeAmount(String),
	#[error("Amount out of range: {0}")]
	OutOfRange(String),
	#[error("Invalid address: {0}")]
	InvalidAddress(String),
}

/// Converts a decimal amount to base units with `decimals` places.
///
/// Digits beyond `decimals` are rounded half away from zero.
pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<U256, ConversionError> {
	if amount.is_sign_negative() && !amount.is_zero() {
		return Err(ConversionError::NegativeAmount(amount.to_string()));
	}

	let rounded = amount
		.abs()
		.round_dp_with_strategy(u32::from(decimals), RoundingStrategy::MidpointAwayFromZero);
	let text = rounded.to_string();
	let (integer_part, fraction_part) = text.split_once('.').unwrap_or((text.as_str(), ""));

	let mut digits = String::with_capacity(integer_part.len() + decimals as usize);
	digits.push_str(integer_part);
	digits.push_str(fraction_part);
	for _ in fraction_part.len()..decimals as usize {
		digits.push('0');
	}

	U256::from_str_radix(&digits, 10).map_err(|_| ConversionError::OutOfRange(text.clone()))
}

/// Converts base units with `decimals` places back to a decimal amount.
pub fn from_base_units(value: U256, decimals: u8) -> Result<Decimal, ConversionError> {
	let formatted = format_base_units(value, decimals);
	Decimal::from_str(&formatted).map_err(|_| ConversionError::OutOfRange(formatted))
}

/// Converts a wallet chain amount to pips.
pub fn to_pip(amount: Decimal) -> Result<U256, ConversionError> {
	to_base_units(amount, PIP_DECIMALS)
}

/// Converts a gwei amount to wei.
pub fn gwei_to_wei(gwei: Decimal) -> Result<u128, ConversionError> {
	let wei = to_base_units(gwei, 9)?;
	u128::try_from(wei).map_err(|_| ConversionError::OutOfRange(gwei.to_string()))
}

/// Converts a wallet chain address (`Mx...`) to a left-padded bytes32.
///
/// The hub bridge contract identifies destinations as bytes32.
pub fn minter_address_to_bytes32(address: &str) -> Result<B256, ConversionError> {
	let hex_part = address
		.strip_prefix("Mx")
		.unwrap_or_else(|| without_0x_prefix(address));
	let parsed = Address::from_str(hex_part)
		.map_err(|_| ConversionError::InvalidAddress(address.to_string()))?;
	Ok(B256::left_padding_from(parsed.as_slice()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_to_base_units() {
		assert_eq!(
			to_base_units(Decimal::new(15, 1), 18).unwrap(),
			U256::from(1_500_000_000_000_000_000u128)
		);
		assert_eq!(to_base_units(Decimal::new(1, 0), 6).unwrap(), U256::from(1_000_000u64));
		assert_eq!(to_base_units(Decimal::ZERO, 18).unwrap(), U256::ZERO);
		// 1.0000005 with 6 places rounds up
		assert_eq!(
			to_base_units(Decimal::new(10_000_005, 7), 6).unwrap(),
			U256::from(1_000_001u64)
		);
	}

	#[test]
	fn test_to_base_units_rejects_negative() {
		assert!(matches!(
			to_base_units(Decimal::new(-1, 0), 18),
			Err(ConversionError::NegativeAmount(_))
		));
	}

	#[test]
	fn test_from_base_units() {
		assert_eq!(
			from_base_units(U256::from(1_500_000u64), 6).unwrap(),
			Decimal::new(15, 1)
		);
		assert_eq!(from_base_units(U256::from(1u64), 18).unwrap(), PIP);
	}

	#[test]
	fn test_gwei_to_wei() {
		assert_eq!(gwei_to_wei(Decimal::new(100, 0)).unwrap(), 100_000_000_000);
		assert_eq!(gwei_to_wei(Decimal::new(15, 1)).unwrap(), 1_500_000_000);
	}

	#[test]
	fn test_minter_address_to_bytes32() {
		let bytes = minter_address_to_bytes32("Mx7633980c000139dd3a777f4b5ef0bb6cf6b7e4c1").unwrap();
		assert!(bytes[..12].iter().all(|b| *b == 0));
		assert_eq!(hex::encode(&bytes[12..]), "7633980c000139dd3a777f4b5ef0bb6cf6b7e4c1");
		assert!(minter_address_to_bytes32("Mxnothex").is_err());
	}
}
