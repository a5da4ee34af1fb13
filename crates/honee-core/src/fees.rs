//! Bridge fee arithmetic.
//!
//! All amounts are decimal coin units. The hub charges its fee on the send
//! amount, while its minimum-amount validation ignores fee discounts; the
//! minimum helpers below compensate for that.

use honee_types::{Decimal, PIP};
use thiserror::Error;

/// Hub fee rate applied when neither the coin nor the config sets one.
pub const DEFAULT_HUB_FEE_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeeError {
	#[error("Degenerate fee rate: {0}")]
	DegenerateRate(String),
}

/// Destination network fee expressed in the withdrawn coin.
pub fn destination_fee_in_coin(coin_price: Decimal, destination_fee: Decimal) -> Decimal {
	if coin_price.is_zero() {
		return Decimal::ZERO;
	}
	destination_fee.checked_div(coin_price).unwrap_or(Decimal::ZERO)
}

/// Undiscounted rate: the coin's commission, else `default_rate`.
///
/// A zero commission counts as unset.
pub fn base_fee_rate(commission: Option<Decimal>, default_rate: Decimal) -> Decimal {
	commission
		.filter(|commission| !commission.is_zero())
		.unwrap_or(default_rate)
}

/// Fee rate after applying `discount`, a fraction in `[0, 1)`.
pub fn hub_fee_rate(base_rate: Decimal, discount: Decimal) -> Decimal {
	base_rate * (Decimal::ONE - discount)
}

pub fn hub_fee_rate_percent(rate: Decimal) -> Decimal {
	rate * Decimal::ONE_HUNDRED
}

pub fn hub_fee(fee_rate: Decimal, amount_to_send: Decimal) -> Decimal {
	amount_to_send * fee_rate
}

/// What arrives after both fees; never negative.
pub fn amount_to_receive(
	amount_to_send: Decimal,
	destination_fee: Decimal,
	hub_fee: Decimal,
) -> Decimal {
	let amount = amount_to_send - destination_fee - hub_fee;
	amount.max(Decimal::ZERO)
}

/// Smallest amount the hub accepts, one pip above its fee total.
pub fn minimum_send_amount(destination_fee: Decimal, base_rate: Decimal) -> Decimal {
	destination_fee * (Decimal::ONE + base_rate) + PIP
}

/// Smallest receive amount consistent with [`minimum_send_amount`] once a discount applies.
///
/// With `x = (base - discounted) / ((1 - base) * (1 - discounted))`, the
/// receive amount `r` solving `r = (r + destination_fee) * x` is
/// `destination_fee * x / (1 - x)`; one pip is added on top.
pub fn minimum_receive_amount(
	destination_fee: Decimal,
	discounted_rate: Decimal,
	base_rate: Decimal,
) -> Result<Decimal, FeeError> {
	let factor = (base_rate - discounted_rate)
		.checked_div((Decimal::ONE - base_rate) * (Decimal::ONE - discounted_rate))
		.ok_or_else(|| {
			FeeError::DegenerateRate(format!(
				"base {} and discounted {} rates leave nothing to receive",
				base_rate, discounted_rate
			))
		})?;

	let minimum = (destination_fee * factor)
		.checked_div(Decimal::ONE - factor)
		.ok_or_else(|| FeeError::DegenerateRate(format!("fee factor {} equals one", factor)))?;

	Ok(minimum + PIP)
}
