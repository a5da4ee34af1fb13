//! Price feed items.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A named price, e.g. `ethereum/gas` in gwei.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceItem {
	pub name: String,
	pub value: Decimal,
}

/// Looks up a price by name.
pub fn find_price(list: &[PriceItem], name: &str) -> Option<Decimal> {
	list.iter()
		.find(|item| item.name == name)
		.map(|item| item.value)
}
