//! Swap-to-hub proxy client.
//!
//! The proxy quotes a swap into a hub-bridged token and returns the steps
//! executing it; each step carries one EVM transaction.

use crate::{HubError, SmartWalletTx, SwapProxyInterface, SwapQuote, SwapToHubParams};
use async_trait::async_trait;
use honee_config::SwapProxyConfig;
use honee_types::U256;
use serde::Deserialize;

/// HTTP client for the swap proxy.
pub struct SwapProxyClient {
	client: reqwest::Client,
	base_url: String,
}

#[derive(Deserialize)]
struct SwapStep {
	tx: SmartWalletTx,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
	to_token_amount: U256,
	#[serde(default)]
	steps: Vec<SwapStep>,
}

impl SwapProxyClient {
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			client: reqwest::Client::new(),
			base_url: base_url.into().trim_end_matches('/').to_string(),
		}
	}

	pub fn from_config(config: &SwapProxyConfig) -> Self {
		Self::new(config.api_url.clone())
	}
}

/// Query string of a swap request; refunds go to the destination by default.
fn query_params(chain_id: u64, params: &SwapToHubParams) -> Vec<(&'static str, String)> {
	vec![
		("chainId", chain_id.to_string()),
		("fromTokenAddress", params.from_token_address.to_string()),
		("toTokenAddress", params.to_token_address.to_string()),
		("amount", params.amount.to_string()),
		("fromAddress", params.from_address.to_string()),
		("destination", params.destination.to_string()),
		(
			"refundTo",
			params.refund_to.unwrap_or(params.destination).to_string(),
		),
		("slippage", params.slippage.to_string()),
		("disableEstimate", params.disable_estimate.to_string()),
		("allowPartialFill", params.allow_partial_fill.to_string()),
	]
}

fn parse_swap(body: &str) -> Result<SwapQuote, HubError> {
	let response: SwapResponse = serde_json::from_str(body)
		.map_err(|e| HubError::InvalidResponse(format!("Invalid swap response: {}", e)))?;
	Ok(SwapQuote {
		to_token_amount: response.to_token_amount,
		tx_list: response.steps.into_iter().map(|step| step.tx).collect(),
	})
}

#[async_trait]
impl SwapProxyInterface for SwapProxyClient {
	async fn build_tx_for_swap(
		&self,
		chain_id: u64,
		params: &SwapToHubParams,
	) -> Result<SwapQuote, HubError> {
		let url = format!("{}/new/swap", self.base_url);
		let body = self
			.client
			.get(&url)
			.query(&query_params(chain_id, params))
			.send()
			.await?
			.error_for_status()?
			.text()
			.await?;

		let quote = parse_swap(&body)?;
		tracing::debug!(chain_id, steps = quote.tx_list.len(), "Built swap to hub");
		Ok(quote)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use honee_types::Address;

	fn params() -> SwapToHubParams {
		SwapToHubParams {
			from_token_address: Address::repeat_byte(0x01),
			to_token_address: Address::repeat_byte(0x02),
			amount: U256::from(1_000u64),
			from_address: Address::repeat_byte(0x03),
			destination: Address::repeat_byte(0x04),
			refund_to: None,
			slippage: 1,
			disable_estimate: true,
			allow_partial_fill: false,
		}
	}

	#[test]
	fn test_refund_defaults_to_destination() {
		let query = query_params(1, &params());
		let refund = query.iter().find(|(key, _)| *key == "refundTo").unwrap();
		assert_eq!(refund.1, Address::repeat_byte(0x04).to_string());
	}

	#[test]
	fn test_parse_swap_flattens_steps() {
		let body = r#"{
			"toTokenAmount": "2500",
			"steps": [
				{"tx": {"to": "0x0101010101010101010101010101010101010101", "data": "0x095ea7b3", "value": "0x0"}},
				{"tx": {"to": "0x0202020202020202020202020202020202020202", "data": "0x12aa3caf", "value": "0x0"}}
			]
		}"#;
		let quote = parse_swap(body).unwrap();
		assert_eq!(quote.to_token_amount, U256::from(2500u64));
		assert_eq!(quote.tx_list.len(), 2);
		assert_eq!(quote.tx_list[1].to, Address::repeat_byte(0x02));
	}
}
