//! Hub bridge status client.

use crate::{HubError, HubInterface};
use async_trait::async_trait;
use honee_config::HubConfig;
use honee_types::{truncate_id, HubTransfer, TransferStatus};
use serde::Deserialize;

/// HTTP client for the hub history API.
pub struct HubApiClient {
	client: reqwest::Client,
	base_url: String,
}

#[derive(Deserialize)]
struct HistoryResponse {
	#[serde(default)]
	transfer: Option<HubTransfer>,
}

impl HubApiClient {
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			client: reqwest::Client::new(),
			base_url: base_url.into().trim_end_matches('/').to_string(),
		}
	}

	pub fn from_config(config: &HubConfig) -> Self {
		Self::new(config.api_url.clone())
	}
}

/// Reads a history response; an unknown transfer maps to `NotFound`.
fn parse_history(body: &str) -> Result<HubTransfer, HubError> {
	let response: HistoryResponse = serde_json::from_str(body)
		.map_err(|e| HubError::InvalidResponse(format!("Invalid hub history: {}", e)))?;
	Ok(response.transfer.unwrap_or(HubTransfer {
		status: TransferStatus::NotFound,
		out_tx_hash: None,
	}))
}

#[async_trait]
impl HubInterface for HubApiClient {
	async fn get_transfer(&self, hash: &str) -> Result<HubTransfer, HubError> {
		let url = format!("{}/history/{}", self.base_url, hash);
		let response = self.client.get(&url).send().await?;

		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Ok(HubTransfer {
				status: TransferStatus::NotFound,
				out_tx_hash: None,
			});
		}

		let body = response.error_for_status()?.text().await?;
		let transfer = parse_history(&body)?;
		tracing::debug!(hash = %truncate_id(hash), status = %transfer.status, "Fetched bridge transfer");
		Ok(transfer)
	}
}
