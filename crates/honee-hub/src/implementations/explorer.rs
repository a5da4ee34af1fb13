//! Wallet chain explorer client.

use crate::{ExplorerInterface, HubError};
use async_trait::async_trait;
use honee_config::ExplorerConfig;
use honee_types::{ExplorerTxStatus, MinterTransaction, MinterTxData};
use serde::Deserialize;

/// HTTP client for the explorer REST API.
pub struct ExplorerClient {
	client: reqwest::Client,
	base_url: String,
}

#[derive(Deserialize, Default)]
struct RawTransaction {
	#[serde(default)]
	hash: String,
	#[serde(default)]
	data: MinterTxData,
}

#[derive(Deserialize)]
struct Envelope {
	#[serde(default)]
	data: Option<RawTransaction>,
}

impl ExplorerClient {
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			client: reqwest::Client::new(),
			base_url: base_url.into().trim_end_matches('/').to_string(),
		}
	}

	pub fn from_config(config: &ExplorerConfig) -> Self {
		Self::new(config.api_url.clone())
	}
}

/// Builds a transaction from the explorer answer.
///
/// 200 marks a successful transaction and 206 a failed one.
fn parse_transaction(hash: &str, status: u16, body: &str) -> Result<MinterTransaction, HubError> {
	let status = match status {
		200 => ExplorerTxStatus::Success,
		206 => ExplorerTxStatus::Failure,
		other => {
			return Err(HubError::Network(format!(
				"Explorer returned status {} for {}",
				other, hash
			)))
		},
	};

	let envelope: Envelope = serde_json::from_str(body)
		.map_err(|e| HubError::InvalidResponse(format!("Invalid explorer transaction: {}", e)))?;
	let raw = envelope.data.unwrap_or_default();

	Ok(MinterTransaction {
		hash: if raw.hash.is_empty() {
			hash.to_string()
		} else {
			raw.hash
		},
		data: raw.data,
		status,
	})
}

#[async_trait]
impl ExplorerInterface for ExplorerClient {
	async fn get_transaction(&self, hash: &str) -> Result<MinterTransaction, HubError> {
		let url = format!("{}/transactions/{}", self.base_url, hash);
		let response = self.client.get(&url).send().await?;
		let status = response.status().as_u16();
		let body = response.text().await?;
		parse_transaction(hash, status, &body)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use honee_types::Decimal;

	#[test]
	fn test_parse_successful_multisend() {
		let body = r#"{"data": {
			"hash": "Mt4f1c",
			"data": {"list": [
				{"to": "Mxaa", "value": "12.5", "coin": {"id": 1993, "symbol": "USDT"}}
			]}
		}}"#;
		let tx = parse_transaction("Mt4f1c", 200, body).unwrap();
		assert_eq!(tx.status, ExplorerTxStatus::Success);
		assert_eq!(
			tx.find_transfer("Mxaa", "USDT").unwrap().value,
			Decimal::new(125, 1)
		);
	}

	#[test]
	fn test_partial_content_means_failure() {
		let tx = parse_transaction("Mt01", 206, r#"{"data": {"hash": "Mt01"}}"#).unwrap();
		assert_eq!(tx.status, ExplorerTxStatus::Failure);
		assert!(tx.data.list.is_none());
	}

	#[test]
	fn test_missing_data_defaults_to_empty() {
		let tx = parse_transaction("Mt01", 200, "{}").unwrap();
		assert_eq!(tx.hash, "Mt01");
		assert!(tx.data.list.is_none());
	}

	#[test]
	fn test_other_status_is_network_error() {
		assert!(matches!(
			parse_transaction("Mt01", 500, "{}"),
			Err(HubError::Network(_))
		));
	}
}
