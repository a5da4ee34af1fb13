//! Split configuration files.
//!
//! The main file may list other files under `include` (a path or an array of
//! paths, relative to the main file's directory). Each top-level section is
//! owned by exactly one file; including a file twice is an error.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use toml::Table;

const INCLUDE_KEY: &str = "include";

pub struct ConfigLoader {
	base_dir: PathBuf,
	visited: HashSet<PathBuf>,
	/// File that defined each top-level section.
	owners: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_dir: impl AsRef<Path>) -> Self {
		Self {
			base_dir: base_dir.as_ref().to_path_buf(),
			visited: HashSet::new(),
			owners: HashMap::new(),
		}
	}

	/// Reads `path` with its includes and parses the merged result.
	pub async fn load_config(&mut self, path: impl AsRef<Path>) -> Result<Config, ConfigError> {
		let main_path = self.locate(path.as_ref())?;
		let mut merged = self.read_table(&main_path).await?;

		let includes = match merged.remove(INCLUDE_KEY) {
			Some(value) => include_paths(&value)?,
			None => Vec::new(),
		};
		self.claim_sections(&merged, &main_path)?;

		for include in includes {
			let include_path = self.locate(&include)?;
			let table = self.read_table(&include_path).await?;
			self.claim_sections(&table, &include_path)?;
			merged.extend(table);
		}

		let rendered = toml::to_string(&merged)
			.map_err(|e| ConfigError::Parse(format!("Failed to render merged config: {}", e)))?;
		rendered.parse()
	}

	async fn read_table(&mut self, path: &Path) -> Result<Table, ConfigError> {
		let canonical = tokio::fs::canonicalize(path).await.map_err(|e| {
			ConfigError::Io(io::Error::new(
				io::ErrorKind::NotFound,
				format!("Cannot resolve {}: {}", path.display(), e),
			))
		})?;
		if !self.visited.insert(canonical) {
			return Err(ConfigError::Validation(format!(
				"{} is included more than once",
				path.display()
			)));
		}

		let content = resolve_env_vars(&tokio::fs::read_to_string(path).await?)?;
		Ok(toml::from_str(&content)?)
	}

	fn claim_sections(&mut self, table: &Table, source: &Path) -> Result<(), ConfigError> {
		for section in table.keys() {
			if let Some(owner) = self.owners.get(section) {
				return Err(ConfigError::Validation(format!(
					"Section '{}' is defined in both {} and {}",
					section,
					owner.display(),
					source.display()
				)));
			}
			self.owners.insert(section.clone(), source.to_path_buf());
		}
		Ok(())
	}

	fn locate(&self, path: &Path) -> Result<PathBuf, ConfigError> {
		let located = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_dir.join(path)
		};
		if located.exists() {
			Ok(located)
		} else {
			Err(ConfigError::Io(io::Error::new(
				io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", located.display()),
			)))
		}
	}
}

fn include_paths(value: &toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	match value {
		toml::Value::String(path) => Ok(vec![PathBuf::from(path)]),
		toml::Value::Array(items) => items
			.iter()
			.map(|item| {
				item.as_str().map(PathBuf::from).ok_or_else(|| {
					ConfigError::Validation("include entries must be strings".into())
				})
			})
			.collect(),
		_ => Err(ConfigError::Validation(
			"include must be a path or an array of paths".into(),
		)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tests::BASE_CONFIG;
	use std::fs;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_single_file_config() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("config.toml");
		fs::write(&config_path, BASE_CONFIG).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config(&config_path).await.unwrap();

		assert_eq!(config.wallet.default_chain_id, 1);
		assert_eq!(config.chains.len(), 2);
	}

	#[tokio::test]
	async fn test_config_with_includes() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = r#"
include = ["chains.toml"]

[wallet]
default_chain_id = 56

[hub]
api_url = "https://hub-api.minter.network"
minter_multisig_address = "Mx68f4839d7f32831b9234f9575f3b95e1afe21a56"

[explorer]
api_url = "https://explorer-api.minter.network/api/v2"

[swap_proxy]
api_url = "https://hub-swap.honee.app"

[tracker]
confirmation_count = 12
"#;

		let chains_config = r#"
[chains.56]
name = "BSC"
rpc_url = "http://localhost:8546"
hub_network = "bsc"
hub_contract_address = "0xf5b0ed82a0b3e11567081694cc66c3df133f7c8f"
wrapped_native_contract_address = "0xbb4cdb9cbd36b01bd1cbaebf2de08d9173bc095c"
"#;

		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("chains.toml"), chains_config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();

		assert_eq!(config.wallet.default_chain_id, 56);
		assert_eq!(config.chains[&56].name, "BSC");
		assert_eq!(config.tracker.confirmation_count, 12);
		assert_eq!(config.tracker.poll_interval_seconds, 10);
	}

	#[tokio::test]
	async fn test_duplicate_section_error() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = r#"
include = ["duplicate.toml"]

[hub]
api_url = "https://hub-api.minter.network"
"#;
		let duplicate_config = r#"
[hub]
api_url = "https://other-hub.example.org"
"#;

		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("duplicate.toml"), duplicate_config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let error_msg = loader
			.load_config("main.toml")
			.await
			.unwrap_err()
			.to_string();

		assert!(error_msg.contains("Section 'hub' is defined in both"));
	}

	#[tokio::test]
	async fn test_self_include_detection() {
		let temp_dir = TempDir::new().unwrap();

		let config = r#"
include = ["self.toml"]

[wallet]
default_chain_id = 1
"#;
		fs::write(temp_dir.path().join("self.toml"), config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let error_msg = loader
			.load_config("self.toml")
			.await
			.unwrap_err()
			.to_string();

		assert!(error_msg.contains("included more than once"));
	}
}
