//! Private key holder for the sending wallet.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroizing;

const REDACTED: &str = "***REDACTED***";

/// Zeroed on drop; `Debug`, `Display` and `Serialize` print a placeholder.
#[derive(Clone)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
	/// Runs `f` with the plain secret.
	pub fn with_exposed<F, R>(&self, f: F) -> R
	where
		F: FnOnce(&str) -> R,
	{
		f(self.0.as_str())
	}
}

impl From<String> for SecretString {
	fn from(secret: String) -> Self {
		Self(Zeroizing::new(secret))
	}
}

impl From<&str> for SecretString {
	fn from(secret: &str) -> Self {
		Self::from(secret.to_string())
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("SecretString").field(&REDACTED).finish()
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl Serialize for SecretString {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(REDACTED)
	}
}

impl<'de> Deserialize<'de> for SecretString {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		String::deserialize(deserializer).map(SecretString::from)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_private_key_never_printed() {
		let key = SecretString::from("0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80");
		assert_eq!(format!("{:?}", key), "SecretString(\"***REDACTED***\")");
		assert_eq!(key.to_string(), REDACTED);
		assert_eq!(serde_json::to_string(&key).unwrap(), "\"***REDACTED***\"");
	}

	#[test]
	fn test_deserialized_key_is_exposed_to_signer() {
		let key: SecretString = serde_json::from_str("\"abc\"").unwrap();
		assert_eq!(key.with_exposed(|s| s.len()), 3);
	}
}
