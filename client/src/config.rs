use std::env;
use std::time::Duration;

use anyhow::Context;

const DEFAULT_SERVER_ADDRESS: &str = "[::1]:5051";
const DEFAULT_CACHE_CAPACITY: u64 = 1_000;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
	pub server_address: String,
	pub cache_capacity: u64,
	/// Upper bound on how long a cached read may be served without a refetch.
	pub cache_ttl: Duration,
}

impl Default for ClientConfig {
	fn default() -> Self {
		ClientConfig {
			server_address: DEFAULT_SERVER_ADDRESS.to_string(),
			cache_capacity: DEFAULT_CACHE_CAPACITY,
			cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
		}
	}
}

impl ClientConfig {
	/// Reads `TAVERN_SERVER_ADDRESS`, `TAVERN_CACHE_CAPACITY` and
	/// `TAVERN_CACHE_TTL_SECS`, loading a `.env` file first if there is one.
	pub fn from_env() -> anyhow::Result<ClientConfig> {
		let _ = dotenvy::dotenv();
		ClientConfig::from_lookup(|key| env::var(key).ok())
	}

	fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<ClientConfig> {
		let mut config = ClientConfig::default();

		if let Some(address) = lookup("TAVERN_SERVER_ADDRESS") {
			config.server_address = address;
		}
		if let Some(capacity) = lookup("TAVERN_CACHE_CAPACITY") {
			config.cache_capacity = capacity.parse().context("TAVERN_CACHE_CAPACITY must be a number")?;
		}
		if let Some(ttl) = lookup("TAVERN_CACHE_TTL_SECS") {
			let secs: u64 = ttl.parse().context("TAVERN_CACHE_TTL_SECS must be a number of seconds")?;
			config.cache_ttl = Duration::from_secs(secs);
		}

		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	#[test]
	fn defaults_when_unset() {
		let config = ClientConfig::from_lookup(|_| None).unwrap();
		assert_eq!(config, ClientConfig::default());
	}

	#[test]
	fn overrides() {
		let vars: HashMap<&str, &str> = HashMap::from([
			("TAVERN_SERVER_ADDRESS", "10.0.0.2:6000"),
			("TAVERN_CACHE_CAPACITY", "50"),
			("TAVERN_CACHE_TTL_SECS", "5"),
		]);
		let config = ClientConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
		assert_eq!(config.server_address, "10.0.0.2:6000");
		assert_eq!(config.cache_capacity, 50);
		assert_eq!(config.cache_ttl, Duration::from_secs(5));
	}

	#[test]
	fn bad_number_is_an_error() {
		let result = ClientConfig::from_lookup(|key| (key == "TAVERN_CACHE_CAPACITY").then(|| "lots".to_string()));
		assert!(result.is_err());
	}
}
