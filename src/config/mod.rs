//! Configuration for the voting client

pub mod rpc;

use crate::{Error, Result};
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

// Re-export RPC config
pub use rpc::RpcConfig;

/// Contract address environment variable name
pub const CONTRACT_ADDRESS_ENV: &str = "VOTING_CONTRACT_ADDRESS";

/// Chain ID environment variable name
pub const CHAIN_ID_ENV: &str = "VOTING_CHAIN_ID";

/// Default environment variable holding the keystore private keys
pub const PRIVATE_KEYS_ENV: &str = "VOTING_PRIVATE_KEYS";

/// First contract address deployed by a fresh Hardhat/Anvil node
pub const LOCAL_DEPLOYMENT_ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

/// Where the voting contract lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Deployed contract address
    pub address: Address,
    /// Chain the contract is deployed on
    pub chain_id: u64,
}

impl ContractConfig {
    /// Build from `VOTING_CONTRACT_ADDRESS` / `VOTING_CHAIN_ID`, falling back to a local
    /// development deployment
    pub fn from_env() -> Self {
        let address = std::env::var(CONTRACT_ADDRESS_ENV)
            .ok()
            .and_then(|raw| match Address::from_str(raw.trim()) {
                Ok(addr) => Some(addr),
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring invalid {}", CONTRACT_ADDRESS_ENV);
                    None
                }
            })
            .unwrap_or_else(local_deployment_address);

        let chain_id = std::env::var(CHAIN_ID_ENV)
            .ok()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(rpc::chains::LOCALHOST);

        Self { address, chain_id }
    }
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn local_deployment_address() -> Address {
    Address::from_str(LOCAL_DEPLOYMENT_ADDRESS).unwrap_or(Address::ZERO)
}

/// Keystore wallet settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSettings {
    /// Environment variable holding comma separated private keys
    #[serde(default = "default_keys_env")]
    pub keys_env: String,
    /// Account to make active before connecting (defaults to the first key)
    #[serde(default)]
    pub default_account: Option<Address>,
}

fn default_keys_env() -> String {
    PRIVATE_KEYS_ENV.to_string()
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            keys_env: default_keys_env(),
            default_account: None,
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Voting contract location
    pub contract: ContractConfig,
    /// Wallet provider settings
    #[serde(default)]
    pub wallet: WalletSettings,
    /// Confirmations awaited before a write counts as confirmed
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    /// Refresh interval for `watch` (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_confirmations() -> u64 {
    1
}

fn default_poll_interval_ms() -> u64 {
    15_000
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let config: Config = serde_json::from_str(&content)?;
        if config.confirmations == 0 {
            return Err(Error::Config(
                "confirmations must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            contract: ContractConfig::default(),
            wallet: WalletSettings::default(),
            confirmations: default_confirmations(),
            poll_interval_ms: default_poll_interval_ms(), // 15 seconds
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn config_deserialize_defaults() {
        let value = serde_json::json!({
            "contract": {
                "address": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
                "chain_id": 31337
            }
        });
        let parsed: Config = serde_json::from_value(value).expect("parse config");
        assert_eq!(parsed.confirmations, 1);
        assert_eq!(parsed.poll_interval_ms, 15_000);
        assert_eq!(parsed.wallet.keys_env, PRIVATE_KEYS_ENV);
        assert!(parsed.wallet.default_account.is_none());
        assert_eq!(parsed.contract.address, local_deployment_address());
    }

    #[test]
    fn config_deserialize_explicit() {
        let value = serde_json::json!({
            "contract": {
                "address": "0x0000000000000000000000000000000000000001",
                "chain_id": 11155111
            },
            "wallet": {
                "keys_env": "MY_KEYS",
                "default_account": "0x70997970c51812dc3a010c7d01b50e0d17dc79c8"
            },
            "confirmations": 3,
            "poll_interval_ms": 5000
        });
        let parsed: Config = serde_json::from_value(value).expect("parse config");
        assert_eq!(parsed.contract.chain_id, 11155111);
        assert_eq!(parsed.wallet.keys_env, "MY_KEYS");
        assert!(parsed.wallet.default_account.is_some());
        assert_eq!(parsed.confirmations, 3);
        assert_eq!(parsed.poll_interval_ms, 5000);
    }

    #[test]
    fn load_reads_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"contract": {{"address": "0x5FbDB2315678afecb367f032d93F642f64180aa3", "chain_id": 1}}}}"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.contract.chain_id, 1);
    }

    #[test]
    fn load_rejects_zero_confirmations() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"contract": {{"address": "0x5FbDB2315678afecb367f032d93F642f64180aa3", "chain_id": 1}}, "confirmations": 0}}"#
        )
        .unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let err = Config::load(Path::new("/nonexistent/voting.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
