//! Wallet provider boundary
//!
//! The session layer talks to exactly one externally supplied wallet provider through
//! [`WalletProvider`]. The provider hands out accounts, a signing handle for the active
//! account, and pushes account-change notifications (an empty list means the wallet
//! has no active account).
//!
//! Signer material never leaves the provider; callers only see [`SigningHandle`].

mod signer;

pub use signer::KeystoreWallet;

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Account-change notifications pushed by the provider
pub type AccountEvents = broadcast::Receiver<Vec<Address>>;

/// Errors reported by a wallet provider
#[derive(Debug, Clone, thiserror::Error)]
pub enum WalletError {
    #[error("{0}")]
    Rejected(String),

    #[error("Wallet provider error: {0}")]
    Provider(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),
}

/// External wallet provider
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask the user for account access. The active account comes first.
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;

    /// Signing handle bound to the currently active account
    async fn get_signer(&self) -> Result<SigningHandle, WalletError>;

    /// Subscribe to account-change notifications
    fn subscribe_accounts(&self) -> AccountEvents;
}

/// Capability to authorize writes on behalf of one account
#[derive(Clone)]
pub struct SigningHandle {
    account: Address,
    wallet: EthereumWallet,
}

impl SigningHandle {
    pub fn new(account: Address, wallet: EthereumWallet) -> Self {
        Self { account, wallet }
    }

    /// Account this handle signs for
    pub fn account(&self) -> Address {
        self.account
    }

    /// Wallet for use with alloy providers
    pub fn wallet(&self) -> &EthereumWallet {
        &self.wallet
    }
}

impl std::fmt::Debug for SigningHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningHandle")
            .field("account", &self.account)
            .field("wallet", &"[REDACTED]")
            .finish()
    }
}

/// Format an address as `0x1234...abcd` (checksummed)
pub fn short_address(address: &Address) -> String {
    let full = address.to_string();
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}
