//! Keystore wallet provider
//!
//! A local stand-in for a browser wallet extension. Keys are loaded once from hex
//! strings and kept inside alloy's `PrivateKeySigner`:
//! - Keys are never serialized
//! - Keys are never logged (Debug output is redacted)
//! - Only `SigningHandle`s leave this module
//!
//! Switching the active account or locking the keystore pushes an account-change
//! notification to every subscriber, the same way an injected provider does.

use super::{AccountEvents, SigningHandle, WalletError, WalletProvider};
use crate::config::WalletSettings;
use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Buffered account-change notifications per subscriber
const EVENT_CAPACITY: usize = 16;

#[derive(Debug)]
struct KeystoreState {
    /// Index into `signers` of the active account
    active: usize,
    /// A locked keystore rejects account requests and reports no accounts
    locked: bool,
}

/// Wallet provider backed by local private keys
pub struct KeystoreWallet {
    signers: Vec<PrivateKeySigner>,
    state: Mutex<KeystoreState>,
    events: broadcast::Sender<Vec<Address>>,
}

impl KeystoreWallet {
    /// Detect a keystore from wallet settings
    ///
    /// Returns `None` when the configured environment variable is unset or empty,
    /// which the session layer treats as "no wallet provider installed".
    pub fn detect(settings: &WalletSettings) -> Result<Option<Self>, WalletError> {
        let raw = match std::env::var(&settings.keys_env) {
            Ok(raw) if !raw.trim().is_empty() => SecretString::from(raw),
            _ => {
                tracing::debug!(var = %settings.keys_env, "No keystore keys configured");
                return Ok(None);
            }
        };

        let wallet = Self::from_secret(&raw)?;
        if let Some(account) = settings.default_account {
            wallet.switch_account(account)?;
        }
        Ok(Some(wallet))
    }

    /// Create a keystore from comma separated hex private keys
    pub fn from_secret(keys: &SecretString) -> Result<Self, WalletError> {
        let signers = keys
            .expose_secret()
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(parse_signer)
            .collect::<Result<Vec<_>, _>>()?;

        Self::with_signers(signers)
    }

    /// Create a keystore from a single hex-encoded private key
    pub fn from_hex(key_hex: &str) -> Result<Self, WalletError> {
        Self::with_signers(vec![parse_signer(key_hex)?])
    }

    /// Create a keystore from already parsed signers; the first becomes active
    pub fn with_signers(signers: Vec<PrivateKeySigner>) -> Result<Self, WalletError> {
        if signers.is_empty() {
            return Err(WalletError::InvalidKey("no private keys supplied".to_string()));
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            signers,
            state: Mutex::new(KeystoreState {
                active: 0,
                locked: false,
            }),
            events,
        })
    }

    /// All addresses held by the keystore, in load order
    pub fn addresses(&self) -> Vec<Address> {
        self.signers.iter().map(|s| s.address()).collect()
    }

    /// Currently active address
    pub fn active_address(&self) -> Result<Address, WalletError> {
        let state = self.lock_state()?;
        Ok(self.signers[state.active].address())
    }

    /// Make another held account active and notify subscribers
    pub fn switch_account(&self, account: Address) -> Result<(), WalletError> {
        let index = self
            .signers
            .iter()
            .position(|s| s.address() == account)
            .ok_or_else(|| WalletError::Provider(format!("Unknown account {}", account)))?;

        let accounts = {
            let mut state = self.lock_state()?;
            state.active = index;
            if state.locked {
                return Ok(());
            }
            self.ordered_accounts(state.active)
        };

        tracing::info!(account = %account, "Keystore account switched");
        self.notify(accounts);
        Ok(())
    }

    /// Lock the keystore; subscribers are told there are no accounts
    pub fn lock(&self) -> Result<(), WalletError> {
        self.lock_state()?.locked = true;
        tracing::info!("Keystore locked");
        self.notify(Vec::new());
        Ok(())
    }

    /// Unlock the keystore. Accounts are only exposed again through `request_accounts`.
    pub fn unlock(&self) -> Result<(), WalletError> {
        self.lock_state()?.locked = false;
        Ok(())
    }

    fn ordered_accounts(&self, active: usize) -> Vec<Address> {
        let mut accounts = Vec::with_capacity(self.signers.len());
        accounts.push(self.signers[active].address());
        accounts.extend(
            self.signers
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != active)
                .map(|(_, s)| s.address()),
        );
        accounts
    }

    fn notify(&self, accounts: Vec<Address>) {
        // No receivers is fine: nobody has mounted a client yet
        let _ = self.events.send(accounts);
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, KeystoreState>, WalletError> {
        self.state
            .lock()
            .map_err(|_| WalletError::Provider("keystore state poisoned".to_string()))
    }
}

fn parse_signer(key_hex: &str) -> Result<PrivateKeySigner, WalletError> {
    // Remove 0x prefix if present
    let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

    key_hex
        .parse()
        .map_err(|e| WalletError::InvalidKey(format!("{}", e)))
}

#[async_trait]
impl WalletProvider for KeystoreWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let state = self.lock_state()?;
        if state.locked {
            return Err(WalletError::Rejected(
                "User rejected the request.".to_string(),
            ));
        }
        Ok(self.ordered_accounts(state.active))
    }

    async fn get_signer(&self) -> Result<SigningHandle, WalletError> {
        let state = self.lock_state()?;
        if state.locked {
            return Err(WalletError::Rejected("Wallet is locked".to_string()));
        }
        let signer = self.signers[state.active].clone();
        let account = signer.address();
        Ok(SigningHandle::new(account, EthereumWallet::from(signer)))
    }

    fn subscribe_accounts(&self) -> AccountEvents {
        self.events.subscribe()
    }
}

// Implement Debug manually to avoid exposing the signers
impl std::fmt::Debug for KeystoreWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeystoreWallet")
            .field("addresses", &self.addresses())
            .field("signers", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    // Well-known local development keys (DO NOT use in production!)
    const KEY_0: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const KEY_1: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn two_account_keystore() -> KeystoreWallet {
        KeystoreWallet::from_secret(&SecretString::from(format!("{},{}", KEY_0, KEY_1))).unwrap()
    }

    #[test]
    fn test_keystore_from_hex() {
        let wallet = KeystoreWallet::from_hex(KEY_0).unwrap();

        assert_eq!(
            format!("{:?}", wallet.active_address().unwrap()).to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let wallet = KeystoreWallet::from_hex(KEY_0).unwrap();

        let debug_str = format!("{:?}", wallet);

        assert!(!debug_str.contains("ac0974bec"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_rejects_invalid_key() {
        let err = KeystoreWallet::from_hex("0xnothex").unwrap_err();
        assert!(matches!(err, WalletError::InvalidKey(_)));

        let err = KeystoreWallet::from_secret(&SecretString::from(" , ".to_string())).unwrap_err();
        assert!(matches!(err, WalletError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_request_accounts_lists_active_first() {
        let wallet = two_account_keystore();
        let second = Address::from_str("0x70997970c51812dc3a010c7d01b50e0d17dc79c8").unwrap();

        wallet.switch_account(second).unwrap();
        let accounts = wallet.request_accounts().await.unwrap();

        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0], second);

        let handle = wallet.get_signer().await.unwrap();
        assert_eq!(handle.account(), second);
    }

    #[tokio::test]
    async fn test_locked_keystore_rejects_requests() {
        let wallet = two_account_keystore();
        wallet.lock().unwrap();

        let err = wallet.request_accounts().await.unwrap_err();
        assert!(matches!(err, WalletError::Rejected(_)));

        wallet.unlock().unwrap();
        assert!(wallet.request_accounts().await.is_ok());
    }

    #[tokio::test]
    async fn test_switch_and_lock_notify_subscribers() {
        let wallet = two_account_keystore();
        let mut events = wallet.subscribe_accounts();
        let second = wallet.addresses()[1];

        wallet.switch_account(second).unwrap();
        let accounts = events.recv().await.unwrap();
        assert_eq!(accounts[0], second);

        wallet.lock().unwrap();
        let accounts = events.recv().await.unwrap();
        assert!(accounts.is_empty());
    }

    #[test]
    fn test_detect_without_keys() {
        let settings = WalletSettings {
            keys_env: "VOTING_TEST_KEYS_UNSET".to_string(),
            default_account: None,
        };
        assert!(KeystoreWallet::detect(&settings).unwrap().is_none());
    }

    #[test]
    fn test_detect_selects_default_account() {
        std::env::set_var("VOTING_TEST_KEYS_DETECT", format!("{}, {}", KEY_0, KEY_1));
        let second = Address::from_str("0x70997970c51812dc3a010c7d01b50e0d17dc79c8").unwrap();
        let settings = WalletSettings {
            keys_env: "VOTING_TEST_KEYS_DETECT".to_string(),
            default_account: Some(second),
        };

        let wallet = KeystoreWallet::detect(&settings).unwrap().unwrap();
        assert_eq!(wallet.addresses().len(), 2);
        assert_eq!(wallet.active_address().unwrap(), second);
    }

    #[test]
    fn test_switch_to_unknown_account_fails() {
        let wallet = KeystoreWallet::from_hex(KEY_0).unwrap();
        let err = wallet.switch_account(Address::ZERO).unwrap_err();
        assert!(matches!(err, WalletError::Provider(_)));
    }
}
