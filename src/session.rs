//! Wallet session manager
//!
//! Owns the connection to the wallet provider and the contract reference bound to the
//! session's signer.
//!
//! ```text
//! Uninitialized --initialize--> Disconnected --connect--> Connected
//!                                     ^                      |  ^
//!                                     +---- accounts [] -----+  | accounts [a, ..]
//!                                                               +--(switch, refresh)
//! ```
//!
//! Nothing leads back to `Uninitialized`.

use crate::contract::{ContractBinder, VotingContract};
use crate::wallet::{AccountEvents, SigningHandle, WalletProvider};
use crate::{Error, Result};
use alloy::primitives::Address;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Uninitialized,
    Disconnected,
    Connected,
}

/// Outcome of an account-change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountChange {
    /// Connected session now points at this account; state must be refetched
    Switched(Address),
    /// Wallet reported no accounts; session cleared
    Disconnected,
    /// Nothing to do (no live session)
    Ignored,
}

struct Session {
    phase: SessionPhase,
    account: Option<Address>,
    signer: Option<SigningHandle>,
    contract: Option<Arc<dyn VotingContract>>,
}

impl Session {
    fn reset(&mut self) {
        self.phase = SessionPhase::Disconnected;
        self.account = None;
        self.signer = None;
        self.contract = None;
    }
}

/// Bridge to exactly one wallet provider
pub struct SessionManager {
    provider: Option<Arc<dyn WalletProvider>>,
    binder: Arc<dyn ContractBinder>,
    session: RwLock<Session>,
}

impl SessionManager {
    /// Create a manager. `provider` is `None` when no wallet was detected.
    pub fn new(provider: Option<Arc<dyn WalletProvider>>, binder: Arc<dyn ContractBinder>) -> Self {
        Self {
            provider,
            binder,
            session: RwLock::new(Session {
                phase: SessionPhase::Uninitialized,
                account: None,
                signer: None,
                contract: None,
            }),
        }
    }

    /// Detect the provider and subscribe to its account-change notifications
    ///
    /// The returned receiver is the subscription; dropping it unsubscribes.
    pub async fn initialize(&self) -> Result<AccountEvents> {
        let provider = self.provider.as_ref().ok_or_else(|| {
            warn!("No wallet provider detected");
            Error::ProviderUnavailable
        })?;

        let events = provider.subscribe_accounts();

        let mut session = self.session.write().await;
        if session.phase == SessionPhase::Uninitialized {
            session.phase = SessionPhase::Disconnected;
        }
        info!("Wallet provider detected");

        Ok(events)
    }

    /// Request account access and bind the contract to the first account's signer
    pub async fn connect(&self) -> Result<Address> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(Error::ProviderUnavailable)?;

        if self.phase().await == SessionPhase::Uninitialized {
            return Err(Error::NotInitialized);
        }

        let accounts = provider
            .request_accounts()
            .await
            .map_err(|e| Error::ConnectionDenied(e.to_string()))?;
        let account = *accounts.first().ok_or_else(|| {
            Error::ConnectionDenied("No accounts returned by wallet".to_string())
        })?;

        let signer = provider
            .get_signer()
            .await
            .map_err(|e| Error::ConnectionDenied(e.to_string()))?;
        let contract = self
            .binder
            .bind(&signer)
            .map_err(|e| Error::ConnectionDenied(e.to_string()))?;

        let mut session = self.session.write().await;
        session.phase = SessionPhase::Connected;
        session.account = Some(account);
        session.signer = Some(signer);
        session.contract = Some(contract);

        info!(account = %account, "Wallet connected");
        Ok(account)
    }

    /// Apply a provider-pushed account list
    pub async fn handle_accounts_changed(&self, accounts: &[Address]) -> AccountChange {
        let mut session = self.session.write().await;

        match (accounts.first(), session.phase) {
            (None, SessionPhase::Connected) => {
                session.reset();
                info!("Wallet reported no accounts, session disconnected");
                AccountChange::Disconnected
            }
            (Some(&account), SessionPhase::Connected) => {
                session.account = Some(account);
                info!(account = %account, "Active account changed");
                AccountChange::Switched(account)
            }
            (_, phase) => {
                debug!(?phase, accounts = accounts.len(), "Ignoring account change");
                AccountChange::Ignored
            }
        }
    }

    /// Contract reference bound to `account`'s signer
    ///
    /// Re-derives the signer and contract reference when the active account moved away
    /// from the one the current binding signs for.
    pub async fn contract_for(&self, account: Address) -> Result<Arc<dyn VotingContract>> {
        {
            let session = self.session.read().await;
            let contract = session.contract.clone().ok_or(Error::NotConnected)?;
            if session.signer.as_ref().map(|s| s.account()) == Some(account) {
                return Ok(contract);
            }
        }

        let provider = self.provider.as_ref().ok_or(Error::ProviderUnavailable)?;
        let signer = provider
            .get_signer()
            .await
            .map_err(|e| Error::ConnectionDenied(e.to_string()))?;
        if signer.account() != account {
            warn!(
                requested = %account,
                signer = %signer.account(),
                "Wallet signer does not match requested account"
            );
        }
        let contract = self
            .binder
            .bind(&signer)
            .map_err(|e| Error::ConnectionDenied(e.to_string()))?;

        let mut session = self.session.write().await;
        if session.phase != SessionPhase::Connected {
            return Err(Error::NotConnected);
        }
        debug!(account = %signer.account(), "Re-derived contract binding");
        session.signer = Some(signer);
        session.contract = Some(contract.clone());

        Ok(contract)
    }

    pub async fn phase(&self) -> SessionPhase {
        self.session.read().await.phase
    }

    pub async fn account(&self) -> Option<Address> {
        self.session.read().await.account
    }

    pub async fn is_connected(&self) -> bool {
        self.phase().await == SessionPhase::Connected
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }
}
