//! Presentation boundary
//!
//! [`VotingClient`] is the object a UI holds for its whole lifetime: mount it once,
//! read [`ClientState`] from it, and call its four operations. It owns the
//! account-change subscription and drops it on unmount.

use crate::contract::{ContractBinder, ContractSnapshot};
use crate::session::{AccountChange, SessionManager, SessionPhase};
use crate::sync::{StateStore, Synchronizer};
use crate::wallet::{AccountEvents, WalletProvider};
use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Read-only view handed to the presentation layer
#[derive(Debug, Clone, Serialize)]
pub struct ClientState {
    pub account: Option<Address>,
    pub phase: SessionPhase,
    pub is_connected: bool,
    /// One flag for every operation kind
    pub is_loading: bool,
    pub error: Option<String>,
    /// `has_voted` and `is_owner` are cleared when the snapshot was read for an
    /// account other than `account`
    pub contract_state: ContractSnapshot,
    /// Account `contract_state` was read for
    pub snapshot_account: Option<Address>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Wallet session plus synchronized contract state
pub struct VotingClient {
    session: Arc<SessionManager>,
    sync: Arc<Synchronizer>,
    store: Arc<StateStore>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl VotingClient {
    /// Initialize the session and start listening for account changes
    ///
    /// A missing provider is not an error here: it is recorded in the error slot and the
    /// client stays disconnected.
    pub async fn mount(
        provider: Option<Arc<dyn WalletProvider>>,
        binder: Arc<dyn ContractBinder>,
    ) -> Self {
        let session = Arc::new(SessionManager::new(provider, binder));
        let store = Arc::new(StateStore::new());
        let sync = Arc::new(Synchronizer::new(session.clone(), store.clone()));

        let listener = match session.initialize().await {
            Ok(events) => Some(tokio::spawn(listen(
                events,
                session.clone(),
                sync.clone(),
            ))),
            Err(e) => {
                store.record_error(&e).await;
                None
            }
        };

        Self {
            session,
            sync,
            store,
            listener: Mutex::new(listener),
        }
    }

    /// Ask the wallet for access, bind the contract and load its state
    pub async fn connect_wallet(&self) {
        if !self.session.has_provider() {
            return;
        }

        let _busy = self.store.begin();
        self.store.clear_error().await;

        match self.session.connect().await {
            Ok(account) => {
                let _ = self.sync.refresh(account).await;
            }
            Err(e) => {
                warn!(error = %e, "Error connecting wallet");
                self.store.record_error(&e).await;
            }
        }
    }

    /// Register a candidate; `true` once confirmed on the ledger
    pub async fn add_candidate(&self, name: &str) -> bool {
        self.sync.register_candidate(name).await
    }

    /// Vote for a candidate; `true` once confirmed on the ledger
    pub async fn vote_for_candidate(&self, candidate_id: u64) -> bool {
        self.sync.vote_for_candidate(candidate_id).await
    }

    /// Reload contract state for the current account, if any
    pub async fn refresh_data(&self) {
        if let Some(account) = self.session.account().await {
            let _ = self.sync.refresh(account).await;
        }
    }

    pub async fn dismiss_error(&self) {
        self.store.clear_error().await;
    }

    pub async fn state(&self) -> ClientState {
        let phase = self.session.phase().await;
        let account = self.session.account().await;
        let (mut contract_state, snapshot_account) = self.store.snapshot_with_account().await;

        if snapshot_account != account {
            // Per-account flags of another account; shared ledger data stays
            contract_state.has_voted = false;
            contract_state.is_owner = false;
        }

        ClientState {
            account,
            phase,
            is_connected: phase == SessionPhase::Connected,
            is_loading: self.store.is_loading(),
            error: self.store.error().await,
            contract_state,
            snapshot_account,
            refreshed_at: self.store.refreshed_at().await,
        }
    }

    /// Stop listening for account changes
    pub fn unmount(&self) {
        let handle = match self.listener.lock() {
            Ok(mut listener) => listener.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            handle.abort();
            debug!("Account listener stopped");
        }
    }
}

impl Drop for VotingClient {
    fn drop(&mut self) {
        self.unmount();
    }
}

async fn listen(mut events: AccountEvents, session: Arc<SessionManager>, sync: Arc<Synchronizer>) {
    loop {
        let accounts = match events.recv().await {
            Ok(accounts) => accounts,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Missed account notifications");
                continue;
            }
            Err(RecvError::Closed) => {
                info!("Wallet provider closed account notifications");
                break;
            }
        };

        match session.handle_accounts_changed(&accounts).await {
            AccountChange::Switched(account) => {
                let _ = sync.refresh(account).await;
            }
            AccountChange::Disconnected | AccountChange::Ignored => {}
        }
    }
}
