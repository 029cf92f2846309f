//! Contract state synchronizer
//!
//! Reads build one [`ContractSnapshot`]; writes follow submit -> wait for confirmation
//! -> refresh, so the snapshot held afterwards reflects the caller's own mutation.
//!
//! The snapshot is only ever replaced wholesale. A failed refresh leaves the previous
//! snapshot untouched. Each snapshot remembers the account it was read for, since
//! `has_voted` and `is_owner` say nothing about any other account.

use crate::contract::{coerce_candidates, ContractSnapshot, LedgerError};
use crate::session::SessionManager;
use crate::{Error, Result};
use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct StoreInner {
    snapshot: ContractSnapshot,
    /// Account whose view `snapshot` is
    snapshot_account: Option<Address>,
    refreshed_at: Option<DateTime<Utc>>,
    /// Single error slot; each failure overwrites the previous one
    error: Option<String>,
}

/// Shared state consumed by the presentation layer
#[derive(Debug, Default)]
pub struct StateStore {
    inner: RwLock<StoreInner>,
    /// Operations in flight; `is_loading` is any of them
    in_flight: AtomicUsize,
}

/// Marks an operation as in flight until dropped
pub struct BusyGuard<'a> {
    store: &'a StateStore,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.store.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> BusyGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        BusyGuard { store: self }
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub async fn snapshot(&self) -> ContractSnapshot {
        self.inner.read().await.snapshot.clone()
    }

    /// Account the current snapshot was read for
    pub async fn snapshot_account(&self) -> Option<Address> {
        self.inner.read().await.snapshot_account
    }

    /// Snapshot together with the account it was read for, under one lock
    pub async fn snapshot_with_account(&self) -> (ContractSnapshot, Option<Address>) {
        let inner = self.inner.read().await;
        (inner.snapshot.clone(), inner.snapshot_account)
    }

    /// The snapshot, only if it was read for `account`
    pub async fn snapshot_for(&self, account: Address) -> Option<ContractSnapshot> {
        let inner = self.inner.read().await;
        (inner.snapshot_account == Some(account)).then(|| inner.snapshot.clone())
    }

    pub async fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.refreshed_at
    }

    pub async fn error(&self) -> Option<String> {
        self.inner.read().await.error.clone()
    }

    pub async fn record_error(&self, error: &Error) {
        self.inner.write().await.error = Some(error.to_string());
    }

    pub async fn clear_error(&self) {
        self.inner.write().await.error = None;
    }

    async fn replace_snapshot(&self, account: Address, snapshot: ContractSnapshot) {
        let mut inner = self.inner.write().await;

        for candidate in &snapshot.candidates {
            if let Some(previous) = inner.snapshot.candidate(candidate.id) {
                if candidate.vote_count < previous.vote_count {
                    warn!(
                        candidate_id = candidate.id,
                        previous = previous.vote_count,
                        current = candidate.vote_count,
                        "Vote count decreased between snapshots"
                    );
                }
            }
        }

        inner.snapshot = snapshot;
        inner.snapshot_account = Some(account);
        inner.refreshed_at = Some(Utc::now());
    }
}

fn fetch_failed(e: LedgerError) -> Error {
    Error::FetchFailed(e.to_string())
}

fn transaction_failed(e: LedgerError) -> Error {
    Error::TransactionFailed(e.to_string())
}

/// Issues reads and writes against the session's contract reference
pub struct Synchronizer {
    session: Arc<SessionManager>,
    store: Arc<StateStore>,
}

impl Synchronizer {
    pub fn new(session: Arc<SessionManager>, store: Arc<StateStore>) -> Self {
        Self { session, store }
    }

    /// Rebuild the snapshot for `account`
    ///
    /// Errors are recorded in the error slot and returned.
    pub async fn refresh(&self, account: Address) -> Result<ContractSnapshot> {
        let _busy = self.store.begin();

        match self.fetch(account).await {
            Ok(snapshot) => {
                self.store.replace_snapshot(account, snapshot.clone()).await;
                info!(
                    account = %account,
                    candidates = snapshot.candidates.len(),
                    has_voted = snapshot.has_voted,
                    is_owner = snapshot.is_owner,
                    "Contract state refreshed"
                );
                Ok(snapshot)
            }
            Err(e) => {
                warn!(account = %account, error = %e, "Contract refresh failed");
                self.store.record_error(&e).await;
                Err(e)
            }
        }
    }

    async fn fetch(&self, account: Address) -> Result<ContractSnapshot> {
        let contract = self.session.contract_for(account).await?;

        let owner = contract.owner().await.map_err(fetch_failed)?;
        let raw_candidates = contract.get_candidates().await.map_err(fetch_failed)?;
        let candidates = coerce_candidates(raw_candidates).map_err(fetch_failed)?;
        let has_voted = contract.users(account).await.map_err(fetch_failed)?;

        // Failing here means no winner can be decided yet (e.g. no candidates)
        let winner = match contract.get_winner().await {
            Ok(winner) => winner,
            Err(e) => {
                debug!(error = %e, "No winner yet");
                String::new()
            }
        };

        Ok(ContractSnapshot {
            // Typed addresses compare by bytes, so checksum casing never matters
            is_owner: owner == account,
            owner,
            candidates,
            has_voted,
            winner,
        })
    }

    /// Register a new candidate (owner only; the ledger enforces it)
    ///
    /// Never fails past this boundary: returns whether the write was confirmed and
    /// records any failure in the error slot.
    pub async fn register_candidate(&self, name: &str) -> bool {
        let _busy = self.store.begin();
        self.store.clear_error().await;

        match self.try_register_candidate(name).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to add candidate");
                self.store.record_error(&e).await;
                false
            }
        }
    }

    async fn try_register_candidate(&self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput(
                "Please enter a candidate name".to_string(),
            ));
        }

        let account = self.session.account().await.ok_or(Error::NotConnected)?;
        let contract = self.session.contract_for(account).await?;
        if let Some(snapshot) = self.store.snapshot_for(account).await {
            if !snapshot.is_owner {
                warn!(account = %account, "Registering a candidate from a non-owner account");
            }
        }

        let pending = contract
            .new_candidate(name)
            .await
            .map_err(transaction_failed)?;
        debug!(name = %name, tx_hash = %pending.tx_hash(), "Candidate registration submitted");
        let confirmation = pending.wait().await.map_err(transaction_failed)?;
        info!(
            name = %name,
            tx_hash = %confirmation.tx_hash,
            block = ?confirmation.block_number,
            "Candidate registered"
        );

        // Ledger effect persisted; a failed refresh is recorded but not a write failure
        let _ = self.refresh(account).await;
        Ok(())
    }

    /// Vote for a candidate (once per account; the ledger enforces it)
    ///
    /// Same error containment as [`Synchronizer::register_candidate`].
    pub async fn vote_for_candidate(&self, candidate_id: u64) -> bool {
        let _busy = self.store.begin();
        self.store.clear_error().await;

        match self.try_vote(candidate_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(candidate_id, error = %e, "Failed to vote");
                self.store.record_error(&e).await;
                false
            }
        }
    }

    async fn try_vote(&self, candidate_id: u64) -> Result<()> {
        let account = self.session.account().await.ok_or(Error::NotConnected)?;
        let contract = self.session.contract_for(account).await?;
        if let Some(snapshot) = self.store.snapshot_for(account).await {
            if snapshot.has_voted {
                warn!(account = %account, "Account has already voted; expecting the ledger to revert");
            }
        }

        let pending = contract
            .vote(candidate_id)
            .await
            .map_err(transaction_failed)?;
        debug!(candidate_id, tx_hash = %pending.tx_hash(), "Vote submitted");
        let confirmation = pending.wait().await.map_err(transaction_failed)?;
        info!(
            candidate_id,
            tx_hash = %confirmation.tx_hash,
            block = ?confirmation.block_number,
            "Vote confirmed"
        );

        let _ = self.refresh(account).await;
        Ok(())
    }
}
