//! In-memory ledger for tests
//!
//! Behaves like the deployed voting contract: owner-only registration, one vote per
//! account, `getWinner` reverting while there are no candidates. Writes only take effect
//! when their `PendingWrite` is awaited, mirroring block confirmation.

use crate::contract::{
    Confirmation, ContractBinder, LedgerError, PendingWrite, RawCandidate, VotingContract,
};
use crate::wallet::{KeystoreWallet, SigningHandle};
use alloy::primitives::{keccak256, Address, U256};
use async_trait::async_trait;
use futures::FutureExt;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// Well-known local development keys (DO NOT use in production!)
pub const KEY_0: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const KEY_1: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

/// Keystore holding both development keys, KEY_0 active
pub fn dev_keystore() -> Arc<KeystoreWallet> {
    let keys = secrecy::SecretString::from(format!("{},{}", KEY_0, KEY_1));
    Arc::new(KeystoreWallet::from_secret(&keys).unwrap())
}

#[derive(Debug, Default)]
struct LedgerState {
    owner: Address,
    candidates: Vec<(String, u64)>,
    voters: HashSet<Address>,
    nonce: u64,
}

#[derive(Debug, Default)]
pub struct MockLedger {
    state: Mutex<LedgerState>,
    /// Every contract call, reads and writes
    calls: AtomicUsize,
    binds: AtomicUsize,
    pub fail_owner: AtomicBool,
    pub fail_candidates: AtomicBool,
    pub fail_users: AtomicBool,
    pub fail_winner: AtomicBool,
    /// Next confirmation reverts instead of applying
    pub revert_next_confirmation: AtomicBool,
}

impl MockLedger {
    pub fn new(owner: Address) -> Arc<Self> {
        let ledger = Self::default();
        ledger.state.lock().unwrap().owner = owner;
        Arc::new(ledger)
    }

    /// Seed a candidate directly, bypassing the owner check
    pub fn seed_candidate(&self, name: &str, votes: u64) {
        self.state
            .lock()
            .unwrap()
            .candidates
            .push((name.to_string(), votes));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn bind_count(&self) -> usize {
        self.binds.load(Ordering::SeqCst)
    }

    pub fn votes_for(&self, id: u64) -> u64 {
        self.state.lock().unwrap().candidates[id as usize].1
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn next_tx_hash(&self) -> alloy::primitives::TxHash {
        let mut state = self.state.lock().unwrap();
        state.nonce += 1;
        keccak256(state.nonce.to_be_bytes())
    }

    fn injected(flag: &AtomicBool, what: &str) -> Result<(), LedgerError> {
        if flag.load(Ordering::SeqCst) {
            return Err(LedgerError::Call(format!("{} read failed", what)));
        }
        Ok(())
    }
}

/// Contract handle bound to one sender
pub struct MockContract {
    ledger: Arc<MockLedger>,
    sender: Address,
}

impl MockContract {
    fn pending(
        &self,
        apply: impl FnOnce(&mut LedgerState) -> Result<(), LedgerError> + Send + 'static,
    ) -> PendingWrite {
        let tx_hash = self.ledger.next_tx_hash();
        let ledger = self.ledger.clone();

        PendingWrite::new(
            tx_hash,
            async move {
                if ledger.revert_next_confirmation.swap(false, Ordering::SeqCst) {
                    return Err(LedgerError::Reverted("out of gas".to_string()));
                }
                let mut state = ledger.state.lock().unwrap();
                apply(&mut *state)?;
                Ok(Confirmation {
                    tx_hash,
                    block_number: Some(state.nonce),
                })
            }
            .boxed(),
        )
    }
}

#[async_trait]
impl VotingContract for MockContract {
    async fn owner(&self) -> Result<Address, LedgerError> {
        self.ledger.record_call();
        MockLedger::injected(&self.ledger.fail_owner, "owner")?;
        Ok(self.ledger.state.lock().unwrap().owner)
    }

    async fn get_candidates(&self) -> Result<Vec<RawCandidate>, LedgerError> {
        self.ledger.record_call();
        MockLedger::injected(&self.ledger.fail_candidates, "candidates")?;
        let state = self.ledger.state.lock().unwrap();
        Ok(state
            .candidates
            .iter()
            .enumerate()
            .map(|(id, (name, votes))| RawCandidate {
                id: U256::from(id as u64),
                name: name.clone(),
                vote_count: U256::from(*votes),
            })
            .collect())
    }

    async fn users(&self, account: Address) -> Result<bool, LedgerError> {
        self.ledger.record_call();
        MockLedger::injected(&self.ledger.fail_users, "users")?;
        Ok(self.ledger.state.lock().unwrap().voters.contains(&account))
    }

    async fn get_winner(&self) -> Result<String, LedgerError> {
        self.ledger.record_call();
        MockLedger::injected(&self.ledger.fail_winner, "winner")?;
        let state = self.ledger.state.lock().unwrap();
        let mut winner: Option<&(String, u64)> = None;
        for candidate in &state.candidates {
            // Strictly greater: the first candidate read keeps ties
            if winner.map_or(true, |w| candidate.1 > w.1) {
                winner = Some(candidate);
            }
        }
        winner
            .map(|(name, _)| name.clone())
            .ok_or_else(|| LedgerError::Reverted("No candidates".to_string()))
    }

    async fn new_candidate(&self, name: &str) -> Result<PendingWrite, LedgerError> {
        self.ledger.record_call();
        if self.ledger.state.lock().unwrap().owner != self.sender {
            return Err(LedgerError::Reverted("Only owner".to_string()));
        }
        let name = name.to_string();
        Ok(self.pending(move |state| {
            state.candidates.push((name, 0));
            Ok(())
        }))
    }

    async fn vote(&self, candidate_id: u64) -> Result<PendingWrite, LedgerError> {
        self.ledger.record_call();
        let sender = self.sender;
        Ok(self.pending(move |state| {
            if state.voters.contains(&sender) {
                return Err(LedgerError::Reverted("Already voted".to_string()));
            }
            let candidate = state
                .candidates
                .get_mut(candidate_id as usize)
                .ok_or_else(|| LedgerError::Reverted("Invalid candidate".to_string()))?;
            candidate.1 += 1;
            state.voters.insert(sender);
            Ok(())
        }))
    }
}

/// Binds [`MockContract`]s against a shared [`MockLedger`]
pub struct MockBinder {
    pub ledger: Arc<MockLedger>,
}

impl ContractBinder for MockBinder {
    fn bind(&self, signer: &SigningHandle) -> Result<Arc<dyn VotingContract>, LedgerError> {
        self.ledger.binds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockContract {
            ledger: self.ledger.clone(),
            sender: signer.account(),
        }))
    }
}
