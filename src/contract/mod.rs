//! Voting contract boundary
//!
//! Everything the ledger returns crosses into the crate through this module:
//! - [`VotingContract`] is the bound contract reference (reads + writes)
//! - [`ContractBinder`] derives a contract reference from a signing handle
//! - Raw replies ([`RawCandidate`]) are coerced into [`Candidate`] here, so malformed
//!   data never reaches the synchronizer

mod binding;
mod revert;

pub use binding::{AlloyBinder, AlloyVotingContract};
pub use revert::parse_revert_reason;

use crate::wallet::SigningHandle;
use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Errors reported by the contract boundary
#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    #[error("Contract call failed: {0}")]
    Call(String),

    #[error("Execution reverted: {0}")]
    Reverted(String),

    #[error("Malformed contract reply: {0}")]
    Malformed(String),

    #[error("Failed to submit transaction: {0}")]
    Submit(String),

    #[error("Failed to bind contract: {0}")]
    Binding(String),
}

/// Candidate exactly as the ledger encodes it
#[derive(Debug, Clone)]
pub struct RawCandidate {
    pub id: U256,
    pub name: String,
    pub vote_count: U256,
}

/// A voting candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Ledger-assigned, immutable id
    pub id: u64,
    pub name: String,
    /// Never decreases
    pub vote_count: u64,
}

impl TryFrom<RawCandidate> for Candidate {
    type Error = LedgerError;

    fn try_from(raw: RawCandidate) -> Result<Self, Self::Error> {
        let id = u64::try_from(raw.id)
            .map_err(|_| LedgerError::Malformed(format!("candidate id {} out of range", raw.id)))?;
        let vote_count = u64::try_from(raw.vote_count).map_err(|_| {
            LedgerError::Malformed(format!(
                "vote count {} for candidate {} out of range",
                raw.vote_count, id
            ))
        })?;
        if raw.name.trim().is_empty() {
            return Err(LedgerError::Malformed(format!(
                "candidate {} has an empty name",
                id
            )));
        }

        Ok(Self {
            id,
            name: raw.name,
            vote_count,
        })
    }
}

/// Coerce a raw candidate list, keeping ledger order
pub fn coerce_candidates(raw: Vec<RawCandidate>) -> Result<Vec<Candidate>, LedgerError> {
    let mut seen = HashSet::with_capacity(raw.len());
    let mut candidates = Vec::with_capacity(raw.len());

    for item in raw {
        let candidate = Candidate::try_from(item)?;
        if !seen.insert(candidate.id) {
            return Err(LedgerError::Malformed(format!(
                "duplicate candidate id {}",
                candidate.id
            )));
        }
        candidates.push(candidate);
    }

    Ok(candidates)
}

/// One atomically assembled read of contract state
///
/// `has_voted` and `is_owner` are only meaningful for the account the snapshot was
/// fetched for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSnapshot {
    pub owner: Address,
    pub candidates: Vec<Candidate>,
    pub has_voted: bool,
    /// Empty when no winner is decided
    pub winner: String,
    pub is_owner: bool,
}

impl ContractSnapshot {
    /// Look up a candidate by id
    pub fn candidate(&self, id: u64) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == id)
    }

    /// Whether the candidate is the current winner
    pub fn is_winner(&self, candidate: &Candidate) -> bool {
        !self.winner.is_empty() && candidate.name == self.winner
    }
}

/// Result of a confirmed write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
}

/// A submitted write awaiting ledger confirmation
///
/// There is no way to cancel it: `wait` resolves only on confirmation or on a
/// transaction-level failure.
pub struct PendingWrite {
    tx_hash: TxHash,
    confirmation: BoxFuture<'static, Result<Confirmation, LedgerError>>,
}

impl PendingWrite {
    pub fn new(
        tx_hash: TxHash,
        confirmation: BoxFuture<'static, Result<Confirmation, LedgerError>>,
    ) -> Self {
        Self {
            tx_hash,
            confirmation,
        }
    }

    pub fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    /// Wait for the ledger to confirm (or revert) the write
    pub async fn wait(self) -> Result<Confirmation, LedgerError> {
        self.confirmation.await
    }
}

impl std::fmt::Debug for PendingWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingWrite")
            .field("tx_hash", &self.tx_hash)
            .finish_non_exhaustive()
    }
}

/// Contract reference bound to one signer
#[async_trait]
pub trait VotingContract: Send + Sync {
    async fn owner(&self) -> Result<Address, LedgerError>;

    async fn get_candidates(&self) -> Result<Vec<RawCandidate>, LedgerError>;

    /// Whether `account` has already voted
    async fn users(&self, account: Address) -> Result<bool, LedgerError>;

    /// Fails while no winner can be determined (e.g. no candidates yet)
    async fn get_winner(&self) -> Result<String, LedgerError>;

    async fn new_candidate(&self, name: &str) -> Result<PendingWrite, LedgerError>;

    async fn vote(&self, candidate_id: u64) -> Result<PendingWrite, LedgerError>;
}

/// Derives a contract reference bound to a signer
pub trait ContractBinder: Send + Sync {
    fn bind(&self, signer: &SigningHandle) -> Result<Arc<dyn VotingContract>, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: u64, name: &str, votes: u64) -> RawCandidate {
        RawCandidate {
            id: U256::from(id),
            name: name.to_string(),
            vote_count: U256::from(votes),
        }
    }

    #[test]
    fn test_coerce_keeps_ledger_order() {
        let candidates =
            coerce_candidates(vec![raw(2, "Carol", 0), raw(0, "Alice", 5), raw(1, "Bob", 3)])
                .unwrap();

        let ids: Vec<u64> = candidates.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 0, 1]);
        assert_eq!(candidates[1].vote_count, 5);
    }

    #[test]
    fn test_coerce_rejects_oversized_values() {
        let mut bad = raw(0, "Alice", 0);
        bad.id = U256::MAX;
        assert!(matches!(
            Candidate::try_from(bad),
            Err(LedgerError::Malformed(_))
        ));

        let mut bad = raw(0, "Alice", 0);
        bad.vote_count = U256::from(u64::MAX) + U256::from(1);
        assert!(matches!(
            Candidate::try_from(bad),
            Err(LedgerError::Malformed(_))
        ));
    }

    #[test]
    fn test_coerce_rejects_empty_name() {
        let err = Candidate::try_from(raw(4, "  ", 1)).unwrap_err();
        assert!(err.to_string().contains("empty name"));
    }

    #[test]
    fn test_coerce_rejects_duplicate_ids() {
        let err = coerce_candidates(vec![raw(1, "Alice", 0), raw(1, "Bob", 0)]).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_snapshot_lookups() {
        let snapshot = ContractSnapshot {
            candidates: coerce_candidates(vec![raw(0, "Alice", 2), raw(1, "Bob", 1)]).unwrap(),
            winner: "Alice".to_string(),
            ..Default::default()
        };

        let alice = snapshot.candidate(0).unwrap();
        let bob = snapshot.candidate(1).unwrap();
        assert!(snapshot.is_winner(alice));
        assert!(!snapshot.is_winner(bob));
        assert!(snapshot.candidate(7).is_none());
    }

    #[test]
    fn test_no_winner_when_undecided() {
        let snapshot = ContractSnapshot {
            candidates: coerce_candidates(vec![raw(0, "Alice", 0)]).unwrap(),
            ..Default::default()
        };
        assert!(!snapshot.is_winner(&snapshot.candidates[0]));
    }

    #[tokio::test]
    async fn test_pending_write_hash_known_before_confirmation() {
        let hash = TxHash::repeat_byte(0xab);
        let pending = PendingWrite::new(
            hash,
            Box::pin(async move {
                Ok(Confirmation {
                    tx_hash: hash,
                    block_number: Some(7),
                })
            }),
        );

        assert_eq!(pending.tx_hash(), hash);
        assert!(format!("{:?}", pending).contains("tx_hash"));

        let confirmation = pending.wait().await.unwrap();
        assert_eq!(confirmation.tx_hash, hash);
        assert_eq!(confirmation.block_number, Some(7));
    }
}
