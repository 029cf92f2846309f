//! Voting dApp client
//!
//! Wallet session and contract state synchronization for an on-chain voting contract:
//! - Connect to a wallet provider and bind the contract to the active account's signer
//! - Read owner, candidates, voted flag and winner into one atomic snapshot
//! - Register candidates and cast votes, refreshing only after ledger confirmation
//!
//! # Layers
//!
//! - [`session::SessionManager`] owns the wallet connection and contract binding
//! - [`sync::Synchronizer`] issues reads/writes and keeps the snapshot consistent
//! - [`client::VotingClient`] is the state + operations surface a UI consumes

pub mod client;
pub mod config;
pub mod contract;
pub mod session;
pub mod sync;
pub mod wallet;

mod error;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use client::{ClientState, VotingClient};
pub use config::{Config, RpcConfig};
pub use contract::{Candidate, ContractSnapshot};
pub use error::{Error, Result};
pub use session::SessionPhase;
