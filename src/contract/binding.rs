//! alloy binding for the on-chain voting contract

use super::{
    parse_revert_reason, Confirmation, ContractBinder, LedgerError, PendingWrite, RawCandidate,
    VotingContract,
};
use crate::config::{Config, RpcConfig};
use crate::wallet::SigningHandle;
use alloy::network::{Ethereum, ReceiptResponse};
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy::sol;
use async_trait::async_trait;
use futures::FutureExt;
use std::sync::Arc;

sol! {
    #[sol(rpc)]
    contract Voting {
        struct Candidate {
            uint256 id;
            string name;
            uint256 voteCount;
        }

        function owner() external view returns (address);
        function getCandidates() external view returns (Candidate[] memory);
        function users(address voter) external view returns (bool);
        function getWinner() external view returns (string memory);
        function newCandidate(string memory name) external;
        function vote(uint256 candidateId) external;
    }
}

fn read_error(e: alloy::contract::Error) -> LedgerError {
    let message = e.to_string();
    if message.contains("execution reverted") {
        LedgerError::Reverted(parse_revert_reason(&message))
    } else {
        LedgerError::Call(message)
    }
}

fn submit_error(e: alloy::contract::Error) -> LedgerError {
    let message = e.to_string();
    if message.contains("execution reverted") {
        LedgerError::Reverted(parse_revert_reason(&message))
    } else {
        LedgerError::Submit(message)
    }
}

/// Voting contract reached over JSON-RPC, signing with the session's wallet
pub struct AlloyVotingContract {
    instance: Voting::VotingInstance<DynProvider>,
    confirmations: u64,
}

impl AlloyVotingContract {
    fn track(&self, pending: PendingTransactionBuilder<Ethereum>) -> PendingWrite {
        let tx_hash = *pending.tx_hash();
        let confirmations = self.confirmations;
        tracing::info!(tx_hash = %tx_hash, "Transaction submitted");

        PendingWrite::new(
            tx_hash,
            async move {
                let receipt = pending
                    .with_required_confirmations(confirmations)
                    .get_receipt()
                    .await
                    .map_err(|e| LedgerError::Call(e.to_string()))?;

                if !ReceiptResponse::status(&receipt) {
                    return Err(LedgerError::Reverted(format!(
                        "transaction {} reverted",
                        tx_hash
                    )));
                }

                Ok(Confirmation {
                    tx_hash,
                    block_number: ReceiptResponse::block_number(&receipt),
                })
            }
            .boxed(),
        )
    }
}

#[async_trait]
impl VotingContract for AlloyVotingContract {
    async fn owner(&self) -> Result<Address, LedgerError> {
        self.instance.owner().call().await.map_err(read_error)
    }

    async fn get_candidates(&self) -> Result<Vec<RawCandidate>, LedgerError> {
        let candidates = self
            .instance
            .getCandidates()
            .call()
            .await
            .map_err(read_error)?;

        Ok(candidates
            .into_iter()
            .map(|c| RawCandidate {
                id: c.id,
                name: c.name,
                vote_count: c.voteCount,
            })
            .collect())
    }

    async fn users(&self, account: Address) -> Result<bool, LedgerError> {
        self.instance.users(account).call().await.map_err(read_error)
    }

    async fn get_winner(&self) -> Result<String, LedgerError> {
        self.instance.getWinner().call().await.map_err(read_error)
    }

    async fn new_candidate(&self, name: &str) -> Result<PendingWrite, LedgerError> {
        let pending = self
            .instance
            .newCandidate(name.to_string())
            .send()
            .await
            .map_err(submit_error)?;
        Ok(self.track(pending))
    }

    async fn vote(&self, candidate_id: u64) -> Result<PendingWrite, LedgerError> {
        let pending = self
            .instance
            .vote(U256::from(candidate_id))
            .send()
            .await
            .map_err(submit_error)?;
        Ok(self.track(pending))
    }
}

/// Binds the voting contract over HTTP JSON-RPC
#[derive(Debug, Clone)]
pub struct AlloyBinder {
    rpc_url: url::Url,
    contract: Address,
    confirmations: u64,
}

impl AlloyBinder {
    pub fn new(rpc_url: &str, contract: Address, confirmations: u64) -> Result<Self, LedgerError> {
        let rpc_url: url::Url = rpc_url
            .parse()
            .map_err(|e| LedgerError::Binding(format!("Invalid RPC URL: {}", e)))?;

        Ok(Self {
            rpc_url,
            contract,
            confirmations: confirmations.max(1),
        })
    }

    /// Create a binder for the configured contract and chain
    pub fn from_config(config: &Config, rpc: &RpcConfig) -> crate::Result<Self> {
        let chain_id = config.contract.chain_id;
        let rpc_url = rpc.get(chain_id).ok_or_else(|| {
            crate::Error::Config(format!("No RPC URL configured for chain {}", chain_id))
        })?;

        Self::new(rpc_url, config.contract.address, config.confirmations)
            .map_err(|e| crate::Error::Config(e.to_string()))
    }

    pub fn contract_address(&self) -> Address {
        self.contract
    }
}

impl ContractBinder for AlloyBinder {
    fn bind(&self, signer: &SigningHandle) -> Result<Arc<dyn VotingContract>, LedgerError> {
        let provider = ProviderBuilder::new()
            .wallet(signer.wallet().clone())
            .connect_http(self.rpc_url.clone())
            .erased();

        tracing::debug!(
            account = %signer.account(),
            contract = %self.contract,
            "Bound voting contract"
        );

        Ok(Arc::new(AlloyVotingContract {
            instance: Voting::new(self.contract, provider),
            confirmations: self.confirmations,
        }))
    }
}
