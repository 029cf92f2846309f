//! Error types for the voting client

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// No wallet provider was detected at startup. Fatal until restart.
    #[error("Please install MetaMask!")]
    ProviderUnavailable,

    #[error("Wallet connection denied: {0}")]
    ConnectionDenied(String),

    #[error("Wallet session not initialized")]
    NotInitialized,

    #[error("Wallet not connected")]
    NotConnected,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to fetch contract data: {0}")]
    FetchFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
