use chain_doge::DogeError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Insufficient funds: need {needed} koinu, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Transaction build failed: {0}")]
    TransactionFailed(String),

    #[error("UTXO lookup failed: {0}")]
    UtxoSource(String),

    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<DogeError> for WalletError {
    fn from(e: DogeError) -> Self {
        match e {
            DogeError::InvalidPrivateKey(msg) => WalletError::InvalidPrivateKey(msg),
            DogeError::InvalidAddressFormat(_) | DogeError::UnsupportedAddressVersion(_) => {
                WalletError::InvalidAddress(e.to_string())
            }
            DogeError::InsufficientFunds { needed, available } => {
                WalletError::InsufficientFunds { needed, available }
            }
            DogeError::SigningError(_) | DogeError::InvalidSignature(_) => {
                WalletError::SigningFailed(e.to_string())
            }
            other => WalletError::TransactionFailed(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(e: serde_json::Error) -> Self {
        WalletError::InvalidConfig(e.to_string())
    }
}
