use thiserror::Error;

/// Dogecoin core operation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DogeError {
    #[error("invalid base58 character '{character}' at position {position}")]
    InvalidCharacter { character: char, position: usize },

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("unsupported address version: 0x{0:02x}")]
    UnsupportedAddressVersion(u8),

    #[error("invalid address format: {0}")]
    InvalidAddressFormat(String),

    #[error("payload too large: {len} bytes, maximum is {max}")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("insufficient funds: need {needed} koinu, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("signing error: {0}")]
    SigningError(String),
}

impl From<hex::FromHexError> for DogeError {
    fn from(e: hex::FromHexError) -> Self {
        DogeError::InvalidHex(e.to_string())
    }
}
