//! Dogecoin chain support for the wallet.
//!
//! Implements the full transaction pipeline from first principles:
//! secp256k1 arithmetic and ECDSA signing, Base58Check addresses and WIF
//! keys, P2PKH/P2SH/OP_RETURN scripts, canonical transaction serialization
//! with SIGHASH_ALL digests, and bounded-time coin selection.
//!
//! Network prefixes are always passed in as [`NetworkParams`]; nothing here
//! holds global state.

pub mod address;
pub mod base58;
pub mod builder;
pub mod curve;
pub mod ecdsa;
pub mod error;
pub mod hash;
pub mod network;
pub mod script;
pub mod transaction;
pub mod utxo;

pub use address::{
    private_key_to_wif, pubkey_to_address, script_for_address, validate_address,
    wif_to_private_key, Address,
};
pub use builder::{
    build_transaction, sign_transaction, sign_transaction_with_rng, verify_input, OpReturn,
    Payment, TransactionRequest, UnsignedTransaction,
};
pub use ecdsa::{PrivateKey, PublicKey, Signature};
pub use error::DogeError;
pub use network::{DogeNetwork, NetworkParams};
pub use script::DataFormat;
pub use transaction::{Transaction, TxInput, TxOutput, Txid};
pub use utxo::{
    filter_spendable, select_utxos, SelectionConfig, SelectionRequest, SelectionStrategy, Utxo,
    UtxoSelection,
};
