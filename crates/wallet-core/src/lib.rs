//! Single-key Dogecoin wallet on top of `chain-doge`.
//!
//! [`Wallet`] owns one secp256k1 key and turns a [`SendRequest`] into a
//! signed, serialized transaction. UTXO lookup and broadcasting are left to
//! [`UtxoSource`] and [`Broadcaster`] implementations supplied by the caller.

pub mod collaborator;
pub mod config;
pub mod error;
pub mod wallet;

pub use chain_doge::{DataFormat, DogeNetwork, OpReturn, Payment, SelectionConfig, Utxo};
pub use collaborator::{parse_explorer_utxos, Broadcaster, UtxoSource};
pub use config::WalletConfig;
pub use error::WalletError;
pub use wallet::{SendRequest, SignedTransaction, Wallet};

// ─── Free-function API ───────────────────────────────────────────────

/// Generate a fresh key and return its WIF for `network`.
pub fn generate_wif(network: DogeNetwork) -> Result<String, WalletError> {
    let wallet = Wallet::generate(network.params())?;
    Ok(wallet.wif().to_string())
}

/// Derive the P2PKH address of a WIF key.
pub fn address_from_wif(wif: &str, network: DogeNetwork) -> Result<String, WalletError> {
    Ok(Wallet::from_wif(wif, network.params())?.address())
}

/// Validate an address for `network`.
///
/// `Ok(false)` means well-formed but for another network or address type.
pub fn validate_address(address: &str, network: DogeNetwork) -> Result<bool, WalletError> {
    Ok(chain_doge::validate_address(address, &network.params())?)
}

/// Sign a payment from a WIF key and return the raw transaction hex.
pub fn sign_payment(
    wif: &str,
    utxos: &[Utxo],
    recipient: &str,
    amount: u64,
    config: &WalletConfig,
) -> Result<SignedTransaction, WalletError> {
    let wallet = Wallet::from_wif(wif, config.params())?;
    wallet.create_transaction(
        utxos,
        &SendRequest::payment(recipient, amount),
        &config.selection,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_wif_derives_network_address() {
        let wif = generate_wif(DogeNetwork::Mainnet).unwrap();
        let address = address_from_wif(&wif, DogeNetwork::Mainnet).unwrap();
        assert!(address.starts_with('D'));
        assert!(validate_address(&address, DogeNetwork::Mainnet).unwrap());
        assert!(!validate_address(&address, DogeNetwork::Testnet).unwrap());
    }

    #[test]
    fn garbage_address_is_an_error() {
        assert!(validate_address("not-an-address", DogeNetwork::Testnet).is_err());
    }
}
