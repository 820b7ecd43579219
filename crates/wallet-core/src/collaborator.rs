//! Interfaces to the services a wallet depends on but does not implement:
//! an indexer that lists UTXOs and a node or explorer that relays raw
//! transactions.

use chain_doge::utxo::ExplorerUtxo;
use chain_doge::Utxo;

use crate::error::WalletError;

/// Lists the unspent outputs of an address.
pub trait UtxoSource {
    fn fetch_utxos(&self, address: &str) -> Result<Vec<Utxo>, WalletError>;
}

/// Relays a signed transaction and returns the txid the network reports.
pub trait Broadcaster {
    fn broadcast(&self, raw_tx_hex: &str) -> Result<String, WalletError>;
}

/// Parse the JSON array an Esplora-style `/address/{addr}/utxo` endpoint
/// returns.
pub fn parse_explorer_utxos(json: &str) -> Result<Vec<Utxo>, WalletError> {
    let entries: Vec<ExplorerUtxo> = serde_json::from_str(json)
        .map_err(|e| WalletError::UtxoSource(format!("unexpected UTXO response: {e}")))?;
    Ok(entries.into_iter().map(Utxo::from).collect())
}
