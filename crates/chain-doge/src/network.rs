use serde::{Deserialize, Serialize};

/// Version bytes that select the address and WIF prefixes of a network.
///
/// Every address and WIF operation takes these explicitly; nothing in the
/// crate holds a "current network".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkParams {
    /// Version byte of pay-to-public-key-hash addresses.
    pub pubkey_hash: u8,
    /// Version byte of pay-to-script-hash addresses.
    pub script_hash: u8,
    /// Version byte of WIF-encoded private keys.
    pub wif: u8,
}

/// Supported Dogecoin networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DogeNetwork {
    Mainnet,
    Testnet,
}

impl DogeNetwork {
    /// Address and WIF version bytes for this network.
    pub fn params(self) -> NetworkParams {
        match self {
            DogeNetwork::Mainnet => NetworkParams {
                pubkey_hash: 0x1e,
                script_hash: 0x16,
                wif: 0x9e,
            },
            DogeNetwork::Testnet => NetworkParams {
                pubkey_hash: 0x71,
                script_hash: 0xc4,
                wif: 0xf1,
            },
        }
    }
}

impl DogeNetwork {
    /// Esplora-style block-explorer base URL, where a public one is known.
    pub fn default_explorer_url(self) -> Option<&'static str> {
        match self {
            DogeNetwork::Mainnet => None,
            DogeNetwork::Testnet => Some("https://doge-electrs-testnet-demo.qed.me"),
        }
    }
}

impl From<DogeNetwork> for NetworkParams {
    fn from(network: DogeNetwork) -> Self {
        network.params()
    }
}

impl std::fmt::Display for DogeNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DogeNetwork::Mainnet => write!(f, "mainnet"),
            DogeNetwork::Testnet => write!(f, "testnet"),
        }
    }
}
