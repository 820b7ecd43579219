use std::path::Path;

use chain_doge::{DogeNetwork, NetworkParams, SelectionConfig};
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// Wallet settings, loadable from JSON. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub network: DogeNetwork,
    pub selection: SelectionConfig,
    /// Block-explorer base URL handed to collaborators. Falls back to the
    /// network default.
    pub explorer_url: Option<String>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: DogeNetwork::Testnet,
            selection: SelectionConfig::default(),
            explorer_url: None,
        }
    }
}

impl WalletConfig {
    pub fn from_json(json: &str) -> Result<Self, WalletError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| WalletError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn params(&self) -> NetworkParams {
        self.network.params()
    }

    /// The configured explorer URL, or the network's default.
    pub fn explorer_url(&self) -> Option<&str> {
        self.explorer_url
            .as_deref()
            .or_else(|| self.network.default_explorer_url())
    }

    fn validate(&self) -> Result<(), WalletError> {
        if self.selection.max_inputs == 0 {
            return Err(WalletError::InvalidConfig(
                "selection.max_inputs must be at least 1".into(),
            ));
        }
        if let Some(url) = &self.explorer_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(WalletError::InvalidConfig(format!(
                    "explorer_url must be an http(s) URL, got {url:?}"
                )));
            }
        }
        Ok(())
    }
}
