use chain_doge::{
    build_transaction, filter_spendable, private_key_to_wif, pubkey_to_address, sign_transaction,
    wif_to_private_key, NetworkParams, OpReturn, Payment, PrivateKey, PublicKey, SelectionConfig,
    SelectionStrategy, TransactionRequest, Utxo,
};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::collaborator::{Broadcaster, UtxoSource};
use crate::error::WalletError;

/// What to send: an optional payment and an optional OP_RETURN payload.
/// Change always returns to the wallet's own address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    pub recipient: Option<Payment>,
    pub op_return: Option<OpReturn>,
}

impl SendRequest {
    pub fn payment(address: impl Into<String>, amount: u64) -> Self {
        Self {
            recipient: Some(Payment {
                address: address.into(),
                amount,
            }),
            op_return: None,
        }
    }

    pub fn with_op_return(mut self, op_return: OpReturn) -> Self {
        self.op_return = Some(op_return);
        self
    }
}

/// A signed transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedTransaction {
    pub raw_hex: String,
    pub txid: String,
    pub fee: u64,
    pub change: Option<u64>,
    pub inputs: usize,
    pub strategy: SelectionStrategy,
}

/// A single-key P2PKH wallet bound to one network.
pub struct Wallet {
    key: PrivateKey,
    public_key: PublicKey,
    params: NetworkParams,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Wallet {
    pub fn generate(params: NetworkParams) -> Result<Self, WalletError> {
        Self::from_private_key(PrivateKey::generate()?, params)
    }

    pub fn generate_with_rng<R: RngCore + CryptoRng>(
        rng: &mut R,
        params: NetworkParams,
    ) -> Result<Self, WalletError> {
        Self::from_private_key(PrivateKey::generate_with_rng(rng)?, params)
    }

    pub fn from_private_key(key: PrivateKey, params: NetworkParams) -> Result<Self, WalletError> {
        let public_key = key.public_key()?;
        Ok(Self {
            key,
            public_key,
            params,
        })
    }

    /// Import a WIF key. The key must carry this network's WIF version.
    pub fn from_wif(wif: &str, params: NetworkParams) -> Result<Self, WalletError> {
        let key = wif_to_private_key(wif, &params)
            .map_err(|e| WalletError::InvalidPrivateKey(e.to_string()))?;
        Self::from_private_key(key, params)
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    pub fn address(&self) -> String {
        pubkey_to_address(&self.public_key, &self.params)
    }

    pub fn wif(&self) -> Zeroizing<String> {
        private_key_to_wif(&self.key, &self.params)
    }

    pub fn public_key_hex(&self) -> String {
        self.public_key.to_hex()
    }

    /// The P2PKH locking script of this wallet's address.
    pub fn script_pubkey(&self) -> Vec<u8> {
        chain_doge::script::p2pkh_script(&self.public_key.hash160())
    }

    /// Select from `utxos`, build, and sign. Unconfirmed or malformed UTXOs
    /// are skipped.
    pub fn create_transaction(
        &self,
        utxos: &[Utxo],
        request: &SendRequest,
        config: &SelectionConfig,
    ) -> Result<SignedTransaction, WalletError> {
        let spendable = filter_spendable(utxos);
        if spendable.len() < utxos.len() {
            info!(
                skipped = utxos.len() - spendable.len(),
                "ignoring unspendable UTXOs"
            );
        }

        let tx_request = TransactionRequest {
            recipient: request.recipient.clone(),
            op_return: request.op_return.clone(),
            change_address: self.address(),
        };
        let unsigned = build_transaction(
            &spendable,
            &tx_request,
            &self.script_pubkey(),
            &self.params,
            config,
        )?;
        let signed = sign_transaction(&unsigned, &self.key)?;

        Ok(SignedTransaction {
            raw_hex: signed.to_hex()?,
            txid: signed.txid()?.to_hex(),
            fee: unsigned.fee,
            change: unsigned.change,
            inputs: signed.inputs.len(),
            strategy: unsigned.strategy,
        })
    }

    /// Fetch UTXOs, create a transaction, and broadcast it.
    pub fn send(
        &self,
        source: &dyn UtxoSource,
        broadcaster: &dyn Broadcaster,
        request: &SendRequest,
        config: &SelectionConfig,
    ) -> Result<SignedTransaction, WalletError> {
        let address = self.address();
        let utxos = source.fetch_utxos(&address)?;
        info!(%address, utxos = utxos.len(), "fetched UTXOs");

        let signed = self.create_transaction(&utxos, request, config)?;
        let reported = broadcaster.broadcast(&signed.raw_hex)?;
        if !reported.eq_ignore_ascii_case(&signed.txid) {
            warn!(expected = %signed.txid, %reported, "broadcaster reported a different txid");
        }
        info!(txid = %signed.txid, fee = signed.fee, "broadcast transaction");
        Ok(signed)
    }
}
