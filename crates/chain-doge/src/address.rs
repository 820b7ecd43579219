use zeroize::Zeroizing;

use crate::base58;
use crate::ecdsa::{PrivateKey, PublicKey};
use crate::error::DogeError;
use crate::network::NetworkParams;
use crate::script::{p2pkh_script, p2sh_script};

/// Byte length of a decoded address payload: version + hash160.
const ADDRESS_PAYLOAD_LEN: usize = 21;

/// Byte length of a decoded compressed-key WIF payload: version + key + flag.
const WIF_PAYLOAD_LEN: usize = 34;

const WIF_COMPRESSED_FLAG: u8 = 0x01;

/// A decoded Base58Check address.
///
/// The checksum is verified by [`Address::decode`] and recomputed by
/// [`Address::encode`], so it is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub version: u8,
    pub hash: [u8; 20],
}

impl Address {
    /// Decode any well-formed address regardless of network.
    ///
    /// Every Base58Check failure surfaces as [`DogeError::InvalidAddressFormat`].
    pub fn decode(address: &str) -> Result<Self, DogeError> {
        let payload = base58::decode_check(address.trim())
            .map_err(|e| DogeError::InvalidAddressFormat(format!("{address}: {e}")))?;
        if payload.len() != ADDRESS_PAYLOAD_LEN {
            return Err(DogeError::InvalidAddressFormat(format!(
                "{address}: expected {ADDRESS_PAYLOAD_LEN} payload bytes, got {}",
                payload.len()
            )));
        }
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&payload[1..]);
        Ok(Self {
            version: payload[0],
            hash,
        })
    }

    pub fn encode(&self) -> String {
        let mut payload = [0u8; ADDRESS_PAYLOAD_LEN];
        payload[0] = self.version;
        payload[1..].copy_from_slice(&self.hash);
        base58::encode_check(&payload)
    }

    /// Locking script for this address under `params`.
    pub fn script_pubkey(&self, params: &NetworkParams) -> Result<Vec<u8>, DogeError> {
        if self.version == params.pubkey_hash {
            Ok(p2pkh_script(&self.hash))
        } else if self.version == params.script_hash {
            Ok(p2sh_script(&self.hash))
        } else {
            Err(DogeError::UnsupportedAddressVersion(self.version))
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

impl std::str::FromStr for Address {
    type Err = DogeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

/// Derive the P2PKH address of a public key.
pub fn pubkey_to_address(pubkey: &PublicKey, params: &NetworkParams) -> String {
    Address {
        version: params.pubkey_hash,
        hash: pubkey.hash160(),
    }
    .encode()
}

/// Validate an address string for the given network.
///
/// Returns `Ok(true)` for a P2PKH or P2SH address of `params`, `Ok(false)`
/// for a well-formed address of another network, and an error if the
/// string does not decode at all.
pub fn validate_address(address: &str, params: &NetworkParams) -> Result<bool, DogeError> {
    let decoded = Address::decode(address)?;
    Ok(decoded.version == params.pubkey_hash || decoded.version == params.script_hash)
}

/// Decode an address and build its P2PKH or P2SH locking script.
pub fn script_for_address(address: &str, params: &NetworkParams) -> Result<Vec<u8>, DogeError> {
    Address::decode(address)?.script_pubkey(params)
}

/// Export a private key in compressed Wallet Import Format.
pub fn private_key_to_wif(key: &PrivateKey, params: &NetworkParams) -> Zeroizing<String> {
    let mut payload = Zeroizing::new([0u8; WIF_PAYLOAD_LEN]);
    payload[0] = params.wif;
    payload[1..33].copy_from_slice(&key.to_bytes());
    payload[33] = WIF_COMPRESSED_FLAG;
    Zeroizing::new(base58::encode_check(payload.as_ref()))
}

/// Import a compressed-key WIF string for the given network.
pub fn wif_to_private_key(wif: &str, params: &NetworkParams) -> Result<PrivateKey, DogeError> {
    let payload = Zeroizing::new(base58::decode_check(wif.trim())?);
    if payload.len() != WIF_PAYLOAD_LEN {
        return Err(DogeError::InvalidPrivateKey(format!(
            "expected {WIF_PAYLOAD_LEN} WIF payload bytes, got {}",
            payload.len()
        )));
    }
    if payload[0] != params.wif {
        return Err(DogeError::InvalidPrivateKey(format!(
            "WIF version 0x{:02x} does not match network version 0x{:02x}",
            payload[0], params.wif
        )));
    }
    if payload[33] != WIF_COMPRESSED_FLAG {
        return Err(DogeError::InvalidPrivateKey(
            "missing compressed-key flag".into(),
        ));
    }
    PrivateKey::from_bytes(&payload[1..33])
}
