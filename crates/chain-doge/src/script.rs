//! Locking and unlocking script construction.

use crate::error::DogeError;
use crate::transaction::SIGHASH_ALL;

pub const OP_RETURN: u8 = 0x6a;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;

/// Largest payload a single opcode byte can push.
pub const MAX_DIRECT_PUSH: usize = 75;

/// Relay-policy limit for OP_RETURN payloads.
pub const MAX_OP_RETURN_BYTES: usize = 80;

/// Length of a P2PKH locking script.
pub const P2PKH_SCRIPT_LEN: usize = 25;

/// How an OP_RETURN payload string is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// The string's UTF-8 bytes.
    #[default]
    Utf8,
    /// Hex digits; ASCII whitespace is ignored.
    Hex,
}

/// Append a minimal push of `data` to `script`.
pub fn push_data(script: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    if len <= MAX_DIRECT_PUSH {
        script.push(len as u8);
    } else if len <= u8::MAX as usize {
        script.push(OP_PUSHDATA1);
        script.push(len as u8);
    } else {
        script.push(OP_PUSHDATA2);
        script.extend_from_slice(&(len as u16).to_le_bytes());
    }
    script.extend_from_slice(data);
}

/// `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`
pub fn p2pkh_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(P2PKH_SCRIPT_LEN);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    push_data(&mut script, pubkey_hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// `OP_HASH160 <hash> OP_EQUAL`
pub fn p2sh_script(script_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(23);
    script.push(OP_HASH160);
    push_data(&mut script, script_hash);
    script.push(OP_EQUAL);
    script
}

/// Build an OP_RETURN data-carrier script from a caller-formatted string.
pub fn op_return_script(data: &str, format: DataFormat) -> Result<Vec<u8>, DogeError> {
    match format {
        DataFormat::Utf8 => op_return_script_from_bytes(data.as_bytes()),
        DataFormat::Hex => {
            let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            let bytes = hex::decode(compact)?;
            op_return_script_from_bytes(&bytes)
        }
    }
}

/// `OP_RETURN <push payload>`. Payloads above 75 bytes use `OP_PUSHDATA1`;
/// above 80 bytes they are rejected.
pub fn op_return_script_from_bytes(payload: &[u8]) -> Result<Vec<u8>, DogeError> {
    if payload.len() > MAX_OP_RETURN_BYTES {
        return Err(DogeError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_OP_RETURN_BYTES,
        });
    }
    let mut script = Vec::with_capacity(payload.len() + 3);
    script.push(OP_RETURN);
    push_data(&mut script, payload);
    Ok(script)
}

/// P2PKH unlocking script: `<DER sig || SIGHASH_ALL> <pubkey>`.
pub fn p2pkh_script_sig(der_signature: &[u8], pubkey: &[u8]) -> Vec<u8> {
    let mut sig = Vec::with_capacity(der_signature.len() + 1);
    sig.extend_from_slice(der_signature);
    sig.push(SIGHASH_ALL as u8);

    let mut script = Vec::with_capacity(sig.len() + pubkey.len() + 2);
    push_data(&mut script, &sig);
    push_data(&mut script, pubkey);
    script
}

/// The 20-byte hash of a P2PKH locking script, `None` for any other shape.
pub fn p2pkh_hash(script: &[u8]) -> Option<[u8; 20]> {
    match script {
        [OP_DUP, OP_HASH160, 20, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG] => hash.try_into().ok(),
        _ => None,
    }
}

/// Split a P2PKH unlocking script into its signature push (DER plus hash
/// type byte) and public-key push. Only direct pushes are accepted.
pub fn parse_p2pkh_script_sig(script_sig: &[u8]) -> Option<(&[u8], &[u8])> {
    let (&sig_len, rest) = script_sig.split_first()?;
    let sig_len = sig_len as usize;
    if sig_len == 0 || sig_len > MAX_DIRECT_PUSH || rest.len() < sig_len {
        return None;
    }
    let (sig, rest) = rest.split_at(sig_len);
    let (&key_len, pubkey) = rest.split_first()?;
    if key_len as usize > MAX_DIRECT_PUSH || pubkey.len() != key_len as usize {
        return None;
    }
    Some((sig, pubkey))
}
