//! Transaction assembly and signing.
//!
//! [`build_transaction`] turns a UTXO set and a payment request into an
//! unsigned transaction with its prevout scripts; [`sign_transaction`]
//! produces the signed copy.

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::address::script_for_address;
use crate::ecdsa::{PrivateKey, PublicKey, Signature};
use crate::error::DogeError;
use crate::network::NetworkParams;
use crate::script::{
    op_return_script, p2pkh_hash, p2pkh_script_sig, parse_p2pkh_script_sig, DataFormat,
};
use crate::transaction::{
    output_size, signature_hash, Transaction, TxInput, TxOutput, Txid, SIGHASH_ALL,
};
use crate::utxo::{select_utxos, SelectionConfig, SelectionRequest, SelectionStrategy, Utxo};

/// A value transfer to one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub address: String,
    /// Koinu.
    pub amount: u64,
}

/// A data-carrier output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpReturn {
    pub data: String,
    #[serde(default)]
    pub format: DataFormat,
}

/// What a transaction should do. At least one of `recipient` and
/// `op_return` must be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub recipient: Option<Payment>,
    pub op_return: Option<OpReturn>,
    /// Receives change at or above the dust threshold.
    pub change_address: String,
}

/// A built transaction awaiting signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub tx: Transaction,
    /// Locking script spent by each input, in input order.
    pub prevout_scripts: Vec<Vec<u8>>,
    pub fee: u64,
    pub change: Option<u64>,
    pub strategy: SelectionStrategy,
}

/// Select inputs and assemble an unsigned transaction.
///
/// Outputs are ordered recipient, OP_RETURN, change. Every selected UTXO is
/// assumed to be locked by `spend_script`.
pub fn build_transaction(
    utxos: &[Utxo],
    request: &TransactionRequest,
    spend_script: &[u8],
    params: &NetworkParams,
    config: &SelectionConfig,
) -> Result<UnsignedTransaction, DogeError> {
    if request.recipient.is_none() && request.op_return.is_none() {
        return Err(DogeError::MalformedTransaction(
            "a transaction needs a recipient or an OP_RETURN output".into(),
        ));
    }

    let mut outputs = Vec::with_capacity(3);
    let mut amount = 0u64;
    if let Some(payment) = &request.recipient {
        if payment.amount == 0 {
            return Err(DogeError::MalformedTransaction(
                "payment amount must be positive".into(),
            ));
        }
        amount = payment.amount;
        outputs.push(TxOutput {
            value: payment.amount,
            script_pubkey: script_for_address(&payment.address, params)?,
        });
    }

    let mut extra_output_bytes = 0;
    if let Some(op_return) = &request.op_return {
        let script_pubkey = op_return_script(&op_return.data, op_return.format)?;
        extra_output_bytes = output_size(&script_pubkey);
        outputs.push(TxOutput {
            value: 0,
            script_pubkey,
        });
    }

    let change_script = script_for_address(&request.change_address, params)?;

    let selection_request = SelectionRequest {
        amount,
        payment_outputs: usize::from(request.recipient.is_some()),
        extra_output_bytes,
    };
    let selection = select_utxos(utxos, &selection_request, config)?;

    if let Some(change) = selection.change {
        outputs.push(TxOutput {
            value: change,
            script_pubkey: change_script,
        });
    }

    let inputs = selection
        .selected
        .iter()
        .map(|u| Ok(TxInput::new(Txid::from_hex(&u.txid)?, u.vout)))
        .collect::<Result<Vec<_>, DogeError>>()?;
    let prevout_scripts = vec![spend_script.to_vec(); inputs.len()];

    let tx = Transaction::new(inputs, outputs);
    tx.validate()?;

    info!(
        inputs = tx.inputs.len(),
        outputs = tx.outputs.len(),
        fee = selection.fee,
        "built transaction"
    );

    Ok(UnsignedTransaction {
        tx,
        prevout_scripts,
        fee: selection.fee,
        change: selection.change,
        strategy: selection.strategy,
    })
}

/// Sign every input with RFC 6979 deterministic nonces.
pub fn sign_transaction(
    unsigned: &UnsignedTransaction,
    key: &PrivateKey,
) -> Result<Transaction, DogeError> {
    sign_inputs(unsigned, key, |digest| key.sign(digest))
}

/// Sign every input with nonces drawn from `rng`.
pub fn sign_transaction_with_rng<R: RngCore + CryptoRng>(
    unsigned: &UnsignedTransaction,
    key: &PrivateKey,
    rng: &mut R,
) -> Result<Transaction, DogeError> {
    sign_inputs(unsigned, key, |digest| key.sign_with_rng(digest, rng))
}

fn sign_inputs<F>(
    unsigned: &UnsignedTransaction,
    key: &PrivateKey,
    mut sign: F,
) -> Result<Transaction, DogeError>
where
    F: FnMut(&[u8; 32]) -> Result<Signature, DogeError>,
{
    let tx = &unsigned.tx;
    if unsigned.prevout_scripts.len() != tx.inputs.len() {
        return Err(DogeError::SigningError(format!(
            "{} prevout scripts for {} inputs",
            unsigned.prevout_scripts.len(),
            tx.inputs.len()
        )));
    }

    let pubkey = key.public_key()?;
    let pubkey_hash = pubkey.hash160();
    let compressed = pubkey.to_compressed();

    let mut script_sigs = Vec::with_capacity(tx.inputs.len());
    for (index, prevout_script) in unsigned.prevout_scripts.iter().enumerate() {
        match p2pkh_hash(prevout_script) {
            Some(hash) if hash == pubkey_hash => {}
            Some(_) => {
                return Err(DogeError::SigningError(format!(
                    "input {index} is locked to a different key"
                )))
            }
            None => {
                return Err(DogeError::SigningError(format!(
                    "input {index} does not spend a P2PKH output"
                )))
            }
        }

        let digest = signature_hash(tx, index, prevout_script)?;
        let signature = sign(&digest)?;
        script_sigs.push(p2pkh_script_sig(&signature.to_der(), &compressed));
    }

    let mut signed = tx.clone();
    for (input, script_sig) in signed.inputs.iter_mut().zip(script_sigs) {
        input.script_sig = script_sig;
    }
    let txid = signed.txid()?;
    info!(%txid, inputs = signed.inputs.len(), "signed transaction");
    Ok(signed)
}

/// Check the P2PKH signature of input `index` against the script it spends.
///
/// Returns `Ok(false)` for a well-formed but invalid signature or a public
/// key that does not hash to `prevout_script`.
pub fn verify_input(
    tx: &Transaction,
    index: usize,
    prevout_script: &[u8],
) -> Result<bool, DogeError> {
    let input = tx.inputs.get(index).ok_or_else(|| {
        DogeError::SigningError(format!("input index {index} out of range"))
    })?;
    let (sig_push, pubkey_bytes) = parse_p2pkh_script_sig(&input.script_sig).ok_or_else(|| {
        DogeError::InvalidSignature(format!("input {index} has no P2PKH scriptSig"))
    })?;
    let Some((&hash_type, der)) = sig_push.split_last() else {
        return Ok(false);
    };
    if u32::from(hash_type) != SIGHASH_ALL {
        return Ok(false);
    }

    let pubkey = PublicKey::from_sec1_bytes(pubkey_bytes)?;
    if p2pkh_hash(prevout_script) != Some(pubkey.hash160()) {
        return Ok(false);
    }
    let signature = Signature::from_der(der)?;
    let digest = signature_hash(tx, index, prevout_script)?;
    Ok(pubkey.verify(&digest, &signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::pubkey_to_address;
    use crate::network::DogeNetwork;
    use crate::script::{p2pkh_script, OP_RETURN};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const KEY_01_HEX: &str = "0101010101010101010101010101010101010101010101010101010101010101";
    const OTHER_ADDRESS: &str = "nesRpRaAbTDmZHwmzBkLd2AtF7Z9L9z5S2";

    struct Fixture {
        key: PrivateKey,
        address: String,
        script: Vec<u8>,
        params: NetworkParams,
    }

    fn fixture() -> Fixture {
        let key = PrivateKey::from_hex(KEY_01_HEX).unwrap();
        let params = DogeNetwork::Testnet.params();
        let pubkey = key.public_key().unwrap();
        Fixture {
            address: pubkey_to_address(&pubkey, &params),
            script: p2pkh_script(&pubkey.hash160()),
            key,
            params,
        }
    }

    fn make_utxo(tag: char, vout: u32, value: u64) -> Utxo {
        Utxo {
            txid: tag.to_string().repeat(64),
            vout,
            value,
            confirmed: true,
        }
    }

    fn config() -> SelectionConfig {
        SelectionConfig {
            fee_rate: 100,
            dust_threshold: 1_000_000,
            min_fee: 0,
            ..SelectionConfig::default()
        }
    }

    fn pay(f: &Fixture, amount: u64) -> TransactionRequest {
        TransactionRequest {
            recipient: Some(Payment {
                address: OTHER_ADDRESS.into(),
                amount,
            }),
            op_return: None,
            change_address: f.address.clone(),
        }
    }

    #[test]
    fn build_with_change() {
        let f = fixture();
        let utxos = vec![make_utxo('a', 0, 1_000_000_000)];
        let unsigned =
            build_transaction(&utxos, &pay(&f, 100_000_000), &f.script, &f.params, &config())
                .unwrap();

        assert_eq!(unsigned.tx.version, 1);
        assert_eq!(unsigned.tx.lock_time, 0);
        assert_eq!(unsigned.tx.inputs.len(), 1);
        assert_eq!(unsigned.tx.inputs[0].sequence, 0xffff_ffff);
        assert!(unsigned.tx.inputs[0].script_sig.is_empty());
        assert_eq!(unsigned.tx.outputs.len(), 2);
        assert_eq!(unsigned.tx.outputs[0].value, 100_000_000);
        assert_eq!(unsigned.tx.outputs[1].script_pubkey, f.script);

        // 10 + 148 + 2·34 = 226 bytes at 100 koinu/byte.
        assert_eq!(unsigned.fee, 22_600);
        assert_eq!(unsigned.change, Some(1_000_000_000 - 100_000_000 - 22_600));
        assert_eq!(unsigned.prevout_scripts, vec![f.script.clone()]);
    }

    #[test]
    fn build_without_change_when_leftover_is_dust() {
        let f = fixture();
        // Leftover after the one-output fee (19_200) is 500_000 < dust.
        let utxos = vec![make_utxo('a', 0, 100_519_200)];
        let unsigned =
            build_transaction(&utxos, &pay(&f, 100_000_000), &f.script, &f.params, &config())
                .unwrap();
        assert_eq!(unsigned.tx.outputs.len(), 1);
        assert_eq!(unsigned.change, None);
        assert_eq!(unsigned.fee, 519_200);
        assert_eq!(unsigned.strategy, SelectionStrategy::NoChange);
    }

    #[test]
    fn build_orders_recipient_op_return_change() {
        let f = fixture();
        let mut request = pay(&f, 100_000_000);
        request.op_return = Some(OpReturn {
            data: "such data".into(),
            format: DataFormat::Utf8,
        });
        let utxos = vec![make_utxo('a', 0, 1_000_000_000)];
        let unsigned =
            build_transaction(&utxos, &request, &f.script, &f.params, &config()).unwrap();

        let outputs = &unsigned.tx.outputs;
        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[0].value, 100_000_000);
        assert_eq!(outputs[1].value, 0);
        assert_eq!(outputs[1].script_pubkey[0], OP_RETURN);
        assert_eq!(outputs[2].script_pubkey, f.script);
        // OP_RETURN output: 8 + 1 + 11 = 20 extra bytes.
        assert_eq!(unsigned.fee, (226 + 20) * 100);
    }

    #[test]
    fn build_op_return_only() {
        let f = fixture();
        let request = TransactionRequest {
            recipient: None,
            op_return: Some(OpReturn {
                data: "deadbeef".into(),
                format: DataFormat::Hex,
            }),
            change_address: f.address.clone(),
        };
        let utxos = vec![make_utxo('a', 0, 1_000_000_000)];
        let unsigned =
            build_transaction(&utxos, &request, &f.script, &f.params, &config()).unwrap();
        assert_eq!(unsigned.tx.outputs.len(), 2);
        assert_eq!(unsigned.tx.outputs[0].value, 0);
        assert_eq!(unsigned.tx.outputs[1].script_pubkey, f.script);
    }

    #[test]
    fn build_requires_some_output() {
        let f = fixture();
        let request = TransactionRequest {
            recipient: None,
            op_return: None,
            change_address: f.address.clone(),
        };
        let result = build_transaction(
            &[make_utxo('a', 0, 1_000_000_000)],
            &request,
            &f.script,
            &f.params,
            &config(),
        );
        assert!(matches!(result, Err(DogeError::MalformedTransaction(_))));
    }

    #[test]
    fn build_rejects_zero_amount() {
        let f = fixture();
        let result = build_transaction(
            &[make_utxo('a', 0, 1_000_000_000)],
            &pay(&f, 0),
            &f.script,
            &f.params,
            &config(),
        );
        assert!(matches!(result, Err(DogeError::MalformedTransaction(_))));
    }

    #[test]
    fn build_rejects_oversized_op_return() {
        let f = fixture();
        let mut request = pay(&f, 100_000_000);
        request.op_return = Some(OpReturn {
            data: "x".repeat(81),
            format: DataFormat::Utf8,
        });
        let result = build_transaction(
            &[make_utxo('a', 0, 1_000_000_000)],
            &request,
            &f.script,
            &f.params,
            &config(),
        );
        assert!(matches!(result, Err(DogeError::PayloadTooLarge { .. })));
    }

    #[test]
    fn build_rejects_foreign_recipient() {
        let f = fixture();
        let mut request = pay(&f, 100_000_000);
        request.recipient = Some(Payment {
            address: "DGEX9JsfNuCCA3ovxAmUSM1GCea1BpY4Et".into(),
            amount: 100_000_000,
        });
        let result = build_transaction(
            &[make_utxo('a', 0, 1_000_000_000)],
            &request,
            &f.script,
            &f.params,
            &config(),
        );
        assert_eq!(result.unwrap_err(), DogeError::UnsupportedAddressVersion(0x1e));
    }

    #[test]
    fn build_insufficient_funds() {
        let f = fixture();
        let result = build_transaction(
            &[make_utxo('a', 0, 50_000_000)],
            &pay(&f, 100_000_000),
            &f.script,
            &f.params,
            &config(),
        );
        assert!(matches!(result, Err(DogeError::InsufficientFunds { .. })));
    }

    #[test]
    fn sign_produces_verifiable_inputs() {
        let f = fixture();
        let utxos = vec![make_utxo('a', 0, 600_000_000), make_utxo('b', 1, 600_000_000)];
        let unsigned =
            build_transaction(&utxos, &pay(&f, 1_000_000_000), &f.script, &f.params, &config())
                .unwrap();
        assert_eq!(unsigned.tx.inputs.len(), 2);

        let signed = sign_transaction(&unsigned, &f.key).unwrap();
        for (index, script) in unsigned.prevout_scripts.iter().enumerate() {
            assert!(verify_input(&signed, index, script).unwrap());
        }
        // The unsigned value is untouched.
        assert!(unsigned.tx.inputs.iter().all(|i| i.script_sig.is_empty()));
    }

    #[test]
    fn sign_is_deterministic() {
        let f = fixture();
        let utxos = vec![make_utxo('a', 0, 1_000_000_000)];
        let unsigned =
            build_transaction(&utxos, &pay(&f, 100_000_000), &f.script, &f.params, &config())
                .unwrap();
        let a = sign_transaction(&unsigned, &f.key).unwrap();
        let b = sign_transaction(&unsigned, &f.key).unwrap();
        assert_eq!(a.serialize().unwrap(), b.serialize().unwrap());
    }

    #[test]
    fn sign_with_rng_verifies() {
        let f = fixture();
        let utxos = vec![make_utxo('a', 0, 1_000_000_000)];
        let unsigned =
            build_transaction(&utxos, &pay(&f, 100_000_000), &f.script, &f.params, &config())
                .unwrap();
        let signed =
            sign_transaction_with_rng(&unsigned, &f.key, &mut StdRng::seed_from_u64(9)).unwrap();
        assert!(verify_input(&signed, 0, &f.script).unwrap());
    }

    #[test]
    fn sign_rejects_foreign_prevout() {
        let f = fixture();
        let utxos = vec![make_utxo('a', 0, 1_000_000_000)];
        let foreign = script_for_address(OTHER_ADDRESS, &f.params).unwrap();
        let unsigned =
            build_transaction(&utxos, &pay(&f, 100_000_000), &foreign, &f.params, &config())
                .unwrap();
        assert!(matches!(
            sign_transaction(&unsigned, &f.key),
            Err(DogeError::SigningError(_))
        ));
    }

    #[test]
    fn verify_detects_tampered_output() {
        let f = fixture();
        let utxos = vec![make_utxo('a', 0, 1_000_000_000)];
        let unsigned =
            build_transaction(&utxos, &pay(&f, 100_000_000), &f.script, &f.params, &config())
                .unwrap();
        let mut signed = sign_transaction(&unsigned, &f.key).unwrap();
        signed.outputs[0].value += 1;
        assert!(!verify_input(&signed, 0, &f.script).unwrap());
    }

    #[test]
    fn verify_unsigned_input_errors() {
        let f = fixture();
        let utxos = vec![make_utxo('a', 0, 1_000_000_000)];
        let unsigned =
            build_transaction(&utxos, &pay(&f, 100_000_000), &f.script, &f.params, &config())
                .unwrap();
        assert!(verify_input(&unsigned.tx, 0, &f.script).is_err());
    }
}
