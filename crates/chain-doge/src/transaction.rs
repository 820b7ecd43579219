use crate::error::DogeError;
use crate::hash::sha256d;

/// Signature-hash type committing to every input and output.
pub const SIGHASH_ALL: u32 = 0x0000_0001;

/// Transaction format version produced by the builder.
pub const TX_VERSION: i32 = 1;

/// Final sequence number; disables lock-time and replacement semantics.
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// Largest script accepted by the serializer.
pub const MAX_SCRIPT_BYTES: usize = 10_000;

/// Fixed per-transaction size estimate: version, counts, lock time.
pub const TX_OVERHEAD_BYTES: u64 = 10;

/// Size estimate of a signed P2PKH input.
pub const P2PKH_INPUT_BYTES: u64 = 148;

/// Size estimate of a P2PKH or P2SH output.
pub const P2PKH_OUTPUT_BYTES: u64 = 34;

/// A transaction id in wire (little-endian) byte order.
///
/// Hex parsing and display use the conventional byte-reversed form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Txid([u8; 32]);

impl Txid {
    pub fn from_wire_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_wire_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse the 64-character display form.
    pub fn from_hex(display: &str) -> Result<Self, DogeError> {
        if display.len() != 64 {
            return Err(DogeError::MalformedTransaction(format!(
                "txid must be 64 hex characters, got {}",
                display.len()
            )));
        }
        let mut bytes: [u8; 32] = hex::decode(display)
            .map_err(|e| DogeError::MalformedTransaction(format!("txid {display}: {e}")))?
            .try_into()
            .map_err(|_| DogeError::MalformedTransaction("txid must be 32 bytes".into()))?;
        bytes.reverse();
        Ok(Self(bytes))
    }

    /// The byte-reversed display form.
    pub fn to_hex(&self) -> String {
        let mut display = self.0;
        display.reverse();
        hex::encode(display)
    }
}

impl std::fmt::Display for Txid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for Txid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Txid({})", self.to_hex())
    }
}

impl std::str::FromStr for Txid {
    type Err = DogeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    pub prev_txid: Txid,
    pub prev_vout: u32,
    /// Empty until the input is signed.
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TxInput {
    /// An unsigned input with the final sequence number.
    pub fn new(prev_txid: Txid, prev_vout: u32) -> Self {
        Self {
            prev_txid,
            prev_vout,
            script_sig: Vec::new(),
            sequence: SEQUENCE_FINAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    /// Value in koinu.
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

/// A transaction. Input and output order is significant: signatures commit
/// to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl Transaction {
    /// A version-1 transaction with lock time zero.
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Self {
            version: TX_VERSION,
            inputs,
            outputs,
            lock_time: 0,
        }
    }

    /// Sum of output values, `None` on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }

    /// Check the invariants every emitted transaction must hold.
    pub fn validate(&self) -> Result<(), DogeError> {
        if self.inputs.is_empty() {
            return Err(DogeError::MalformedTransaction("no inputs".into()));
        }
        if self.outputs.is_empty() {
            return Err(DogeError::MalformedTransaction("no outputs".into()));
        }
        for (index, input) in self.inputs.iter().enumerate() {
            check_script_len(&input.script_sig, "scriptSig", index)?;
        }
        for (index, output) in self.outputs.iter().enumerate() {
            check_script_len(&output.script_pubkey, "scriptPubKey", index)?;
        }
        if self.total_output_value().is_none() {
            return Err(DogeError::MalformedTransaction(
                "output values overflow".into(),
            ));
        }
        Ok(())
    }

    /// Canonical wire serialization. Validates before writing anything.
    pub fn serialize(&self) -> Result<Vec<u8>, DogeError> {
        self.validate()?;
        let mut out = Vec::with_capacity(self.serialized_size());
        self.write_to(&mut out, |_, input| input.script_sig.as_slice());
        Ok(out)
    }

    /// Lowercase hex of [`Transaction::serialize`].
    pub fn to_hex(&self) -> Result<String, DogeError> {
        Ok(hex::encode(self.serialize()?))
    }

    /// Double-SHA-256 of the serialization.
    pub fn txid(&self) -> Result<Txid, DogeError> {
        Ok(Txid(sha256d(&self.serialize()?)))
    }

    /// Parse a serialized transaction. Trailing bytes are rejected.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, DogeError> {
        let mut reader = Reader::new(bytes);
        let version = reader.read_i32()?;

        let input_count = reader.read_count()?;
        let mut inputs = Vec::with_capacity(input_count.min(bytes.len() / 41));
        for _ in 0..input_count {
            let prev_txid = Txid(reader.read_array()?);
            let prev_vout = reader.read_u32()?;
            let script_sig = reader.read_script()?;
            let sequence = reader.read_u32()?;
            inputs.push(TxInput {
                prev_txid,
                prev_vout,
                script_sig,
                sequence,
            });
        }

        let output_count = reader.read_count()?;
        let mut outputs = Vec::with_capacity(output_count.min(bytes.len() / 9));
        for _ in 0..output_count {
            let value = reader.read_u64()?;
            let script_pubkey = reader.read_script()?;
            outputs.push(TxOutput {
                value,
                script_pubkey,
            });
        }

        let lock_time = reader.read_u32()?;
        reader.finish()?;

        let tx = Self {
            version,
            inputs,
            outputs,
            lock_time,
        };
        tx.validate()?;
        Ok(tx)
    }

    pub fn from_hex(raw: &str) -> Result<Self, DogeError> {
        Self::deserialize(&hex::decode(raw.trim())?)
    }

    fn serialized_size(&self) -> usize {
        let inputs: usize = self
            .inputs
            .iter()
            .map(|i| 40 + varint_len(i.script_sig.len() as u64) + i.script_sig.len())
            .sum();
        let outputs: usize = self
            .outputs
            .iter()
            .map(|o| output_size(&o.script_pubkey))
            .sum();
        8 + varint_len(self.inputs.len() as u64)
            + inputs
            + varint_len(self.outputs.len() as u64)
            + outputs
    }

    /// Write the wire form, taking each input's script from `script_for`.
    fn write_to<'a, F>(&'a self, out: &mut Vec<u8>, script_for: F)
    where
        F: Fn(usize, &'a TxInput) -> &'a [u8],
    {
        out.extend_from_slice(&self.version.to_le_bytes());

        write_varint(out, self.inputs.len() as u64);
        for (index, input) in self.inputs.iter().enumerate() {
            out.extend_from_slice(input.prev_txid.as_wire_bytes());
            out.extend_from_slice(&input.prev_vout.to_le_bytes());
            let script = script_for(index, input);
            write_varint(out, script.len() as u64);
            out.extend_from_slice(script);
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }

        write_varint(out, self.outputs.len() as u64);
        for output in &self.outputs {
            out.extend_from_slice(&output.value.to_le_bytes());
            write_varint(out, output.script_pubkey.len() as u64);
            out.extend_from_slice(&output.script_pubkey);
        }

        out.extend_from_slice(&self.lock_time.to_le_bytes());
    }
}

fn check_script_len(script: &[u8], field: &str, index: usize) -> Result<(), DogeError> {
    if script.len() > MAX_SCRIPT_BYTES {
        return Err(DogeError::MalformedTransaction(format!(
            "{field} {index} is {} bytes, maximum is {MAX_SCRIPT_BYTES}",
            script.len()
        )));
    }
    Ok(())
}

/// SIGHASH_ALL preimage for input `input_index`.
///
/// The signed input carries `script_pubkey` (the locking script it spends),
/// every other input an empty script, and the 4-byte hash type is appended.
/// `tx` is never modified.
pub fn sighash_preimage(
    tx: &Transaction,
    input_index: usize,
    script_pubkey: &[u8],
) -> Result<Vec<u8>, DogeError> {
    if input_index >= tx.inputs.len() {
        return Err(DogeError::SigningError(format!(
            "input index {input_index} out of range for {} inputs",
            tx.inputs.len()
        )));
    }
    tx.validate()?;
    check_script_len(script_pubkey, "prevout scriptPubKey", input_index)?;

    let empty: &[u8] = &[];
    let mut preimage = Vec::with_capacity(tx.serialized_size() + script_pubkey.len() + 4);
    tx.write_to(&mut preimage, |index, _| {
        if index == input_index {
            script_pubkey
        } else {
            empty
        }
    });
    preimage.extend_from_slice(&SIGHASH_ALL.to_le_bytes());
    Ok(preimage)
}

/// The 32-byte digest signed for input `input_index`.
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_pubkey: &[u8],
) -> Result<[u8; 32], DogeError> {
    Ok(sha256d(&sighash_preimage(tx, input_index, script_pubkey)?))
}

/// Append a compact-size integer.
pub fn write_varint(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xfc => out.push(value as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Read a compact-size integer from the front of `bytes`, returning the
/// value and the number of bytes consumed. Non-minimal encodings are
/// rejected.
pub fn read_varint(bytes: &[u8]) -> Result<(u64, usize), DogeError> {
    let mut reader = Reader::new(bytes);
    let value = reader.read_varint()?;
    Ok((value, reader.pos))
}

/// Encoded length of a compact-size integer.
pub fn varint_len(value: u64) -> usize {
    match value {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Serialized size of an output carrying `script_pubkey`.
pub fn output_size(script_pubkey: &[u8]) -> usize {
    8 + varint_len(script_pubkey.len() as u64) + script_pubkey.len()
}

/// Size estimate for a P2PKH-input transaction:
/// `10 + 148·inputs + 34·outputs + extra_output_bytes`.
pub fn estimate_size(num_inputs: usize, num_outputs: usize, extra_output_bytes: usize) -> u64 {
    TX_OVERHEAD_BYTES
        .saturating_add((num_inputs as u64).saturating_mul(P2PKH_INPUT_BYTES))
        .saturating_add((num_outputs as u64).saturating_mul(P2PKH_OUTPUT_BYTES))
        .saturating_add(extra_output_bytes as u64)
}

/// Fee estimate in koinu at `fee_rate` koinu per byte.
pub fn estimate_fee(
    num_inputs: usize,
    num_outputs: usize,
    extra_output_bytes: usize,
    fee_rate: u64,
) -> u64 {
    estimate_size(num_inputs, num_outputs, extra_output_bytes).saturating_mul(fee_rate)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DogeError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                DogeError::MalformedTransaction(format!(
                    "need {len} bytes at offset {}, only {} remain",
                    self.pos,
                    self.bytes.len() - self.pos
                ))
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DogeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn read_u32(&mut self) -> Result<u32, DogeError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    fn read_i32(&mut self) -> Result<i32, DogeError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    fn read_u64(&mut self) -> Result<u64, DogeError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    fn read_varint(&mut self) -> Result<u64, DogeError> {
        let [prefix] = self.read_array::<1>()?;
        let (value, min) = match prefix {
            0xfd => (u64::from(u16::from_le_bytes(self.read_array()?)), 0xfd),
            0xfe => (u64::from(u32::from_le_bytes(self.read_array()?)), 0x1_0000),
            0xff => (u64::from_le_bytes(self.read_array()?), 0x1_0000_0000),
            small => return Ok(u64::from(small)),
        };
        if value < min {
            return Err(DogeError::MalformedTransaction(format!(
                "non-minimal varint encoding of {value}"
            )));
        }
        Ok(value)
    }

    fn read_count(&mut self) -> Result<usize, DogeError> {
        let count = self.read_varint()?;
        let remaining = (self.bytes.len() - self.pos) as u64;
        if count > remaining {
            return Err(DogeError::MalformedTransaction(format!(
                "declared count {count} exceeds remaining {remaining} bytes"
            )));
        }
        Ok(count as usize)
    }

    fn read_script(&mut self) -> Result<Vec<u8>, DogeError> {
        let len = self.read_count()?;
        Ok(self.read_bytes(len)?.to_vec())
    }

    fn finish(&self) -> Result<(), DogeError> {
        if self.pos != self.bytes.len() {
            return Err(DogeError::MalformedTransaction(format!(
                "{} trailing bytes",
                self.bytes.len() - self.pos
            )));
        }
        Ok(())
    }
}
