//! Base58 and Base58Check codecs.
//!
//! The alphabet omits `0`, `O`, `I` and `l`. Leading zero bytes map one-to-one
//! onto leading `'1'` characters so the encoding preserves them.

use crate::error::DogeError;
use crate::hash::sha256d;

/// The Bitcoin-family Base58 alphabet.
pub const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Length of the Base58Check checksum suffix.
pub const CHECKSUM_LEN: usize = 4;

const INVALID: u8 = 0xff;

/// Reverse lookup table: ASCII byte -> alphabet index, `INVALID` otherwise.
const DECODE_MAP: [u8; 128] = {
    let mut map = [INVALID; 128];
    let mut i = 0;
    while i < ALPHABET.len() {
        map[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    map
};

/// Encode bytes as a Base58 string.
pub fn encode(input: &[u8]) -> String {
    let zeros = input.iter().take_while(|&&b| b == 0).count();

    // Base-58 digits of the big-endian integer, least significant first.
    let mut digits: Vec<u8> = Vec::with_capacity(input.len() * 138 / 100 + 1);
    for &byte in &input[zeros..] {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            carry += (*digit as u32) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }

    let mut out = String::with_capacity(zeros + digits.len());
    out.extend(std::iter::repeat(ALPHABET[0] as char).take(zeros));
    out.extend(digits.iter().rev().map(|&d| ALPHABET[d as usize] as char));
    out
}

/// Decode a Base58 string into bytes.
///
/// Fails with [`DogeError::InvalidCharacter`] on the first character outside
/// the alphabet.
pub fn decode(input: &str) -> Result<Vec<u8>, DogeError> {
    let mut zeros = 0;
    let mut leading = true;

    // Base-256 bytes of the integer, least significant first.
    let mut bytes: Vec<u8> = Vec::with_capacity(input.len() * 733 / 1000 + 1);
    for (position, character) in input.chars().enumerate() {
        let value = alphabet_index(character)
            .ok_or(DogeError::InvalidCharacter { character, position })?;

        if leading && value == 0 {
            zeros += 1;
            continue;
        }
        leading = false;

        let mut carry = value as u32;
        for byte in bytes.iter_mut() {
            carry += (*byte as u32) * 58;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }

    let mut out = vec![0u8; zeros];
    out.extend(bytes.iter().rev());
    Ok(out)
}

/// Base58Check: `payload || sha256d(payload)[..4]`, Base58-encoded.
pub fn encode_check(payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(payload.len() + CHECKSUM_LEN);
    data.extend_from_slice(payload);
    data.extend_from_slice(&checksum(payload));
    encode(&data)
}

/// Decode a Base58Check string and return the payload without its checksum.
///
/// Fails with [`DogeError::ChecksumMismatch`] when the trailing four bytes
/// do not match, or when the string is too short to carry a checksum.
pub fn decode_check(input: &str) -> Result<Vec<u8>, DogeError> {
    let mut data = decode(input)?;
    if data.len() < CHECKSUM_LEN {
        return Err(DogeError::ChecksumMismatch);
    }
    let split = data.len() - CHECKSUM_LEN;
    if data[split..] != checksum(&data[..split]) {
        return Err(DogeError::ChecksumMismatch);
    }
    data.truncate(split);
    Ok(data)
}

/// First four bytes of `sha256d(payload)`.
pub fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let hash = sha256d(payload);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&hash[..CHECKSUM_LEN]);
    out
}

fn alphabet_index(c: char) -> Option<u8> {
    if !c.is_ascii() {
        return None;
    }
    match DECODE_MAP[c as usize] {
        INVALID => None,
        v => Some(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_hello_world() {
        assert_eq!(encode(b"hello world"), "StV1DL6CwTryKyV");
    }

    #[test]
    fn decode_hello_world() {
        assert_eq!(decode("StV1DL6CwTryKyV").unwrap(), b"hello world");
    }

    #[test]
    fn leading_zeros_preserved() {
        assert_eq!(encode(&[0, 0, 1]), "112");
        assert_eq!(decode("112").unwrap(), vec![0, 0, 1]);
    }

    #[test]
    fn all_zero_bytes() {
        assert_eq!(encode(&[0, 0, 0]), "111");
        assert_eq!(decode("111").unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn empty_roundtrip() {
        assert_eq!(encode(&[]), "");
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn invalid_character_reported_with_position() {
        let cases = [("abc0", '0', 3), ("Oab", 'O', 0), ("1I", 'I', 1), ("zl", 'l', 1)];
        for (input, bad, pos) in cases {
            match decode(input) {
                Err(DogeError::InvalidCharacter {
                    character,
                    position,
                }) => {
                    assert_eq!(character, bad);
                    assert_eq!(position, pos);
                }
                other => panic!("expected InvalidCharacter for {input}, got {other:?}"),
            }
        }
    }

    #[test]
    fn non_ascii_rejected() {
        assert!(matches!(
            decode("ab\u{e9}"),
            Err(DogeError::InvalidCharacter { position: 2, .. })
        ));
    }

    #[test]
    fn check_roundtrip() {
        let payload = [0x71, 0xde, 0xad, 0xbe, 0xef];
        let encoded = encode_check(&payload);
        assert_eq!(decode_check(&encoded).unwrap(), payload);
    }

    #[test]
    fn check_detects_tampering() {
        let mut data = vec![0x1e; 21];
        data.extend_from_slice(&checksum(&data));
        data[5] ^= 0x01;
        assert_eq!(decode_check(&encode(&data)), Err(DogeError::ChecksumMismatch));
    }

    #[test]
    fn check_too_short() {
        assert_eq!(decode_check("1"), Err(DogeError::ChecksumMismatch));
        assert_eq!(decode_check(""), Err(DogeError::ChecksumMismatch));
    }

    #[test]
    fn check_known_testnet_address() {
        let payload = decode_check("nfHasKcaJsev32P7yzQvgkbZSWxJC8W4Vf").unwrap();
        assert_eq!(payload[0], 0x71);
        assert_eq!(
            hex::encode(&payload[1..]),
            "79b000887626b294a914501a4cd226b58b235983"
        );
    }
}
