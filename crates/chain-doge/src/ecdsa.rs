//! secp256k1 keys and ECDSA signatures.
//!
//! Signing is deterministic by default (RFC 6979 nonces over HMAC-SHA256);
//! [`PrivateKey::sign_with_rng`] draws a fresh random nonce per attempt
//! instead. Both paths share one bounded retry loop and always emit
//! low-S signatures.

use num_bigint::BigUint;
use num_traits::Zero;
use rand_core::{CryptoRng, OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::curve::{
    self, generator, mod_add, mod_inverse, mod_mul, order, point_add, point_multiply, to_32_bytes,
    Point, COMPRESSED_POINT_LEN,
};
use crate::error::DogeError;
use crate::hash::{hash160, hmac_sha256};

/// Upper bound on nonce draws per signature. Exhausting it requires a
/// broken random source.
pub const MAX_SIGNING_ATTEMPTS: usize = 64;

/// Upper bound on scalar draws in key generation.
const MAX_KEYGEN_ATTEMPTS: usize = 16;

/// A secp256k1 private key, a scalar in `[1, n-1]`.
///
/// The bytes are wiped when the key is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    bytes: [u8; 32],
}

impl PrivateKey {
    /// Generate a key from the operating system's CSPRNG.
    pub fn generate() -> Result<Self, DogeError> {
        Self::generate_with_rng(&mut OsRng)
    }

    /// Generate a key: 32 random bytes reduced mod `n`, redrawn on zero.
    pub fn generate_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, DogeError> {
        let mut buf = Zeroizing::new([0u8; 32]);
        for _ in 0..MAX_KEYGEN_ATTEMPTS {
            rng.fill_bytes(buf.as_mut());
            let scalar = BigUint::from_bytes_be(buf.as_ref()) % order();
            if !scalar.is_zero() {
                return Ok(Self {
                    bytes: to_32_bytes(&scalar),
                });
            }
        }
        Err(DogeError::InvalidPrivateKey(
            "random source produced no usable scalar".into(),
        ))
    }

    /// Import a 32-byte big-endian scalar. Rejects `0` and values `>= n`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DogeError> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            DogeError::InvalidPrivateKey(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        let scalar = BigUint::from_bytes_be(&bytes);
        if scalar.is_zero() {
            return Err(DogeError::InvalidPrivateKey("scalar is zero".into()));
        }
        if &scalar >= order() {
            return Err(DogeError::InvalidPrivateKey(
                "scalar is not below the curve order".into(),
            ));
        }
        Ok(Self { bytes })
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, DogeError> {
        let bytes = Zeroizing::new(hex::decode(hex_str.trim())?);
        Self::from_bytes(&bytes)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    fn scalar(&self) -> BigUint {
        BigUint::from_bytes_be(&self.bytes)
    }

    /// Derive the public key `k·G`.
    pub fn public_key(&self) -> Result<PublicKey, DogeError> {
        let point = point_multiply(&self.scalar(), generator());
        if point.is_infinity() {
            return Err(DogeError::InvalidPrivateKey(
                "public key is the point at infinity".into(),
            ));
        }
        PublicKey::from_point(point)
    }

    /// Sign a 32-byte digest with an RFC 6979 deterministic nonce.
    pub fn sign(&self, digest: &[u8; 32]) -> Result<Signature, DogeError> {
        let mut nonces = Rfc6979::new(&self.bytes, digest)?;
        self.sign_with_nonces(digest, || nonces.next_candidate())
    }

    /// Sign a 32-byte digest with a fresh random nonce per attempt.
    ///
    /// Draws outside `[1, n-1]` are discarded and redrawn.
    pub fn sign_with_rng<R: RngCore + CryptoRng>(
        &self,
        digest: &[u8; 32],
        rng: &mut R,
    ) -> Result<Signature, DogeError> {
        self.sign_with_nonces(digest, || {
            let mut buf = Zeroizing::new([0u8; 32]);
            rng.fill_bytes(buf.as_mut());
            Ok(BigUint::from_bytes_be(buf.as_ref()))
        })
    }

    fn sign_with_nonces<F>(
        &self,
        digest: &[u8; 32],
        mut next_nonce: F,
    ) -> Result<Signature, DogeError>
    where
        F: FnMut() -> Result<BigUint, DogeError>,
    {
        let n = order();
        let d = self.scalar();
        let z = BigUint::from_bytes_be(digest) % n;

        for _ in 0..MAX_SIGNING_ATTEMPTS {
            let k = next_nonce()?;
            if k.is_zero() || &k >= n {
                continue;
            }

            let r = match point_multiply(&k, generator()).x() {
                Some(x) => x % n,
                None => continue,
            };
            if r.is_zero() {
                continue;
            }

            let Some(k_inv) = mod_inverse(&k, n) else {
                continue;
            };
            let s = mod_mul(&k_inv, &mod_add(&z, &mod_mul(&r, &d, n), n), n);
            if s.is_zero() {
                continue;
            }

            return Ok(Signature::new_unchecked(r, s).normalize_s());
        }

        Err(DogeError::SigningError(format!(
            "no valid nonce after {MAX_SIGNING_ATTEMPTS} attempts"
        )))
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

/// RFC 6979 HMAC-DRBG for a 256-bit curve order and SHA-256.
struct Rfc6979 {
    k: Zeroizing<[u8; 32]>,
    v: Zeroizing<[u8; 32]>,
    primed: bool,
}

impl Rfc6979 {
    fn new(private_key: &[u8; 32], digest: &[u8; 32]) -> Result<Self, DogeError> {
        // bits2octets: the digest reduced mod n.
        let h1 = to_32_bytes(&(BigUint::from_bytes_be(digest) % order()));

        let mut k = Zeroizing::new([0u8; 32]);
        let mut v = Zeroizing::new([1u8; 32]);
        *k = hmac_sha256(&k[..], &[&v[..], &[0x00], private_key, &h1])?;
        *v = hmac_sha256(&k[..], &[&v[..]])?;
        *k = hmac_sha256(&k[..], &[&v[..], &[0x01], private_key, &h1])?;
        *v = hmac_sha256(&k[..], &[&v[..]])?;

        Ok(Self {
            k,
            v,
            primed: false,
        })
    }

    /// Next candidate nonce. The caller rejects values outside `[1, n-1]`.
    fn next_candidate(&mut self) -> Result<BigUint, DogeError> {
        if self.primed {
            *self.k = hmac_sha256(&self.k[..], &[&self.v[..], &[0x00]])?;
            *self.v = hmac_sha256(&self.k[..], &[&self.v[..]])?;
        }
        self.primed = true;
        *self.v = hmac_sha256(&self.k[..], &[&self.v[..]])?;
        Ok(BigUint::from_bytes_be(&self.v[..]))
    }
}

/// A secp256k1 public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    point: Point,
    compressed: [u8; COMPRESSED_POINT_LEN],
}

impl PublicKey {
    fn from_point(point: Point) -> Result<Self, DogeError> {
        let compressed = point.to_compressed()?;
        Ok(Self { point, compressed })
    }

    /// Parse a SEC1 compressed or uncompressed encoding.
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, DogeError> {
        Self::from_point(Point::from_sec1_bytes(bytes)?)
    }

    /// 33-byte SEC1 compressed encoding.
    pub fn to_compressed(&self) -> [u8; COMPRESSED_POINT_LEN] {
        self.compressed
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.compressed)
    }

    pub fn point(&self) -> &Point {
        &self.point
    }

    /// Hash160 of the compressed encoding.
    pub fn hash160(&self) -> [u8; 20] {
        hash160(&self.compressed)
    }

    /// Check `sig` over `digest`. Returns `false` for out-of-range `r` or `s`.
    pub fn verify(&self, digest: &[u8; 32], sig: &Signature) -> bool {
        let n = order();
        if !sig.components_in_range() {
            return false;
        }
        let Some(w) = mod_inverse(&sig.s, n) else {
            return false;
        };
        let z = BigUint::from_bytes_be(digest) % n;
        let u1 = mod_mul(&z, &w, n);
        let u2 = mod_mul(&sig.r, &w, n);
        let point = point_add(
            &point_multiply(&u1, generator()),
            &point_multiply(&u2, &self.point),
        );
        match point.x() {
            Some(x) => x % n == sig.r,
            None => false,
        }
    }
}

/// An ECDSA signature `(r, s)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    r: BigUint,
    s: BigUint,
}

impl Signature {
    /// Build from components, requiring `0 < r, s < n`.
    pub fn new(r: BigUint, s: BigUint) -> Result<Self, DogeError> {
        let sig = Self::new_unchecked(r, s);
        if !sig.components_in_range() {
            return Err(DogeError::InvalidSignature(
                "r and s must be in [1, n-1]".into(),
            ));
        }
        Ok(sig)
    }

    fn new_unchecked(r: BigUint, s: BigUint) -> Self {
        Self { r, s }
    }

    fn components_in_range(&self) -> bool {
        let n = order();
        !self.r.is_zero() && !self.s.is_zero() && &self.r < n && &self.s < n
    }

    pub fn r(&self) -> &BigUint {
        &self.r
    }

    pub fn s(&self) -> &BigUint {
        &self.s
    }

    /// `s <= n/2`
    pub fn is_low_s(&self) -> bool {
        self.s <= curve::SECP256K1.half_n
    }

    /// Replace `s` with `n - s` when it lies in the upper half.
    pub fn normalize_s(self) -> Self {
        if self.is_low_s() {
            return self;
        }
        let s = order() - &self.s;
        Self { r: self.r, s }
    }

    /// DER `SEQUENCE { INTEGER r, INTEGER s }`.
    pub fn to_der(&self) -> Vec<u8> {
        let r = der_integer(&self.r);
        let s = der_integer(&self.s);
        let mut out = Vec::with_capacity(6 + r.len() + s.len());
        out.push(0x30);
        out.push((4 + r.len() + s.len()) as u8);
        out.push(0x02);
        out.push(r.len() as u8);
        out.extend_from_slice(&r);
        out.push(0x02);
        out.push(s.len() as u8);
        out.extend_from_slice(&s);
        out
    }

    pub fn to_der_hex(&self) -> String {
        hex::encode(self.to_der())
    }

    /// Strict DER parser: short-form lengths, minimal positive integers,
    /// no trailing bytes, components in `[1, n-1]`.
    pub fn from_der(der: &[u8]) -> Result<Self, DogeError> {
        let invalid = |msg: &str| DogeError::InvalidSignature(msg.to_string());

        let [0x30, len, body @ ..] = der else {
            return Err(invalid("missing SEQUENCE header"));
        };
        if *len as usize != body.len() || *len >= 0x80 {
            return Err(invalid("SEQUENCE length mismatch"));
        }

        let (r, rest) = parse_der_integer(body)?;
        let (s, rest) = parse_der_integer(rest)?;
        if !rest.is_empty() {
            return Err(invalid("trailing bytes after s"));
        }
        Self::new(r, s)
    }
}

fn der_integer(value: &BigUint) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    if bytes[0] & 0x80 != 0 {
        let mut padded = Vec::with_capacity(bytes.len() + 1);
        padded.push(0x00);
        padded.extend_from_slice(&bytes);
        return padded;
    }
    bytes
}

fn parse_der_integer(input: &[u8]) -> Result<(BigUint, &[u8]), DogeError> {
    let invalid = |msg: &str| DogeError::InvalidSignature(msg.to_string());

    let [0x02, len, rest @ ..] = input else {
        return Err(invalid("expected INTEGER"));
    };
    let len = *len as usize;
    if len == 0 || len > rest.len() {
        return Err(invalid("INTEGER length out of bounds"));
    }
    let (digits, rest) = rest.split_at(len);
    if digits[0] & 0x80 != 0 {
        return Err(invalid("negative INTEGER"));
    }
    if digits.len() > 1 && digits[0] == 0x00 && digits[1] & 0x80 == 0 {
        return Err(invalid("non-minimal INTEGER padding"));
    }
    Ok((BigUint::from_bytes_be(digits), rest))
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_der_hex())
    }
}
