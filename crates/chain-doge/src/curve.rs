//! secp256k1 field and group arithmetic.
//!
//! Affine points over `y² = x³ + 7 (mod p)` with arbitrary-precision
//! integers. Every field element and scalar handed out by this module is
//! reduced into `[0, modulus)`.

use std::sync::LazyLock;

use num_bigint::{BigInt, BigUint};
use num_traits::{One, Zero};

use crate::error::DogeError;

/// Length of a SEC1 compressed point.
pub const COMPRESSED_POINT_LEN: usize = 33;

/// Length of a SEC1 uncompressed point.
pub const UNCOMPRESSED_POINT_LEN: usize = 65;

/// Fixed secp256k1 domain parameters.
pub struct CurveParams {
    /// Field prime.
    pub p: BigUint,
    /// Group order.
    pub n: BigUint,
    /// `n / 2`, the upper bound of a low-S signature component.
    pub half_n: BigUint,
    /// Curve constant `b` in `y² = x³ + b`.
    pub b: BigUint,
    /// Generator point.
    pub g: Point,
}

#[rustfmt::skip]
const P_BYTES: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xfe, 0xff, 0xff, 0xfc, 0x2f,
];

#[rustfmt::skip]
const N_BYTES: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b,
    0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

#[rustfmt::skip]
const GX_BYTES: [u8; 32] = [
    0x79, 0xbe, 0x66, 0x7e, 0xf9, 0xdc, 0xbb, 0xac,
    0x55, 0xa0, 0x62, 0x95, 0xce, 0x87, 0x0b, 0x07,
    0x02, 0x9b, 0xfc, 0xdb, 0x2d, 0xce, 0x28, 0xd9,
    0x59, 0xf2, 0x81, 0x5b, 0x16, 0xf8, 0x17, 0x98,
];

#[rustfmt::skip]
const GY_BYTES: [u8; 32] = [
    0x48, 0x3a, 0xda, 0x77, 0x26, 0xa3, 0xc4, 0x65,
    0x5d, 0xa4, 0xfb, 0xfc, 0x0e, 0x11, 0x08, 0xa8,
    0xfd, 0x17, 0xb4, 0x48, 0xa6, 0x85, 0x54, 0x19,
    0x9c, 0x47, 0xd0, 0x8f, 0xfb, 0x10, 0xd4, 0xb8,
];

/// The secp256k1 parameters, parsed once on first use.
pub static SECP256K1: LazyLock<CurveParams> = LazyLock::new(|| {
    let p = BigUint::from_bytes_be(&P_BYTES);
    let n = BigUint::from_bytes_be(&N_BYTES);
    let gx = BigUint::from_bytes_be(&GX_BYTES);
    let gy = BigUint::from_bytes_be(&GY_BYTES);
    let half_n = &n >> 1u32;
    CurveParams {
        p,
        n,
        half_n,
        b: BigUint::from(7u32),
        g: Point::Affine { x: gx, y: gy },
    }
});

/// `x³ + b (mod p)`, the right-hand side of the curve equation.
fn curve_rhs(x: &BigUint, curve: &CurveParams) -> BigUint {
    let x_cubed = mod_mul(&mod_mul(x, x, &curve.p), x, &curve.p);
    mod_add(&x_cubed, &curve.b, &curve.p)
}

/// The generator point `G`.
pub fn generator() -> &'static Point {
    &SECP256K1.g
}

/// The group order `n`.
pub fn order() -> &'static BigUint {
    &SECP256K1.n
}

/// `(a + b) mod m`
pub fn mod_add(a: &BigUint, b: &BigUint, m: &BigUint) -> BigUint {
    (a + b) % m
}

/// `(a - b) mod m`, never negative.
pub fn mod_sub(a: &BigUint, b: &BigUint, m: &BigUint) -> BigUint {
    let a = a % m;
    let b = b % m;
    if a >= b {
        a - b
    } else {
        m - b + a
    }
}

/// `(a * b) mod m`
pub fn mod_mul(a: &BigUint, b: &BigUint, m: &BigUint) -> BigUint {
    (a * b) % m
}

/// Multiplicative inverse of `a` modulo `m` by the extended Euclidean
/// algorithm. `None` iff `gcd(a, m) != 1`, which for the prime moduli used
/// here only happens when `a ≡ 0`.
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    let modulus = BigInt::from(m.clone());
    let (mut old_r, mut r) = (BigInt::from(a % m), modulus.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());

    while !r.is_zero() {
        let quotient = &old_r / &r;
        let next_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, next_r);
        let next_s = &old_s - &quotient * &s;
        old_s = std::mem::replace(&mut s, next_s);
    }

    if !old_r.is_one() {
        return None;
    }
    ((old_s % &modulus + &modulus) % &modulus).to_biguint()
}

/// A point on secp256k1 in affine coordinates, or the identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Point {
    /// The point at infinity (group identity).
    Infinity,
    /// A finite point; coordinates are reduced mod `p`.
    Affine { x: BigUint, y: BigUint },
}

impl Point {
    /// Build a finite point, rejecting coordinates that are not on the curve.
    pub fn from_affine(x: BigUint, y: BigUint) -> Result<Self, DogeError> {
        let point = Point::Affine { x, y };
        if !point.is_on_curve() {
            return Err(DogeError::InvalidPublicKey("point not on curve".into()));
        }
        Ok(point)
    }

    pub fn is_infinity(&self) -> bool {
        matches!(self, Point::Infinity)
    }

    /// Affine x-coordinate, `None` for the identity.
    pub fn x(&self) -> Option<&BigUint> {
        match self {
            Point::Infinity => None,
            Point::Affine { x, .. } => Some(x),
        }
    }

    /// Check `y² = x³ + 7 (mod p)`. The identity counts as on the curve.
    pub fn is_on_curve(&self) -> bool {
        let curve = &*SECP256K1;
        match self {
            Point::Infinity => true,
            Point::Affine { x, y } => {
                if x >= &curve.p || y >= &curve.p {
                    return false;
                }
                mod_mul(y, y, &curve.p) == curve_rhs(x, curve)
            }
        }
    }

    /// `-P`
    pub fn negate(&self) -> Point {
        match self {
            Point::Infinity => Point::Infinity,
            Point::Affine { x, y } => Point::Affine {
                x: x.clone(),
                y: mod_sub(&BigUint::zero(), y, &SECP256K1.p),
            },
        }
    }

    /// SEC1 compressed encoding: y-parity prefix (`0x02` even, `0x03` odd)
    /// followed by the 32-byte big-endian x-coordinate.
    pub fn to_compressed(&self) -> Result<[u8; COMPRESSED_POINT_LEN], DogeError> {
        let Point::Affine { x, y } = self else {
            return Err(DogeError::InvalidPublicKey(
                "point at infinity has no encoding".into(),
            ));
        };
        let mut out = [0u8; COMPRESSED_POINT_LEN];
        out[0] = if is_odd(y) { 0x03 } else { 0x02 };
        out[1..].copy_from_slice(&to_32_bytes(x));
        Ok(out)
    }

    /// SEC1 uncompressed encoding: `0x04 || x || y`.
    pub fn to_uncompressed(&self) -> Result<[u8; UNCOMPRESSED_POINT_LEN], DogeError> {
        let Point::Affine { x, y } = self else {
            return Err(DogeError::InvalidPublicKey(
                "point at infinity has no encoding".into(),
            ));
        };
        let mut out = [0u8; UNCOMPRESSED_POINT_LEN];
        out[0] = 0x04;
        out[1..33].copy_from_slice(&to_32_bytes(x));
        out[33..].copy_from_slice(&to_32_bytes(y));
        Ok(out)
    }

    /// Parse a SEC1 compressed (33-byte) or uncompressed (65-byte) point.
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, DogeError> {
        let curve = &*SECP256K1;
        match (bytes.len(), bytes.first()) {
            (COMPRESSED_POINT_LEN, Some(&prefix @ (0x02 | 0x03))) => {
                let x = BigUint::from_bytes_be(&bytes[1..]);
                if x >= curve.p {
                    return Err(DogeError::InvalidPublicKey("x-coordinate out of range".into()));
                }
                let rhs = curve_rhs(&x, curve);
                // p ≡ 3 (mod 4), so a square root is rhs^((p+1)/4).
                let exponent = (&curve.p + BigUint::one()) >> 2u32;
                let mut y = rhs.modpow(&exponent, &curve.p);
                if is_odd(&y) != (prefix == 0x03) {
                    y = mod_sub(&BigUint::zero(), &y, &curve.p);
                }
                Point::from_affine(x, y)
            }
            (UNCOMPRESSED_POINT_LEN, Some(0x04)) => {
                let x = BigUint::from_bytes_be(&bytes[1..33]);
                let y = BigUint::from_bytes_be(&bytes[33..]);
                Point::from_affine(x, y)
            }
            (len, prefix) => Err(DogeError::InvalidPublicKey(format!(
                "unsupported encoding: {len} bytes, prefix {:?}",
                prefix
            ))),
        }
    }
}

/// Group addition. Handles identity operands, the doubling case `P == Q`
/// and the inverse case `P == -Q` (result is the identity).
pub fn point_add(lhs: &Point, rhs: &Point) -> Point {
    let p = &SECP256K1.p;
    let (x1, y1, x2, y2) = match (lhs, rhs) {
        (Point::Infinity, other) | (other, Point::Infinity) => return other.clone(),
        (Point::Affine { x: x1, y: y1 }, Point::Affine { x: x2, y: y2 }) => (x1, y1, x2, y2),
    };

    if x1 == x2 {
        if y1 == y2 {
            return point_double(lhs);
        }
        return Point::Infinity;
    }

    // x1 != x2, so the denominator is invertible.
    let Some(denominator) = mod_inverse(&mod_sub(x2, x1, p), p) else {
        return Point::Infinity;
    };
    let slope = mod_mul(&mod_sub(y2, y1, p), &denominator, p);
    let x3 = mod_sub(&mod_sub(&mod_mul(&slope, &slope, p), x1, p), x2, p);
    let y3 = mod_sub(&mod_mul(&slope, &mod_sub(x1, &x3, p), p), y1, p);
    Point::Affine { x: x3, y: y3 }
}

/// Group doubling `2P`. A point with `y = 0` doubles to the identity.
pub fn point_double(point: &Point) -> Point {
    let p = &SECP256K1.p;
    let Point::Affine { x, y } = point else {
        return Point::Infinity;
    };
    if y.is_zero() {
        return Point::Infinity;
    }

    let Some(denominator) = mod_inverse(&mod_add(y, y, p), p) else {
        return Point::Infinity;
    };
    let numerator = mod_mul(&BigUint::from(3u32), &mod_mul(x, x, p), p);
    let slope = mod_mul(&numerator, &denominator, p);
    let x3 = mod_sub(&mod_mul(&slope, &slope, p), &mod_add(x, x, p), p);
    let y3 = mod_sub(&mod_mul(&slope, &mod_sub(x, &x3, p), p), y, p);
    Point::Affine { x: x3, y: y3 }
}

/// Scalar multiplication `k·P` by double-and-add, scanning the bits of `k`
/// from least to most significant. `k == 0` yields the identity.
pub fn point_multiply(k: &BigUint, point: &Point) -> Point {
    let mut result = Point::Infinity;
    if k.is_zero() {
        return result;
    }

    let mut addend = point.clone();
    let bytes = k.to_bytes_le();
    let last = bytes.len() - 1;
    for (index, byte) in bytes.iter().enumerate() {
        for bit in 0..8 {
            if (byte >> bit) & 1 == 1 {
                result = point_add(&result, &addend);
            }
            // Skip the doubling after the most significant set bit.
            if index == last && (byte >> bit) >> 1 == 0 {
                return result;
            }
            addend = point_double(&addend);
        }
    }
    result
}

/// Big-endian 32-byte encoding of a value below 2²⁵⁶.
pub fn to_32_bytes(value: &BigUint) -> [u8; 32] {
    let bytes = value.to_bytes_be();
    let mut out = [0u8; 32];
    let len = bytes.len().min(32);
    out[32 - len..].copy_from_slice(&bytes[bytes.len() - len..]);
    out
}

fn is_odd(value: &BigUint) -> bool {
    value.to_bytes_le().first().is_some_and(|b| b & 1 == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(hex: &str) -> BigUint {
        BigUint::parse_bytes(hex.as_bytes(), 16).unwrap()
    }

    #[test]
    fn domain_constants_match_published_values() {
        let p = scalar("fffffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2f");
        let n = scalar("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141");
        let curve = &*SECP256K1;
        assert_eq!(curve.p, p);
        assert_eq!(curve.half_n, &n >> 1u32);
        assert_eq!(curve.n, n);
    }

    #[test]
    fn generator_is_on_curve() {
        assert!(generator().is_on_curve());
    }

    #[test]
    fn mod_sub_wraps() {
        let m = BigUint::from(7u32);
        assert_eq!(mod_sub(&BigUint::from(2u32), &BigUint::from(5u32), &m), BigUint::from(4u32));
        assert_eq!(mod_sub(&BigUint::from(5u32), &BigUint::from(2u32), &m), BigUint::from(3u32));
    }

    #[test]
    fn mod_inverse_small_prime() {
        let m = BigUint::from(11u32);
        let inv = mod_inverse(&BigUint::from(3u32), &m).unwrap();
        assert_eq!(inv, BigUint::from(4u32));
    }

    #[test]
    fn mod_inverse_of_zero_is_none() {
        assert!(mod_inverse(&BigUint::zero(), &SECP256K1.p).is_none());
    }

    #[test]
    fn mod_inverse_non_coprime_is_none() {
        assert!(mod_inverse(&BigUint::from(6u32), &BigUint::from(9u32)).is_none());
    }

    #[test]
    fn mod_inverse_large() {
        let a = scalar("deadbeefcafebabe0123456789abcdef");
        let inv = mod_inverse(&a, order()).unwrap();
        assert!(mod_mul(&a, &inv, order()).is_one());
    }

    #[test]
    fn multiply_by_one_is_identity_map() {
        assert_eq!(point_multiply(&BigUint::one(), generator()), *generator());
    }

    #[test]
    fn multiply_by_zero_is_infinity() {
        assert!(point_multiply(&BigUint::zero(), generator()).is_infinity());
    }

    #[test]
    fn multiply_by_order_is_infinity() {
        assert!(point_multiply(order(), generator()).is_infinity());
    }

    #[test]
    fn double_equals_add_to_self() {
        let g = generator();
        assert_eq!(point_double(g), point_add(g, g));
        assert_eq!(point_double(g), point_multiply(&BigUint::from(2u32), g));
    }

    #[test]
    fn two_g_known_vector() {
        let two_g = point_multiply(&BigUint::from(2u32), generator());
        assert_eq!(
            two_g.x().unwrap(),
            &scalar("c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5")
        );
    }

    #[test]
    fn add_inverse_is_infinity() {
        let g = generator();
        assert!(point_add(g, &g.negate()).is_infinity());
    }

    #[test]
    fn add_identity_operands() {
        let g = generator();
        assert_eq!(point_add(&Point::Infinity, g), *g);
        assert_eq!(point_add(g, &Point::Infinity), *g);
        assert!(point_add(&Point::Infinity, &Point::Infinity).is_infinity());
    }

    #[test]
    fn n_minus_one_is_negated_generator() {
        let k = order() - BigUint::one();
        assert_eq!(point_multiply(&k, generator()), generator().negate());
    }

    #[test]
    fn compressed_generator() {
        assert_eq!(
            hex::encode(generator().to_compressed().unwrap()),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
    }

    #[test]
    fn compressed_roundtrip_both_parities() {
        for k in [1u32, 2, 3, 7, 1000] {
            let point = point_multiply(&BigUint::from(k), generator());
            let encoded = point.to_compressed().unwrap();
            assert_eq!(Point::from_sec1_bytes(&encoded).unwrap(), point);
        }
    }

    #[test]
    fn uncompressed_roundtrip() {
        let point = point_multiply(&BigUint::from(5u32), generator());
        let encoded = point.to_uncompressed().unwrap();
        assert_eq!(Point::from_sec1_bytes(&encoded).unwrap(), point);
    }

    #[test]
    fn infinity_has_no_encoding() {
        assert!(Point::Infinity.to_compressed().is_err());
    }

    #[test]
    fn off_curve_point_rejected() {
        assert!(Point::from_affine(BigUint::one(), BigUint::one()).is_err());
        let mut bytes = generator().to_uncompressed().unwrap();
        bytes[64] ^= 0x01;
        assert!(Point::from_sec1_bytes(&bytes).is_err());
    }

    #[test]
    fn bad_prefix_rejected() {
        let mut bytes = generator().to_compressed().unwrap();
        bytes[0] = 0x05;
        assert!(Point::from_sec1_bytes(&bytes).is_err());
    }

    #[test]
    fn to_32_bytes_pads() {
        let bytes = to_32_bytes(&BigUint::from(0x0102u32));
        assert_eq!(bytes[30], 0x01);
        assert_eq!(bytes[31], 0x02);
        assert!(bytes[..30].iter().all(|&b| b == 0));
    }
}
