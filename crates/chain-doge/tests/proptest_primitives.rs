use proptest::prelude::*;

use chain_doge::base58;
use chain_doge::curve::{generator, order, point_add, point_multiply};
use chain_doge::{DogeError, PrivateKey, Signature};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use num_bigint::BigUint;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn with_leading_zeros() -> impl Strategy<Value = Vec<u8>> {
    (0usize..=5, prop::collection::vec(any::<u8>(), 0..64)).prop_map(|(zeros, tail)| {
        let mut bytes = vec![0u8; zeros];
        bytes.extend(tail);
        bytes
    })
}

fn scalar() -> impl Strategy<Value = BigUint> {
    any::<[u8; 32]>().prop_map(|bytes| BigUint::from_bytes_be(&bytes) % order())
}

fn private_key() -> impl Strategy<Value = PrivateKey> {
    any::<[u8; 32]>().prop_filter_map("scalar out of range", |bytes| {
        PrivateKey::from_bytes(&bytes).ok()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn base58_roundtrip(bytes in with_leading_zeros()) {
        let encoded = base58::encode(&bytes);
        prop_assert_eq!(base58::decode(&encoded).unwrap(), bytes);
    }

    #[test]
    fn base58_matches_bs58(bytes in with_leading_zeros()) {
        prop_assert_eq!(base58::encode(&bytes), bs58::encode(&bytes).into_string());
    }

    #[test]
    fn base58check_matches_bs58(payload in prop::collection::vec(any::<u8>(), 0..40)) {
        prop_assert_eq!(
            base58::encode_check(&payload),
            bs58::encode(&payload).with_check().into_string()
        );
    }

    #[test]
    fn base58check_detects_single_byte_flip(
        payload in prop::collection::vec(any::<u8>(), 1..40),
        index in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let mut data = payload.clone();
        data.extend_from_slice(&base58::checksum(&payload));
        let i = index.index(data.len());
        data[i] ^= flip;
        prop_assert_eq!(
            base58::decode_check(&base58::encode(&data)),
            Err(DogeError::ChecksumMismatch)
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn scalar_multiplication_distributes(a in scalar(), b in scalar()) {
        let g = generator();
        let sum = (&a + &b) % order();
        prop_assert_eq!(
            point_multiply(&sum, g),
            point_add(&point_multiply(&a, g), &point_multiply(&b, g))
        );
    }

    #[test]
    fn multiples_stay_on_curve(k in scalar()) {
        prop_assert!(point_multiply(&k, generator()).is_on_curve());
    }

    #[test]
    fn deterministic_signature_is_valid_and_low_s(
        key in private_key(),
        digest in any::<[u8; 32]>(),
    ) {
        let pubkey = key.public_key().unwrap();
        let sig = key.sign(&digest).unwrap();
        prop_assert!(sig.is_low_s());
        prop_assert!(pubkey.verify(&digest, &sig));

        let verifying =
            k256::ecdsa::VerifyingKey::from_sec1_bytes(&pubkey.to_compressed()).unwrap();
        let reference = k256::ecdsa::Signature::from_der(&sig.to_der()).unwrap();
        prop_assert!(verifying.verify_prehash(&digest, &reference).is_ok());
    }

    #[test]
    fn random_nonce_signature_is_valid_and_low_s(
        key in private_key(),
        digest in any::<[u8; 32]>(),
        seed in any::<u64>(),
    ) {
        let sig = key.sign_with_rng(&digest, &mut StdRng::seed_from_u64(seed)).unwrap();
        prop_assert!(sig.is_low_s());
        prop_assert!(key.public_key().unwrap().verify(&digest, &sig));
    }

    #[test]
    fn der_roundtrip(key in private_key(), digest in any::<[u8; 32]>()) {
        let sig = key.sign(&digest).unwrap();
        prop_assert_eq!(Signature::from_der(&sig.to_der()).unwrap(), sig);
    }
}
