//! Property-based tests for neo-crypto
//!
//! These tests use proptest to verify:
//! - Sign then verify succeeds, and fails for any other message
//! - Signature invocation scripts round-trip
//! - Multi-signature scripts do not depend on key order

use neo_crypto::{
    script, Keypair, PrivateKey, PublicKey, Secp256r1Sign, Secp256r1Verify, ECC256_SIGN_SIZE,
};
use proptest::prelude::*;

fn keypair(seed: [u8; 32]) -> Option<Keypair> {
    Keypair::from_private(PrivateKey::new(seed)).ok()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_sign_then_verify(seed in any::<[u8; 32]>(), message in any::<Vec<u8>>()) {
        let Some(keypair) = keypair(seed) else {
            return Ok(());
        };
        let sign = keypair.private_key.secp256r1_sign(&message).unwrap();
        prop_assert!(keypair.public_key.secp256r1_verify(&message, &sign).is_ok());

        let mut other = message.clone();
        other.push(0x01);
        prop_assert!(keypair.public_key.secp256r1_verify(&other, &sign).is_err());
    }

    #[test]
    fn test_invocation_script_round_trip(sign in any::<[u8; 32]>()) {
        let mut full = [0u8; ECC256_SIGN_SIZE];
        full[..32].copy_from_slice(&sign);
        full[32..].copy_from_slice(&sign);
        let script = script::signature_invocation_script(&full);
        prop_assert_eq!(script::parse_signature_invocation(&script), Some(&full[..]));
    }

    #[test]
    fn test_multisig_ignores_key_order(seeds in prop::collection::vec(any::<[u8; 32]>(), 1..6)) {
        let keys: Vec<PublicKey> = seeds
            .into_iter()
            .filter_map(keypair)
            .map(|k| k.public_key)
            .collect();
        prop_assume!(!keys.is_empty());

        let mut reversed = keys.clone();
        reversed.reverse();
        let m = keys.len() - (keys.len() - 1) / 3;
        prop_assert_eq!(
            script::multisig_redeem_script(m, &keys).unwrap(),
            script::multisig_redeem_script(m, &reversed).unwrap()
        );
    }
}
