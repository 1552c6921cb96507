// Copyright @ 2025 - present, R3E Network
// All Rights Reserved

//! Verification and invocation scripts for consensus witnesses.
//!
//! Only the handful of opcodes needed to bind validator keys to signatures
//! are emitted here; script execution itself belongs to the VM.

use neo_primitives::UInt160;

use crate::{PublicKey, ECC256_SIGN_SIZE};

const PUSHINT8: u8 = 0x00;
const PUSHINT16: u8 = 0x01;
const PUSHDATA1: u8 = 0x0C;
const PUSH1: u8 = 0x11;
const SYSCALL: u8 = 0x41;

/// Interop hash of `System.Crypto.CheckSig`.
const CHECK_SIG: [u8; 4] = [0x56, 0xe7, 0xb3, 0x27];
/// Interop hash of `System.Crypto.CheckMultisig`.
const CHECK_MULTISIG: [u8; 4] = [0x9e, 0xd0, 0xdc, 0x3a];

pub const MAX_MULTISIG_KEYS: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("script: invalid multi-signature threshold {m} of {n}")]
    InvalidThreshold { m: usize, n: usize },
}

/// Script that verifies one signature against `key`.
pub fn signature_redeem_script(key: &PublicKey) -> Vec<u8> {
    let mut script = Vec::with_capacity(40);
    script.push(PUSHDATA1);
    script.push(33);
    script.extend_from_slice(&key.to_compressed());
    script.push(SYSCALL);
    script.extend_from_slice(&CHECK_SIG);
    script
}

/// Script that verifies `m` signatures from `keys`; keys are sorted first.
pub fn multisig_redeem_script(m: usize, keys: &[PublicKey]) -> Result<Vec<u8>, ScriptError> {
    let n = keys.len();
    if m == 0 || m > n || n > MAX_MULTISIG_KEYS {
        return Err(ScriptError::InvalidThreshold { m, n });
    }

    let mut sorted = keys.to_vec();
    sorted.sort();

    let mut script = Vec::with_capacity(n * 35 + 12);
    push_int(&mut script, m);
    for key in &sorted {
        script.push(PUSHDATA1);
        script.push(33);
        script.extend_from_slice(&key.to_compressed());
    }
    push_int(&mut script, n);
    script.push(SYSCALL);
    script.extend_from_slice(&CHECK_MULTISIG);
    Ok(script)
}

/// Invocation script pushing a single signature.
pub fn signature_invocation_script(sign: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(sign.len() + 2);
    push_signature(&mut script, sign);
    script
}

/// Appends one `PUSHDATA1 <sign>` to an invocation script.
pub fn push_signature(script: &mut Vec<u8>, sign: &[u8]) {
    script.push(PUSHDATA1);
    script.push(sign.len() as u8);
    script.extend_from_slice(sign);
}

/// Extracts the signature of a single-signature invocation script.
pub fn parse_signature_invocation(script: &[u8]) -> Option<&[u8]> {
    match script {
        [PUSHDATA1, len, sign @ ..]
            if *len as usize == ECC256_SIGN_SIZE && sign.len() == ECC256_SIGN_SIZE =>
        {
            Some(sign)
        }
        _ => None,
    }
}

/// Size of an invocation script carrying `m` signatures.
pub const fn multisig_invocation_size(m: usize) -> usize {
    m * (ECC256_SIGN_SIZE + 2)
}

#[inline]
pub fn script_hash(script: &[u8]) -> UInt160 {
    UInt160::from_script(script)
}

fn push_int(script: &mut Vec<u8>, value: usize) {
    match value {
        0..=16 => script.push(PUSH1 - 1 + value as u8),
        17..=127 => {
            script.push(PUSHINT8);
            script.push(value as u8);
        }
        _ => {
            script.push(PUSHINT16);
            script.extend_from_slice(&(value as u16).to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Keypair;

    fn keys(n: usize) -> Vec<PublicKey> {
        let mut rng = rand::thread_rng();
        (0..n).map(|_| Keypair::generate(&mut rng).public_key).collect()
    }

    #[test]
    fn test_signature_redeem_script() {
        let key = keys(1)[0];
        let script = signature_redeem_script(&key);
        assert_eq!(script.len(), 40);
        assert_eq!(&script[2..35], &key.to_compressed());
        assert_eq!(&script[36..], &CHECK_SIG);
    }

    #[test]
    fn test_multisig_is_order_independent() {
        let mut keys = keys(4);
        let a = multisig_redeem_script(3, &keys).unwrap();
        keys.reverse();
        let b = multisig_redeem_script(3, &keys).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0], PUSH1 + 2);
        assert_eq!(script_hash(&a), script_hash(&b));

        assert!(multisig_redeem_script(0, &keys).is_err());
        assert!(multisig_redeem_script(5, &keys).is_err());
    }

    #[test]
    fn test_invocation_round_trip() {
        let sign = [7u8; ECC256_SIGN_SIZE];
        let script = signature_invocation_script(&sign);
        assert_eq!(script.len(), multisig_invocation_size(1));
        assert_eq!(parse_signature_invocation(&script), Some(&sign[..]));
        assert_eq!(parse_signature_invocation(&script[1..]), None);
    }
}
