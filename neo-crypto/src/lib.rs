// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! secp256r1 keys, ECDSA and the verification scripts that bind keys to
//! consensus witnesses.

pub mod ecc256;
pub mod ecdsa;
pub mod script;

pub use ecc256::{KeyError, Keypair, PrivateKey, PublicKey, KEY_SIZE};
pub use ecdsa::{Secp256r1Sign, Secp256r1Verify, SignError, VerifyError, ECC256_SIGN_SIZE};
pub use script::ScriptError;
