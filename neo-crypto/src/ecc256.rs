// Copyright @ 2025 - present, R3E Network
// All Rights Reserved

use std::cmp::Ordering;
use std::fmt::{self, Debug, Display, Formatter};

use p256::{elliptic_curve::sec1::ToEncodedPoint, EncodedPoint, PublicKey as P256PublicKey};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

mod keypair;

pub use keypair::Keypair;

pub const KEY_SIZE: usize = 32;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("ecc256: invalid private key")]
    InvalidPrivateKey,

    #[error("ecc256: invalid public key encoding")]
    InvalidPublicKey,
}

#[derive(Clone)]
pub struct PrivateKey {
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl PrivateKey {
    #[inline]
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self {
            key: Zeroizing::new(bytes),
        }
    }

    #[inline]
    pub fn from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; KEY_SIZE] = slice.try_into().map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::new(bytes))
    }

    /// Parses a 64-character hex scalar.
    pub fn from_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = Zeroizing::new(hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?);
        Self::from_slice(&bytes)
    }

    #[inline]
    pub fn as_be_bytes(&self) -> &[u8] {
        self.key.as_slice()
    }
}

impl Debug for PrivateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PrivateKey").field(&"***").finish()
    }
}

impl Eq for PrivateKey {}

impl PartialEq for PrivateKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.key.as_slice().ct_eq(other.key.as_slice()).into()
    }
}

/// An uncompressed secp256r1 point.
///
/// Ordered by X then Y, the order Neo uses when building multi-signature scripts.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct PublicKey {
    gx: [u8; KEY_SIZE],
    gy: [u8; KEY_SIZE],
}

impl PublicKey {
    pub(crate) fn from_p256(public: &P256PublicKey) -> Result<Self, KeyError> {
        let encoded = public.to_encoded_point(false);
        Self::from_encoded(&encoded)
    }

    fn from_encoded(encoded: &EncodedPoint) -> Result<Self, KeyError> {
        let (Some(x), Some(y)) = (encoded.x(), encoded.y()) else {
            return Err(KeyError::InvalidPublicKey);
        };
        let mut gx = [0u8; KEY_SIZE];
        let mut gy = [0u8; KEY_SIZE];
        gx.copy_from_slice(x.as_ref());
        gy.copy_from_slice(y.as_ref());
        Ok(Self { gx, gy })
    }

    /// Accepts both compressed (33 bytes) and uncompressed (65 bytes) encodings.
    #[inline]
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let public =
            P256PublicKey::from_sec1_bytes(bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Self::from_p256(&public)
    }

    #[inline]
    pub fn to_uncompressed(&self) -> [u8; 65] {
        let mut buf = [0u8; 65];
        buf[0] = 0x04;
        buf[1..33].copy_from_slice(&self.gx);
        buf[33..].copy_from_slice(&self.gy);
        buf
    }

    #[inline]
    pub fn to_compressed(&self) -> [u8; 33] {
        let mut buf = [0u8; 33];
        buf[0] = 0x02 + (self.gy[KEY_SIZE - 1] & 0x01);
        buf[1..].copy_from_slice(&self.gx);
        buf
    }
}

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PublicKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.gx.cmp(&other.gx).then_with(|| self.gy.cmp(&other.gy))
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("compressed", &hex::encode(self.to_compressed()))
            .finish()
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_compressed()))
    }
}
