//! Hash helpers used for script hashes and payload digests.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Computes SHA-256 of `data`.
#[inline]
#[must_use]
pub fn sha256<T: AsRef<[u8]>>(data: T) -> [u8; 32] {
    Sha256::digest(data.as_ref()).into()
}

/// Computes RIPEMD-160 of SHA-256 of `data` (the Neo script hash).
#[inline]
#[must_use]
pub fn hash160<T: AsRef<[u8]>>(data: T) -> [u8; 20] {
    Ripemd160::digest(sha256(data)).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_empty() {
        assert_eq!(
            hex::encode(sha256([])),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hash160_empty() {
        assert_eq!(
            hex::encode(hash160([])),
            "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb"
        );
    }
}
