//! Transaction verification outcomes reported by the chain.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of verifying a transaction against the chain and the pending block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum VerifyResult {
    /// Verification passed.
    Succeed,
    /// The transaction is already known.
    AlreadyExists,
    /// The transaction could not be verified (e.g. missing state).
    UnableToVerify,
    /// The transaction is malformed or its witnesses are invalid.
    Invalid,
    /// `valid_until_block` has passed.
    Expired,
    /// The sender cannot cover the accumulated fees.
    InsufficientFunds,
    /// The transaction violates local policy.
    PolicyFail,
    /// Any other failure.
    Unknown,
}

impl VerifyResult {
    /// Returns true for [`VerifyResult::Succeed`].
    #[inline]
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Succeed)
    }
}

impl fmt::Display for VerifyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
