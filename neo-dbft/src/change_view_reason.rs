//! Why a validator asks to leave the current view.
//!
//! | Reason | Raised when |
//! |--------|-------------|
//! | `Timeout` | The view timer fired without progress |
//! | `ChangeAgreement` | M validators already asked for a higher view |
//! | `TxNotFound` | The timer fired while proposed transactions were still missing |
//! | `TxRejectedByPolicy` | A proposed transaction failed local policy |
//! | `TxInvalid` | A proposed transaction failed verification |
//! | `BlockRejectedByPolicy` | The proposal exceeds the block size or system fee limit |
//!
//! ```rust
//! use neo_dbft::ChangeViewReason;
//! use neo_primitives::VerifyResult;
//!
//! assert_eq!(
//!     ChangeViewReason::from(VerifyResult::PolicyFail),
//!     ChangeViewReason::TxRejectedByPolicy
//! );
//! assert_eq!(ChangeViewReason::try_from(0x05), Ok(ChangeViewReason::BlockRejectedByPolicy));
//! ```

use neo_primitives::VerifyResult;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum ChangeViewReason {
    #[default]
    Timeout = 0x00,
    ChangeAgreement = 0x01,
    TxNotFound = 0x02,
    TxRejectedByPolicy = 0x03,
    TxInvalid = 0x04,
    BlockRejectedByPolicy = 0x05,
}

impl ChangeViewReason {
    pub const ALL: [Self; 6] = [
        Self::Timeout,
        Self::ChangeAgreement,
        Self::TxNotFound,
        Self::TxRejectedByPolicy,
        Self::TxInvalid,
        Self::BlockRejectedByPolicy,
    ];

    #[inline]
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        self as u8
    }

    /// True for reasons raised by a local policy decision rather than by the clock.
    #[must_use]
    pub const fn is_rejection(self) -> bool {
        matches!(
            self,
            Self::TxRejectedByPolicy | Self::TxInvalid | Self::BlockRejectedByPolicy
        )
    }
}

impl TryFrom<u8> for ChangeViewReason {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|reason| reason.to_byte() == value)
            .ok_or(value)
    }
}

/// Maps a failed transaction verification onto the reason broadcast with the change view.
impl From<VerifyResult> for ChangeViewReason {
    fn from(result: VerifyResult) -> Self {
        match result {
            VerifyResult::PolicyFail => Self::TxRejectedByPolicy,
            _ => Self::TxInvalid,
        }
    }
}

impl fmt::Display for ChangeViewReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
