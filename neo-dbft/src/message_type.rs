//! Consensus message type identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ConsensusMessageType {
    ChangeView = 0x00,
    PrepareRequest = 0x20,
    PrepareResponse = 0x21,
    Commit = 0x30,
    RecoveryRequest = 0x40,
    RecoveryMessage = 0x41,
}

impl ConsensusMessageType {
    #[inline]
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        self as u8
    }

    /// Messages admitted even when their view differs from the local view.
    ///
    /// Their handlers apply their own view rule.
    #[must_use]
    pub const fn accepts_any_view(self) -> bool {
        matches!(
            self,
            Self::ChangeView | Self::Commit | Self::RecoveryRequest | Self::RecoveryMessage
        )
    }
}

impl TryFrom<u8> for ConsensusMessageType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::ChangeView),
            0x20 => Ok(Self::PrepareRequest),
            0x21 => Ok(Self::PrepareResponse),
            0x30 => Ok(Self::Commit),
            0x40 => Ok(Self::RecoveryRequest),
            0x41 => Ok(Self::RecoveryMessage),
            other => Err(other),
        }
    }
}

impl fmt::Display for ConsensusMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_bytes() {
        assert_eq!(ConsensusMessageType::PrepareRequest.to_byte(), 0x20);
        assert_eq!(
            ConsensusMessageType::try_from(0x41),
            Ok(ConsensusMessageType::RecoveryMessage)
        );
        assert_eq!(ConsensusMessageType::try_from(0x22), Err(0x22));
    }

    #[test]
    fn test_view_exemptions() {
        assert!(ConsensusMessageType::ChangeView.accepts_any_view());
        assert!(ConsensusMessageType::Commit.accepts_any_view());
        assert!(!ConsensusMessageType::PrepareRequest.accepts_any_view());
        assert!(!ConsensusMessageType::PrepareResponse.accepts_any_view());
    }
}
