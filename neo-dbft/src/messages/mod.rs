//! Consensus messages and the signed envelope that carries them.
//!
//! Every message travels inside a [`ConsensusPayload`] signed by the sending
//! validator. The signature covers `network || sha256(unsigned payload)`.

mod change_view;
mod commit;
mod prepare;
mod recovery;

pub use change_view::ChangeView;
pub use commit::Commit;
pub use prepare::{PrepareRequest, PrepareResponse};
pub use recovery::{
    ChangeViewCompact, CommitCompact, PreparationCompact, RecoveryMessage, RecoveryRequest,
};

use crate::error::ConsensusResult;
use crate::ledger::{sign_data, Witness};
use crate::{ConsensusMessageType, ViewNumber};
use neo_crypto::{script, Keypair, PublicKey, Secp256r1Sign, Secp256r1Verify};
use neo_primitives::{sha256, UInt256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusMessage {
    ChangeView(ChangeView),
    PrepareRequest(PrepareRequest),
    PrepareResponse(PrepareResponse),
    Commit(Commit),
    RecoveryRequest(RecoveryRequest),
    RecoveryMessage(RecoveryMessage),
}

impl ConsensusMessage {
    pub fn view_number(&self) -> ViewNumber {
        match self {
            Self::ChangeView(m) => m.view_number,
            Self::PrepareRequest(m) => m.view_number,
            Self::PrepareResponse(m) => m.view_number,
            Self::Commit(m) => m.view_number,
            Self::RecoveryRequest(m) => m.view_number,
            Self::RecoveryMessage(m) => m.view_number,
        }
    }

    pub fn message_type(&self) -> ConsensusMessageType {
        match self {
            Self::ChangeView(_) => ConsensusMessageType::ChangeView,
            Self::PrepareRequest(_) => ConsensusMessageType::PrepareRequest,
            Self::PrepareResponse(_) => ConsensusMessageType::PrepareResponse,
            Self::Commit(_) => ConsensusMessageType::Commit,
            Self::RecoveryRequest(_) => ConsensusMessageType::RecoveryRequest,
            Self::RecoveryMessage(_) => ConsensusMessageType::RecoveryMessage,
        }
    }
}

/// Signed envelope for a consensus message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusPayload {
    pub version: u32,
    pub prev_hash: UInt256,
    pub block_index: u32,
    pub validator_index: u8,
    pub message: ConsensusMessage,
    pub witness: Witness,
}

impl ConsensusPayload {
    /// Builds and signs a payload with `keypair`.
    pub fn sign(
        version: u32,
        prev_hash: UInt256,
        block_index: u32,
        validator_index: u8,
        message: ConsensusMessage,
        keypair: &Keypair,
        network: u32,
    ) -> ConsensusResult<Self> {
        let mut payload = Self {
            version,
            prev_hash,
            block_index,
            validator_index,
            message,
            witness: Witness::default(),
        };
        let sign = keypair
            .private_key
            .secp256r1_sign(payload.sign_data(network)?)?;
        payload.witness = Witness {
            invocation_script: script::signature_invocation_script(&sign),
            verification_script: script::signature_redeem_script(&keypair.public_key),
        };
        Ok(payload)
    }

    #[inline]
    pub fn view_number(&self) -> ViewNumber {
        self.message.view_number()
    }

    #[inline]
    pub fn message_type(&self) -> ConsensusMessageType {
        self.message.message_type()
    }

    /// Hash of everything except the witness.
    pub fn hash(&self) -> ConsensusResult<UInt256> {
        let unsigned = bincode::serialize(&(
            self.version,
            &self.prev_hash,
            self.block_index,
            self.validator_index,
            &self.message,
        ))?;
        Ok(UInt256::from_array(sha256(unsigned)))
    }

    pub fn sign_data(&self, network: u32) -> ConsensusResult<Vec<u8>> {
        Ok(sign_data(network, &self.hash()?))
    }

    /// Checks the witness is a single signature by `signer` over this payload.
    pub fn verify_witness(&self, network: u32, signer: &PublicKey) -> bool {
        if self.witness.verification_script != script::signature_redeem_script(signer) {
            return false;
        }
        let Some(sign) = script::parse_signature_invocation(&self.witness.invocation_script)
        else {
            return false;
        };
        match self.sign_data(network) {
            Ok(data) => signer.secp256r1_verify(data, sign).is_ok(),
            Err(_) => false,
        }
    }

    pub fn change_view(&self) -> Option<&ChangeView> {
        match &self.message {
            ConsensusMessage::ChangeView(m) => Some(m),
            _ => None,
        }
    }

    pub fn prepare_request(&self) -> Option<&PrepareRequest> {
        match &self.message {
            ConsensusMessage::PrepareRequest(m) => Some(m),
            _ => None,
        }
    }

    pub fn prepare_response(&self) -> Option<&PrepareResponse> {
        match &self.message {
            ConsensusMessage::PrepareResponse(m) => Some(m),
            _ => None,
        }
    }

    pub fn commit(&self) -> Option<&Commit> {
        match &self.message {
            ConsensusMessage::Commit(m) => Some(m),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChangeViewReason;

    const NETWORK: u32 = 0x4e454f;

    fn change_view(keypair: &Keypair) -> ConsensusPayload {
        ConsensusPayload::sign(
            0,
            UInt256::zero(),
            10,
            2,
            ConsensusMessage::ChangeView(ChangeView {
                view_number: 1,
                timestamp: 1234,
                reason: ChangeViewReason::Timeout,
            }),
            keypair,
            NETWORK,
        )
        .unwrap()
    }

    #[test]
    fn test_payload_witness() {
        let keypair = Keypair::generate(&mut rand::thread_rng());
        let other = Keypair::generate(&mut rand::thread_rng());
        let payload = change_view(&keypair);

        assert!(payload.verify_witness(NETWORK, &keypair.public_key));
        assert!(!payload.verify_witness(NETWORK + 1, &keypair.public_key));
        assert!(!payload.verify_witness(NETWORK, &other.public_key));

        let mut tampered = payload.clone();
        tampered.block_index += 1;
        assert!(!tampered.verify_witness(NETWORK, &keypair.public_key));
    }

    #[test]
    fn test_payload_hash_excludes_witness() {
        let keypair = Keypair::generate(&mut rand::thread_rng());
        let payload = change_view(&keypair);
        let mut stripped = payload.clone();
        stripped.witness = Witness::default();

        assert_eq!(payload.hash().unwrap(), stripped.hash().unwrap());
        assert_eq!(payload.view_number(), 1);
        assert_eq!(payload.message_type(), ConsensusMessageType::ChangeView);
        assert_eq!(payload.change_view().map(|m| m.new_view_number()), Some(2));
        assert!(payload.commit().is_none());
    }
}
