//! Recovery request and the compact state snapshot sent in reply.
//!
//! Compacts keep only what cannot be recomputed by the receiver: the
//! validator index, the message fields that differ per sender and the
//! original invocation script. Rebuilding a payload from a compact yields
//! byte-identical unsigned data, so the original signature still verifies.

use super::{ChangeView, Commit, ConsensusMessage, ConsensusPayload, PrepareRequest, PrepareResponse};
use crate::ledger::Witness;
use crate::{ChangeViewReason, ViewNumber};
use neo_crypto::{script, PublicKey};
use neo_primitives::UInt256;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRequest {
    pub view_number: ViewNumber,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeViewCompact {
    pub validator_index: u8,
    pub original_view_number: ViewNumber,
    pub timestamp: u64,
    pub reason: ChangeViewReason,
    pub invocation_script: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparationCompact {
    pub validator_index: u8,
    pub invocation_script: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitCompact {
    pub view_number: ViewNumber,
    pub validator_index: u8,
    pub signature: Vec<u8>,
    pub invocation_script: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryMessage {
    pub view_number: ViewNumber,
    pub change_view_messages: Vec<ChangeViewCompact>,
    pub prepare_request_message: Option<PrepareRequest>,
    /// Set only when the PrepareRequest itself is unknown to the sender.
    pub preparation_hash: Option<UInt256>,
    pub preparation_messages: Vec<PreparationCompact>,
    pub commit_messages: Vec<CommitCompact>,
}

impl ChangeViewCompact {
    pub fn from_payload(payload: &ConsensusPayload) -> Option<Self> {
        let message = payload.change_view()?;
        Some(Self {
            validator_index: payload.validator_index,
            original_view_number: message.view_number,
            timestamp: message.timestamp,
            reason: message.reason,
            invocation_script: payload.witness.invocation_script.clone(),
        })
    }
}

impl PreparationCompact {
    pub fn from_payload(payload: &ConsensusPayload) -> Self {
        Self {
            validator_index: payload.validator_index,
            invocation_script: payload.witness.invocation_script.clone(),
        }
    }
}

impl CommitCompact {
    pub fn from_payload(payload: &ConsensusPayload) -> Option<Self> {
        let message = payload.commit()?;
        Some(Self {
            view_number: message.view_number,
            validator_index: payload.validator_index,
            signature: message.signature.clone(),
            invocation_script: payload.witness.invocation_script.clone(),
        })
    }
}

impl RecoveryMessage {
    pub fn change_view_payloads(
        &self,
        envelope: &ConsensusPayload,
        validators: &[PublicKey],
    ) -> Vec<ConsensusPayload> {
        self.change_view_messages
            .iter()
            .filter_map(|compact| {
                let message = ConsensusMessage::ChangeView(ChangeView {
                    view_number: compact.original_view_number,
                    timestamp: compact.timestamp,
                    reason: compact.reason,
                });
                rebuild(
                    envelope,
                    validators,
                    compact.validator_index,
                    message,
                    &compact.invocation_script,
                )
            })
            .collect()
    }

    pub fn prepare_request_payload(
        &self,
        envelope: &ConsensusPayload,
        validators: &[PublicKey],
        primary_index: u8,
    ) -> Option<ConsensusPayload> {
        let request = self.prepare_request_message.clone()?;
        let compact = self
            .preparation_messages
            .iter()
            .find(|p| p.validator_index == primary_index)?;
        rebuild(
            envelope,
            validators,
            primary_index,
            ConsensusMessage::PrepareRequest(request),
            &compact.invocation_script,
        )
    }

    /// Responses of every non-primary validator, acknowledging `preparation_hash`.
    pub fn prepare_response_payloads(
        &self,
        envelope: &ConsensusPayload,
        validators: &[PublicKey],
        primary_index: u8,
        preparation_hash: UInt256,
    ) -> Vec<ConsensusPayload> {
        self.preparation_messages
            .iter()
            .filter(|p| p.validator_index != primary_index)
            .filter_map(|compact| {
                let message = ConsensusMessage::PrepareResponse(PrepareResponse {
                    view_number: self.view_number,
                    preparation_hash,
                });
                rebuild(
                    envelope,
                    validators,
                    compact.validator_index,
                    message,
                    &compact.invocation_script,
                )
            })
            .collect()
    }

    pub fn commit_payloads(
        &self,
        envelope: &ConsensusPayload,
        validators: &[PublicKey],
    ) -> Vec<ConsensusPayload> {
        self.commit_messages
            .iter()
            .filter_map(|compact| {
                let message = ConsensusMessage::Commit(Commit {
                    view_number: compact.view_number,
                    signature: compact.signature.clone(),
                });
                rebuild(
                    envelope,
                    validators,
                    compact.validator_index,
                    message,
                    &compact.invocation_script,
                )
            })
            .collect()
    }
}

fn rebuild(
    envelope: &ConsensusPayload,
    validators: &[PublicKey],
    validator_index: u8,
    message: ConsensusMessage,
    invocation_script: &[u8],
) -> Option<ConsensusPayload> {
    let validator = validators.get(validator_index as usize)?;
    Some(ConsensusPayload {
        version: envelope.version,
        prev_hash: envelope.prev_hash,
        block_index: envelope.block_index,
        validator_index,
        message,
        witness: Witness {
            invocation_script: invocation_script.to_vec(),
            verification_script: script::signature_redeem_script(validator),
        },
    })
}
