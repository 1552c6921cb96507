//! Consensus payload handlers.
//!
//! Every payload first passes the admission filter in
//! [`handle_consensus_payload`]. Anything stale, foreign or badly signed is
//! dropped there and the context comes back unchanged; only internal faults
//! surface as `Err`.

mod change_view;
mod commit;
mod events;
mod prepare;
mod recovery;

pub use events::{handle_persist_block, handle_transaction_received};
pub use prepare::MAX_TIMESTAMP_DRIFT_MS;

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use neo_primitives::UInt256;
use tracing::debug;

use crate::context::ConsensusContext;
use crate::env::{Environment, Transition};
use crate::error::ConsensusResult;
use crate::messages::{ConsensusMessage, ConsensusPayload};

/// Entry point for payloads received from the network.
///
/// `known_hashes` dedupes recovery requests for the current height. Boxed
/// because recovery messages replay their contents through this function.
pub fn handle_consensus_payload<'a>(
    env: &'a Environment,
    context: ConsensusContext,
    known_hashes: &'a mut HashSet<UInt256>,
    payload: Arc<ConsensusPayload>,
) -> BoxFuture<'a, ConsensusResult<Transition>> {
    async move {
        if !admit(env, &context, &payload).await {
            return Ok(Transition::stay(context));
        }
        let context = context.with_last_seen(payload.validator_index, payload.block_index);
        match &payload.message {
            ConsensusMessage::ChangeView(_) => {
                change_view::on_change_view(env, context, known_hashes, &payload).await
            }
            ConsensusMessage::PrepareRequest(_) => {
                prepare::on_prepare_request(env, context, &payload).await
            }
            ConsensusMessage::PrepareResponse(_) => {
                prepare::on_prepare_response(env, context, &payload).await
            }
            ConsensusMessage::Commit(_) => commit::on_commit(env, context, &payload).await,
            ConsensusMessage::RecoveryRequest(_) => {
                recovery::on_recovery_request(env, context, known_hashes, &payload).await
            }
            ConsensusMessage::RecoveryMessage(_) => {
                recovery::on_recovery_message(env, context, known_hashes, &payload).await
            }
        }
    }
    .boxed()
}

/// Drops payloads that are not addressed to this height and view, come
/// from an unknown or our own slot, or fail signature checks.
async fn admit(env: &Environment, context: &ConsensusContext, payload: &ConsensusPayload) -> bool {
    let message_type = payload.message_type();
    if payload.block_index != context.block_index {
        if payload.block_index > context.block_index {
            debug!(
                block_index = context.block_index,
                payload_index = payload.block_index,
                "Chain is behind, dropping payload"
            );
        }
        return false;
    }
    if payload.version != context.version || payload.prev_hash != context.prev_hash {
        debug!(%message_type, validator = payload.validator_index, "Dropping payload for another chain tip");
        return false;
    }
    if Some(payload.validator_index) == context.my_index {
        return false;
    }
    let Some(validator) = context.validator(payload.validator_index) else {
        debug!(
            %message_type,
            validator = payload.validator_index,
            validators = context.n(),
            "Dropping payload from unknown validator"
        );
        return false;
    };
    if !message_type.accepts_any_view() && payload.view_number() != context.view_number {
        debug!(
            %message_type,
            validator = payload.validator_index,
            view = context.view_number,
            payload_view = payload.view_number(),
            "Dropping payload for another view"
        );
        return false;
    }
    if !payload.verify_witness(env.network(), validator) {
        debug!(%message_type, validator = payload.validator_index, "Dropping payload with invalid witness");
        return false;
    }
    if !env.blockchain().verify_consensus_payload(payload).await {
        debug!(%message_type, validator = payload.validator_index, "Dropping payload rejected by chain");
        return false;
    }
    true
}
