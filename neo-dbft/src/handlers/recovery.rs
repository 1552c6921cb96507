use std::collections::HashSet;
use std::sync::Arc;

use neo_primitives::UInt256;
use tracing::debug;

use super::handle_consensus_payload;
use crate::actions::send_recovery_message;
use crate::context::ConsensusContext;
use crate::env::{Environment, Transition};
use crate::error::ConsensusResult;
use crate::messages::{ConsensusMessage, ConsensusPayload};

/// Handles RecoveryRequest message.
///
/// Answered by committed nodes and by the `M` validators following the
/// requester, so that not every peer floods the network.
pub(super) async fn on_recovery_request(
    env: &Environment,
    context: ConsensusContext,
    known_hashes: &mut HashSet<UInt256>,
    payload: &Arc<ConsensusPayload>,
) -> ConsensusResult<Transition> {
    if !known_hashes.insert(payload.hash()?) {
        return Ok(Transition::stay(context));
    }
    debug!(
        block_index = context.block_index,
        view = context.view_number,
        validator = payload.validator_index,
        "Received RecoveryRequest"
    );

    answer_recovery(env, &context, payload.validator_index).await?;
    Ok(Transition::stay(context))
}

/// Sends a RecoveryMessage if this node is committed or is one of the `M`
/// validators following `requester`.
pub(super) async fn answer_recovery(
    env: &Environment,
    context: &ConsensusContext,
    requester: u8,
) -> ConsensusResult<()> {
    if !context.commit_sent() && !should_answer(context, requester) {
        return Ok(());
    }
    send_recovery_message(env, context).await
}

fn should_answer(context: &ConsensusContext, requester: u8) -> bool {
    let Some(me) = context.my_index else {
        return false;
    };
    let n = context.n();
    (1..=context.m()).any(|i| (requester as usize + i) % n == me as usize)
}

/// Handles RecoveryMessage message.
pub(super) async fn on_recovery_message(
    env: &Environment,
    context: ConsensusContext,
    known_hashes: &mut HashSet<UInt256>,
    payload: &Arc<ConsensusPayload>,
) -> ConsensusResult<Transition> {
    let ConsensusMessage::RecoveryMessage(message) = &payload.message else {
        return Ok(Transition::stay(context));
    };
    debug!(
        block_index = context.block_index,
        view = context.view_number,
        validator = payload.validator_index,
        recovery_view = message.view_number,
        change_views = message.change_view_messages.len(),
        preparations = message.preparation_messages.len(),
        commits = message.commit_messages.len(),
        "Received RecoveryMessage"
    );

    let validators = context.validators.clone();
    let mut transition = Transition::stay(context);

    if message.view_number > transition.context.view_number {
        if transition.context.commit_sent() {
            return Ok(transition);
        }
        for replayed in message.change_view_payloads(payload, &validators) {
            transition = replay(env, transition, known_hashes, replayed).await?;
        }
    }

    let context = &transition.context;
    if message.view_number == context.view_number
        && !context.not_accepting_payloads_due_to_view_changing()
        && !context.commit_sent()
    {
        let primary_index = context.primary_index;
        let request = message.prepare_request_payload(payload, &validators, primary_index);
        let request_hash = request.as_ref().map(ConsensusPayload::hash).transpose()?;

        if !transition.context.request_sent_or_received() {
            if let Some(request) = request {
                transition = replay(env, transition, known_hashes, request).await?;
            }
        }

        let recorded_request = transition
            .context
            .preparation_payloads
            .get(primary_index as usize)
            .and_then(Option::as_ref)
            .map(|p| p.hash())
            .transpose()?;
        let preparation_hash = message
            .preparation_hash
            .or(recorded_request)
            .or(request_hash);
        if let Some(preparation_hash) = preparation_hash {
            for response in message.prepare_response_payloads(
                payload,
                &validators,
                primary_index,
                preparation_hash,
            ) {
                transition = replay(env, transition, known_hashes, response).await?;
            }
        }
    }

    if message.view_number <= transition.context.view_number {
        for commit in message.commit_payloads(payload, &validators) {
            transition = replay(env, transition, known_hashes, commit).await?;
        }
    }

    Ok(transition)
}

async fn replay(
    env: &Environment,
    transition: Transition,
    known_hashes: &mut HashSet<UInt256>,
    payload: ConsensusPayload,
) -> ConsensusResult<Transition> {
    let earlier = transition.timer_ms;
    Ok(
        handle_consensus_payload(env, transition.context, known_hashes, Arc::new(payload))
            .await?
            .inherit(earlier),
    )
}
