use std::collections::HashSet;
use std::sync::Arc;

use neo_primitives::UInt256;
use tracing::debug;

use super::recovery::answer_recovery;
use crate::actions::check_expected_view;
use crate::context::ConsensusContext;
use crate::env::{Environment, Transition};
use crate::error::ConsensusResult;
use crate::messages::ConsensusPayload;

/// Handles ChangeView message.
pub(super) async fn on_change_view(
    env: &Environment,
    context: ConsensusContext,
    known_hashes: &mut HashSet<UInt256>,
    payload: &Arc<ConsensusPayload>,
) -> ConsensusResult<Transition> {
    let Some(message) = payload.change_view() else {
        return Ok(Transition::stay(context));
    };
    let new_view = message.new_view_number();
    debug!(
        block_index = context.block_index,
        view = context.view_number,
        validator = payload.validator_index,
        new_view,
        reason = %message.reason,
        "Received ChangeView"
    );

    // A peer still asking for a view we already reached is lagging behind.
    if new_view <= context.view_number && known_hashes.insert(payload.hash()?) {
        answer_recovery(env, &context, payload.validator_index).await?;
    }
    if context.commit_sent() {
        return Ok(Transition::stay(context));
    }

    let recorded = context
        .change_view_payloads
        .get(payload.validator_index as usize)
        .and_then(Option::as_ref)
        .and_then(|p| p.change_view())
        .map_or(0, |m| m.new_view_number());
    if new_view <= recorded {
        return Ok(Transition::stay(context));
    }

    let context = context.with_change_view(payload.clone())?;
    check_expected_view(env, context, new_view).await
}
