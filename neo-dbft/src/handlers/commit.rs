use std::sync::Arc;

use neo_crypto::Secp256r1Verify;
use tracing::{debug, warn};

use crate::check::check_commits;
use crate::context::ConsensusContext;
use crate::env::{Environment, Transition};
use crate::error::ConsensusResult;
use crate::messages::ConsensusPayload;

/// Handles Commit message.
pub(super) async fn on_commit(
    env: &Environment,
    context: ConsensusContext,
    payload: &Arc<ConsensusPayload>,
) -> ConsensusResult<Transition> {
    let Some(commit) = payload.commit() else {
        return Ok(Transition::stay(context));
    };
    let index = payload.validator_index as usize;

    if let Some(existing) = context.commit_payloads.get(index).and_then(Option::as_ref) {
        if existing.hash()? != payload.hash()? {
            warn!(
                block_index = context.block_index,
                validator = payload.validator_index,
                "Rejected Commit: validator already committed to a different block"
            );
        }
        return Ok(Transition::stay(context));
    }

    if commit.view_number != context.view_number {
        debug!(
            block_index = context.block_index,
            view = context.view_number,
            validator = payload.validator_index,
            commit_view = commit.view_number,
            "Recording Commit from another view"
        );
        return Ok(Transition::stay(context.with_commit(payload.clone())?));
    }

    let Some(header) = context.ensure_header() else {
        // checked once the PrepareRequest arrives
        return Ok(Transition::stay(context.with_commit(payload.clone())?));
    };
    let Some(validator) = context.validator(payload.validator_index) else {
        return Ok(Transition::stay(context));
    };
    let sign_data = header.sign_data(env.network())?;
    if validator
        .secp256r1_verify(sign_data, &commit.signature)
        .is_err()
    {
        warn!(
            block_index = context.block_index,
            view = context.view_number,
            validator = payload.validator_index,
            "Rejected Commit: signature does not match proposed block"
        );
        return Ok(Transition::stay(context));
    }

    debug!(
        block_index = context.block_index,
        view = context.view_number,
        validator = payload.validator_index,
        "Received Commit"
    );
    let context = context.with_commit(payload.clone())?;
    check_commits(env, context).await
}
