//! Quorum checks that move a view forward.

use tracing::{debug, info, warn};

use crate::actions::request_change_view;
use crate::context::ConsensusContext;
use crate::env::{Environment, Transition};
use crate::error::ConsensusResult;
use crate::make::{make_commit, make_prepare_response};
use crate::ChangeViewReason;

/// Once every declared transaction is known, a backup checks the proposal
/// against block policy and acknowledges it.
pub async fn check_prepare_response(
    env: &Environment,
    context: ConsensusContext,
) -> ConsensusResult<Transition> {
    if !context.transactions_resolved() {
        return Ok(Transition::stay(context));
    }
    if context.is_primary() || context.watch_only() {
        return Ok(Transition::stay(context));
    }

    let settings = env.settings();
    let block_size = context.expected_block_size()?;
    if block_size > settings.max_block_size {
        warn!(
            block_index = context.block_index,
            view = context.view_number,
            block_size,
            max_block_size = settings.max_block_size,
            "Rejecting proposal: block too large"
        );
        return request_change_view(env, context, ChangeViewReason::BlockRejectedByPolicy).await;
    }
    let system_fee = context.expected_block_system_fee();
    if system_fee > settings.max_block_system_fee {
        warn!(
            block_index = context.block_index,
            view = context.view_number,
            system_fee,
            max_block_system_fee = settings.max_block_system_fee,
            "Rejecting proposal: system fee too high"
        );
        return request_change_view(env, context, ChangeViewReason::BlockRejectedByPolicy).await;
    }

    let (context, payload) = make_prepare_response(env, context)?;
    info!(
        block_index = context.block_index,
        view = context.view_number,
        "Sending PrepareResponse"
    );
    env.node.relay_consensus_payload((*payload).clone()).await;
    check_preparations(env, context).await
}

/// With `M` preparations for a resolved proposal, commit to it.
pub async fn check_preparations(
    env: &Environment,
    context: ConsensusContext,
) -> ConsensusResult<Transition> {
    let preparations = context.preparation_payloads.iter().flatten().count();
    if preparations < context.m() || !context.transactions_resolved() || context.watch_only() {
        return Ok(Transition::stay(context));
    }
    if context.commit_sent() {
        return check_commits(env, context).await;
    }

    let (context, payload) = make_commit(env, context)?;
    info!(
        block_index = context.block_index,
        view = context.view_number,
        preparations,
        "Sending Commit"
    );
    env.node.relay_consensus_payload((*payload).clone()).await;
    check_commits(env, context).await
}

/// With `M` commits for this view, assemble and relay the block.
pub async fn check_commits(
    env: &Environment,
    context: ConsensusContext,
) -> ConsensusResult<Transition> {
    let view = context.view_number;
    let commits = context
        .commit_payloads
        .iter()
        .flatten()
        .filter(|p| p.view_number() == view)
        .count();
    if commits < context.m() || !context.transactions_resolved() || context.block_sent() {
        debug!(
            block_index = context.block_index,
            view,
            commits,
            "Waiting for commits"
        );
        return Ok(Transition::stay(context));
    }

    let block = context.create_block()?;
    let block_hash = block.hash()?;
    info!(
        block_index = context.block_index,
        view,
        hash = %block_hash,
        transactions = block.transactions.len(),
        "Sending Block"
    );
    env.node.relay_block(block).await;
    Ok(Transition::stay(context.with_block_sent(block_hash)?))
}
