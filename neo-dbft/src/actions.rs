//! View lifecycle: (re)initialization, view changes, recovery requests and
//! transaction intake.

use tracing::{debug, info, warn};

use crate::check::{check_prepare_response, check_preparations};
use crate::context::ConsensusContext;
use crate::env::{Environment, Transition};
use crate::error::ConsensusResult;
use crate::ledger::Transaction;
use crate::make::{
    make_change_view, make_prepare_request, make_recovery_message, make_recovery_request,
};
use crate::timer::{millis_on_view, millis_until_proposal};
use crate::{ChangeViewReason, ViewNumber};

/// Builds the first context of a freshly started node.
pub async fn initialize_new_consensus(env: &Environment) -> ConsensusResult<Transition> {
    initialize_consensus(env, ConsensusContext::default(), 0).await
}

/// Resets `context` to `view_number` and arms the view timer.
pub async fn initialize_consensus(
    env: &Environment,
    context: ConsensusContext,
    view_number: ViewNumber,
) -> ConsensusResult<Transition> {
    let context = context
        .reset(env.blockchain(), &env.keypair.public_key, view_number)
        .await?;

    if context.watch_only() {
        info!(
            block_index = context.block_index,
            view = view_number,
            "Initialized watch-only consensus"
        );
        return Ok(Transition::stay(context));
    }

    let per_block = env.settings().milliseconds_per_block;
    let timer_ms = if context.is_primary() {
        millis_until_proposal(per_block, env.now(), context.block_received_time)
    } else {
        millis_on_view(view_number, per_block)
    };
    info!(
        block_index = context.block_index,
        view = view_number,
        index = context.my_index,
        primary = context.primary_index,
        role = if context.is_primary() { "Primary" } else { "Backup" },
        timer_ms,
        "Initialized consensus"
    );
    Ok(Transition::with_timer(context, timer_ms))
}

/// Asks the other validators to move past the current view.
pub async fn request_change_view(
    env: &Environment,
    context: ConsensusContext,
    reason: ChangeViewReason,
) -> ConsensusResult<Transition> {
    if context.watch_only() {
        return Ok(Transition::stay(context));
    }

    let expected_view = context.view_number.saturating_add(1);
    let timer_ms = millis_on_view(expected_view, env.settings().milliseconds_per_block);

    if context.more_than_f_nodes_committed_or_lost() {
        info!(
            block_index = context.block_index,
            view = context.view_number,
            committed = context.count_committed(),
            failed = context.count_failed(),
            "Too many nodes committed or lost, requesting recovery instead of ChangeView"
        );
        request_recovery(env, &context).await?;
        return Ok(Transition::with_timer(context, timer_ms));
    }

    let (context, payload) = make_change_view(env, context, reason, expected_view)?;
    info!(
        block_index = context.block_index,
        view = context.view_number,
        new_view = expected_view,
        %reason,
        "Sending ChangeView"
    );
    env.node.relay_consensus_payload((*payload).clone()).await;

    Ok(check_expected_view(env, context, expected_view)
        .await?
        .inherit(Some(timer_ms)))
}

/// Moves to `view_number` once `M` validators ask for it or something later.
pub async fn check_expected_view(
    env: &Environment,
    context: ConsensusContext,
    view_number: ViewNumber,
) -> ConsensusResult<Transition> {
    if context.view_number >= view_number {
        return Ok(Transition::stay(context));
    }
    let agreeing = context
        .change_view_payloads
        .iter()
        .flatten()
        .filter(|p| {
            p.change_view()
                .is_some_and(|m| m.new_view_number() >= view_number)
        })
        .count();
    if agreeing < context.m() {
        return Ok(Transition::stay(context));
    }

    let mut context = context;
    if !context.watch_only()
        && context
            .my_change_view()
            .map_or(true, |m| m.new_view_number() < view_number)
    {
        let (next, payload) =
            make_change_view(env, context, ChangeViewReason::ChangeAgreement, view_number)?;
        env.node.relay_consensus_payload((*payload).clone()).await;
        context = next;
    }

    info!(
        block_index = context.block_index,
        from = context.view_number,
        to = view_number,
        agreeing,
        "Changing view"
    );
    initialize_consensus(env, context, view_number).await
}

pub async fn request_recovery(env: &Environment, context: &ConsensusContext) -> ConsensusResult<()> {
    let payload = make_recovery_request(env, context)?;
    env.node.relay_consensus_payload(payload).await;
    Ok(())
}

/// Broadcasts everything this node knows about the current height.
pub async fn send_recovery_message(
    env: &Environment,
    context: &ConsensusContext,
) -> ConsensusResult<()> {
    if context.watch_only() {
        return Ok(());
    }
    let payload = make_recovery_message(env, context)?;
    debug!(
        block_index = context.block_index,
        view = context.view_number,
        "Sending RecoveryMessage"
    );
    env.node.relay_consensus_payload(payload).await;
    Ok(())
}

/// Primary only: propose a block for the current view.
pub async fn send_prepare_request(
    env: &Environment,
    context: ConsensusContext,
) -> ConsensusResult<Transition> {
    let (context, payload) = make_prepare_request(env, context).await?;
    info!(
        block_index = context.block_index,
        view = context.view_number,
        transactions = context.transaction_hashes().map_or(0, <[_]>::len),
        "Sending PrepareRequest"
    );
    env.node.relay_consensus_payload((*payload).clone()).await;

    if context.n() == 1 {
        return check_preparations(env, context).await;
    }
    Ok(Transition::stay(context))
}

/// Records a declared transaction of the current proposal.
pub async fn add_transaction(
    env: &Environment,
    context: ConsensusContext,
    tx: Transaction,
    verify: bool,
) -> ConsensusResult<Transition> {
    let hash = tx.hash()?;
    if env.blockchain().transaction(&hash).await.is_some() {
        debug!(%hash, "Transaction already on chain");
        return Ok(Transition::stay(context));
    }

    if verify {
        let pending: Vec<Transaction> = context
            .proposal()
            .map(|p| p.transactions.values().cloned().collect())
            .unwrap_or_default();
        let result = env
            .blockchain()
            .verify_transaction(&tx, &pending, &context.verification_context)
            .await;
        if !result.is_success() {
            let reason = ChangeViewReason::from(result);
            warn!(
                block_index = context.block_index,
                view = context.view_number,
                %hash,
                ?result,
                %reason,
                "Proposed transaction failed verification"
            );
            return request_change_view(env, context, reason).await;
        }
    }

    let context = context.with_transaction(tx)?;
    check_prepare_response(env, context).await
}
