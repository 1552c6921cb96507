use std::collections::HashSet;
use std::sync::Arc;

use neo_crypto::Secp256r1Verify;
use tracing::{debug, info, warn};

use crate::actions::add_transaction;
use crate::check::{check_prepare_response, check_preparations};
use crate::context::{ConsensusContext, Proposal};
use crate::env::{Environment, Transition};
use crate::error::ConsensusResult;
use crate::messages::ConsensusPayload;

/// How far ahead of local time a proposal timestamp may be.
pub const MAX_TIMESTAMP_DRIFT_MS: u64 = 10 * 60 * 1000;

/// Handles PrepareRequest message.
pub(super) async fn on_prepare_request(
    env: &Environment,
    context: ConsensusContext,
    payload: &Arc<ConsensusPayload>,
) -> ConsensusResult<Transition> {
    let Some(message) = payload.prepare_request() else {
        return Ok(Transition::stay(context));
    };
    if context.request_sent_or_received() || context.not_accepting_payloads_due_to_view_changing()
    {
        return Ok(Transition::stay(context));
    }
    if payload.validator_index != context.primary_index {
        debug!(
            block_index = context.block_index,
            view = context.view_number,
            validator = payload.validator_index,
            primary = context.primary_index,
            "Rejected PrepareRequest: sender is not primary"
        );
        return Ok(Transition::stay(context));
    }
    if message.version != context.version || message.prev_hash != context.prev_hash {
        return Ok(Transition::stay(context));
    }

    let settings = env.settings();
    if message.transaction_hashes.len() > settings.max_transactions_per_block {
        warn!(
            block_index = context.block_index,
            transactions = message.transaction_hashes.len(),
            "Rejected PrepareRequest: too many transactions"
        );
        return Ok(Transition::stay(context));
    }
    let now = env.now();
    if message.timestamp <= context.prev_timestamp
        || message.timestamp > now.saturating_add(MAX_TIMESTAMP_DRIFT_MS)
    {
        warn!(
            block_index = context.block_index,
            timestamp = message.timestamp,
            prev_timestamp = context.prev_timestamp,
            now,
            "Rejected PrepareRequest: timestamp out of range"
        );
        return Ok(Transition::stay(context));
    }
    let mut distinct = HashSet::with_capacity(message.transaction_hashes.len());
    if !message.transaction_hashes.iter().all(|h| distinct.insert(*h)) {
        warn!(block_index = context.block_index, "Rejected PrepareRequest: duplicate transactions");
        return Ok(Transition::stay(context));
    }
    for hash in &message.transaction_hashes {
        if env.blockchain().transaction(hash).await.is_some() {
            warn!(
                block_index = context.block_index,
                %hash,
                "Rejected PrepareRequest: transaction already on chain"
            );
            return Ok(Transition::stay(context));
        }
    }

    info!(
        block_index = context.block_index,
        view = context.view_number,
        primary = payload.validator_index,
        transactions = message.transaction_hashes.len(),
        "Received PrepareRequest"
    );

    let request_hash = payload.hash()?;
    let proposal = Proposal::new(
        message.timestamp,
        message.nonce,
        message.transaction_hashes.clone(),
    );
    let mut context = context
        .with_proposal(proposal)?
        .retain_preparations(|p| {
            p.prepare_response()
                .map_or(true, |r| r.preparation_hash == request_hash)
        })
        .with_preparation(payload.clone())?;
    context.verification_context = env.node.new_verification_context();

    if let Some(header) = context.ensure_header() {
        let sign_data = header.sign_data(env.network())?;
        let view = context.view_number;
        let validators = context.validators.clone();
        context = context.retain_commits(|index, p| {
            p.commit().is_some_and(|c| {
                c.view_number != view
                    || validators
                        .get(index)
                        .is_some_and(|v| v.secp256r1_verify(&sign_data, &c.signature).is_ok())
            })
        });
    }

    if message.transaction_hashes.is_empty() {
        return check_prepare_response(env, context).await;
    }

    let mut transition = Transition::stay(context);
    for hash in &message.transaction_hashes {
        let Some(tx) = env.node.mem_pool_transaction(hash) else {
            continue;
        };
        let earlier = transition.timer_ms;
        transition = add_transaction(env, transition.context, tx, true)
            .await?
            .inherit(earlier);
        let resolved = transition
            .context
            .proposal()
            .is_some_and(|p| p.transactions.contains_key(hash));
        if !resolved {
            return Ok(transition);
        }
    }

    if let Some(missing) = transition.context.proposal().map(Proposal::missing) {
        if !missing.is_empty() {
            debug!(
                block_index = transition.context.block_index,
                missing = missing.len(),
                "Waiting for proposed transactions"
            );
        }
    }
    Ok(transition)
}

/// Handles PrepareResponse message.
pub(super) async fn on_prepare_response(
    env: &Environment,
    context: ConsensusContext,
    payload: &Arc<ConsensusPayload>,
) -> ConsensusResult<Transition> {
    let Some(message) = payload.prepare_response() else {
        return Ok(Transition::stay(context));
    };
    let recorded = context
        .preparation_payloads
        .get(payload.validator_index as usize)
        .is_some_and(Option::is_some);
    if recorded || context.not_accepting_payloads_due_to_view_changing() {
        return Ok(Transition::stay(context));
    }
    if let Some(request) = context
        .preparation_payloads
        .get(context.primary_index as usize)
        .and_then(Option::as_ref)
    {
        if message.preparation_hash != request.hash()? {
            debug!(
                block_index = context.block_index,
                validator = payload.validator_index,
                "Rejected PrepareResponse: preparation hash mismatch"
            );
            return Ok(Transition::stay(context));
        }
    }

    debug!(
        block_index = context.block_index,
        view = context.view_number,
        validator = payload.validator_index,
        "Received PrepareResponse"
    );
    let context = context.with_preparation(payload.clone())?;
    if context.watch_only() || context.commit_sent() {
        return Ok(Transition::stay(context));
    }
    if context.request_sent_or_received() {
        return check_preparations(env, context).await;
    }
    Ok(Transition::stay(context))
}
