//! Payload constructors.
//!
//! Each builds a message for the current context, signs it with this
//! node's key and records it in the matching slot. A slot already holding
//! our payload for the same purpose is reused instead of re-signed.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use neo_crypto::Secp256r1Sign;
use neo_primitives::UInt256;
use tracing::debug;

use crate::context::{ConsensusContext, Proposal};
use crate::env::Environment;
use crate::error::{ConsensusError, ConsensusResult};
use crate::ledger::Transaction;
use crate::messages::{
    ChangeView, ChangeViewCompact, Commit, CommitCompact, ConsensusMessage, ConsensusPayload,
    PreparationCompact, PrepareRequest, PrepareResponse, RecoveryMessage, RecoveryRequest,
};
use crate::{ChangeViewReason, ViewNumber};

pub type Made = (ConsensusContext, Arc<ConsensusPayload>);

fn my_index(context: &ConsensusContext) -> ConsensusResult<u8> {
    context
        .my_index
        .ok_or_else(|| ConsensusError::invariant("watch-only node cannot sign payloads"))
}

fn my_payload(slots: &[Option<Arc<ConsensusPayload>>], index: u8) -> Option<Arc<ConsensusPayload>> {
    slots.get(index as usize).cloned().flatten()
}

pub fn sign_payload(
    env: &Environment,
    context: &ConsensusContext,
    message: ConsensusMessage,
) -> ConsensusResult<ConsensusPayload> {
    ConsensusPayload::sign(
        context.version,
        context.prev_hash,
        context.block_index,
        my_index(context)?,
        message,
        &env.keypair,
        env.network(),
    )
}

/// ChangeView asking for `new_view_number`.
pub fn make_change_view(
    env: &Environment,
    context: ConsensusContext,
    reason: ChangeViewReason,
    new_view_number: ViewNumber,
) -> ConsensusResult<Made> {
    let index = my_index(&context)?;
    if let Some(existing) = my_payload(&context.change_view_payloads, index) {
        if existing
            .change_view()
            .is_some_and(|m| m.new_view_number() == new_view_number)
        {
            return Ok((context, existing));
        }
    }

    let message = ConsensusMessage::ChangeView(ChangeView {
        view_number: new_view_number.saturating_sub(1),
        timestamp: env.now(),
        reason,
    });
    let payload = Arc::new(sign_payload(env, &context, message)?);
    let context = context.with_change_view(payload.clone())?;
    Ok((context, payload))
}

/// Picks mempool transactions for a new proposal.
///
/// The pool is trimmed to the transaction-count cap by fee per byte, then
/// walked in arrival order, skipping transactions that would overflow the
/// block size or system fee budget.
pub fn select_transactions(
    env: &Environment,
    context: &ConsensusContext,
    mut pool: Vec<Transaction>,
) -> ConsensusResult<(Vec<UInt256>, HashMap<UInt256, Transaction>)> {
    let settings = env.settings();
    let mut sized = Vec::with_capacity(pool.len());
    for tx in pool.drain(..) {
        let size = tx.size()?;
        sized.push((tx, size));
    }

    if sized.len() > settings.max_transactions_per_block {
        let mut ranked: Vec<usize> = (0..sized.len()).collect();
        ranked.sort_by(|&a, &b| fee_density_desc(&sized[a], &sized[b]));
        ranked.truncate(settings.max_transactions_per_block);
        ranked.sort_unstable();
        let trimmed: Vec<(Transaction, usize)> = ranked
            .into_iter()
            .map(|i| std::mem::take(&mut sized[i]))
            .collect();
        sized = trimmed;
    }

    let mut block_size = context.expected_block_size_without_transactions();
    let mut system_fee = 0i64;
    let mut hashes = Vec::new();
    let mut transactions = HashMap::new();
    for (tx, size) in sized {
        if block_size + size > settings.max_block_size {
            continue;
        }
        if system_fee.saturating_add(tx.system_fee) > settings.max_block_system_fee {
            continue;
        }
        let hash = tx.hash()?;
        if transactions.contains_key(&hash) {
            continue;
        }
        block_size += size;
        system_fee += tx.system_fee;
        hashes.push(hash);
        transactions.insert(hash, tx);
    }
    Ok((hashes, transactions))
}

fn fee_density_desc(a: &(Transaction, usize), b: &(Transaction, usize)) -> Ordering {
    // a.fee / a.size vs b.fee / b.size without division
    let lhs = i128::from(a.0.network_fee) * b.1 as i128;
    let rhs = i128::from(b.0.network_fee) * a.1 as i128;
    rhs.cmp(&lhs)
}

/// The primary's proposal for this view.
pub async fn make_prepare_request(
    env: &Environment,
    context: ConsensusContext,
) -> ConsensusResult<Made> {
    let index = my_index(&context)?;
    if let Some(existing) = my_payload(&context.preparation_payloads, index) {
        if existing.prepare_request().is_some() {
            return Ok((context, existing));
        }
    }
    if !context.is_primary() {
        return Err(ConsensusError::invariant("only the primary may propose"));
    }

    let (transaction_hashes, transactions) =
        select_transactions(env, &context, env.node.mem_pool())?;
    let timestamp = env.now().max(context.prev_timestamp + 1);
    let nonce = rand::random::<u64>();
    debug!(
        block_index = context.block_index,
        view = context.view_number,
        transactions = transaction_hashes.len(),
        "Building prepare request"
    );

    let message = ConsensusMessage::PrepareRequest(PrepareRequest {
        view_number: context.view_number,
        version: context.version,
        prev_hash: context.prev_hash,
        timestamp,
        nonce,
        transaction_hashes: transaction_hashes.clone(),
    });
    let payload = Arc::new(sign_payload(env, &context, message)?);

    let mut verification = env.node.new_verification_context();
    let mut proposal = Proposal::new(timestamp, nonce, transaction_hashes);
    for tx in transactions.values() {
        verification.add_transaction(tx);
    }
    proposal.transactions = transactions;

    let mut context = context
        .with_proposal(proposal)?
        .with_preparation(payload.clone())?;
    context.verification_context = verification;
    Ok((context, payload))
}

/// A backup's acknowledgement of the primary's request.
pub fn make_prepare_response(
    env: &Environment,
    context: ConsensusContext,
) -> ConsensusResult<Made> {
    let index = my_index(&context)?;
    if let Some(existing) = my_payload(&context.preparation_payloads, index) {
        return Ok((context, existing));
    }

    let request = my_payload(&context.preparation_payloads, context.primary_index)
        .ok_or_else(|| ConsensusError::invariant("prepare response without a prepare request"))?;
    let message = ConsensusMessage::PrepareResponse(PrepareResponse {
        view_number: context.view_number,
        preparation_hash: request.hash()?,
    });
    let payload = Arc::new(sign_payload(env, &context, message)?);
    let context = context.with_preparation(payload.clone())?;
    Ok((context, payload))
}

/// Signs the proposed header. At most one commit exists per validator and height.
pub fn make_commit(env: &Environment, context: ConsensusContext) -> ConsensusResult<Made> {
    let index = my_index(&context)?;
    if let Some(existing) = my_payload(&context.commit_payloads, index) {
        let context = if context.block_sent() {
            context
        } else {
            context.with_signature_sent()?
        };
        return Ok((context, existing));
    }

    let header = context
        .ensure_header()
        .ok_or_else(|| ConsensusError::invariant("commit without a proposal"))?;
    let signature = env
        .keypair
        .private_key
        .secp256r1_sign(header.sign_data(env.network())?)?;
    let message = ConsensusMessage::Commit(Commit {
        view_number: context.view_number,
        signature: signature.to_vec(),
    });
    let payload = Arc::new(sign_payload(env, &context, message)?);
    let context = context
        .with_commit(payload.clone())?
        .with_signature_sent()?;
    Ok((context, payload))
}

/// Not recorded: recovery requests are answered, never counted.
pub fn make_recovery_request(
    env: &Environment,
    context: &ConsensusContext,
) -> ConsensusResult<ConsensusPayload> {
    sign_payload(
        env,
        context,
        ConsensusMessage::RecoveryRequest(RecoveryRequest {
            view_number: context.view_number,
            timestamp: env.now(),
        }),
    )
}

/// Snapshot of everything this node knows about the current height.
pub fn make_recovery_message(
    env: &Environment,
    context: &ConsensusContext,
) -> ConsensusResult<ConsensusPayload> {
    let change_view_messages = context
        .last_change_view_payloads
        .iter()
        .flatten()
        .filter_map(|p| ChangeViewCompact::from_payload(p))
        .take(context.m())
        .collect();

    let prepare_request_message = context
        .preparation_payloads
        .get(context.primary_index as usize)
        .and_then(Option::as_ref)
        .and_then(|p| p.prepare_request().cloned());
    let preparation_hash = if prepare_request_message.is_none() {
        most_common_preparation_hash(context)
    } else {
        None
    };

    let preparation_messages = context
        .preparation_payloads
        .iter()
        .flatten()
        .map(|p| PreparationCompact::from_payload(p))
        .collect();

    let commit_messages = if context.commit_sent() {
        context
            .commit_payloads
            .iter()
            .flatten()
            .filter_map(|p| CommitCompact::from_payload(p))
            .collect()
    } else {
        Vec::new()
    };

    sign_payload(
        env,
        context,
        ConsensusMessage::RecoveryMessage(RecoveryMessage {
            view_number: context.view_number,
            change_view_messages,
            prepare_request_message,
            preparation_hash,
            preparation_messages,
            commit_messages,
        }),
    )
}

fn most_common_preparation_hash(context: &ConsensusContext) -> Option<UInt256> {
    let mut counts: Vec<(UInt256, usize)> = Vec::new();
    for response in context
        .preparation_payloads
        .iter()
        .flatten()
        .filter_map(|p| p.prepare_response())
    {
        match counts.iter_mut().find(|(h, _)| *h == response.preparation_hash) {
            Some((_, count)) => *count += 1,
            None => counts.push((response.preparation_hash, 1)),
        }
    }
    // first seen wins ties
    counts
        .into_iter()
        .rev()
        .max_by_key(|(_, count)| *count)
        .map(|(hash, _)| hash)
}
