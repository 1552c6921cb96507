use std::collections::HashSet;

use neo_primitives::UInt256;
use tracing::{debug, info};

use crate::actions::{add_transaction, initialize_consensus};
use crate::context::ConsensusContext;
use crate::env::{Environment, Transition};
use crate::error::ConsensusResult;
use crate::ledger::Transaction;

/// A transaction arrived from the network or the mempool.
pub async fn handle_transaction_received(
    env: &Environment,
    context: ConsensusContext,
    tx: Transaction,
) -> ConsensusResult<Transition> {
    if !context.request_sent_or_received() || !context.is_backup() || context.commit_sent() {
        return Ok(Transition::stay(context));
    }
    let hash = tx.hash()?;
    let wanted = context
        .proposal()
        .is_some_and(|p| p.is_declared(&hash) && !p.transactions.contains_key(&hash));
    if !wanted {
        return Ok(Transition::stay(context));
    }
    debug!(
        block_index = context.block_index,
        view = context.view_number,
        %hash,
        "Received proposed transaction"
    );
    add_transaction(env, context, tx, true).await
}

/// A block was persisted: start over at the next height.
pub async fn handle_persist_block(
    env: &Environment,
    context: ConsensusContext,
    known_hashes: &mut HashSet<UInt256>,
) -> ConsensusResult<Transition> {
    let context = context.with_block_received_time(env.now());
    known_hashes.clear();
    env.node.sync_mem_pool().await;
    info!(
        block_index = context.block_index,
        view = context.view_number,
        "Block persisted, starting next round"
    );
    initialize_consensus(env, context, 0).await
}
