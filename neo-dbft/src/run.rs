//! Timer-driven progress.

use tracing::{debug, info};

use crate::actions::{request_change_view, send_prepare_request, send_recovery_message};
use crate::context::ConsensusContext;
use crate::env::{Environment, Transition};
use crate::error::ConsensusResult;
use crate::timer::{millis_on_view, HView};
use crate::ChangeViewReason;

/// Handles a timer event. `armed_for` names the (height, view) the timer was
/// armed in; a mismatch means the timer is stale. `None` forces a round.
pub async fn run_consensus(
    env: &Environment,
    context: ConsensusContext,
    armed_for: Option<HView>,
) -> ConsensusResult<Transition> {
    if let Some(hview) = armed_for {
        if hview.height != context.block_index || hview.view_number != context.view_number {
            debug!(
                block_index = context.block_index,
                view = context.view_number,
                timer_height = hview.height,
                timer_view = hview.view_number,
                "Ignoring stale timer"
            );
            return Ok(Transition::stay(context));
        }
    }

    let per_block = env.settings().milliseconds_per_block;

    if env.private_net {
        if context.is_primary() && !context.watch_only() && !context.request_sent_or_received() {
            let transition = send_prepare_request(env, context).await?;
            return Ok(transition.inherit(Some(per_block)));
        }
    }

    if context.watch_only() || context.block_sent() {
        return Ok(Transition::stay(context));
    }

    if context.is_primary() && !context.request_sent_or_received() {
        let view = context.view_number;
        let transition = send_prepare_request(env, context).await?;
        return Ok(transition.inherit(Some(millis_on_view(view, per_block))));
    }

    if context.commit_sent() {
        info!(
            block_index = context.block_index,
            view = context.view_number,
            "Timer fired after commit, re-broadcasting recovery"
        );
        send_recovery_message(env, &context).await?;
        return Ok(Transition::with_timer(context, per_block << 1));
    }

    let reason = if context.request_sent_or_received() && !context.transactions_resolved() {
        ChangeViewReason::TxNotFound
    } else {
        ChangeViewReason::Timeout
    };
    request_change_view(env, context, reason).await
}
