use super::{quorum, ConsensusContext, ConsensusPhase};
use crate::error::{ConsensusError, ConsensusResult};
use crate::ledger::{TransactionVerificationContext, Witness};
use crate::node::Blockchain;
use crate::ViewNumber;
use neo_crypto::{script, PublicKey};
use std::collections::HashMap;
use tracing::debug;

impl ConsensusContext {
    /// The single authoritative transition between attempts.
    ///
    /// View 0 starts a new height: the validator set, next-consensus address
    /// and previous header are re-read from the chain and every payload slot
    /// is cleared. A later view only rotates the primary (see [`Self::with_view`]).
    pub async fn reset(
        self,
        blockchain: &dyn Blockchain,
        public_key: &PublicKey,
        view_number: ViewNumber,
    ) -> ConsensusResult<Self> {
        if view_number > 0 {
            return Ok(self.with_view(view_number));
        }

        let current_index = blockchain.current_index().await;
        let prev_hash = blockchain.current_hash().await;
        let prev_header = blockchain.header(&prev_hash).await.ok_or_else(|| {
            ConsensusError::invariant(format!(
                "header {prev_hash} of height {current_index} is missing"
            ))
        })?;
        // The chain may report more candidates than consensus seats.
        let validators_count = blockchain.settings().validators_count;
        let mut next_validators = blockchain.next_block_validators().await?;
        next_validators.truncate(validators_count);
        if next_validators.is_empty() || next_validators.len() > u8::MAX as usize {
            return Err(ConsensusError::invariant(format!(
                "unusable validator set of {} keys",
                next_validators.len()
            )));
        }

        let block_index = current_index + 1;
        let next_consensus = if blockchain.should_refresh_committee(block_index) {
            let mut elected = blockchain.validators().await?;
            elected.truncate(validators_count);
            script::script_hash(&script::multisig_redeem_script(
                quorum(elected.len()),
                &elected,
            )?)
        } else {
            script::script_hash(&script::multisig_redeem_script(
                quorum(next_validators.len()),
                &next_validators,
            )?)
        };

        let n = next_validators.len();
        let mut witness_size = self.witness_size;
        if witness_size == 0 || self.validators.len() != n {
            let m = quorum(n);
            witness_size = Witness {
                invocation_script: vec![0; script::multisig_invocation_size(m)],
                verification_script: script::multisig_redeem_script(m, &next_validators)?,
            }
            .size();
        }

        let mut last_seen_message = self.last_seen_message;
        if self.validators != next_validators || last_seen_message.is_empty() {
            debug!(block_index, validators = n, "Re-seeding last seen messages");
            last_seen_message = next_validators
                .iter()
                .map(|v| {
                    let seen = last_seen_message.get(v).copied().unwrap_or(current_index);
                    (*v, seen)
                })
                .collect::<HashMap<_, _>>();
        }

        let my_index = next_validators
            .iter()
            .position(|v| v == public_key)
            .map(|i| i as u8);

        let mut context = Self {
            block_index,
            view_number: 0,
            my_index,
            primary_index: 0,
            version: 0,
            prev_hash,
            prev_timestamp: prev_header.timestamp,
            validators: next_validators,
            next_consensus,
            witness_size,
            block_received_time: self.block_received_time,
            preparation_payloads: vec![None; n],
            commit_payloads: vec![None; n],
            change_view_payloads: vec![None; n],
            last_change_view_payloads: vec![None; n],
            last_seen_message,
            verification_context: TransactionVerificationContext::new(),
            phase: ConsensusPhase::Initial,
        };
        context.primary_index = context.primary_index_for(0);
        if let Some(i) = my_index {
            let me = context.validators[i as usize];
            context.last_seen_message.insert(me, block_index);
        }
        Ok(context)
    }
}
