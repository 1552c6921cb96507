//! Consensus context: the protocol state of one (height, view) attempt.
//!
//! A context is a value. Transitions consume it and return the next one,
//! and the driver installs the result wholesale; nothing else holds a
//! mutable reference to it.

mod phase;
mod reset;

pub use phase::{ConsensusPhase, Proposal};

use crate::error::{ConsensusError, ConsensusResult};
use crate::ledger::{
    merkle_root, Block, Header, Transaction, TransactionVerificationContext, Witness,
    HEADER_FIXED_SIZE, LENGTH_PREFIX_SIZE,
};
use crate::messages::{ChangeView, ConsensusPayload};
use crate::ViewNumber;
use neo_crypto::{script, PublicKey};
use neo_primitives::{UInt160, UInt256};
use std::collections::HashMap;
use std::sync::Arc;

/// One payload per validator, indexed by validator slot.
pub type PayloadSlots = Vec<Option<Arc<ConsensusPayload>>>;

/// Byzantine quorum for `n` validators: `n - (n - 1) / 3`.
#[inline]
pub fn quorum(n: usize) -> usize {
    n - n.saturating_sub(1) / 3
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsensusContext {
    pub block_index: u32,
    pub view_number: ViewNumber,
    /// `None` when this node is not in the validator set (watch-only).
    pub my_index: Option<u8>,
    pub primary_index: u8,
    pub version: u32,
    pub prev_hash: UInt256,
    pub prev_timestamp: u64,
    pub validators: Vec<PublicKey>,
    pub next_consensus: UInt160,
    /// Encoded size of the multi-signature block witness.
    pub witness_size: usize,
    pub block_received_time: u64,
    pub preparation_payloads: PayloadSlots,
    pub commit_payloads: PayloadSlots,
    pub change_view_payloads: PayloadSlots,
    pub last_change_view_payloads: PayloadSlots,
    pub last_seen_message: HashMap<PublicKey, u32>,
    pub verification_context: TransactionVerificationContext,
    pub phase: ConsensusPhase,
}

impl ConsensusContext {
    #[inline]
    pub fn n(&self) -> usize {
        self.validators.len()
    }

    #[inline]
    pub fn m(&self) -> usize {
        quorum(self.n())
    }

    #[inline]
    pub fn f(&self) -> usize {
        self.n() - self.m()
    }

    /// `(block_index - view) mod n`, normalized into `[0, n)`.
    pub fn primary_index_for(&self, view_number: ViewNumber) -> u8 {
        let n = self.n() as i64;
        if n == 0 {
            return 0;
        }
        (i64::from(self.block_index) - i64::from(view_number)).rem_euclid(n) as u8
    }

    #[inline]
    pub fn watch_only(&self) -> bool {
        self.my_index.is_none()
    }

    #[inline]
    pub fn is_primary(&self) -> bool {
        self.my_index == Some(self.primary_index)
    }

    #[inline]
    pub fn is_backup(&self) -> bool {
        self.my_index.is_some() && !self.is_primary()
    }

    #[inline]
    pub fn proposal(&self) -> Option<&Proposal> {
        self.phase.proposal()
    }

    #[inline]
    pub fn request_sent_or_received(&self) -> bool {
        self.proposal().is_some()
    }

    pub fn transaction_hashes(&self) -> Option<&[UInt256]> {
        self.proposal().map(|p| p.transaction_hashes.as_slice())
    }

    /// A proposal exists and every declared transaction has a body.
    pub fn transactions_resolved(&self) -> bool {
        self.proposal().is_some_and(Proposal::is_complete)
    }

    pub fn commit_sent(&self) -> bool {
        self.my_slot(&self.commit_payloads).is_some()
    }

    pub fn block_sent(&self) -> bool {
        matches!(self.phase, ConsensusPhase::BlockSent { .. })
    }

    pub fn my_change_view(&self) -> Option<&ChangeView> {
        self.my_slot(&self.change_view_payloads)
            .and_then(|p| p.change_view())
    }

    /// Our own ChangeView already targets a later view.
    pub fn view_changing(&self) -> bool {
        self.my_change_view()
            .is_some_and(|m| m.new_view_number() > self.view_number)
    }

    pub fn count_committed(&self) -> usize {
        self.commit_payloads.iter().flatten().count()
    }

    /// Validators not heard from since before the previous height.
    pub fn count_failed(&self) -> usize {
        let threshold = self.block_index.saturating_sub(1);
        self.validators
            .iter()
            .filter(|v| {
                self.last_seen_message
                    .get(v)
                    .map_or(true, |seen| *seen < threshold)
            })
            .count()
    }

    pub fn more_than_f_nodes_committed_or_lost(&self) -> bool {
        self.count_committed() + self.count_failed() > self.f()
    }

    pub fn not_accepting_payloads_due_to_view_changing(&self) -> bool {
        self.view_changing() && !self.more_than_f_nodes_committed_or_lost()
    }

    pub fn validator(&self, index: u8) -> Option<&PublicKey> {
        self.validators.get(index as usize)
    }

    fn my_slot<'a>(&self, slots: &'a PayloadSlots) -> Option<&'a Arc<ConsensusPayload>> {
        let index = self.my_index? as usize;
        slots.get(index)?.as_ref()
    }

    /// Header of the proposed block, once a proposal is known.
    pub fn ensure_header(&self) -> Option<Header> {
        let proposal = self.proposal()?;
        Some(Header {
            version: self.version,
            prev_hash: self.prev_hash,
            merkle_root: merkle_root(&proposal.transaction_hashes),
            timestamp: proposal.timestamp,
            nonce: proposal.nonce,
            index: self.block_index,
            primary_index: self.primary_index,
            next_consensus: self.next_consensus,
            witness: Witness::default(),
        })
    }

    pub fn expected_block_size_without_transactions(&self) -> usize {
        HEADER_FIXED_SIZE + self.witness_size + LENGTH_PREFIX_SIZE
    }

    pub fn expected_block_size(&self) -> ConsensusResult<usize> {
        let mut size = self.expected_block_size_without_transactions();
        if let Some(proposal) = self.proposal() {
            for tx in proposal.transactions.values() {
                size += tx.size()?;
            }
        }
        Ok(size)
    }

    pub fn expected_block_system_fee(&self) -> i64 {
        self.proposal()
            .map(|p| p.transactions.values().map(|tx| tx.system_fee).sum())
            .unwrap_or_default()
    }

    /// Assembles the finished block from the `m` lowest-index commits of this view.
    pub fn create_block(&self) -> ConsensusResult<Block> {
        let mut header = self
            .ensure_header()
            .ok_or_else(|| ConsensusError::invariant("create_block without a proposal"))?;
        let transactions = self
            .proposal()
            .and_then(Proposal::ordered_transactions)
            .ok_or_else(|| ConsensusError::invariant("create_block with unresolved transactions"))?;

        let m = self.m();
        let mut invocation_script = Vec::with_capacity(script::multisig_invocation_size(m));
        let mut signatures = 0;
        for payload in self.commit_payloads.iter().flatten() {
            if signatures == m {
                break;
            }
            let Some(commit) = payload.commit() else {
                continue;
            };
            if commit.view_number != self.view_number {
                continue;
            }
            script::push_signature(&mut invocation_script, &commit.signature);
            signatures += 1;
        }
        if signatures < m {
            return Err(ConsensusError::invariant(format!(
                "create_block with {signatures} of {m} commits"
            )));
        }

        header.witness = Witness {
            invocation_script,
            verification_script: script::multisig_redeem_script(m, &self.validators)?,
        };
        Ok(Block {
            header,
            transactions,
        })
    }

    fn checked_slot(&self, payload: &ConsensusPayload) -> ConsensusResult<usize> {
        let index = payload.validator_index as usize;
        if index >= self.n() {
            return Err(ConsensusError::invariant(format!(
                "validator index {index} outside of {} validators",
                self.n()
            )));
        }
        Ok(index)
    }

    pub fn with_preparation(mut self, payload: Arc<ConsensusPayload>) -> ConsensusResult<Self> {
        let index = self.checked_slot(&payload)?;
        self.preparation_payloads[index] = Some(payload);
        Ok(self)
    }

    pub fn with_commit(mut self, payload: Arc<ConsensusPayload>) -> ConsensusResult<Self> {
        let index = self.checked_slot(&payload)?;
        self.commit_payloads[index] = Some(payload);
        Ok(self)
    }

    pub fn with_change_view(mut self, payload: Arc<ConsensusPayload>) -> ConsensusResult<Self> {
        let index = self.checked_slot(&payload)?;
        self.change_view_payloads[index] = Some(payload);
        Ok(self)
    }

    /// Drops preparation payloads rejected by `keep`.
    pub fn retain_preparations<F>(mut self, mut keep: F) -> Self
    where
        F: FnMut(&ConsensusPayload) -> bool,
    {
        for slot in &mut self.preparation_payloads {
            if slot.as_deref().is_some_and(|p| !keep(p)) {
                *slot = None;
            }
        }
        self
    }

    /// Drops commit payloads rejected by `keep`.
    pub fn retain_commits<F>(mut self, mut keep: F) -> Self
    where
        F: FnMut(usize, &ConsensusPayload) -> bool,
    {
        for (index, slot) in self.commit_payloads.iter_mut().enumerate() {
            if slot.as_deref().is_some_and(|p| !keep(index, p)) {
                *slot = None;
            }
        }
        self
    }

    pub fn with_last_seen(mut self, validator_index: u8, block_index: u32) -> Self {
        if let Some(validator) = self.validators.get(validator_index as usize).copied() {
            let seen = self.last_seen_message.entry(validator).or_default();
            *seen = (*seen).max(block_index);
        }
        self
    }

    pub fn with_block_received_time(mut self, time: u64) -> Self {
        self.block_received_time = time;
        self
    }

    pub fn with_proposal(mut self, proposal: Proposal) -> ConsensusResult<Self> {
        let is_primary = self.is_primary();
        self.phase = std::mem::take(&mut self.phase).propose(proposal, is_primary)?;
        self.verification_context = TransactionVerificationContext::new();
        Ok(self)
    }

    pub fn with_transaction(mut self, tx: Transaction) -> ConsensusResult<Self> {
        let hash = tx.hash()?;
        self.verification_context.add_transaction(&tx);
        self.phase = std::mem::take(&mut self.phase).add_transaction(hash, tx)?;
        Ok(self)
    }

    pub fn with_signature_sent(mut self) -> ConsensusResult<Self> {
        self.phase = std::mem::take(&mut self.phase).sign()?;
        Ok(self)
    }

    pub fn with_block_sent(mut self, block_hash: UInt256) -> ConsensusResult<Self> {
        self.phase = std::mem::take(&mut self.phase).finish(block_hash)?;
        Ok(self)
    }

    /// Moves to `view_number` within the same height.
    ///
    /// Keeps change views that still target at least the new view as the
    /// `last_change_view_payloads`, forgets preparations and the proposal, and
    /// keeps commits.
    pub fn with_view(mut self, view_number: ViewNumber) -> Self {
        self.last_change_view_payloads = self
            .change_view_payloads
            .iter()
            .map(|slot| {
                slot.as_ref()
                    .filter(|p| {
                        p.change_view()
                            .is_some_and(|m| m.new_view_number() >= view_number)
                    })
                    .cloned()
            })
            .collect();
        self.view_number = view_number;
        self.primary_index = self.primary_index_for(view_number);
        self.preparation_payloads = vec![None; self.n()];
        self.phase = ConsensusPhase::Initial;
        self.verification_context = TransactionVerificationContext::new();
        if let Some(me) = self.my_index.and_then(|i| self.validator(i).copied()) {
            self.last_seen_message.insert(me, self.block_index);
        }
        self
    }
}

#[cfg(test)]
mod tests;
