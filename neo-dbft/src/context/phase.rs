//! Protocol phase of one (height, view) attempt.

use crate::error::{ConsensusError, ConsensusResult};
use crate::ledger::Transaction;
use neo_primitives::UInt256;
use std::collections::HashMap;

/// The block proposed for this view, as declared by the primary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub timestamp: u64,
    pub nonce: u64,
    pub transaction_hashes: Vec<UInt256>,
    /// Resolved bodies; keys are always a subset of `transaction_hashes`.
    pub transactions: HashMap<UInt256, Transaction>,
}

impl Proposal {
    pub fn new(timestamp: u64, nonce: u64, transaction_hashes: Vec<UInt256>) -> Self {
        Self {
            timestamp,
            nonce,
            transaction_hashes,
            transactions: HashMap::new(),
        }
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.transactions.len() == self.transaction_hashes.len()
    }

    pub fn is_declared(&self, hash: &UInt256) -> bool {
        self.transaction_hashes.contains(hash)
    }

    pub fn missing(&self) -> Vec<UInt256> {
        self.transaction_hashes
            .iter()
            .filter(|hash| !self.transactions.contains_key(hash))
            .copied()
            .collect()
    }

    /// Bodies in declared order; `None` until every hash is resolved.
    pub fn ordered_transactions(&self) -> Option<Vec<Transaction>> {
        self.transaction_hashes
            .iter()
            .map(|hash| self.transactions.get(hash).cloned())
            .collect()
    }

    fn insert(&mut self, hash: UInt256, tx: Transaction) -> ConsensusResult<()> {
        if !self.is_declared(&hash) {
            return Err(ConsensusError::invariant(format!(
                "transaction {hash} is not part of the proposal"
            )));
        }
        self.transactions.insert(hash, tx);
        Ok(())
    }
}

/// Each variant carries only what is valid in that phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConsensusPhase {
    #[default]
    Initial,
    /// This node is primary and broadcast its PrepareRequest.
    RequestSent(Proposal),
    /// This node is a backup and accepted the primary's PrepareRequest.
    RequestReceived(Proposal),
    /// This node broadcast its Commit.
    SignatureSent(Proposal),
    /// The finished block was relayed.
    BlockSent {
        proposal: Proposal,
        block_hash: UInt256,
    },
}

impl ConsensusPhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initial => "Initial",
            Self::RequestSent(_) => "RequestSent",
            Self::RequestReceived(_) => "RequestReceived",
            Self::SignatureSent(_) => "SignatureSent",
            Self::BlockSent { .. } => "BlockSent",
        }
    }

    pub fn proposal(&self) -> Option<&Proposal> {
        match self {
            Self::Initial => None,
            Self::RequestSent(p) | Self::RequestReceived(p) | Self::SignatureSent(p) => Some(p),
            Self::BlockSent { proposal, .. } => Some(proposal),
        }
    }

    /// Enters the request phase for a fresh proposal.
    pub fn propose(self, proposal: Proposal, is_primary: bool) -> ConsensusResult<Self> {
        match self {
            Self::Initial if is_primary => Ok(Self::RequestSent(proposal)),
            Self::Initial => Ok(Self::RequestReceived(proposal)),
            other => Err(ConsensusError::invariant(format!(
                "cannot accept a proposal in phase {}",
                other.name()
            ))),
        }
    }

    pub fn add_transaction(self, hash: UInt256, tx: Transaction) -> ConsensusResult<Self> {
        match self {
            Self::RequestSent(mut p) => {
                p.insert(hash, tx)?;
                Ok(Self::RequestSent(p))
            }
            Self::RequestReceived(mut p) => {
                p.insert(hash, tx)?;
                Ok(Self::RequestReceived(p))
            }
            other => Err(ConsensusError::invariant(format!(
                "cannot add transactions in phase {}",
                other.name()
            ))),
        }
    }

    /// Moves to `SignatureSent`; a no-op when already there.
    pub fn sign(self) -> ConsensusResult<Self> {
        match self {
            Self::RequestSent(p) | Self::RequestReceived(p) | Self::SignatureSent(p) => {
                Ok(Self::SignatureSent(p))
            }
            other => Err(ConsensusError::invariant(format!(
                "cannot commit in phase {}",
                other.name()
            ))),
        }
    }

    pub fn finish(self, block_hash: UInt256) -> ConsensusResult<Self> {
        match self {
            Self::RequestSent(proposal)
            | Self::RequestReceived(proposal)
            | Self::SignatureSent(proposal) => Ok(Self::BlockSent {
                proposal,
                block_hash,
            }),
            other => Err(ConsensusError::invariant(format!(
                "cannot finish a block in phase {}",
                other.name()
            ))),
        }
    }
}
