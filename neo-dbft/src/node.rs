//! Collaborators the engine talks to: the chain and the local node.
//!
//! Both are injected as trait objects; the engine never touches storage or
//! the network directly.

use async_trait::async_trait;
use neo_crypto::PublicKey;
use neo_primitives::{UInt256, VerifyResult};

use crate::config::ProtocolSettings;
use crate::error::ConsensusResult;
use crate::ledger::{Block, Header, Transaction, TransactionVerificationContext};
use crate::messages::ConsensusPayload;

/// Read access to the persisted chain plus transaction/payload verification.
#[async_trait]
pub trait Blockchain: Send + Sync {
    fn settings(&self) -> &ProtocolSettings;

    /// Validators of the current block.
    async fn validators(&self) -> ConsensusResult<Vec<PublicKey>>;

    /// Validators that will sign the next block.
    async fn next_block_validators(&self) -> ConsensusResult<Vec<PublicKey>>;

    async fn current_index(&self) -> u32;

    async fn current_hash(&self) -> UInt256;

    async fn header(&self, hash: &UInt256) -> Option<Header>;

    /// A persisted transaction, if any.
    async fn transaction(&self, hash: &UInt256) -> Option<Transaction>;

    /// Verifies `tx` against chain state, the transactions already accepted
    /// into the pending block and their accumulated fees.
    async fn verify_transaction(
        &self,
        tx: &Transaction,
        pending: &[Transaction],
        context: &TransactionVerificationContext,
    ) -> VerifyResult;

    /// Chain-level checks on a payload whose witness already matched its validator.
    async fn verify_consensus_payload(&self, payload: &ConsensusPayload) -> bool;

    fn should_refresh_committee(&self, height: u32) -> bool {
        self.settings().should_refresh_committee(height)
    }
}

/// The hosting node: relay, mempool and chain access.
#[async_trait]
pub trait Node: Send + Sync {
    fn blockchain(&self) -> &dyn Blockchain;

    async fn relay_consensus_payload(&self, payload: ConsensusPayload);

    async fn relay_block(&self, block: Block);

    /// Pooled transactions in arrival order.
    fn mem_pool(&self) -> Vec<Transaction>;

    fn mem_pool_transaction(&self, hash: &UInt256) -> Option<Transaction>;

    /// Asks the mempool to drop entries invalidated by a newly persisted block.
    async fn sync_mem_pool(&self);

    fn new_verification_context(&self) -> TransactionVerificationContext {
        TransactionVerificationContext::new()
    }
}
