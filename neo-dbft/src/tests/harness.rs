//! In-memory chain and node doubles shared by the scenario tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use neo_crypto::{Keypair, PublicKey};
use neo_primitives::{UInt256, VerifyResult};
use parking_lot::Mutex;

use crate::actions::initialize_new_consensus;
use crate::config::ProtocolSettings;
use crate::context::ConsensusContext;
use crate::env::{Environment, Transition};
use crate::error::ConsensusResult;
use crate::handlers::handle_consensus_payload;
use crate::ledger::{Block, Header, Transaction, TransactionVerificationContext};
use crate::messages::{ConsensusMessage, ConsensusPayload};
use crate::node::{Blockchain, Node};
use crate::timer::TimerContext;
use crate::{ChangeViewReason, ConsensusMessageType};

pub const NETWORK: u32 = 0x0074_6e41;
pub const GENESIS_TIME: u64 = 1_600_000_000_000;

pub fn settings() -> ProtocolSettings {
    ProtocolSettings {
        network: NETWORK,
        milliseconds_per_block: 60_000,
        committee_members_count: 0,
        ..Default::default()
    }
}

pub struct MockChain {
    settings: ProtocolSettings,
    validators: Vec<PublicKey>,
    tip: Mutex<(u32, UInt256)>,
    headers: Mutex<HashMap<UInt256, Header>>,
    on_chain: Mutex<HashMap<UInt256, Transaction>>,
    verdicts: Mutex<HashMap<UInt256, VerifyResult>>,
}

impl MockChain {
    pub fn new(settings: ProtocolSettings, validators: Vec<PublicKey>) -> Self {
        let genesis = Header {
            timestamp: GENESIS_TIME,
            ..Default::default()
        };
        let hash = genesis.hash().unwrap();
        Self {
            settings,
            validators,
            tip: Mutex::new((0, hash)),
            headers: Mutex::new(HashMap::from([(hash, genesis)])),
            on_chain: Mutex::new(HashMap::new()),
            verdicts: Mutex::new(HashMap::new()),
        }
    }

    /// Persists `block` as the new tip.
    pub fn persist(&self, block: &Block) {
        let hash = block.hash().unwrap();
        self.headers.lock().insert(hash, block.header.clone());
        for tx in &block.transactions {
            self.on_chain.lock().insert(tx.hash().unwrap(), tx.clone());
        }
        *self.tip.lock() = (block.index(), hash);
    }

    pub fn add_on_chain(&self, tx: &Transaction) {
        self.on_chain.lock().insert(tx.hash().unwrap(), tx.clone());
    }

    pub fn set_verdict(&self, tx: &Transaction, result: VerifyResult) {
        self.verdicts.lock().insert(tx.hash().unwrap(), result);
    }
}

#[async_trait]
impl Blockchain for MockChain {
    fn settings(&self) -> &ProtocolSettings {
        &self.settings
    }

    async fn validators(&self) -> ConsensusResult<Vec<PublicKey>> {
        Ok(self.validators.clone())
    }

    async fn next_block_validators(&self) -> ConsensusResult<Vec<PublicKey>> {
        Ok(self.validators.clone())
    }

    async fn current_index(&self) -> u32 {
        self.tip.lock().0
    }

    async fn current_hash(&self) -> UInt256 {
        self.tip.lock().1
    }

    async fn header(&self, hash: &UInt256) -> Option<Header> {
        self.headers.lock().get(hash).cloned()
    }

    async fn transaction(&self, hash: &UInt256) -> Option<Transaction> {
        self.on_chain.lock().get(hash).cloned()
    }

    async fn verify_transaction(
        &self,
        tx: &Transaction,
        _pending: &[Transaction],
        _context: &TransactionVerificationContext,
    ) -> VerifyResult {
        let Ok(hash) = tx.hash() else {
            return VerifyResult::Invalid;
        };
        self.verdicts
            .lock()
            .get(&hash)
            .copied()
            .unwrap_or(VerifyResult::Succeed)
    }

    async fn verify_consensus_payload(&self, _payload: &ConsensusPayload) -> bool {
        true
    }
}

pub struct MockNode {
    pub chain: Arc<MockChain>,
    pub mem_pool: Mutex<Vec<Transaction>>,
    pub relayed: Mutex<Vec<ConsensusPayload>>,
    pub blocks: Mutex<Vec<Block>>,
    pub mem_pool_syncs: AtomicUsize,
}

impl MockNode {
    pub fn new(chain: Arc<MockChain>) -> Self {
        Self {
            chain,
            mem_pool: Mutex::new(Vec::new()),
            relayed: Mutex::new(Vec::new()),
            blocks: Mutex::new(Vec::new()),
            mem_pool_syncs: AtomicUsize::new(0),
        }
    }

    pub fn take_relayed(&self) -> Vec<ConsensusPayload> {
        std::mem::take(&mut *self.relayed.lock())
    }

    pub fn relayed_of(&self, message_type: ConsensusMessageType) -> Vec<ConsensusPayload> {
        self.relayed
            .lock()
            .iter()
            .filter(|p| p.message_type() == message_type)
            .cloned()
            .collect()
    }

    pub fn relayed_change_view_reasons(&self) -> Vec<ChangeViewReason> {
        self.relayed
            .lock()
            .iter()
            .filter_map(|p| p.change_view().map(|m| m.reason))
            .collect()
    }
}

#[async_trait]
impl Node for MockNode {
    fn blockchain(&self) -> &dyn Blockchain {
        &*self.chain
    }

    async fn relay_consensus_payload(&self, payload: ConsensusPayload) {
        self.relayed.lock().push(payload);
    }

    async fn relay_block(&self, block: Block) {
        self.blocks.lock().push(block);
    }

    fn mem_pool(&self) -> Vec<Transaction> {
        self.mem_pool.lock().clone()
    }

    fn mem_pool_transaction(&self, hash: &UInt256) -> Option<Transaction> {
        self.mem_pool
            .lock()
            .iter()
            .find(|tx| tx.hash().ok().as_ref() == Some(hash))
            .cloned()
    }

    async fn sync_mem_pool(&self) {
        self.mem_pool_syncs.fetch_add(1, Ordering::SeqCst);
    }
}

/// `n` validators sharing one chain, each with its own node and context.
pub struct Network {
    pub keys: Vec<Keypair>,
    pub chain: Arc<MockChain>,
    pub nodes: Vec<Arc<MockNode>>,
    pub envs: Vec<Environment>,
    pub contexts: Vec<ConsensusContext>,
    pub known_hashes: Vec<HashSet<UInt256>>,
}

impl Network {
    pub async fn new(n: usize) -> Self {
        Self::with_settings(n, settings()).await
    }

    pub async fn with_settings(n: usize, settings: ProtocolSettings) -> Self {
        let mut rng = rand::thread_rng();
        let keys: Vec<Keypair> = (0..n).map(|_| Keypair::generate(&mut rng)).collect();
        let validators = keys.iter().map(|k| k.public_key).collect();
        let chain = Arc::new(MockChain::new(settings, validators));
        let nodes: Vec<Arc<MockNode>> = (0..n)
            .map(|_| Arc::new(MockNode::new(chain.clone())))
            .collect();
        let envs: Vec<Environment> = keys
            .iter()
            .zip(&nodes)
            .map(|(key, node)| {
                Environment::new(node.clone(), key.clone(), TimerContext::default(), false)
            })
            .collect();

        let mut contexts = Vec::with_capacity(n);
        for env in &envs {
            contexts.push(initialize_new_consensus(env).await.unwrap().context);
        }
        Self {
            keys,
            chain,
            nodes,
            envs,
            contexts,
            known_hashes: vec![HashSet::new(); n],
        }
    }

    /// Delivers `payload` to validator `to`.
    pub async fn deliver(&mut self, to: usize, payload: &ConsensusPayload) -> Transition {
        let context = std::mem::take(&mut self.contexts[to]);
        let transition = handle_consensus_payload(
            &self.envs[to],
            context,
            &mut self.known_hashes[to],
            Arc::new(payload.clone()),
        )
        .await
        .unwrap();
        self.contexts[to] = transition.context.clone();
        transition
    }

    /// Gossips relayed payloads to every validator until nothing new is relayed.
    pub async fn settle(&mut self) {
        loop {
            let batch: Vec<ConsensusPayload> =
                self.nodes.iter().flat_map(|node| node.take_relayed()).collect();
            if batch.is_empty() {
                return;
            }
            for payload in &batch {
                for to in 0..self.keys.len() {
                    self.deliver(to, payload).await;
                }
            }
        }
    }

    /// Signs `message` as validator `from` for the current height of `from`.
    pub fn sign(&self, from: usize, message: ConsensusMessage) -> ConsensusPayload {
        let context = &self.contexts[from];
        ConsensusPayload::sign(
            context.version,
            context.prev_hash,
            context.block_index,
            from as u8,
            message,
            &self.keys[from],
            NETWORK,
        )
        .unwrap()
    }

    pub fn primary(&self) -> usize {
        self.contexts[0].primary_index as usize
    }
}

pub fn transaction(nonce: u32, system_fee: i64, network_fee: i64) -> Transaction {
    Transaction {
        nonce,
        system_fee,
        network_fee,
        valid_until_block: 100,
        script: vec![0x11, 0x40],
        ..Default::default()
    }
}
