//! Block and transaction shapes produced and consumed by the engine.
//!
//! These are the minimal ledger types consensus needs: enough to hash, size
//! and sign a proposed block. Execution and storage live in the chain.

use crate::error::ConsensusResult;
use neo_primitives::{sha256, UInt160, UInt256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fixed part of an encoded header: version, prev hash, merkle root,
/// timestamp, nonce, index, primary index and next consensus.
pub const HEADER_FIXED_SIZE: usize = 4 + 32 + 32 + 8 + 8 + 4 + 1 + 20;

/// Length prefix of an encoded sequence.
pub const LENGTH_PREFIX_SIZE: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Witness {
    pub invocation_script: Vec<u8>,
    pub verification_script: Vec<u8>,
}

impl Witness {
    /// Encoded size of the witness.
    #[must_use]
    pub fn size(&self) -> usize {
        2 * LENGTH_PREFIX_SIZE + self.invocation_script.len() + self.verification_script.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u8,
    pub nonce: u32,
    pub sender: UInt160,
    pub system_fee: i64,
    pub network_fee: i64,
    pub valid_until_block: u32,
    pub script: Vec<u8>,
    pub witnesses: Vec<Witness>,
}

impl Transaction {
    /// Hash of the unsigned part; witnesses are excluded.
    pub fn hash(&self) -> ConsensusResult<UInt256> {
        let unsigned = bincode::serialize(&(
            self.version,
            self.nonce,
            &self.sender,
            self.system_fee,
            self.network_fee,
            self.valid_until_block,
            &self.script,
        ))?;
        Ok(UInt256::from_array(sha256(unsigned)))
    }

    /// Encoded size including witnesses.
    pub fn size(&self) -> ConsensusResult<usize> {
        Ok(bincode::serialized_size(self)? as usize)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub version: u32,
    pub prev_hash: UInt256,
    pub merkle_root: UInt256,
    pub timestamp: u64,
    pub nonce: u64,
    pub index: u32,
    pub primary_index: u8,
    pub next_consensus: UInt160,
    pub witness: Witness,
}

impl Header {
    pub fn hash(&self) -> ConsensusResult<UInt256> {
        let unsigned = bincode::serialize(&(
            self.version,
            &self.prev_hash,
            &self.merkle_root,
            self.timestamp,
            self.nonce,
            self.index,
            self.primary_index,
            &self.next_consensus,
        ))?;
        Ok(UInt256::from_array(sha256(unsigned)))
    }

    /// The bytes validators sign when committing to this header.
    pub fn sign_data(&self, network: u32) -> ConsensusResult<Vec<u8>> {
        Ok(sign_data(network, &self.hash()?))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn hash(&self) -> ConsensusResult<UInt256> {
        self.header.hash()
    }

    #[must_use]
    pub fn index(&self) -> u32 {
        self.header.index
    }

    pub fn size(&self) -> ConsensusResult<usize> {
        Ok(bincode::serialized_size(self)? as usize)
    }
}

/// `network || hash`, the message covered by every consensus signature.
#[must_use]
pub fn sign_data(network: u32, hash: &UInt256) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + UInt256::LENGTH);
    data.extend_from_slice(&network.to_le_bytes());
    data.extend_from_slice(hash.as_bytes());
    data
}

/// Merkle root over transaction hashes; odd levels duplicate their last node.
#[must_use]
pub fn merkle_root(hashes: &[UInt256]) -> UInt256 {
    if hashes.is_empty() {
        return UInt256::zero();
    }

    let mut level: Vec<UInt256> = hashes.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                let mut buf = [0u8; 64];
                buf[..32].copy_from_slice(left.as_bytes());
                buf[32..].copy_from_slice(right.as_bytes());
                UInt256::from_array(sha256(sha256(buf)))
            })
            .collect();
    }
    level[0]
}

/// Fees already claimed by each sender within the block being verified.
///
/// Lets the chain reject a transaction whose sender cannot pay for it on top
/// of the transactions already accepted into the same proposal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionVerificationContext {
    sender_fee: HashMap<UInt160, i64>,
}

impl TransactionVerificationContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_transaction(&mut self, tx: &Transaction) {
        *self.sender_fee.entry(tx.sender).or_default() += tx.system_fee + tx.network_fee;
    }

    pub fn remove_transaction(&mut self, tx: &Transaction) {
        if let Some(fee) = self.sender_fee.get_mut(&tx.sender) {
            *fee -= tx.system_fee + tx.network_fee;
            if *fee <= 0 {
                self.sender_fee.remove(&tx.sender);
            }
        }
    }

    /// Whether `balance` covers this transaction plus the sender's pending fees.
    #[must_use]
    pub fn check_transaction(&self, tx: &Transaction, balance: i64) -> bool {
        let pending = self.total_fee(&tx.sender);
        balance >= pending + tx.system_fee + tx.network_fee
    }

    #[must_use]
    pub fn total_fee(&self, sender: &UInt160) -> i64 {
        self.sender_fee.get(sender).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(nonce: u32, sender: u8) -> Transaction {
        Transaction {
            nonce,
            sender: UInt160::from([sender; 20]),
            system_fee: 10,
            network_fee: 5,
            valid_until_block: 100,
            script: vec![0x40],
            ..Default::default()
        }
    }

    #[test]
    fn test_transaction_hash_ignores_witnesses() {
        let a = tx(1, 1);
        let mut b = a.clone();
        b.witnesses.push(Witness {
            invocation_script: vec![1, 2, 3],
            verification_script: vec![4],
        });
        assert_eq!(a.hash().unwrap(), b.hash().unwrap());
        assert_ne!(a.hash().unwrap(), tx(2, 1).hash().unwrap());
        assert!(b.size().unwrap() > a.size().unwrap());
    }

    #[test]
    fn test_merkle_root() {
        assert_eq!(merkle_root(&[]), UInt256::zero());

        let h1 = tx(1, 1).hash().unwrap();
        let h2 = tx(2, 1).hash().unwrap();
        let h3 = tx(3, 1).hash().unwrap();
        assert_eq!(merkle_root(&[h1]), h1);
        assert_ne!(merkle_root(&[h1, h2]), merkle_root(&[h2, h1]));
        assert_eq!(merkle_root(&[h1, h2, h3]), merkle_root(&[h1, h2, h3, h3]));
    }

    #[test]
    fn test_header_sign_data() {
        let header = Header {
            index: 7,
            ..Default::default()
        };
        let data = header.sign_data(0x334f454e).unwrap();
        assert_eq!(&data[..4], &0x334f454eu32.to_le_bytes());
        assert_eq!(&data[4..], header.hash().unwrap().as_bytes());
    }

    #[test]
    fn test_block_size_matches_layout() {
        let block = Block {
            header: Header {
                witness: Witness {
                    invocation_script: vec![0; 66],
                    verification_script: vec![0; 40],
                },
                ..Default::default()
            },
            transactions: vec![tx(1, 1)],
        };
        let expected = HEADER_FIXED_SIZE
            + block.header.witness.size()
            + LENGTH_PREFIX_SIZE
            + block.transactions[0].size().unwrap();
        assert_eq!(block.size().unwrap(), expected);
    }

    #[test]
    fn test_verification_context() {
        let mut ctx = TransactionVerificationContext::new();
        let first = tx(1, 9);
        assert!(ctx.check_transaction(&first, 15));
        ctx.add_transaction(&first);
        assert_eq!(ctx.total_fee(&first.sender), 15);
        assert!(!ctx.check_transaction(&tx(2, 9), 20));
        assert!(ctx.check_transaction(&tx(2, 8), 20));
        ctx.remove_transaction(&first);
        assert_eq!(ctx.total_fee(&first.sender), 0);
    }
}
