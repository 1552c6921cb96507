use crate::ViewNumber;
use neo_primitives::UInt256;
use serde::{Deserialize, Serialize};

/// The primary's block proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareRequest {
    pub view_number: ViewNumber,
    pub version: u32,
    pub prev_hash: UInt256,
    pub timestamp: u64,
    pub nonce: u64,
    pub transaction_hashes: Vec<UInt256>,
}

/// A backup's acknowledgement of the PrepareRequest payload with `preparation_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareResponse {
    pub view_number: ViewNumber,
    pub preparation_hash: UInt256,
}
