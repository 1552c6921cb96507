//! Protocol settings and node-local consensus configuration.
//!
//! `ProtocolSettings` must match across every validator of a network.
//! `ConsensusConfig` is local to one node and is usually loaded from TOML:
//!
//! ```toml
//! private_key = "<64 hex chars>"
//! private_net = false
//!
//! [logging]
//! level = "info"
//! format = "compact"
//! ```

use crate::error::{ConsensusError, ConsensusResult};
use crate::logging::LogConfig;
use neo_crypto::{Keypair, PrivateKey};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Network-wide parameters consensus depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolSettings {
    /// Network identifier (magic number), mixed into every signature.
    pub network: u32,

    /// Target block interval.
    #[serde(default = "default_ms_per_block")]
    pub milliseconds_per_block: u64,

    /// Upper bound on the encoded size of a block.
    #[serde(default = "default_max_block_size")]
    pub max_block_size: usize,

    /// Upper bound on transactions per block.
    #[serde(default = "default_max_transactions_per_block")]
    pub max_transactions_per_block: usize,

    /// Upper bound on the summed system fee of a block.
    #[serde(default = "default_max_block_system_fee")]
    pub max_block_system_fee: i64,

    /// Number of consensus seats; candidates the chain reports beyond it are ignored.
    #[serde(default = "default_validators_count")]
    pub validators_count: usize,

    /// Committee size; the committee is refreshed every this many blocks.
    #[serde(default = "default_committee_members_count")]
    pub committee_members_count: u32,
}

fn default_ms_per_block() -> u64 {
    15_000
}

fn default_max_block_size() -> usize {
    262_144
}

fn default_max_transactions_per_block() -> usize {
    512
}

fn default_max_block_system_fee() -> i64 {
    150_000_000_000
}

fn default_validators_count() -> usize {
    7
}

fn default_committee_members_count() -> u32 {
    21
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            network: 0x334f_454e,
            milliseconds_per_block: default_ms_per_block(),
            max_block_size: default_max_block_size(),
            max_transactions_per_block: default_max_transactions_per_block(),
            max_block_system_fee: default_max_block_system_fee(),
            validators_count: default_validators_count(),
            committee_members_count: default_committee_members_count(),
        }
    }
}

impl ProtocolSettings {
    /// Whether the committee rotates when `height` is persisted.
    #[must_use]
    pub fn should_refresh_committee(&self, height: u32) -> bool {
        self.committee_members_count > 0 && height % self.committee_members_count == 0
    }
}

/// Node-local consensus options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Hex-encoded secp256r1 private scalar of this validator.
    pub private_key: String,

    /// Enables `run_consensus_now` and timer fast-forwarding.
    #[serde(default)]
    pub private_net: bool,

    #[serde(default)]
    pub logging: LogConfig,
}

impl ConsensusConfig {
    pub fn new(private_key: impl Into<String>, private_net: bool) -> Self {
        Self {
            private_key: private_key.into(),
            private_net,
            logging: LogConfig::default(),
        }
    }

    pub fn from_toml_str(text: &str) -> ConsensusResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> ConsensusResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> ConsensusResult<()> {
        self.keypair().map(|_| ())
    }

    /// Derives the validator key pair from `private_key`.
    pub fn keypair(&self) -> ConsensusResult<Keypair> {
        let private_key = PrivateKey::from_hex(self.private_key.trim())
            .map_err(|e| ConsensusError::config(format!("private_key: {e}")))?;
        Ok(Keypair::from_private(private_key)?)
    }
}
