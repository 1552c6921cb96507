//! Error types for the consensus engine.
//!
//! Only internal faults surface as errors. Stale or byzantine payloads are
//! dropped by the handlers and never reach this type.
//!
//! ## Error Categories
//!
//! | Error | Description |
//! |-------|-------------|
//! | `InvariantViolation` | A phase was entered without the data it requires |
//! | `Blockchain` | The chain could not answer a read the engine depends on |
//! | `NotPrivateNet` | A private-network-only operation was called on a public network |
//! | `NotRunning` / `ChannelClosed` | The driver is paused or its loop has exited |
//! | `Config` | Invalid configuration |
//!
//! ## Example
//!
//! ```rust
//! use neo_dbft::error::ConsensusError;
//!
//! let err = ConsensusError::invariant("previous header missing");
//! assert!(err.to_string().contains("previous header missing"));
//! ```

use neo_crypto::{KeyError, ScriptError, SignError};
use thiserror::Error;

/// Errors that can occur while running consensus.
#[derive(Error, Debug)]
pub enum ConsensusError {
    /// An internal invariant does not hold.
    #[error("Invariant violation: {message}")]
    InvariantViolation {
        /// Error message.
        message: String,
    },

    /// A chain read failed.
    #[error("Blockchain error: {message}")]
    Blockchain {
        /// Error message.
        message: String,
    },

    /// Operation restricted to private networks.
    #[error("{operation} is only available on a private network")]
    NotPrivateNet {
        /// Name of the rejected operation.
        operation: &'static str,
    },

    /// The driver is not running.
    #[error("Consensus is not running")]
    NotRunning,

    /// The event loop exited before answering.
    #[error("Consensus event loop closed")]
    ChannelClosed,

    /// Invalid configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// Logging could not be installed.
    #[error("Logging initialization failed: {0}")]
    LoggingInit(String),

    /// Key decoding error.
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    /// Signing error.
    #[error("Sign error: {0}")]
    Sign(#[from] SignError),

    /// Script construction error.
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    /// Bincode serialization error.
    #[error("Serialization error")]
    BincodeError(#[from] bincode::Error),

    /// TOML parse error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ConsensusError {
    /// Create an invariant violation error.
    pub fn invariant<S: Into<String>>(message: S) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Create a blockchain error.
    pub fn blockchain<S: Into<String>>(message: S) -> Self {
        Self::Blockchain {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type for consensus operations.
pub type ConsensusResult<T> = std::result::Result<T, ConsensusError>;
