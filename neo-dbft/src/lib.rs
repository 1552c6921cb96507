//! # Neo dBFT
//!
//! Event-driven delegated Byzantine Fault Tolerance consensus for Neo
//! validators.
//!
//! The engine is a pure protocol core: it consumes consensus payloads,
//! transactions and block-persisted notifications from the surrounding node
//! through the [`Node`] and [`Blockchain`] traits, and produces signed
//! [`ConsensusPayload`]s and finished [`Block`]s for the node to relay.
//!
//! ## Quorum
//!
//! With `n` validators, `M = n - (n - 1) / 3` agreeing validators advance a
//! phase and up to `F = n - M` faulty ones are tolerated.
//!
//! ## Consensus Flow
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   One view of one height                     │
//! │                                                              │
//! │  Primary                       Backups                       │
//! │    │                              │                          │
//! │    │───── PrepareRequest ────────>│  Initial -> RequestSent  │
//! │    │                              │     / RequestReceived    │
//! │    │<──── PrepareResponse ────────│                          │
//! │    │                              │  M preparations          │
//! │    │<─────────── Commit ─────────>│  -> SignatureSent        │
//! │    │                              │  M commits               │
//! │    │        Block relayed         │  -> BlockSent            │
//! │    ▼                              ▼                          │
//! │                                                              │
//! │  Timeout / policy rejection: ChangeView(view + 1)            │
//! │  M ChangeViews for >= v: reset to view v, rotate primary     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use neo_dbft::{quorum, ChangeViewReason, ConsensusMessageType};
//!
//! assert_eq!(quorum(4), 3);
//! assert_eq!(quorum(7), 5);
//!
//! let msg_type = ConsensusMessageType::try_from(0x20).unwrap();
//! assert_eq!(msg_type, ConsensusMessageType::PrepareRequest);
//! assert_eq!(ChangeViewReason::Timeout.to_byte(), 0x00);
//! ```

pub mod actions;
pub mod change_view_reason;
pub mod check;
pub mod config;
pub mod context;
pub mod env;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod logging;
pub mod make;
pub mod message_type;
pub mod messages;
pub mod node;
pub mod run;
pub mod service;
pub mod timer;

#[cfg(test)]
mod tests;

/// View number within one block height.
pub type ViewNumber = u8;

// Re-exports
pub use change_view_reason::ChangeViewReason;
pub use config::{ConsensusConfig, ProtocolSettings};
pub use context::{quorum, ConsensusContext, ConsensusPhase, Proposal};
pub use env::{Environment, Transition};
pub use error::{ConsensusError, ConsensusResult};
pub use handlers::handle_consensus_payload;
pub use ledger::{Block, Header, Transaction, TransactionVerificationContext, Witness};
pub use logging::{init_logging, LogConfig, LogFormat};
pub use message_type::ConsensusMessageType;
pub use messages::{ConsensusMessage, ConsensusPayload};
pub use node::{Blockchain, Node};
pub use service::{Consensus, Event, StartGuard};
pub use timer::{HView, TimerContext};
