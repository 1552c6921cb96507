//! What a handler needs besides the context: collaborators, keys and clock.

use std::sync::Arc;

use neo_crypto::Keypair;

use crate::config::ProtocolSettings;
use crate::context::ConsensusContext;
use crate::node::{Blockchain, Node};
use crate::timer::TimerContext;

#[derive(Clone)]
pub struct Environment {
    pub node: Arc<dyn Node>,
    pub keypair: Keypair,
    pub timer: TimerContext,
    pub private_net: bool,
}

impl Environment {
    pub fn new(node: Arc<dyn Node>, keypair: Keypair, timer: TimerContext, private_net: bool) -> Self {
        Self {
            node,
            keypair,
            timer,
            private_net,
        }
    }

    #[inline]
    pub fn blockchain(&self) -> &dyn Blockchain {
        self.node.blockchain()
    }

    #[inline]
    pub fn settings(&self) -> &ProtocolSettings {
        self.blockchain().settings()
    }

    #[inline]
    pub fn network(&self) -> u32 {
        self.settings().network
    }

    #[inline]
    pub fn now(&self) -> u64 {
        self.timer.now_millis()
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("public_key", &self.keypair.public_key)
            .field("private_net", &self.private_net)
            .finish_non_exhaustive()
    }
}

/// Result of every handler: the next context and, optionally, a new timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub context: ConsensusContext,
    pub timer_ms: Option<u64>,
}

impl Transition {
    #[inline]
    pub fn stay(context: ConsensusContext) -> Self {
        Self {
            context,
            timer_ms: None,
        }
    }

    #[inline]
    pub fn with_timer(context: ConsensusContext, timer_ms: u64) -> Self {
        Self {
            context,
            timer_ms: Some(timer_ms),
        }
    }

    /// Keeps the latest timer when chaining steps.
    #[inline]
    pub fn inherit(mut self, earlier: Option<u64>) -> Self {
        self.timer_ms = self.timer_ms.or(earlier);
        self
    }
}
