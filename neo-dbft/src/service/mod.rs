//! The consensus driver.
//!
//! [`Consensus`] owns a single worker task that drains an event queue in
//! arrival order and threads the [`ConsensusContext`] through the handlers.
//! Producers only enqueue, so the network and storage layers never wait on
//! consensus progress.

mod worker;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::actions::initialize_new_consensus;
use crate::config::ConsensusConfig;
use crate::context::ConsensusContext;
use crate::env::Environment;
use crate::error::{ConsensusError, ConsensusResult};
use crate::ledger::Transaction;
use crate::messages::ConsensusPayload;
use crate::node::Node;
use crate::timer::{millis_on_view, HView, TimerContext};

use worker::Worker;

/// Inputs of the event loop.
#[derive(Debug)]
pub enum Event {
    PersistBlock,
    ConsensusPayload(ConsensusPayload),
    TransactionReceived(Transaction),
    /// `armed_for` is `None` for a forced round; `responder` learns its outcome.
    Timer {
        armed_for: Option<HView>,
        responder: Option<oneshot::Sender<ConsensusResult<()>>>,
    },
}

struct Running {
    events: mpsc::UnboundedSender<Event>,
    stop: oneshot::Sender<()>,
    worker: JoinHandle<()>,
}

struct Inner {
    env: Environment,
    running: Mutex<Option<Running>>,
    context: Arc<Mutex<ConsensusContext>>,
}

/// dBFT consensus driver. Cheap to clone; clones share the same loop.
#[derive(Clone)]
pub struct Consensus {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Consensus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consensus")
            .field("env", &self.inner.env)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Consensus {
    pub fn new(config: &ConsensusConfig, node: Arc<dyn Node>) -> ConsensusResult<Self> {
        Self::with_timer(config, node, TimerContext::default())
    }

    /// Like [`Consensus::new`] with an explicit clock.
    pub fn with_timer(
        config: &ConsensusConfig,
        node: Arc<dyn Node>,
        timer: TimerContext,
    ) -> ConsensusResult<Self> {
        config.validate()?;
        let env = Environment::new(node, config.keypair()?, timer, config.private_net);
        Ok(Self {
            inner: Arc::new(Inner {
                env,
                running: Mutex::new(None),
                context: Arc::new(Mutex::new(ConsensusContext::default())),
            }),
        })
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.worker.is_finished())
    }

    /// Snapshot of the context as of the last handled event.
    pub fn context(&self) -> ConsensusContext {
        self.inner.context.lock().clone()
    }

    pub fn now_millis(&self) -> u64 {
        self.inner.env.now()
    }

    /// Stops any previous run and starts over from the current chain tip.
    pub async fn start(&self) -> ConsensusResult<StartGuard> {
        self.pause().await;
        let transition = initialize_new_consensus(&self.inner.env).await?;
        info!(
            block_index = transition.context.block_index,
            watch_only = transition.context.watch_only(),
            "Consensus started"
        );
        self.spawn(transition.context, transition.timer_ms);
        Ok(StartGuard {
            consensus: self.clone(),
        })
    }

    /// Stops the loop and waits for the in-flight handler. The last context
    /// is kept for [`Consensus::resume`].
    pub async fn pause(&self) {
        let running = self.inner.running.lock().take();
        let Some(running) = running else {
            return;
        };
        let _ = running.stop.send(());
        drop(running.events);
        if let Err(err) = running.worker.await {
            error!(error = %err, "Consensus worker panicked");
        }
        info!("Consensus paused");
    }

    /// Restarts the loop with the context kept by the last pause.
    pub async fn resume(&self) -> ConsensusResult<()> {
        if self.is_running() {
            return Ok(());
        }
        let context = self.context();
        if context.validators.is_empty() {
            self.start().await?;
            return Ok(());
        }
        let timer_ms = (!context.watch_only() && !context.block_sent()).then(|| {
            millis_on_view(
                context.view_number,
                self.inner.env.settings().milliseconds_per_block,
            )
        });
        info!(
            block_index = context.block_index,
            view = context.view_number,
            "Consensus resumed"
        );
        self.spawn(context, timer_ms);
        Ok(())
    }

    /// Clears the fast-forward offset of the clock.
    pub fn reset(&self) {
        self.inner.env.timer.reset();
    }

    pub fn on_persist_block(&self) {
        self.send(Event::PersistBlock);
    }

    pub fn on_consensus_payload_received(&self, payload: ConsensusPayload) {
        self.send(Event::ConsensusPayload(payload));
    }

    pub fn on_transaction_received(&self, tx: Transaction) {
        self.send(Event::TransactionReceived(tx));
    }

    /// Forces a timer round and waits for it. Private networks only.
    pub async fn run_consensus_now(&self) -> ConsensusResult<()> {
        self.ensure_private_net("run_consensus_now")?;
        let events = self
            .inner
            .running
            .lock()
            .as_ref()
            .map(|r| r.events.clone())
            .ok_or(ConsensusError::NotRunning)?;
        let (responder, outcome) = oneshot::channel();
        events
            .send(Event::Timer {
                armed_for: None,
                responder: Some(responder),
            })
            .map_err(|_| ConsensusError::ChannelClosed)?;
        outcome.await.map_err(|_| ConsensusError::ChannelClosed)?
    }

    pub fn fast_forward_offset(&self, seconds: u64) -> ConsensusResult<()> {
        self.ensure_private_net("fast_forward_offset")?;
        self.inner.env.timer.fast_forward_offset(seconds);
        Ok(())
    }

    pub fn fast_forward_to_time(&self, seconds: u64) -> ConsensusResult<()> {
        self.ensure_private_net("fast_forward_to_time")?;
        self.inner.env.timer.fast_forward_to_time(seconds);
        Ok(())
    }

    fn ensure_private_net(&self, operation: &'static str) -> ConsensusResult<()> {
        if self.inner.env.private_net {
            Ok(())
        } else {
            Err(ConsensusError::NotPrivateNet { operation })
        }
    }

    fn send(&self, event: Event) {
        let guard = self.inner.running.lock();
        let Some(running) = guard.as_ref() else {
            debug!(?event, "Consensus not running, dropping event");
            return;
        };
        if running.events.send(event).is_err() {
            debug!("Consensus loop closed, dropping event");
        }
    }

    fn spawn(&self, context: ConsensusContext, timer_ms: Option<u64>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        *self.inner.context.lock() = context.clone();

        let worker = Worker::new(
            self.inner.env.clone(),
            events_tx.clone(),
            self.inner.context.clone(),
        );
        let handle = tokio::spawn(worker.run(context, timer_ms, events_rx, stop_rx));
        *self.inner.running.lock() = Some(Running {
            events: events_tx,
            stop: stop_tx,
            worker: handle,
        });
    }
}

/// Returned by [`Consensus::start`]; disposing it pauses the driver.
#[derive(Debug)]
#[must_use = "dropping the guard leaves consensus running"]
pub struct StartGuard {
    consensus: Consensus,
}

impl StartGuard {
    pub async fn dispose(self) {
        self.consensus.pause().await;
    }
}
