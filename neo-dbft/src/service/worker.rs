use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use neo_primitives::UInt256;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::Event;
use crate::context::ConsensusContext;
use crate::env::{Environment, Transition};
use crate::error::ConsensusResult;
use crate::handlers::{handle_consensus_payload, handle_persist_block, handle_transaction_received};
use crate::run::run_consensus;
use crate::timer::HView;

/// The single consumer of the event queue.
pub(super) struct Worker {
    env: Environment,
    events: mpsc::UnboundedSender<Event>,
    published: Arc<Mutex<ConsensusContext>>,
    known_hashes: HashSet<UInt256>,
    timer: Option<JoinHandle<()>>,
}

impl Worker {
    pub(super) fn new(
        env: Environment,
        events: mpsc::UnboundedSender<Event>,
        published: Arc<Mutex<ConsensusContext>>,
    ) -> Self {
        Self {
            env,
            events,
            published,
            known_hashes: HashSet::new(),
            timer: None,
        }
    }

    pub(super) async fn run(
        mut self,
        mut context: ConsensusContext,
        timer_ms: Option<u64>,
        mut events: mpsc::UnboundedReceiver<Event>,
        mut stop: oneshot::Receiver<()>,
    ) {
        if let Some(delay) = timer_ms {
            self.arm_timer(&context, delay);
        }

        loop {
            let mut event = tokio::select! {
                biased;
                _ = &mut stop => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            let responder = match &mut event {
                Event::Timer { responder, .. } => responder.take(),
                _ => None,
            };

            let previous = context.clone();
            match self.handle(context, event).await {
                Ok(transition) => {
                    context = transition.context;
                    if let Some(delay) = transition.timer_ms {
                        self.arm_timer(&context, delay);
                    }
                    *self.published.lock() = context.clone();
                    if let Some(responder) = responder {
                        let _ = responder.send(Ok(()));
                    }
                }
                Err(err) => {
                    error!(
                        error = %err,
                        block_index = previous.block_index,
                        view = previous.view_number,
                        "Consensus handler failed, stopping"
                    );
                    context = previous;
                    if let Some(responder) = responder {
                        let _ = responder.send(Err(err));
                    }
                    break;
                }
            }
        }

        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        *self.published.lock() = context;
        debug!("Consensus loop exited");
    }

    async fn handle(&mut self, context: ConsensusContext, event: Event) -> ConsensusResult<Transition> {
        match event {
            Event::PersistBlock => {
                handle_persist_block(&self.env, context, &mut self.known_hashes).await
            }
            Event::ConsensusPayload(payload) => {
                handle_consensus_payload(
                    &self.env,
                    context,
                    &mut self.known_hashes,
                    Arc::new(payload),
                )
                .await
            }
            Event::TransactionReceived(tx) => {
                handle_transaction_received(&self.env, context, tx).await
            }
            Event::Timer { armed_for, .. } => run_consensus(&self.env, context, armed_for).await,
        }
    }

    /// At most one timer is live; arming cancels the previous one.
    fn arm_timer(&mut self, context: &ConsensusContext, delay_ms: u64) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        let armed_for = HView {
            height: context.block_index,
            view_number: context.view_number,
        };
        let events = self.events.clone();
        debug!(
            block_index = armed_for.height,
            view = armed_for.view_number,
            delay_ms,
            "Timer armed"
        );
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let _ = events.send(Event::Timer {
                armed_for: Some(armed_for),
                responder: None,
            });
        }));
    }
}
