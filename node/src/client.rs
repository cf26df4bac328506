// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Client session: optimistic local history kept in step with a room.
//!
//! Own commands are validated and predicted locally before they go to the
//! room; confirmed events resolve the predictions. A `StateSet` blocks the
//! session until the state is decoded off the async runtime and installed.
//! Events that arrive in the meantime are queued and applied in order after
//! the install.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot, watch};
use easel_kernel::canvas::drawer::CanvasDrawer;
use easel_kernel::canvas::model::CanvasModel;
use easel_kernel::error::{KernelError, ReconciliationError};
use easel_kernel::event::CanvasEvent;
use easel_kernel::executor::ApplyOutcome;
use easel_kernel::history::{HistoryManager, HistoryObserver};
use easel_kernel::interpreter::predict;
use easel_kernel::proxy::SharedFactory;
use easel_kernel::revoker::EventRevoker;
use easel_kernel::snapshot::decode::decode_sync_state;
use easel_kernel::snapshot::hash::hash_model;
use easel_kernel::state::command::Command;
use easel_kernel::types::id::{LayerId, UserId};
use easel_kernel::validator::CommandValidator;
use easel_kernel::virtual_history::VirtualHistoryManager;

use crate::config::NodeConfig;
use crate::errors::NodeError;
use crate::room::{RoomHandle, RoomMessage};
use crate::telemetry;

/// Immutable picture of the live canvas handed to the render loop.
#[derive(Debug)]
pub struct RenderFrame {
    pub generation: u64,
    pub drawer: CanvasDrawer,
    pub hash: [u8; 32],
}

/// Local intents of the user driving this session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientInput {
    Command(Command),
    Undo,
    Redo,
    SetVisibility { layer: LayerId, visible: bool },
}

enum SessionRequest {
    Input {
        input: ClientInput,
        reply: oneshot::Sender<Result<(), NodeError>>,
    },
    Settle {
        reply: oneshot::Sender<()>,
    },
}

/// Holds confirmed events back while a sync state is being installed.
#[derive(Debug, Default)]
pub struct SyncGate {
    blocked: bool,
    epoch: u64,
    queued: VecDeque<CanvasEvent>,
}

impl SyncGate {
    /// Blocks for a new state and returns its epoch. Events queued for an
    /// older state are already part of the new one and are dropped.
    pub fn block(&mut self) -> u64 {
        self.blocked = true;
        self.epoch += 1;
        self.queued.clear();
        self.epoch
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }

    pub fn queue(&mut self, event: CanvasEvent) {
        self.queued.push_back(event);
    }

    pub fn queued(&self) -> usize {
        self.queued.len()
    }

    /// Unblocks and hands back the queued events in arrival order.
    pub fn resume(&mut self) -> VecDeque<CanvasEvent> {
        self.blocked = false;
        std::mem::take(&mut self.queued)
    }
}

/// Raises a flag when the local history had to be thrown away.
struct ResyncFlag(Arc<AtomicBool>);

impl HistoryObserver for ResyncFlag {
    fn on_history_broken(&mut self, error: &ReconciliationError) {
        tracing::warn!("Client history broken, requesting resync: {}", error);
        self.0.store(true, Ordering::SeqCst);
    }
}

type Decoded = (u64, Result<(CanvasModel, Vec<CanvasEvent>), NodeError>, Instant);

/// Handle used to drive a running session.
#[derive(Clone, Debug)]
pub struct ClientHandle {
    user: UserId,
    tx: mpsc::Sender<SessionRequest>,
    frames: watch::Receiver<Arc<RenderFrame>>,
}

impl std::fmt::Debug for SessionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionRequest::Input { input, .. } => f.debug_tuple("Input").field(input).finish(),
            SessionRequest::Settle { .. } => f.write_str("Settle"),
        }
    }
}

impl ClientHandle {
    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// Latest published frames. Intermediate frames may be skipped.
    pub fn frames(&self) -> watch::Receiver<Arc<RenderFrame>> {
        self.frames.clone()
    }

    pub async fn send(&self, input: ClientInput) -> Result<(), NodeError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionRequest::Input { input, reply }).await?;
        rx.await?
    }

    /// Resolves once no sync is in progress and no prediction is outstanding.
    pub async fn settle(&self) -> Result<(), NodeError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionRequest::Settle { reply }).await?;
        Ok(rx.await?)
    }
}

pub struct ClientSession {
    user: UserId,
    room: RoomHandle,
    history: VirtualHistoryManager,
    validator: CommandValidator,
    revoker: EventRevoker,
    factory: SharedFactory,
    gate: SyncGate,
    generation: u64,
    frames: watch::Sender<Arc<RenderFrame>>,
    broken: Arc<AtomicBool>,
    settling: Vec<oneshot::Sender<()>>,
}

impl ClientSession {
    /// Joins `room` and starts the session on its own task.
    pub async fn connect(
        user: UserId,
        room: RoomHandle,
        config: &NodeConfig,
        factory: SharedFactory,
    ) -> Result<ClientHandle, NodeError> {
        let inbox = room.join(user.clone()).await?;

        let blank = CanvasModel::new(config.canvas_size());
        let mut history = HistoryManager::new(blank, factory.clone(), config.history).map_err(KernelError::from)?;
        let broken = Arc::new(AtomicBool::new(false));
        history.add_observer(Box::new(ResyncFlag(broken.clone())));

        let first = RenderFrame {
            generation: 0,
            drawer: history.drawer().snapshot().map_err(KernelError::from)?,
            hash: hash_model(history.model()),
        };
        let (frames, frames_rx) = watch::channel(Arc::new(first));

        let revoker = EventRevoker::new(config.revoke_policy.clone());
        let mut gate = SyncGate::default();
        // Nothing is accepted until the room's initial state is installed.
        gate.block();

        let session = ClientSession {
            user: user.clone(),
            room,
            history: VirtualHistoryManager::new(history),
            validator: CommandValidator::new(revoker.clone()),
            revoker,
            factory,
            gate,
            generation: 0,
            frames,
            broken,
            settling: Vec::new(),
        };

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(session.run(inbox, rx));
        Ok(ClientHandle {
            user,
            tx,
            frames: frames_rx,
        })
    }

    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<RoomMessage>, mut requests: mpsc::Receiver<SessionRequest>) {
        let (decoded_tx, mut decoded_rx) = mpsc::unbounded_channel::<Decoded>();
        let mut requests_open = true;

        loop {
            tokio::select! {
                message = inbox.recv() => match message {
                    Some(message) => self.on_message(message, &decoded_tx),
                    None => break,
                },
                request = requests.recv(), if requests_open => match request {
                    Some(SessionRequest::Input { input, reply }) => {
                        let result = self.on_input(input).await;
                        let _ = reply.send(result);
                    }
                    Some(SessionRequest::Settle { reply }) => self.settling.push(reply),
                    None => requests_open = false,
                },
                Some((epoch, decoded, started)) = decoded_rx.recv() => self.install(epoch, decoded, started),
            }

            if self.broken.swap(false, Ordering::SeqCst) {
                if let Err(e) = self.room.sync(self.user.clone()).await {
                    tracing::warn!("{}: resync request failed: {}", self.user, e);
                }
            }
            self.release_settled();
        }
        tracing::info!("{}: session ended", self.user);
    }

    fn on_message(&mut self, message: RoomMessage, decoded_tx: &mpsc::UnboundedSender<Decoded>) {
        match message {
            RoomMessage::Event(event) => {
                if self.gate.is_blocked() {
                    self.gate.queue(event);
                } else {
                    self.apply_confirmed(event);
                    self.publish();
                }
            }
            RoomMessage::StateSet(bytes) => {
                let epoch = self.gate.block();
                let factory = self.factory.clone();
                let tx = decoded_tx.clone();
                let started = Instant::now();
                tracing::debug!("{}: sync state of {} bytes, blocking", self.user, bytes.len());
                tokio::task::spawn_blocking(move || {
                    let decoded = decode_sync_state(&bytes)
                        .map_err(NodeError::from)
                        .and_then(|state| {
                            let checkpoint = state.checkpoint.restore(factory.as_ref())?;
                            Ok((checkpoint, state.history))
                        });
                    let _ = tx.send((epoch, decoded, started));
                });
            }
            RoomMessage::Rejected {
                command,
                predicted,
                reason,
            } => {
                metrics::increment_counter!(telemetry::COMMANDS_REJECTED);
                tracing::debug!("{}: {} rejected: {}", self.user, command.name(), reason);
                if predicted && !self.gate.is_blocked() {
                    match self.history.discard_predictions() {
                        Ok(n) => {
                            metrics::increment_counter!(telemetry::RECONCILIATIONS);
                            tracing::debug!("{}: discarded {} predictions", self.user, n);
                        }
                        Err(e) => tracing::warn!("{}: discarding predictions failed: {}", self.user, e),
                    }
                    self.publish();
                }
            }
        }
    }

    fn install(&mut self, epoch: u64, decoded: Result<(CanvasModel, Vec<CanvasEvent>), NodeError>, started: Instant) {
        if !self.gate.is_current(epoch) {
            tracing::debug!("{}: dropping superseded sync state", self.user);
            return;
        }

        let installed = decoded.and_then(|(checkpoint, events)| {
            self.history
                .history_mut()
                .set_history(checkpoint, events)
                .map_err(|e| NodeError::Kernel(e.into()))
        });
        let queued = self.gate.resume();
        match installed {
            Ok(()) => {
                metrics::increment_counter!(telemetry::RESYNCS);
                metrics::histogram!(telemetry::REPLAY_DURATION, started.elapsed().as_secs_f64());
                tracing::info!(
                    "{}: installed sync state, {} retained, {} queued",
                    self.user,
                    self.history.history().real_history().count(),
                    queued.len()
                );
                for event in queued {
                    self.apply_confirmed(event);
                }
            }
            Err(e) => {
                tracing::error!("{}: sync state rejected: {}", self.user, e);
                self.broken.store(true, Ordering::SeqCst);
            }
        }
        self.publish();
    }

    fn apply_confirmed(&mut self, event: CanvasEvent) {
        match self.history.event(event) {
            ApplyOutcome::Reconciled => metrics::increment_counter!(telemetry::RECONCILIATIONS),
            ApplyOutcome::RolledBack => {
                tracing::warn!("{}: confirmed event did not apply, requesting resync", self.user);
                self.broken.store(true, Ordering::SeqCst);
            }
            ApplyOutcome::Applied | ApplyOutcome::Promoted => {}
        }
    }

    async fn on_input(&mut self, input: ClientInput) -> Result<(), NodeError> {
        if self.gate.is_blocked() {
            return Err(NodeError::Syncing);
        }
        let command = match input {
            ClientInput::Command(command) => command,
            ClientInput::Undo => match self.revoker.create_undo_command(self.history.timeline(), &self.user) {
                Some(command) => command,
                None => return Ok(()),
            },
            ClientInput::Redo => match self.revoker.create_redo_command(self.history.timeline(), &self.user) {
                Some(command) => command,
                None => return Ok(()),
            },
            ClientInput::SetVisibility { layer, visible } => {
                self.history
                    .history_mut()
                    .drawer_mut()
                    .set_layer_visibility(layer, visible)
                    .map_err(KernelError::from)?;
                self.publish();
                return Ok(());
            }
        };
        self.submit(command).await
    }

    async fn submit(&mut self, command: Command) -> Result<(), NodeError> {
        self.validator
            .validate(self.history.model(), self.history.timeline(), &self.user, &command)
            .map_err(KernelError::from)?;

        let predicted = match predict(&self.user, &command) {
            Some(prediction) => self.history.virtual_event(prediction).is_success(),
            None => false,
        };
        if predicted {
            self.publish();
        }
        self.room.command(self.user.clone(), command, predicted).await
    }

    fn publish(&mut self) {
        self.generation += 1;
        match self.history.drawer().snapshot() {
            Ok(drawer) => {
                let frame = RenderFrame {
                    generation: self.generation,
                    hash: hash_model(drawer.model()),
                    drawer,
                };
                self.frames.send_replace(Arc::new(frame));
            }
            Err(e) => tracing::error!("{}: cannot snapshot canvas: {}", self.user, e),
        }
    }

    fn release_settled(&mut self) {
        if self.gate.is_blocked() || self.history.pending() > 0 {
            return;
        }
        for reply in self.settling.drain(..) {
            let _ = reply.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easel_kernel::types::id::EventId;
    use easel_kernel::event::EventKind;

    fn event(id: u64) -> CanvasEvent {
        CanvasEvent::new(EventId(id), UserId::from("a"), EventKind::LayerCreated { layer_id: LayerId(id as u32) })
    }

    #[test]
    fn test_gate_queues_in_order() {
        let mut gate = SyncGate::default();
        let epoch = gate.block();
        gate.queue(event(1));
        gate.queue(event(2));
        assert!(gate.is_blocked());
        assert!(gate.is_current(epoch));

        let drained: Vec<u64> = gate.resume().into_iter().map(|e| e.id.0).collect();
        assert_eq!(drained, vec![1, 2]);
        assert!(!gate.is_blocked());
        assert_eq!(gate.queued(), 0);
    }

    #[test]
    fn test_newer_state_supersedes_queue() {
        let mut gate = SyncGate::default();
        let first = gate.block();
        gate.queue(event(1));
        let second = gate.block();
        assert!(!gate.is_current(first));
        assert!(gate.is_current(second));
        assert_eq!(gate.queued(), 0);
    }
}
