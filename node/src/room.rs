// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Room - single-writer authority for one shared canvas.
//!
//! The room owns the authoritative history and the interpreter. Every request
//! arrives on one queue and is handled to completion before the next, so the
//! event order seen by subscribers is the order in which commands were accepted.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use easel_kernel::canvas::model::CanvasModel;
use easel_kernel::error::{KernelError, ReconciliationError};
use easel_kernel::event::CanvasEvent;
use easel_kernel::history::{HistoryManager, HistoryObserver};
use easel_kernel::interpreter::CommandInterpreter;
use easel_kernel::proxy::SharedFactory;
use easel_kernel::revoker::EventRevoker;
use easel_kernel::snapshot::encode::encode_sync_state;
use easel_kernel::snapshot::hash::hash_model;
use easel_kernel::state::command::Command;
use easel_kernel::types::id::{EventId, UserId};
use easel_kernel::validator::CommandValidator;

use crate::config::NodeConfig;
use crate::errors::NodeError;
use crate::telemetry;

/// What a subscriber receives, in room order.
#[derive(Clone, Debug)]
pub enum RoomMessage {
    Event(CanvasEvent),
    /// Encoded `SyncState` to install in place of the local history.
    StateSet(Arc<Vec<u8>>),
    /// One of this user's commands was refused. `predicted` echoes the submission.
    Rejected {
        command: Command,
        predicted: bool,
        reason: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomStatus {
    pub hash: [u8; 32],
    pub retained: usize,
    pub next_event_id: EventId,
    pub subscribers: usize,
}

enum RoomRequest {
    Join {
        user: UserId,
        reply: oneshot::Sender<mpsc::UnboundedReceiver<RoomMessage>>,
    },
    Command {
        user: UserId,
        command: Command,
        predicted: bool,
    },
    Sync {
        user: UserId,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
    Status {
        reply: oneshot::Sender<RoomStatus>,
    },
    Dump {
        reply: oneshot::Sender<Result<Vec<u8>, NodeError>>,
    },
}

/// Cloneable sender side of a room.
#[derive(Clone, Debug)]
pub struct RoomHandle {
    tx: mpsc::Sender<RoomRequest>,
}

impl RoomHandle {
    /// Registers a subscriber. The first message on the returned channel is the current state.
    pub async fn join(&self, user: UserId) -> Result<mpsc::UnboundedReceiver<RoomMessage>, NodeError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(RoomRequest::Join { user, reply }).await?;
        Ok(rx.await?)
    }

    pub async fn command(&self, user: UserId, command: Command, predicted: bool) -> Result<(), NodeError> {
        self.tx
            .send(RoomRequest::Command {
                user,
                command,
                predicted,
            })
            .await?;
        Ok(())
    }

    /// Asks for a fresh `StateSet` for every subscription of `user`.
    pub async fn sync(&self, user: UserId) -> Result<(), NodeError> {
        self.tx.send(RoomRequest::Sync { user }).await?;
        Ok(())
    }

    /// Starts the canvas over and pushes the blank state to everyone.
    pub async fn reset(&self) -> Result<(), NodeError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(RoomRequest::Reset { reply }).await?;
        Ok(rx.await?)
    }

    pub async fn status(&self) -> Result<RoomStatus, NodeError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(RoomRequest::Status { reply }).await?;
        Ok(rx.await?)
    }

    /// Encoded sync state, as a joining client would receive it.
    pub async fn dump(&self) -> Result<Vec<u8>, NodeError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(RoomRequest::Dump { reply }).await?;
        rx.await?
    }
}

struct Subscriber {
    user: UserId,
    tx: mpsc::UnboundedSender<RoomMessage>,
}

/// Feeds history notifications into metrics.
struct RoomMetrics;

impl HistoryObserver for RoomMetrics {
    fn on_history_wiped(&mut self, evicted: &[CanvasEvent]) {
        metrics::increment_counter!(telemetry::HISTORY_COMPACTIONS);
        tracing::debug!("Room: folded {} events into the checkpoint", evicted.len());
    }

    fn on_history_broken(&mut self, error: &ReconciliationError) {
        tracing::error!("Room: history discarded: {}", error);
    }
}

pub struct Room {
    history: HistoryManager,
    interpreter: CommandInterpreter,
    subscribers: Vec<Subscriber>,
    config: NodeConfig,
    factory: SharedFactory,
}

impl Room {
    pub fn new(config: NodeConfig, factory: SharedFactory) -> Result<Self, NodeError> {
        let (history, interpreter) = Self::fresh(&config, &factory)?;
        Ok(Self {
            history,
            interpreter,
            subscribers: Vec::new(),
            config,
            factory,
        })
    }

    fn fresh(config: &NodeConfig, factory: &SharedFactory) -> Result<(HistoryManager, CommandInterpreter), NodeError> {
        let model = CanvasModel::with_layers(config.canvas_size(), config.initial_layers, factory.as_ref());
        let mut history =
            HistoryManager::new(model, factory.clone(), config.history).map_err(KernelError::from)?;
        history.add_observer(Box::new(RoomMetrics));
        let validator = CommandValidator::new(EventRevoker::new(config.revoke_policy.clone()));
        let interpreter = CommandInterpreter::resume(&history, validator);
        Ok((history, interpreter))
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    /// Moves the room onto its own task.
    pub fn spawn(self) -> RoomHandle {
        let (tx, rx) = mpsc::channel(self.config.room_queue);
        tokio::spawn(self.run(rx));
        RoomHandle { tx }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<RoomRequest>) {
        tracing::info!(
            "Room open: {}x{} with {} layers",
            self.config.width,
            self.config.height,
            self.config.initial_layers
        );
        while let Some(request) = rx.recv().await {
            self.handle(request);
        }
        tracing::info!("Room closed after {} retained events", self.history.real_history().count());
    }

    fn handle(&mut self, request: RoomRequest) {
        match request {
            RoomRequest::Join { user, reply } => {
                let (tx, rx) = mpsc::unbounded_channel();
                match self.encoded_state() {
                    Ok(state) => {
                        let _ = tx.send(RoomMessage::StateSet(state));
                        metrics::increment_counter!(telemetry::RESYNCS);
                    }
                    Err(e) => tracing::error!("Room: cannot encode state for {}: {}", user, e),
                }
                tracing::info!("Room: {} joined", user);
                self.subscribers.push(Subscriber { user, tx });
                let _ = reply.send(rx);
            }
            RoomRequest::Command {
                user,
                command,
                predicted,
            } => self.on_command(user, command, predicted),
            RoomRequest::Sync { user } => match self.encoded_state() {
                Ok(state) => {
                    tracing::info!("Room: resync requested by {}", user);
                    metrics::increment_counter!(telemetry::RESYNCS);
                    self.send_to(&user, RoomMessage::StateSet(state));
                }
                Err(e) => tracing::error!("Room: cannot encode state for {}: {}", user, e),
            },
            RoomRequest::Reset { reply } => {
                match Self::fresh(&self.config, &self.factory) {
                    Ok((history, interpreter)) => {
                        self.history = history;
                        self.interpreter = interpreter;
                        tracing::info!("Room: canvas reset");
                        match self.encoded_state() {
                            Ok(state) => self.broadcast(RoomMessage::StateSet(state)),
                            Err(e) => tracing::error!("Room: cannot encode reset state: {}", e),
                        }
                    }
                    Err(e) => tracing::error!("Room: reset failed: {}", e),
                }
                let _ = reply.send(());
            }
            RoomRequest::Status { reply } => {
                let _ = reply.send(self.status());
            }
            RoomRequest::Dump { reply } => {
                let _ = reply.send(self.encoded_state().map(|s| s.as_ref().clone()));
            }
        }
    }

    fn on_command(&mut self, user: UserId, command: Command, predicted: bool) {
        match self.interpreter.command(&mut self.history, &user, command.clone()) {
            Ok(event) => {
                metrics::increment_counter!(telemetry::EVENTS_APPLIED);
                tracing::debug!("Room: {} {} by {}", event.id, event.kind.event_type(), user);
                self.broadcast(RoomMessage::Event(event));
            }
            Err(e) => {
                metrics::increment_counter!(telemetry::COMMANDS_REJECTED);
                tracing::debug!("Room: rejected {} from {}: {}", command.name(), user, e);
                let reason = e.to_string();
                self.send_to(
                    &user,
                    RoomMessage::Rejected {
                        command,
                        predicted,
                        reason,
                    },
                );
            }
        }
    }

    pub fn status(&self) -> RoomStatus {
        RoomStatus {
            hash: hash_model(self.history.model()),
            retained: self.history.real_history().count(),
            next_event_id: self.interpreter.next_event_id(),
            subscribers: self.subscribers.len(),
        }
    }

    fn encoded_state(&self) -> Result<Arc<Vec<u8>>, NodeError> {
        Ok(Arc::new(encode_sync_state(&self.history.sync_state())?))
    }

    /// Delivers in registration order and forgets subscribers whose receiver is gone.
    fn broadcast(&mut self, message: RoomMessage) {
        self.subscribers.retain(|s| s.tx.send(message.clone()).is_ok());
    }

    fn send_to(&mut self, user: &UserId, message: RoomMessage) {
        self.subscribers
            .retain(|s| &s.user != user || s.tx.send(message.clone()).is_ok());
    }
}
