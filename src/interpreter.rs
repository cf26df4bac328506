// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Command Interpreter - the authority's command → event step
//!
//! Validates a command, stamps it with the next event id and hands the
//! resulting event to the history. Id counters only advance when the event
//! was actually applied, so a rejected command leaves no gap.

use crate::error::{KernelError, KernelResult};
use crate::event::{CanvasEvent, EventKind};
use crate::history::HistoryManager;
use crate::state::command::Command;
use crate::types::id::{EventId, LayerId, UserId};
use crate::validator::CommandValidator;

#[derive(Clone, Debug)]
pub struct CommandInterpreter {
    next_event_id: EventId,
    next_layer_id: LayerId,
    validator: CommandValidator,
}

impl CommandInterpreter {
    pub fn new(next_event_id: EventId, next_layer_id: LayerId, validator: CommandValidator) -> Self {
        Self {
            next_event_id,
            next_layer_id,
            validator,
        }
    }

    /// Interpreter continuing after the state held by `history`.
    pub fn resume(history: &HistoryManager, validator: CommandValidator) -> Self {
        let next_event_id = history
            .timeline()
            .last_confirmed_id()
            .map_or(EventId(0), |id| id.next());
        let next_layer_id = history
            .model()
            .max_layer_id()
            .map_or(LayerId(0), |id| id.next());
        Self::new(next_event_id, next_layer_id, validator)
    }

    pub fn next_event_id(&self) -> EventId {
        self.next_event_id
    }

    pub fn next_layer_id(&self) -> LayerId {
        self.next_layer_id
    }

    pub fn validator(&self) -> &CommandValidator {
        &self.validator
    }

    pub fn command(&mut self, history: &mut HistoryManager, user: &UserId, cmd: Command) -> KernelResult<CanvasEvent> {
        self.validator
            .validate(history.model(), history.timeline(), user, &cmd)?;

        let creates_layer = matches!(cmd, Command::CreateLayer);
        let kind = match cmd {
            Command::CreateLayer => EventKind::LayerCreated { layer_id: self.next_layer_id },
            Command::RemoveLayer { layer } => EventKind::LayerRemoved { layer_id: layer },
            Command::DrawLayer { layer, draw } => EventKind::LayerDrawn { layer_id: layer, draw },
            Command::RevokeEvent { event_id } => EventKind::EventRevoked { event_id },
            Command::RestoreEvent { event_id } => EventKind::EventRestored { event_id },
            Command::SetLayerOrder { order } => EventKind::LayerOrderChanged { order },
        };
        let event = CanvasEvent::new(self.next_event_id, user.clone(), kind);

        if !history.event(event.clone()).is_success() {
            return Err(KernelError::RolledBack);
        }

        self.next_event_id = self.next_event_id.next();
        if creates_layer {
            self.next_layer_id = self.next_layer_id.next();
        }
        tracing::debug!("{} stamped {} for {}", event.kind.event_type(), event.id, user);
        Ok(event)
    }
}

/// The prediction a client applies locally for `cmd`, if any.
///
/// Only commands whose event is fully determined by the command itself are
/// predicted; layer creation and reordering wait for the authority.
pub fn predict(user: &UserId, cmd: &Command) -> Option<CanvasEvent> {
    let kind = match cmd {
        Command::DrawLayer { layer, draw } => EventKind::LayerDrawn {
            layer_id: *layer,
            draw: draw.clone(),
        },
        Command::RevokeEvent { event_id } => EventKind::EventRevoked { event_id: *event_id },
        Command::RestoreEvent { event_id } => EventKind::EventRestored { event_id: *event_id },
        _ => return None,
    };
    Some(CanvasEvent::speculative(user.clone(), kind))
}
