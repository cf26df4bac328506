// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Command validation against the current canvas and history.
//!
//! Used by the authority before stamping a command and by clients before
//! sending and predicting one.

use crate::canvas::model::CanvasModel;
use crate::error::ValidationError;
use crate::revoker::EventRevoker;
use crate::state::command::Command;
use crate::timeline::Timeline;
use crate::types::id::UserId;

#[derive(Clone, Debug, Default)]
pub struct CommandValidator {
    revoker: EventRevoker,
}

impl CommandValidator {
    pub fn new(revoker: EventRevoker) -> Self {
        Self { revoker }
    }

    pub fn revoker(&self) -> &EventRevoker {
        &self.revoker
    }

    pub fn validate(
        &self,
        model: &CanvasModel,
        timeline: &Timeline,
        user: &UserId,
        cmd: &Command,
    ) -> Result<(), ValidationError> {
        match cmd {
            Command::CreateLayer => Ok(()),
            Command::RemoveLayer { layer } | Command::DrawLayer { layer, .. } => {
                if model.contains(*layer) {
                    Ok(())
                } else {
                    Err(ValidationError::UnknownLayer(*layer))
                }
            }
            Command::SetLayerOrder { order } => model.validate_order(order),
            Command::RevokeEvent { event_id } => {
                if self.revoker.is_revokable(timeline, user, *event_id) {
                    Ok(())
                } else {
                    Err(ValidationError::NotRevokable(*event_id))
                }
            }
            Command::RestoreEvent { event_id } => {
                if self.revoker.is_restorable(timeline, user, *event_id) {
                    Ok(())
                } else {
                    Err(ValidationError::NotRestorable(*event_id))
                }
            }
        }
    }
}
