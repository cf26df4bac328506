// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Canvas Command enum definitions.
//!
//! Commands are unordered user intents. They are validated and turned into
//! `CanvasEvent`s by the authority and are never persisted themselves.

use serde::{Deserialize, Serialize};

use crate::types::geometry::{Color, Position, Size};
use crate::types::id::{EventId, LayerId};

/// A single raster mutation of one layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawCommand {
    Stroke {
        positions: Vec<Position>,
        color: Color,
        width: u32,
    },
    Erase {
        positions: Vec<Position>,
        opacity: u8,
        width: u32,
    },
    Clear,
    FillRect {
        position: Position,
        size: Size,
        color: Color,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    CreateLayer,
    RemoveLayer {
        layer: LayerId,
    },
    DrawLayer {
        layer: LayerId,
        draw: DrawCommand,
    },
    RevokeEvent {
        event_id: EventId,
    },
    RestoreEvent {
        event_id: EventId,
    },
    SetLayerOrder {
        order: Vec<LayerId>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateLayer => "createLayer",
            Command::RemoveLayer { .. } => "removeLayer",
            Command::DrawLayer { .. } => "drawLayer",
            Command::RevokeEvent { .. } => "revokeEvent",
            Command::RestoreEvent { .. } => "restoreEvent",
            Command::SetLayerOrder { .. } => "setLayerOrder",
        }
    }
}
