// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Canvas events as primary truth
//!
//! Every change to a shared canvas is expressed as a `CanvasEvent` stamped by
//! the authority. Replaying the same retained events on top of the same
//! checkpoint yields the same rasters on every participant.
//!
//! # Invariants
//! - Ids are unique and increase in submission order within one authority
//! - Events are immutable once created, except for `is_revoked`
//! - Revoke/restore markers never touch rasters directly

use serde::{Deserialize, Serialize};

use crate::state::command::DrawCommand;
use crate::types::enums::EventKindTag;
use crate::types::id::{EventId, LayerId, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    LayerCreated {
        layer_id: LayerId,
    },
    LayerRemoved {
        layer_id: LayerId,
    },
    LayerDrawn {
        layer_id: LayerId,
        draw: DrawCommand,
    },
    LayerOrderChanged {
        order: Vec<LayerId>,
    },
    EventRevoked {
        event_id: EventId,
    },
    EventRestored {
        event_id: EventId,
    },
}

/// How an event must be applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventClass {
    /// One independent mutation of the live model.
    Atomic,
    /// Needs the whole canvas re-derived from the checkpoint.
    Compound,
}

impl EventKind {
    pub fn tag(&self) -> EventKindTag {
        match self {
            EventKind::LayerCreated { .. } => EventKindTag::LayerCreated,
            EventKind::LayerRemoved { .. } => EventKindTag::LayerRemoved,
            EventKind::LayerDrawn { .. } => EventKindTag::LayerDrawn,
            EventKind::LayerOrderChanged { .. } => EventKindTag::LayerOrderChanged,
            EventKind::EventRevoked { .. } => EventKindTag::EventRevoked,
            EventKind::EventRestored { .. } => EventKindTag::EventRestored,
        }
    }

    /// Returns a human-readable description of the event type
    pub fn event_type(&self) -> &'static str {
        self.tag().name()
    }

    pub fn class(&self) -> EventClass {
        match self {
            EventKind::EventRevoked { .. } | EventKind::EventRestored { .. } => EventClass::Compound,
            _ => EventClass::Atomic,
        }
    }

    /// Revoke and restore markers.
    pub fn is_marker(&self) -> bool {
        self.class() == EventClass::Compound
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasEvent {
    pub id: EventId,
    pub user_id: UserId,
    pub is_revoked: bool,
    pub kind: EventKind,
}

impl CanvasEvent {
    pub fn new(id: EventId, user_id: UserId, kind: EventKind) -> Self {
        Self {
            id,
            user_id,
            is_revoked: false,
            kind,
        }
    }

    /// A client-side prediction awaiting its authoritative twin.
    pub fn speculative(user_id: UserId, kind: EventKind) -> Self {
        Self::new(EventId::PLACEHOLDER, user_id, kind)
    }

    pub fn class(&self) -> EventClass {
        self.kind.class()
    }

    /// True when `self` (a prediction) and `confirmed` describe the same change.
    /// Ids are ignored: predictions carry a placeholder.
    pub fn is_equivalent(&self, confirmed: &CanvasEvent) -> bool {
        self.user_id == confirmed.user_id && self.kind == confirmed.kind
    }

    /// Whether replay should apply this event's raster effect.
    pub fn is_replayable(&self) -> bool {
        !self.is_revoked && !self.kind.is_marker()
    }
}
