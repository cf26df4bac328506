// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Undo and redo command generation.
//!
//! Undo revokes the newest live event of a user. Redo restores the target of
//! the newest revoke marker of a user whose target is still revoked. Both are
//! computed from the retained history, so nothing older than the checkpoint
//! can be undone.

use serde::{Deserialize, Serialize};

use crate::event::{CanvasEvent, EventKind};
use crate::state::command::Command;
use crate::timeline::Timeline;
use crate::types::enums::EventKindTag;
use crate::types::id::{EventId, UserId};

/// Event kinds that may never be revoked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevokePolicy {
    pub unrevokable: Vec<EventKindTag>,
}

impl Default for RevokePolicy {
    fn default() -> Self {
        Self {
            unrevokable: vec![
                EventKindTag::EventRevoked,
                EventKindTag::EventRestored,
                EventKindTag::LayerCreated,
            ],
        }
    }
}

impl RevokePolicy {
    pub fn allows(&self, kind: &EventKind) -> bool {
        !kind.is_marker() && !self.unrevokable.contains(&kind.tag())
    }
}

#[derive(Clone, Debug, Default)]
pub struct EventRevoker {
    policy: RevokePolicy,
}

impl EventRevoker {
    pub fn new(policy: RevokePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RevokePolicy {
        &self.policy
    }

    /// Revokes the newest non-marker, non-revoked event of `user`, if its kind allows it.
    pub fn create_undo_command(&self, timeline: &Timeline, user: &UserId) -> Option<Command> {
        let pending_non_revoke = timeline
            .speculative()
            .iter()
            .any(|e| !matches!(e.kind, EventKind::EventRevoked { .. }));
        if pending_non_revoke {
            return None;
        }

        // Unrevokable kinds (markers included) are skipped, not a stopping point.
        timeline
            .confirmed()
            .iter()
            .rev()
            .find(|e| e.user_id == *user && !e.is_revoked && self.policy.allows(&e.kind))
            .map(|e| Command::RevokeEvent { event_id: e.id })
    }

    /// Restores the target of the newest revoke marker of `user` that is still in effect.
    pub fn create_redo_command(&self, timeline: &Timeline, user: &UserId) -> Option<Command> {
        if has_pending_edit(timeline) {
            return None;
        }

        timeline
            .confirmed()
            .iter()
            .rev()
            .filter(|e| e.user_id == *user)
            .find_map(|marker| match marker.kind {
                EventKind::EventRevoked { event_id } if self.is_restorable(timeline, user, event_id) => {
                    Some(Command::RestoreEvent { event_id })
                }
                _ => None,
            })
    }

    pub fn is_revokable(&self, timeline: &Timeline, user: &UserId, id: EventId) -> bool {
        timeline
            .find(id)
            .is_some_and(|e| owned_by(e, user) && !e.is_revoked && self.policy.allows(&e.kind))
    }

    pub fn is_restorable(&self, timeline: &Timeline, user: &UserId, id: EventId) -> bool {
        timeline
            .find(id)
            .is_some_and(|e| owned_by(e, user) && e.is_revoked && !e.kind.is_marker())
    }
}

fn owned_by(event: &CanvasEvent, user: &UserId) -> bool {
    event.user_id == *user
}

/// A pending drawing prediction has no id yet and cannot be targeted.
fn has_pending_edit(timeline: &Timeline) -> bool {
    timeline.speculative().iter().any(|e| !e.kind.is_marker())
}
