// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event Timeline - retained history
//!
//! Maintains the distinction between:
//! - **confirmed** = events stamped by the authority, oldest first
//! - **speculative** = local predictions awaiting their confirmed twin
//!
//! # Semantics
//! - The merged history is confirmed followed by speculative
//! - Only `is_revoked` of a retained event is ever changed
//! - Eviction only ever takes confirmed events from the front

use std::collections::VecDeque;

use crate::event::CanvasEvent;
use crate::types::id::EventId;

#[derive(Clone, Debug, Default)]
pub struct Timeline {
    confirmed: VecDeque<CanvasEvent>,
    speculative: VecDeque<CanvasEvent>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timeline from a transferred history (resync scenario)
    pub fn from_confirmed(events: Vec<CanvasEvent>) -> Self {
        Self {
            confirmed: events.into(),
            speculative: VecDeque::new(),
        }
    }

    pub fn confirmed(&self) -> &VecDeque<CanvasEvent> {
        &self.confirmed
    }

    pub fn speculative(&self) -> &VecDeque<CanvasEvent> {
        &self.speculative
    }

    /// Confirmed events followed by speculative ones.
    pub fn merged(&self) -> impl DoubleEndedIterator<Item = &CanvasEvent> + '_ {
        self.confirmed.iter().chain(self.speculative.iter())
    }

    pub fn len(&self) -> usize {
        self.confirmed.len() + self.speculative.len()
    }

    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty() && self.speculative.is_empty()
    }

    pub fn has_pending(&self) -> bool {
        !self.speculative.is_empty()
    }

    pub fn last_confirmed_id(&self) -> Option<EventId> {
        self.confirmed.back().map(|e| e.id)
    }

    /// Finds a confirmed event by id. Speculative events carry no real id.
    pub fn find(&self, id: EventId) -> Option<&CanvasEvent> {
        if id.is_placeholder() {
            return None;
        }
        self.confirmed.iter().rev().find(|e| e.id == id)
    }

    pub(crate) fn find_merged_mut(&mut self, id: EventId) -> Option<&mut CanvasEvent> {
        if id.is_placeholder() {
            return None;
        }
        self.confirmed.iter_mut().rev().find(|e| e.id == id)
    }

    pub(crate) fn push_confirmed(&mut self, event: CanvasEvent) {
        self.confirmed.push_back(event);
    }

    pub(crate) fn push_speculative(&mut self, event: CanvasEvent) {
        self.speculative.push_back(event);
    }

    pub(crate) fn pop_speculative(&mut self) -> Option<CanvasEvent> {
        self.speculative.pop_front()
    }

    pub(crate) fn take_speculative(&mut self) -> VecDeque<CanvasEvent> {
        std::mem::take(&mut self.speculative)
    }

    pub(crate) fn pop_confirmed(&mut self) -> Option<CanvasEvent> {
        self.confirmed.pop_front()
    }

    /// Drops every retained event.
    pub(crate) fn break_history(&mut self) {
        self.confirmed.clear();
        self.speculative.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::types::id::{LayerId, UserId};

    fn created(id: u64) -> CanvasEvent {
        CanvasEvent::new(EventId(id), UserId::from("u"), EventKind::LayerCreated { layer_id: LayerId(id as u32) })
    }

    #[test]
    fn test_merged_order_is_confirmed_then_speculative() {
        let mut timeline = Timeline::from_confirmed(vec![created(0), created(1)]);
        timeline.push_speculative(CanvasEvent::speculative(
            UserId::from("u"),
            EventKind::LayerRemoved { layer_id: LayerId(0) },
        ));

        let ids: Vec<EventId> = timeline.merged().map(|e| e.id).collect();
        assert_eq!(ids, vec![EventId(0), EventId(1), EventId::PLACEHOLDER]);
        assert!(timeline.has_pending());
        assert_eq!(timeline.len(), 3);
    }

    #[test]
    fn test_find_ignores_placeholder() {
        let mut timeline = Timeline::new();
        timeline.push_speculative(CanvasEvent::speculative(
            UserId::from("u"),
            EventKind::LayerCreated { layer_id: LayerId(9) },
        ));
        assert!(timeline.find(EventId::PLACEHOLDER).is_none());
        assert!(timeline.find_merged_mut(EventId::PLACEHOLDER).is_none());
    }

    #[test]
    fn test_break_history_clears_both_queues() {
        let mut timeline = Timeline::from_confirmed(vec![created(0)]);
        timeline.push_speculative(created(1));
        timeline.break_history();
        assert!(timeline.is_empty());
        assert_eq!(timeline.last_confirmed_id(), None);
    }
}
