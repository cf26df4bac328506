// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Client-side optimistic history.
//!
//! Local edits are applied immediately as predictions and queued. Each
//! confirmed event from the authority is matched against the oldest
//! prediction: a match is promoted as is, a mismatch throws away every
//! prediction and re-derives the canvas before applying the confirmed event.

use crate::canvas::drawer::CanvasDrawer;
use crate::canvas::model::CanvasModel;
use crate::error::ReconciliationError;
use crate::event::{CanvasEvent, EventKind};
use crate::executor::ApplyOutcome;
use crate::history::{HistoryManager, HistoryObserver};
use crate::timeline::Timeline;

#[derive(Debug)]
pub struct VirtualHistoryManager {
    history: HistoryManager,
}

impl VirtualHistoryManager {
    pub fn new(history: HistoryManager) -> Self {
        Self { history }
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryManager {
        &mut self.history
    }

    pub fn into_inner(self) -> HistoryManager {
        self.history
    }

    pub fn add_observer(&mut self, observer: Box<dyn HistoryObserver>) {
        self.history.add_observer(observer);
    }

    pub fn model(&self) -> &CanvasModel {
        self.history.model()
    }

    pub fn drawer(&self) -> &CanvasDrawer {
        self.history.drawer()
    }

    pub fn timeline(&self) -> &Timeline {
        self.history.timeline()
    }

    pub fn pending(&self) -> usize {
        self.history.timeline().speculative().len()
    }

    /// Applies a local prediction and queues it.
    pub fn virtual_event(&mut self, event: CanvasEvent) -> ApplyOutcome {
        debug_assert!(event.id.is_placeholder(), "predictions carry the placeholder id");
        self.history.execute_speculative(event)
    }

    /// Handles a confirmed event from the authority.
    pub fn event(&mut self, confirmed: CanvasEvent) -> ApplyOutcome {
        let matches = match self.history.timeline().speculative().front() {
            None => return self.history.event(confirmed),
            Some(prediction) => prediction.is_equivalent(&confirmed),
        };

        if matches {
            self.history.timeline_mut().pop_speculative();
            tracing::debug!("Prediction confirmed as {}", confirmed.id);
            self.history.append_confirmed(confirmed);
            return ApplyOutcome::Promoted;
        }

        tracing::debug!(
            "Prediction mismatch at {} ({}); discarding {} predictions",
            confirmed.id,
            confirmed.kind.event_type(),
            self.pending()
        );
        // The confirmed event still applies to whatever the live canvas now is.
        if let Err(e) = self.discard_predictions() {
            tracing::warn!("Re-derivation after mismatch at {} failed: {}", confirmed.id, e);
        }
        match self.history.event(confirmed) {
            ApplyOutcome::RolledBack => ApplyOutcome::RolledBack,
            _ => ApplyOutcome::Reconciled,
        }
    }

    /// Throws away all predictions and re-derives the live model from the
    /// checkpoint and confirmed history. Returns how many were dropped.
    pub fn discard_predictions(&mut self) -> Result<usize, ReconciliationError> {
        let timeline = self.history.timeline_mut();
        let discarded = timeline.take_speculative();
        if discarded.is_empty() {
            return Ok(0);
        }

        // Undo flag flips newest first so chained revoke/restore unwind in order.
        for prediction in discarded.iter().rev() {
            let (target, was_revoked) = match prediction.kind {
                EventKind::EventRevoked { event_id } => (event_id, false),
                EventKind::EventRestored { event_id } => (event_id, true),
                _ => continue,
            };
            if let Some(entry) = timeline.find_merged_mut(target) {
                entry.is_revoked = was_revoked;
            }
        }

        self.history.re_execute()?;
        Ok(discarded.len())
    }
}
