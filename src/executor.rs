// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event Executor - the only way events touch a canvas
//!
//! Holds the live canvas and the checkpoint it is derived from.
//!
//! - Atomic events mutate the live model directly.
//! - Compound events (revoke/restore) flip a flag in the retained history and
//!   re-derive the live model from the checkpoint. The replay runs on a clone,
//!   so a failure leaves the live model untouched and only the flag change has
//!   to be undone.
//! - Evicted history is folded into the checkpoint. If that fails the history
//!   is broken: it is dropped and the checkpoint is rebuilt from the live model.
//!
//! # Invariants
//! - live == checkpoint + replayable events of the merged history
//! - A rolled back event leaves both model and timeline as they were

use crate::canvas::drawer::CanvasDrawer;
use crate::canvas::model::CanvasModel;
use crate::error::{ExecutionError, RasterError, ReconciliationError};
use crate::event::{CanvasEvent, EventClass, EventKind};
use crate::proxy::{CanvasProxyFactory, SharedFactory};
use crate::timeline::Timeline;

/// Result of handing one event to the history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Event executed and retained
    Applied,

    /// Confirmed event matched the oldest prediction; nothing re-rendered
    Promoted,

    /// Predictions were discarded and the canvas re-derived before applying
    Reconciled,

    /// Event failed and left no trace
    RolledBack,
}

impl ApplyOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, ApplyOutcome::RolledBack)
    }
}

/// Applies an atomic event to `model`. Markers are rejected.
pub fn play(model: &mut CanvasModel, factory: &dyn CanvasProxyFactory, kind: &EventKind) -> Result<(), ExecutionError> {
    match kind {
        EventKind::LayerCreated { layer_id } => {
            model.create_layer(*layer_id, factory);
        }
        EventKind::LayerRemoved { layer_id } => {
            model.remove_layer(*layer_id)?;
        }
        EventKind::LayerDrawn { layer_id, draw } => {
            let layer = model
                .layer_mut(*layer_id)
                .ok_or(ExecutionError::LayerNotFound(*layer_id))?;
            layer.draw(draw)?;
        }
        EventKind::LayerOrderChanged { order } => {
            model.set_layer_order(order)?;
        }
        EventKind::EventRevoked { .. } | EventKind::EventRestored { .. } => {
            return Err(ExecutionError::NotPlayable(kind.event_type()));
        }
    }
    Ok(())
}

/// Replays the replayable subset of `events` onto `model`.
pub fn replay<'a>(
    model: &mut CanvasModel,
    factory: &dyn CanvasProxyFactory,
    events: impl IntoIterator<Item = &'a CanvasEvent>,
) -> Result<(), ExecutionError> {
    for event in events {
        if event.is_replayable() {
            play(model, factory, &event.kind)?;
        }
    }
    Ok(())
}

#[derive(Debug)]
pub struct EventExecutor {
    live: CanvasDrawer,
    checkpoint: CanvasModel,
    factory: SharedFactory,
}

impl EventExecutor {
    /// Executor whose checkpoint is a copy of `model`.
    pub fn new(model: CanvasModel, factory: SharedFactory) -> Result<Self, RasterError> {
        let checkpoint = model.clone_with(factory.as_ref())?;
        Ok(Self {
            live: CanvasDrawer::new(model, factory.clone()),
            checkpoint,
            factory,
        })
    }

    pub fn drawer(&self) -> &CanvasDrawer {
        &self.live
    }

    /// Presentation-only access (visibility).
    pub fn drawer_mut(&mut self) -> &mut CanvasDrawer {
        &mut self.live
    }

    pub fn model(&self) -> &CanvasModel {
        self.live.model()
    }

    pub fn checkpoint(&self) -> &CanvasModel {
        &self.checkpoint
    }

    pub fn factory(&self) -> &SharedFactory {
        &self.factory
    }

    /// Applies `event` to the live model.
    ///
    /// The event itself is not appended to `timeline`; compound events only
    /// flip the flag of their target inside it.
    pub fn execute_event(&mut self, event: &CanvasEvent, timeline: &mut Timeline) -> ApplyOutcome {
        let result = match event.class() {
            EventClass::Atomic => self.apply_atomic(&event.kind),
            EventClass::Compound => {
                let saved = timeline.clone();
                let result = self.apply_compound(&event.kind, timeline);
                if result.is_err() {
                    *timeline = saved;
                }
                result
            }
        };

        match result {
            Ok(()) => ApplyOutcome::Applied,
            Err(e) => {
                tracing::warn!("Event {} ({}) rolled back: {}", event.id, event.kind.event_type(), e);
                ApplyOutcome::RolledBack
            }
        }
    }

    fn apply_atomic(&mut self, kind: &EventKind) -> Result<(), ExecutionError> {
        play(self.live.model_mut(), self.factory.as_ref(), kind)?;
        self.live.sync_controllers();
        Ok(())
    }

    fn apply_compound(&mut self, kind: &EventKind, timeline: &mut Timeline) -> Result<(), ExecutionError> {
        let (target, revoked) = match kind {
            EventKind::EventRevoked { event_id } => (*event_id, true),
            EventKind::EventRestored { event_id } => (*event_id, false),
            _ => return Err(ExecutionError::NotPlayable(kind.event_type())),
        };

        let entry = timeline
            .find_merged_mut(target)
            .ok_or(ExecutionError::EventNotFound(target))?;
        entry.is_revoked = revoked;

        self.force_re_execute(timeline)
    }

    /// Rebuilds the live model from the checkpoint and the merged history.
    /// On failure the live model is left as it was.
    pub fn force_re_execute(&mut self, timeline: &Timeline) -> Result<(), ExecutionError> {
        let mut model = self.checkpoint.clone_with(self.factory.as_ref())?;
        replay(&mut model, self.factory.as_ref(), timeline.merged())?;
        debug_assert!(model.check_invariants());

        self.live.set_model(model);
        tracing::debug!("Re-executed {} retained events from checkpoint", timeline.len());
        Ok(())
    }

    /// Folds evicted events into the checkpoint. The live model is not touched.
    pub fn apply_wiped_events(
        &mut self,
        events: &[CanvasEvent],
        timeline: &mut Timeline,
    ) -> Result<(), ReconciliationError> {
        if let Err(source) = replay(&mut self.checkpoint, self.factory.as_ref(), events) {
            let err = ReconciliationError::Compaction {
                count: events.len(),
                source,
            };
            tracing::error!("History broken: {}", err);
            self.break_history(timeline);
            return Err(err);
        }
        Ok(())
    }

    /// Drops the retained history and takes the live model as the new checkpoint.
    pub fn break_history(&mut self, timeline: &mut Timeline) {
        timeline.break_history();
        match self.live.clone_model() {
            Ok(model) => self.checkpoint = model,
            Err(e) => tracing::error!("Could not rebuild checkpoint from live canvas: {}", e),
        }
    }

    /// Installs a new checkpoint. Callers re-derive the live model afterwards.
    pub fn reset_checkpoint(&mut self, checkpoint: CanvasModel) {
        self.checkpoint = checkpoint;
    }
}
