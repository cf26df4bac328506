// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! History Manager - authoritative event log with bounded retention
//!
//! Every event goes through the executor first and is retained only if it
//! applied. Retention is bounded by a running cost total: once it passes the
//! ceiling, the oldest confirmed events are evicted and folded into the
//! checkpoint until the excess is covered.
//!
//! Compaction waits while predictions are pending, since a pending
//! revoke/restore may point at an event that would otherwise be evicted.

use crate::canvas::drawer::CanvasDrawer;
use crate::canvas::model::CanvasModel;
use crate::config::HistoryConfig;
use crate::error::{KernelResult, RasterError, ReconciliationError};
use crate::event::CanvasEvent;
use crate::executor::{ApplyOutcome, EventExecutor};
use crate::proxy::SharedFactory;
use crate::snapshot::SyncState;
use crate::timeline::Timeline;

/// Receives history notifications in registration order.
pub trait HistoryObserver: Send {
    fn on_event(&mut self, _event: &CanvasEvent) {}

    /// Retained history or live canvas changed in any way.
    fn on_history_changed(&mut self) {}

    /// `evicted` were folded into the checkpoint.
    fn on_history_wiped(&mut self, _evicted: &[CanvasEvent]) {}

    /// Retained history was discarded after a replay failure.
    fn on_history_broken(&mut self, _error: &ReconciliationError) {}
}

pub struct HistoryManager {
    executor: EventExecutor,
    timeline: Timeline,
    config: HistoryConfig,
    total_cost: u64,
    observers: Vec<Box<dyn HistoryObserver>>,
}

impl core::fmt::Debug for HistoryManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HistoryManager")
            .field("retained", &self.timeline.len())
            .field("total_cost", &self.total_cost)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl HistoryManager {
    pub fn new(model: CanvasModel, factory: SharedFactory, config: HistoryConfig) -> Result<Self, RasterError> {
        Ok(Self {
            executor: EventExecutor::new(model, factory)?,
            timeline: Timeline::new(),
            config,
            total_cost: 0,
            observers: Vec::new(),
        })
    }

    pub fn add_observer(&mut self, observer: Box<dyn HistoryObserver>) {
        self.observers.push(observer);
    }

    // --- Read APIs ---

    pub fn model(&self) -> &CanvasModel {
        self.executor.model()
    }

    pub fn checkpoint(&self) -> &CanvasModel {
        self.executor.checkpoint()
    }

    pub fn drawer(&self) -> &CanvasDrawer {
        self.executor.drawer()
    }

    pub fn drawer_mut(&mut self) -> &mut CanvasDrawer {
        self.executor.drawer_mut()
    }

    pub fn factory(&self) -> &SharedFactory {
        self.executor.factory()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Retained events, confirmed then speculative.
    pub fn merged_history(&self) -> impl DoubleEndedIterator<Item = &CanvasEvent> + '_ {
        self.timeline.merged()
    }

    /// Confirmed events only.
    pub fn real_history(&self) -> impl DoubleEndedIterator<Item = &CanvasEvent> + '_ {
        self.timeline.confirmed().iter()
    }

    pub fn total_cost(&self) -> u64 {
        self.total_cost
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    // --- Write Logic ---

    /// Executes a confirmed event and retains it on success.
    pub fn event(&mut self, event: CanvasEvent) -> ApplyOutcome {
        let outcome = self.executor.execute_event(&event, &mut self.timeline);
        if outcome == ApplyOutcome::RolledBack {
            return outcome;
        }
        self.append_confirmed(event);
        outcome
    }

    /// Executes a prediction and queues it as speculative on success.
    pub(crate) fn execute_speculative(&mut self, event: CanvasEvent) -> ApplyOutcome {
        let outcome = self.executor.execute_event(&event, &mut self.timeline);
        if outcome == ApplyOutcome::RolledBack {
            return outcome;
        }
        self.notify(|o| o.on_event(&event));
        self.timeline.push_speculative(event);
        self.notify(|o| o.on_history_changed());
        outcome
    }

    /// Retains an event whose effect is already on the live model.
    pub(crate) fn append_confirmed(&mut self, event: CanvasEvent) {
        self.total_cost += self.config.cost_of(&event.kind);
        self.notify(|o| o.on_event(&event));
        self.timeline.push_confirmed(event);
        self.compact();
        self.notify(|o| o.on_history_changed());
    }

    pub(crate) fn timeline_mut(&mut self) -> &mut Timeline {
        &mut self.timeline
    }

    /// Re-derives the live model from checkpoint and retained events.
    /// A failure breaks the history.
    pub fn re_execute(&mut self) -> Result<(), ReconciliationError> {
        match self.executor.force_re_execute(&self.timeline) {
            Ok(()) => {
                self.notify(|o| o.on_history_changed());
                Ok(())
            }
            Err(e) => {
                let err = ReconciliationError::ReExecution(e);
                tracing::error!("History broken: {}", err);
                self.break_history(&err);
                Err(err)
            }
        }
    }

    /// Installs a transferred checkpoint and confirmed history.
    /// Pending predictions are dropped.
    pub fn set_history(&mut self, checkpoint: CanvasModel, events: Vec<CanvasEvent>) -> Result<(), ReconciliationError> {
        let config = self.config;
        self.total_cost = events.iter().map(|e| config.cost_of(&e.kind)).sum();
        self.timeline = Timeline::from_confirmed(events);
        self.executor.reset_checkpoint(checkpoint);
        tracing::info!("History installed: {} events", self.timeline.len());
        self.re_execute()?;
        self.compact();
        Ok(())
    }

    /// Checkpoint plus confirmed history, for a joining or resyncing peer.
    pub fn sync_state(&self) -> SyncState {
        SyncState::capture(self)
    }

    /// Decodes the checkpoint with this manager's factory and installs the state.
    pub fn install_sync_state(&mut self, state: SyncState) -> KernelResult<()> {
        let checkpoint = state.checkpoint.restore(self.factory().as_ref())?;
        self.set_history(checkpoint, state.history)?;
        Ok(())
    }

    fn break_history(&mut self, error: &ReconciliationError) {
        self.executor.break_history(&mut self.timeline);
        self.total_cost = 0;
        self.notify(|o| o.on_history_broken(error));
        self.notify(|o| o.on_history_changed());
    }

    /// Evicts the oldest confirmed events while the cost total exceeds the ceiling.
    fn compact(&mut self) {
        if self.timeline.has_pending() || self.total_cost <= self.config.cost_ceiling {
            return;
        }

        let excess = self.total_cost - self.config.cost_ceiling;
        let mut evicted_cost = 0;
        let mut evicted = Vec::new();
        while evicted_cost < excess {
            match self.timeline.pop_confirmed() {
                Some(event) => {
                    evicted_cost += self.config.cost_of(&event.kind);
                    evicted.push(event);
                }
                None => break,
            }
        }
        self.total_cost -= evicted_cost;

        match self.executor.apply_wiped_events(&evicted, &mut self.timeline) {
            Ok(()) => {
                tracing::debug!("Compacted {} events into checkpoint (cost {})", evicted.len(), evicted_cost);
                self.notify(|o| o.on_history_wiped(&evicted));
            }
            Err(err) => {
                // Executor already dropped the timeline and rebuilt the checkpoint.
                self.total_cost = 0;
                self.notify(|o| o.on_history_broken(&err));
            }
        }
    }

    fn notify(&mut self, mut f: impl FnMut(&mut dyn HistoryObserver)) {
        for observer in self.observers.iter_mut() {
            f(observer.as_mut());
        }
    }
}
