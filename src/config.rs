// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Configuration constants.

use serde::{Deserialize, Serialize};

use crate::event::EventKind;

/// Name given to freshly created layers.
pub const DEFAULT_LAYER_NAME: &str = "New layer";

/// Cost of an ordinary history entry (draws, layer edits).
pub const DEFAULT_EVENT_COST: u64 = 10;

/// Cost of a revoke/restore marker. Markers are small and frequent.
pub const DEFAULT_MARKER_COST: u64 = 1;

/// Total retained cost before compaction starts evicting.
/// 500 keeps about fifty ordinary events of undo depth.
pub const DEFAULT_COST_CEILING: u64 = 500;

/// Tuning knobs for history compaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub cost_ceiling: u64,
    pub event_cost: u64,
    pub marker_cost: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            cost_ceiling: DEFAULT_COST_CEILING,
            event_cost: DEFAULT_EVENT_COST,
            marker_cost: DEFAULT_MARKER_COST,
        }
    }
}

impl HistoryConfig {
    pub fn cost_of(&self, kind: &EventKind) -> u64 {
        if kind.is_marker() {
            self.marker_cost
        } else {
            self.event_cost
        }
    }
}
