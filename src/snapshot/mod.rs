// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Transferable canvas state.
//!
//! A `CanvasSnapshot` is a backend-neutral copy of a `CanvasModel`: every
//! raster is stored as its `serialize_to_bytes` output. A `SyncState` pairs
//! the authority's checkpoint snapshot with its confirmed history and is what
//! a joining or resyncing client installs.

pub mod encode;
pub mod decode;
pub mod hash;

use serde::{Deserialize, Serialize};

use crate::canvas::layer::LayerModel;
use crate::canvas::model::CanvasModel;
use crate::error::{KernelResult, RasterError};
use crate::event::CanvasEvent;
use crate::history::HistoryManager;
use crate::proxy::CanvasProxyFactory;
use crate::types::geometry::Size;
use crate::types::id::LayerId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSnapshot {
    pub id: LayerId,
    pub name: String,
    pub image: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSnapshot {
    pub size: Size,
    /// Bottom to top.
    pub layers: Vec<LayerSnapshot>,
    pub order: Vec<LayerId>,
}

impl CanvasSnapshot {
    pub fn capture(model: &CanvasModel) -> Self {
        Self {
            size: model.size(),
            layers: model
                .layers_in_order()
                .map(|layer| LayerSnapshot {
                    id: layer.id,
                    name: layer.name.clone(),
                    image: layer.raster().serialize_to_bytes(),
                })
                .collect(),
            order: model.order().to_vec(),
        }
    }

    /// Rebuilds a model with surfaces from `factory`.
    pub fn restore(&self, factory: &dyn CanvasProxyFactory) -> KernelResult<CanvasModel> {
        let mut model = CanvasModel::new(self.size);
        for layer in &self.layers {
            let raster = factory.from_bytes(&layer.image)?;
            if raster.size() != self.size {
                let found = raster.size();
                return Err(RasterError::SizeMismatch {
                    expected_w: self.size.width,
                    expected_h: self.size.height,
                    found_w: found.width,
                    found_h: found.height,
                }
                .into());
            }
            model.insert_layer(LayerModel::new(layer.id, layer.name.clone(), raster));
        }
        model.set_layer_order(&self.order)?;
        Ok(model)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub checkpoint: CanvasSnapshot,
    pub history: Vec<CanvasEvent>,
}

impl SyncState {
    /// Checkpoint and confirmed history of `history`. Predictions are never transferred.
    pub fn capture(history: &HistoryManager) -> Self {
        Self {
            checkpoint: CanvasSnapshot::capture(history.checkpoint()),
            history: history.real_history().cloned().collect(),
        }
    }

    /// Replays the state from scratch into a standalone model.
    pub fn replay(&self, factory: &dyn CanvasProxyFactory) -> KernelResult<CanvasModel> {
        let mut model = self.checkpoint.restore(factory)?;
        crate::executor::replay(&mut model, factory, &self.history)?;
        Ok(model)
    }
}
