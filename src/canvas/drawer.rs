// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Live canvas plus per-layer presentation state.

use rustc_hash::FxHashMap;

use crate::canvas::model::CanvasModel;
use crate::error::{ExecutionError, RasterError, ValidationError};
use crate::proxy::{CanvasProxy, SharedFactory};
use crate::state::command::DrawCommand;
use crate::types::id::LayerId;

/// Presentation state of one layer. Never part of the synced model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerController {
    pub visible: bool,
}

impl Default for LayerController {
    fn default() -> Self {
        Self { visible: true }
    }
}

#[derive(Debug)]
pub struct CanvasDrawer {
    model: CanvasModel,
    controllers: FxHashMap<LayerId, LayerController>,
    factory: SharedFactory,
}

impl CanvasDrawer {
    pub fn new(model: CanvasModel, factory: SharedFactory) -> Self {
        let controllers = model
            .order()
            .iter()
            .map(|id| (*id, LayerController::default()))
            .collect();
        Self {
            model,
            controllers,
            factory,
        }
    }

    pub fn model(&self) -> &CanvasModel {
        &self.model
    }

    pub(crate) fn model_mut(&mut self) -> &mut CanvasModel {
        &mut self.model
    }

    pub fn factory(&self) -> &SharedFactory {
        &self.factory
    }

    pub fn controller(&self, id: LayerId) -> Option<&LayerController> {
        self.controllers.get(&id)
    }

    pub fn is_visible(&self, id: LayerId) -> bool {
        self.controllers.get(&id).map_or(false, |c| c.visible)
    }

    /// Idempotent: an existing layer keeps its raster and controller.
    pub fn create_layer(&mut self, id: LayerId) -> &LayerController {
        self.model.create_layer(id, self.factory.as_ref());
        self.controllers.entry(id).or_default()
    }

    pub fn remove_layer(&mut self, id: LayerId) -> Result<(), ExecutionError> {
        self.model.remove_layer(id)?;
        self.controllers.remove(&id);
        Ok(())
    }

    pub fn set_layer_order(&mut self, order: &[LayerId]) -> Result<(), ValidationError> {
        self.model.set_layer_order(order)
    }

    pub fn draw_layer(&mut self, id: LayerId, cmd: &DrawCommand) -> Result<(), ExecutionError> {
        let layer = self.model.layer_mut(id).ok_or(ExecutionError::LayerNotFound(id))?;
        layer.draw(cmd)?;
        Ok(())
    }

    pub fn set_layer_visibility(&mut self, id: LayerId, visible: bool) -> Result<(), ExecutionError> {
        let controller = self
            .controllers
            .get_mut(&id)
            .ok_or(ExecutionError::LayerNotFound(id))?;
        controller.visible = visible;
        Ok(())
    }

    /// Swaps in a new model. Layers whose id survives keep their visibility.
    pub fn set_model(&mut self, model: CanvasModel) {
        self.model = model;
        self.sync_controllers();
    }

    /// Drops controllers of vanished layers and adds defaults for new ones.
    pub(crate) fn sync_controllers(&mut self) {
        let model = &self.model;
        self.controllers.retain(|id, _| model.contains(*id));
        for id in model.order() {
            self.controllers.entry(*id).or_default();
        }
    }

    pub fn clone_model(&self) -> Result<CanvasModel, RasterError> {
        self.model.clone_with(self.factory.as_ref())
    }

    /// Independent copy of the model together with the current visibility flags.
    pub fn snapshot(&self) -> Result<CanvasDrawer, RasterError> {
        Ok(CanvasDrawer {
            model: self.clone_model()?,
            controllers: self.controllers.clone(),
            factory: self.factory.clone(),
        })
    }

    /// Composites every visible layer bottom to top onto a cleared `target`.
    pub fn render(&self, target: &mut dyn CanvasProxy) -> Result<(), RasterError> {
        target.clear()?;
        self.composite_range(target, 0, self.model.len())
    }

    /// Composites visible layers at order positions `from..to` onto `target` without clearing it.
    pub fn composite_range(&self, target: &mut dyn CanvasProxy, from: usize, to: usize) -> Result<(), RasterError> {
        let order = self.model.order();
        let to = to.min(order.len());
        for id in order.iter().take(to).skip(from) {
            if !self.is_visible(*id) {
                continue;
            }
            if let Some(layer) = self.model.layer(*id) {
                target.composite_from(layer.raster())?;
            }
        }
        Ok(())
    }
}
