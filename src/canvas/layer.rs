// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! A single raster layer.

use crate::config::DEFAULT_LAYER_NAME;
use crate::error::RasterError;
use crate::proxy::{CanvasProxy, CanvasProxyFactory};
use crate::state::command::DrawCommand;
use crate::types::geometry::Size;
use crate::types::id::LayerId;

#[derive(Debug)]
pub struct LayerModel {
    pub id: LayerId,
    pub name: String,
    raster: Box<dyn CanvasProxy>,
}

impl LayerModel {
    pub fn new(id: LayerId, name: impl Into<String>, raster: Box<dyn CanvasProxy>) -> Self {
        Self {
            id,
            name: name.into(),
            raster,
        }
    }

    /// Transparent layer with the default name.
    pub fn blank(id: LayerId, size: Size, factory: &dyn CanvasProxyFactory) -> Self {
        Self::new(id, DEFAULT_LAYER_NAME, factory.create(size))
    }

    pub fn raster(&self) -> &dyn CanvasProxy {
        self.raster.as_ref()
    }

    pub fn raster_mut(&mut self) -> &mut dyn CanvasProxy {
        self.raster.as_mut()
    }

    pub fn draw(&mut self, cmd: &DrawCommand) -> Result<(), RasterError> {
        LayerDrawer::apply(self.raster.as_mut(), cmd)
    }

    /// Deep copy into a surface allocated by `factory`.
    pub fn clone_with(&self, factory: &dyn CanvasProxyFactory) -> Result<LayerModel, RasterError> {
        Ok(LayerModel {
            id: self.id,
            name: self.name.clone(),
            raster: factory.duplicate(self.raster.as_ref())?,
        })
    }
}

/// Translates a `DrawCommand` into raster calls.
pub struct LayerDrawer;

impl LayerDrawer {
    pub fn apply(raster: &mut dyn CanvasProxy, cmd: &DrawCommand) -> Result<(), RasterError> {
        match cmd {
            DrawCommand::Stroke { positions, color, width } => raster.stroke(positions, *color, *width),
            DrawCommand::Erase { positions, opacity, width } => raster.erase(positions, *opacity, *width),
            DrawCommand::Clear => raster.clear(),
            DrawCommand::FillRect { position, size, color } => raster.fill_rect(*position, *size, *color),
        }
    }
}
