// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! In-progress stroke preview.
//!
//! A preview composites three parts: the layers below the previewed layer,
//! a scratch copy of that layer with the pending draw applied, and the layers
//! above it. The two caches are tied to a model generation and rebuilt when
//! the committed canvas moves on. Committed layers are never written.

use crate::canvas::drawer::CanvasDrawer;
use crate::canvas::layer::LayerDrawer;
use crate::error::{ExecutionError, RasterError};
use crate::proxy::CanvasProxy;
use crate::state::command::DrawCommand;
use crate::types::id::LayerId;

#[derive(Debug)]
pub struct PreviewOverlay {
    layer: LayerId,
    generation: u64,
    draw: Option<DrawCommand>,
    below: Box<dyn CanvasProxy>,
    above: Box<dyn CanvasProxy>,
    scratch: Option<Box<dyn CanvasProxy>>,
}

impl PreviewOverlay {
    /// Starts a preview of `layer` against the drawer's current model.
    pub fn begin(drawer: &CanvasDrawer, layer: LayerId, generation: u64) -> Result<Self, ExecutionError> {
        let (below, above) = Self::build_caches(drawer, layer)?;
        Ok(Self {
            layer,
            generation,
            draw: None,
            below,
            above,
            scratch: None,
        })
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn draw_command(&self) -> Option<&DrawCommand> {
        self.draw.as_ref()
    }

    pub fn is_stale(&self, generation: u64) -> bool {
        self.generation != generation
    }

    /// Replaces the pending draw and re-renders the scratch layer.
    pub fn update(&mut self, drawer: &CanvasDrawer, draw: DrawCommand) -> Result<(), ExecutionError> {
        let committed = drawer
            .model()
            .layer(self.layer)
            .ok_or(ExecutionError::LayerNotFound(self.layer))?;
        let mut scratch = drawer.factory().duplicate(committed.raster())?;
        LayerDrawer::apply(scratch.as_mut(), &draw)?;
        self.scratch = Some(scratch);
        self.draw = Some(draw);
        Ok(())
    }

    /// Rebuilds caches after the committed canvas changed, keeping the pending draw.
    pub fn refresh(&mut self, drawer: &CanvasDrawer, generation: u64) -> Result<(), ExecutionError> {
        let (below, above) = Self::build_caches(drawer, self.layer)?;
        self.below = below;
        self.above = above;
        self.generation = generation;
        match self.draw.take() {
            Some(draw) => self.update(drawer, draw),
            None => {
                self.scratch = None;
                Ok(())
            }
        }
    }

    /// Composites the preview onto a cleared `target`.
    pub fn render(&self, drawer: &CanvasDrawer, target: &mut dyn CanvasProxy) -> Result<(), RasterError> {
        target.clear()?;
        target.composite_from(self.below.as_ref())?;
        if drawer.is_visible(self.layer) {
            match (&self.scratch, drawer.model().layer(self.layer)) {
                (Some(scratch), _) => target.composite_from(scratch.as_ref())?,
                (None, Some(committed)) => target.composite_from(committed.raster())?,
                (None, None) => {}
            }
        }
        target.composite_from(self.above.as_ref())
    }

    /// Drops the scratch surface. The caches go with `self`.
    pub fn end(self) -> Option<DrawCommand> {
        self.draw
    }

    fn build_caches(
        drawer: &CanvasDrawer,
        layer: LayerId,
    ) -> Result<(Box<dyn CanvasProxy>, Box<dyn CanvasProxy>), ExecutionError> {
        let model = drawer.model();
        let at = model.position_of(layer).ok_or(ExecutionError::LayerNotFound(layer))?;

        let mut below = drawer.factory().create(model.size());
        drawer.composite_range(below.as_mut(), 0, at)?;
        let mut above = drawer.factory().create(model.size());
        drawer.composite_range(above.as_mut(), at + 1, model.len())?;
        Ok((below, above))
    }
}
