// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Raster backend seam.
//!
//! The engine never touches pixels directly. Every raster mutation goes
//! through `CanvasProxy`, and every surface is allocated by a
//! `CanvasProxyFactory`. Implementations must be deterministic: identical
//! inputs on identical surfaces produce identical bytes.

use core::any::Any;
use core::fmt;
use std::sync::Arc;

use crate::error::RasterError;
use crate::types::geometry::{Color, Position, Size};

pub trait CanvasProxy: Send + Sync + fmt::Debug {
    fn size(&self) -> Size;

    fn stroke(&mut self, positions: &[Position], color: Color, width: u32) -> Result<(), RasterError>;

    /// Reduces alpha along the path by `opacity` (255 erases fully).
    fn erase(&mut self, positions: &[Position], opacity: u8, width: u32) -> Result<(), RasterError>;

    fn clear(&mut self) -> Result<(), RasterError>;

    fn fill_rect(&mut self, position: Position, size: Size, color: Color) -> Result<(), RasterError>;

    /// Source-over composite of `other` onto `self`. Both surfaces must share a size.
    fn composite_from(&mut self, other: &dyn CanvasProxy) -> Result<(), RasterError>;

    fn serialize_to_bytes(&self) -> Vec<u8>;

    /// Lets a backend recognise its own surfaces in `composite_from`.
    fn as_any(&self) -> &dyn Any;
}

pub trait CanvasProxyFactory: Send + Sync + fmt::Debug {
    fn create(&self, size: Size) -> Box<dyn CanvasProxy>;

    /// Rebuilds a surface from `CanvasProxy::serialize_to_bytes` output.
    fn from_bytes(&self, bytes: &[u8]) -> Result<Box<dyn CanvasProxy>, RasterError>;

    /// Copies `source` into a freshly allocated surface sharing no storage with it.
    fn duplicate(&self, source: &dyn CanvasProxy) -> Result<Box<dyn CanvasProxy>, RasterError> {
        let mut copy = self.create(source.size());
        copy.composite_from(source)?;
        Ok(copy)
    }
}

pub type SharedFactory = Arc<dyn CanvasProxyFactory>;
