// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod layer;
pub mod model;
pub mod drawer;
pub mod preview;

pub use drawer::{CanvasDrawer, LayerController};
pub use layer::{LayerDrawer, LayerModel};
pub use model::CanvasModel;
pub use preview::PreviewOverlay;
