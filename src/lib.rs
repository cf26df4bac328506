// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! easel-kernel: a deterministic, event-sourced engine for shared layered raster canvases.
//!
//! The authority turns commands into ordered events; every participant replays
//! those events over a common checkpoint and ends up with the same pixels.
//! Clients additionally predict their own edits and reconcile them against
//! the authoritative stream.

pub mod config;
pub mod error;
pub mod types;
pub mod state;
pub mod event;
pub mod proxy;
pub mod raster;
pub mod canvas;
pub mod timeline;
pub mod executor;
pub mod history;
pub mod virtual_history;
pub mod revoker;
pub mod validator;
pub mod interpreter;
pub mod snapshot;

pub use canvas::{CanvasDrawer, CanvasModel, LayerModel, PreviewOverlay};
pub use error::{KernelError, KernelResult};
pub use event::{CanvasEvent, EventClass, EventKind};
pub use executor::{ApplyOutcome, EventExecutor};
pub use history::{HistoryManager, HistoryObserver};
pub use interpreter::CommandInterpreter;
pub use revoker::{EventRevoker, RevokePolicy};
pub use state::{Command, DrawCommand};
pub use validator::CommandValidator;
pub use virtual_history::VirtualHistoryManager;

#[cfg(test)]
pub mod tests;
