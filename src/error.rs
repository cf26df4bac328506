// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.
//!
//! Each error kind maps to one failure boundary of the sync engine:
//! - `ValidationError`: a command is rejected before it becomes an event
//! - `ExecutionError`: an event failed while being applied and was rolled back
//! - `ReconciliationError`: replay of retained history failed; the history was reset
//! - `SnapshotError`: a transferred canvas state could not be decoded

use thiserror::Error;

use crate::types::id::{EventId, LayerId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RasterError {
    #[error("Surface size mismatch: expected {expected_w}x{expected_h}, found {found_w}x{found_h}")]
    SizeMismatch {
        expected_w: u32,
        expected_h: u32,
        found_w: u32,
        found_h: u32,
    },

    #[error("Surface belongs to a different raster backend")]
    IncompatibleSurface,

    #[error("Stroke requires at least one position")]
    EmptyStroke,

    #[error("Invalid image bytes: {0}")]
    InvalidImage(String),

    #[error("Raster backend failure: {0}")]
    Backend(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown layer: {0}")]
    UnknownLayer(LayerId),

    #[error("Layer order does not match the current layers (expected {expected} ids, found {found})")]
    OrderMismatch { expected: usize, found: usize },

    #[error("Event {0} cannot be revoked by this user")]
    NotRevokable(EventId),

    #[error("Event {0} cannot be restored by this user")]
    NotRestorable(EventId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Layer not found: {0}")]
    LayerNotFound(LayerId),

    #[error("Target event not found in history: {0}")]
    EventNotFound(EventId),

    #[error("Event kind {0} cannot be played directly")]
    NotPlayable(&'static str),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Raster(#[from] RasterError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationError {
    #[error("Replaying {count} compacted events into the checkpoint failed: {source}")]
    Compaction {
        count: usize,
        #[source]
        source: ExecutionError,
    },

    #[error("Re-deriving the canvas from the checkpoint failed: {0}")]
    ReExecution(#[source] ExecutionError),
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Invalid snapshot magic: {0:#010x}")]
    InvalidMagic(u32),

    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    #[error("Snapshot truncated: expected {expected} payload bytes, found {found}")]
    Truncated { expected: u64, found: u64 },

    #[error("Snapshot checksum mismatch")]
    ChecksumMismatch,

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("Decoding error: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum KernelError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error("Event was rolled back by the executor")]
    RolledBack,
}

pub type KernelResult<T> = std::result::Result<T, KernelError>;
