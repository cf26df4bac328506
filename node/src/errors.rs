// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use thiserror::Error;
use easel_kernel::error::{KernelError, SnapshotError};

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("Room is closed")]
    RoomClosed,
    #[error("Session is waiting for a canvas resync")]
    Syncing,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for NodeError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        NodeError::RoomClosed
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for NodeError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        NodeError::RoomClosed
    }
}
