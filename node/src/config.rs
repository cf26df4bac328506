// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use easel_kernel::config::HistoryConfig;
use easel_kernel::revoker::RevokePolicy;
use easel_kernel::types::geometry::Size;

use crate::errors::NodeError;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "EASEL_CONFIG";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub width: u32,
    pub height: u32,
    /// Layers present before the first event.
    pub initial_layers: u32,
    pub history: HistoryConfig,
    pub revoke_policy: RevokePolicy,
    /// Depth of the room's request queue.
    pub room_queue: usize,
    pub render_interval_ms: u64,
    /// Where `--dump` writes the room's sync state.
    pub dump_path: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            initial_layers: 1,
            history: HistoryConfig::default(),
            revoke_policy: RevokePolicy::default(),
            room_queue: 256,
            render_interval_ms: 16,
            dump_path: None,
        }
    }
}

impl NodeConfig {
    /// Reads the file named by `EASEL_CONFIG`, or falls back to defaults when unset.
    pub fn load() -> Result<Self, NodeError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_path(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, NodeError> {
        let raw = std::fs::read_to_string(path)?;
        let cfg: NodeConfig = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn canvas_size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    fn validate(&self) -> Result<(), NodeError> {
        if self.width == 0 || self.height == 0 {
            return Err(NodeError::InvalidInput(format!(
                "canvas size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.room_queue == 0 {
            return Err(NodeError::InvalidInput("room_queue must be at least 1".into()));
        }
        Ok(())
    }
}
