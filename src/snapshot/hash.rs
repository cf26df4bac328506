// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Canonical BLAKE3 canvas hashing.
//!
//! Two participants agree on a canvas exactly when their model hashes match.
//!
//! # Hash Input Structure
//! ```text
//! width (u32 LE), height (u32 LE), layer count (u32 LE)
//! ↓
//! For each layer (bottom to top):
//!   id (u32 LE)
//!   name length (u32 LE), name bytes
//!   image length (u64 LE), serialized raster bytes
//! ```
//! Layer visibility is presentation state and is not hashed.

use crate::canvas::model::CanvasModel;

pub fn hash_model(model: &CanvasModel) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();

    let size = model.size();
    hasher.update(&size.width.to_le_bytes());
    hasher.update(&size.height.to_le_bytes());
    hasher.update(&(model.len() as u32).to_le_bytes());

    for layer in model.layers_in_order() {
        hasher.update(&layer.id.0.to_le_bytes());
        hasher.update(&(layer.name.len() as u32).to_le_bytes());
        hasher.update(layer.name.as_bytes());

        let image = layer.raster().serialize_to_bytes();
        hasher.update(&(image.len() as u64).to_le_bytes());
        hasher.update(&image);
    }

    *hasher.finalize().as_bytes()
}

/// Compute BLAKE3 hash of a byte slice
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Lowercase hex, for logs and CLI output.
pub fn to_hex(hash: &[u8; 32]) -> String {
    blake3::Hash::from(*hash).to_hex().to_string()
}
