// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Snapshot encoding.
//!
//! # Container layout
//! ```text
//! [magic: u32 LE "ESYN"][version: u32 LE][crc64: u64 LE][len: u64 LE][payload]
//! ```
//! The payload is bincode (serde mode, standard config). The checksum covers
//! the payload only.

use byteorder::{LittleEndian, WriteBytesExt};
use crc64fast::Digest;
use serde::Serialize;

use crate::error::SnapshotError;
use crate::snapshot::SyncState;

pub const MAGIC: u32 = 0x4E59_5345; // "ESYN"
pub const SCHEMA_VERSION: u32 = 1;
pub const HEADER_LEN: usize = 24;

pub fn checksum(payload: &[u8]) -> u64 {
    let mut digest = Digest::new();
    digest.write(payload);
    digest.sum64()
}

pub fn encode_container<T: Serialize>(value: &T) -> Result<Vec<u8>, SnapshotError> {
    let payload = bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| SnapshotError::Encode(e.to_string()))?;

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.write_u32::<LittleEndian>(MAGIC)?;
    out.write_u32::<LittleEndian>(SCHEMA_VERSION)?;
    out.write_u64::<LittleEndian>(checksum(&payload))?;
    out.write_u64::<LittleEndian>(payload.len() as u64)?;
    out.extend_from_slice(&payload);
    Ok(out)
}

pub fn encode_sync_state(state: &SyncState) -> Result<Vec<u8>, SnapshotError> {
    encode_container(state)
}
