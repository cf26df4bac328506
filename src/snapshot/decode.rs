// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Snapshot decoding.

use byteorder::{LittleEndian, ReadBytesExt};
use serde::de::DeserializeOwned;

use crate::error::SnapshotError;
use crate::snapshot::encode::{checksum, HEADER_LEN, MAGIC, SCHEMA_VERSION};
use crate::snapshot::SyncState;

pub fn decode_container<T: DeserializeOwned>(buf: &[u8]) -> Result<T, SnapshotError> {
    if buf.len() < HEADER_LEN {
        return Err(SnapshotError::Truncated {
            expected: HEADER_LEN as u64,
            found: buf.len() as u64,
        });
    }

    let mut header = &buf[..HEADER_LEN];
    let magic = header.read_u32::<LittleEndian>()?;
    if magic != MAGIC {
        return Err(SnapshotError::InvalidMagic(magic));
    }
    let version = header.read_u32::<LittleEndian>()?;
    if version != SCHEMA_VERSION {
        return Err(SnapshotError::UnsupportedVersion(version));
    }
    let expected_crc = header.read_u64::<LittleEndian>()?;
    let len = header.read_u64::<LittleEndian>()?;

    let payload = &buf[HEADER_LEN..];
    if payload.len() as u64 != len {
        return Err(SnapshotError::Truncated {
            expected: len,
            found: payload.len() as u64,
        });
    }
    if checksum(payload) != expected_crc {
        return Err(SnapshotError::ChecksumMismatch);
    }

    let (value, read) = bincode::serde::decode_from_slice::<T, _>(payload, bincode::config::standard())
        .map_err(|e| SnapshotError::Decode(e.to_string()))?;
    if read != payload.len() {
        return Err(SnapshotError::Decode(format!(
            "{} trailing bytes after payload",
            payload.len() - read
        )));
    }
    Ok(value)
}

pub fn decode_sync_state(buf: &[u8]) -> Result<SyncState, SnapshotError> {
    decode_container(buf)
}
