// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::error::SnapshotError;
use crate::raster::BitmapFactory;
use crate::snapshot::decode::decode_sync_state;
use crate::snapshot::encode::{encode_sync_state, HEADER_LEN};
use crate::snapshot::hash::{hash_bytes, to_hex};
use crate::snapshot::{CanvasSnapshot, SyncState};
use crate::tests::fixtures::*;
use crate::types::geometry::Color;
use crate::types::id::LayerId;

fn busy_server() -> crate::history::HistoryManager {
    let mut server = history(3);
    server.event(drawn(0, "a", 0, line(0, 0, 23, 23, Color::rgba(10, 20, 30, 200))));
    server.event(drawn(1, "b", 2, line(23, 0, 0, 23, Color::BLACK)));
    server.event(revoked(2, "a", 0));
    server
}

#[test]
fn test_snapshot_restore() {
    let mut model = blank_model(2);
    model.layer_mut(LayerId(1)).unwrap().name = "ink".to_string();
    model.layer_mut(LayerId(1)).unwrap().draw(&line(2, 2, 9, 4, Color::BLACK)).unwrap();
    model.set_layer_order(&[LayerId(1), LayerId(0)]).unwrap();

    let snapshot = CanvasSnapshot::capture(&model);
    let restored = snapshot.restore(&BitmapFactory).unwrap();

    assert_eq!(model_hash(&restored), model_hash(&model));
    assert_eq!(restored.order(), &[LayerId(1), LayerId(0)]);
    assert_eq!(restored.layer(LayerId(1)).unwrap().name, "ink");
}

#[test]
fn test_sync_state_encode_decode_keeps_hash() {
    let server = busy_server();
    let bytes = encode_sync_state(&server.sync_state()).unwrap();
    let decoded = decode_sync_state(&bytes).unwrap();

    assert_eq!(decoded, server.sync_state());
    let replayed = decoded.replay(&BitmapFactory).unwrap();
    assert_eq!(model_hash(&replayed), model_hash(server.model()));
}

#[test]
fn test_encoding_is_deterministic() {
    let server = busy_server();
    let a = encode_sync_state(&server.sync_state()).unwrap();
    let b = encode_sync_state(&server.sync_state()).unwrap();
    assert_eq!(hash_bytes(&a), hash_bytes(&b));
    assert_eq!(to_hex(&hash_bytes(&a)).len(), 64);
}

#[test]
fn test_corrupted_payload_is_rejected() {
    let mut bytes = encode_sync_state(&busy_server().sync_state()).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    assert!(matches!(decode_sync_state(&bytes), Err(SnapshotError::ChecksumMismatch)));
}

#[test]
fn test_bad_header_is_rejected() {
    let good = encode_sync_state(&busy_server().sync_state()).unwrap();

    let mut bad_magic = good.clone();
    bad_magic[0] ^= 0x01;
    assert!(matches!(decode_sync_state(&bad_magic), Err(SnapshotError::InvalidMagic(_))));

    let mut bad_version = good.clone();
    bad_version[4] = 9;
    assert!(matches!(decode_sync_state(&bad_version), Err(SnapshotError::UnsupportedVersion(9))));

    assert!(matches!(
        decode_sync_state(&good[..HEADER_LEN - 1]),
        Err(SnapshotError::Truncated { .. })
    ));
    assert!(matches!(
        decode_sync_state(&good[..good.len() - 3]),
        Err(SnapshotError::Truncated { .. })
    ));
}

#[test]
fn test_restore_rejects_foreign_raster_size() {
    let model = blank_model(1);
    let mut snapshot = CanvasSnapshot::capture(&model);
    snapshot.size = crate::types::geometry::Size::new(5, 5);
    assert!(snapshot.restore(&BitmapFactory).is_err());
}

#[test]
fn test_sync_state_excludes_predictions() {
    let mut vhm = crate::virtual_history::VirtualHistoryManager::new(history(1));
    vhm.event(drawn(0, "a", 0, line(0, 0, 3, 3, Color::BLACK)));
    vhm.virtual_event(crate::event::CanvasEvent::speculative(
        user("a"),
        crate::event::EventKind::LayerDrawn {
            layer_id: LayerId(0),
            draw: line(3, 3, 6, 6, Color::BLACK),
        },
    ));
    let state: SyncState = vhm.history().sync_state();
    assert_eq!(state.history.len(), 1);
}

#[test]
fn test_sync_state_survives_file_roundtrip() {
    let server = busy_server();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut file, &encode_sync_state(&server.sync_state()).unwrap()).unwrap();

    let bytes = std::fs::read(file.path()).unwrap();
    let replayed = decode_sync_state(&bytes).unwrap().replay(&BitmapFactory).unwrap();
    assert_eq!(model_hash(&replayed), model_hash(server.model()));
}
